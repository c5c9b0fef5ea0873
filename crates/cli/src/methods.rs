//! Methods the stdio bridge answers out of the box.

use {
    serde_json::json,
    xnft_channels::{ChannelBinding, MethodRegistry},
    xnft_config::ResponseOriginMode,
};

pub fn builtin_methods(binding: &ChannelBinding) -> MethodRegistry {
    let mut reg = MethodRegistry::new();

    reg.register("ping", Box::new(|_ctx| Box::pin(async { Ok(json!("pong")) })));

    reg.register(
        "echo",
        Box::new(|ctx| Box::pin(async move { Ok(ctx.params) })),
    );

    let mut methods = reg.method_names();
    methods.push("channel.info".into());
    methods.sort();
    let info = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "target_url": binding.target_href(),
        "target_origin": binding.target_origin(),
        "request_channel": binding.request_channel(),
        "response_channel": binding.response_channel(),
        "response_origin": match binding.response_origin() {
            ResponseOriginMode::Any => "any",
            ResponseOriginMode::Target => "target",
        },
        "methods": methods,
    });
    reg.register(
        "channel.info",
        Box::new(move |_ctx| {
            let info = info.clone();
            Box::pin(async move { Ok(info) })
        }),
    );

    reg
}
