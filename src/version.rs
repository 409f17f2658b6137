/// Gateway version reported by `--version` and at startup. Release builds
/// may stamp it through the `GATEWAY_VERSION` build-time variable.
pub const VERSION: &str = match option_env!("GATEWAY_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};
