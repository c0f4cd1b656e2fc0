use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    let parse_error = "Failed to parse env filter directive";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("alloy_transport_http=off".parse().expect(parse_error))
        .add_directive("alloy_rpc_client=off".parse().expect(parse_error))
        .add_directive("reqwest=off".parse().expect(parse_error))
        .add_directive("hyper_util=off".parse().expect(parse_error));

    tracing_subscriber::fmt()
        .with_env_filter(filter) // reads RUST_LOG
        .init();
}
