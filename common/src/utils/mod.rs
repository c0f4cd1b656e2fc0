pub mod logging;
pub mod rpc_client;
