pub mod account;
pub mod auth;
pub mod finality;
pub mod node_client;
pub mod prover_client;
pub mod sequencer_client;
pub mod signature;
pub mod transaction;
pub mod types;
