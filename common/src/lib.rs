// Shared modules for the keywarden node
pub mod config;
pub mod keystore;
pub mod l1;
pub mod l2;
pub mod utils;
