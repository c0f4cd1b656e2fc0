pub mod bindings;
pub mod execution_layer;
pub mod header;
