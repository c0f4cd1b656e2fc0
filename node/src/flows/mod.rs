pub mod deposit;
pub mod sync;
pub mod update;
pub mod user_op;
pub mod withdraw;
