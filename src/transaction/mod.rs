pub mod model;
pub mod pool;

pub use model::{Transaction, now_timestamp};
pub use pool::TransactionPool;
