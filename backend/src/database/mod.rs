pub mod pool;
pub mod retry;

pub use pool::{create_pool, run_migrations, Database, DatabaseError, IsolationLevel};
pub use retry::with_retry;
