pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{MemoryStore, StoreOp};
pub use postgres::PgStore;
pub use traits::*;
