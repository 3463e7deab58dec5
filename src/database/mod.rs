pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
pub mod users;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::{MemoryStore, MemoryUserStore};
pub use postgres::{PgStore, PgUserStore};
pub use store::{OwnedStore, StoreError, Table};
pub use users::UserStore;
