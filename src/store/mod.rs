//! SQLite persistence of galaxy aggregates

mod fetch;
pub mod row;
mod save;
pub mod schema_gen;
mod sqlite;

pub use save::Changes;
pub use sqlite::GalaxyStore;
