//! Storage backends

pub mod mysql;
pub mod sqlite;

pub use mysql::MySqlRepository;
pub use sqlite::SqliteRepository;
