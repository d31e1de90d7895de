mod models;
mod queries;
mod sqlite;

pub use models::IndexRecord;
pub use sqlite::Database;
