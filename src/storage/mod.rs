pub mod cache;
pub mod database;
pub mod models;

pub use cache::QueryCache;
pub use database::Database;
