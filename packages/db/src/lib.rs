//! SurrealDB integration for the alpha simulation store.
//!
//! This crate provides database connectivity and the repository that
//! persists alpha records.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage; also makes
//!   `rocksdb://alpha_store` the default endpoint

mod connection;
mod schema;
pub mod repositories;

pub use connection::{DEFAULT_ENDPOINT, Database, DbConfig, DbError, connect};
pub use repositories::AlphaRepository;
pub use schema::init_schema;

/// Connect with the given configuration and make sure the schema exists.
///
/// This should be called once at application startup.
pub async fn init(config: DbConfig) -> Result<Database, DbError> {
    let db = connect(&config).await?;
    init_schema(&db).await?;
    Ok(db)
}
