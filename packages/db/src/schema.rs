//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates the alpha table, its fields, and indexes. Safe to run on
/// every startup.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(ALPHA_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Alpha table schema.
const ALPHA_SCHEMA: &str = r#"
-- Alpha table, one record per simulated expression
DEFINE TABLE IF NOT EXISTS alpha SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS fingerprint ON alpha TYPE string;
DEFINE FIELD IF NOT EXISTS alpha_type ON alpha TYPE string;
DEFINE FIELD IF NOT EXISTS settings ON alpha FLEXIBLE TYPE object;
DEFINE FIELD IF NOT EXISTS status ON alpha TYPE string DEFAULT "pending"
    ASSERT $value IN ["pending", "success", "failed"];
DEFINE FIELD IF NOT EXISTS remote_id ON alpha TYPE option<string>;
DEFINE FIELD IF NOT EXISTS attempt_count ON alpha TYPE int DEFAULT 0;
DEFINE FIELD IF NOT EXISTS batch_id ON alpha TYPE option<string>;
DEFINE FIELD IF NOT EXISTS error_message ON alpha TYPE option<string>;
DEFINE FIELD IF NOT EXISTS created_at ON alpha TYPE datetime DEFAULT time::now() READONLY;
DEFINE FIELD IF NOT EXISTS updated_at ON alpha TYPE datetime DEFAULT time::now();

-- Fingerprint is the identity key
DEFINE INDEX IF NOT EXISTS alpha_fingerprint ON alpha FIELDS fingerprint UNIQUE;
DEFINE INDEX IF NOT EXISTS alpha_status ON alpha FIELDS status;
DEFINE INDEX IF NOT EXISTS alpha_batch ON alpha FIELDS batch_id;
DEFINE INDEX IF NOT EXISTS alpha_created ON alpha FIELDS created_at;
"#;
