use db::{AlphaRepository, DbConfig, DbError};
use sim_core::AlphaSpec;

/// Fresh in-memory repository. Every call opens its own `mem://` datastore.
pub async fn setup_repo() -> Result<AlphaRepository, DbError> {
    let db = db::init(DbConfig::memory()).await?;
    Ok(AlphaRepository::new(db))
}

pub fn specs(expressions: &[&str]) -> Vec<AlphaSpec> {
    expressions.iter().map(|e| AlphaSpec::regular(*e)).collect()
}

pub fn fingerprints(expressions: &[&str]) -> Vec<String> {
    expressions.iter().map(|e| e.to_string()).collect()
}
