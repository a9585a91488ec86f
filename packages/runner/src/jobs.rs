//! Job file loading.

use std::path::Path;

use serde::Deserialize;
use sim_core::AlphaSpec;

/// One entry of a job file: a full spec, or a bare expression that gets the
/// default settings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobEntry {
    Spec(AlphaSpec),
    Expression(String),
}

impl From<JobEntry> for AlphaSpec {
    fn from(entry: JobEntry) -> Self {
        match entry {
            JobEntry::Spec(spec) => spec,
            JobEntry::Expression(expression) => AlphaSpec::regular(expression),
        }
    }
}

pub fn parse_jobs(contents: &str) -> Result<Vec<AlphaSpec>, serde_json::Error> {
    let entries: Vec<JobEntry> = serde_json::from_str(contents)?;
    Ok(entries.into_iter().map(AlphaSpec::from).collect())
}

pub async fn load_jobs(path: &Path) -> Result<Vec<AlphaSpec>, Box<dyn std::error::Error>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let specs = parse_jobs(&contents)?;
    tracing::info!("Loaded {} alphas from {}", specs.len(), path.display());
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_specs_and_bare_expressions() -> Result<(), serde_json::Error> {
        let specs = parse_jobs(
            r#"[
                "rank(close)",
                {"type": "REGULAR", "settings": {"decay": 3}, "regular": "rank(open)"}
            ]"#,
        )?;

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0], AlphaSpec::regular("rank(close)"));
        assert_eq!(specs[1].fingerprint, "rank(open)");
        assert_eq!(specs[1].settings["decay"], 3);
        Ok(())
    }

    #[test]
    fn rejects_non_array_documents() {
        assert!(parse_jobs(r#"{"regular": "rank(close)"}"#).is_err());
    }
}
