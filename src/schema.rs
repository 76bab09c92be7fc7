//! Schema provisioning stage.
//!
//! Reads one DDL script and runs it through the store gateway as a single
//! transactional batch. Re-provisioning without dropping objects fails on the
//! database's duplicate-object errors and rolls back, leaving no partial
//! schema behind. There is no partial application or subset re-run.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to read DDL script {path}: {source}")]
    ReadScript {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run the DDL script at `path` against the store.
pub async fn provision(store: &Store, path: &Path) -> Result<(), ProvisionError> {
    let script = std::fs::read_to_string(path).map_err(|source| ProvisionError::ReadScript {
        path: path.display().to_string(),
        source,
    })?;

    store.run_batch(&script).await?;
    info!(script = %path.display(), "schema provisioned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[tokio::test]
    async fn missing_script_is_a_read_error() {
        let store = Store::new(&StoreConfig {
            host: "localhost".into(),
            port: 5433,
            user: "u".into(),
            password: "p".into(),
            database: "d".into(),
            schema: "s".into(),
        });

        let err = provision(&store, Path::new("does/not/exist.sql"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ReadScript { .. }));
    }
}
