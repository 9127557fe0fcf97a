//! JSON persistence for [`ContactBook`].
//!
//! A contact file is a JSON array of records:
//!
//! ```json
//! [
//!   {
//!     "alias": "bob",
//!     "communication_address": "127.0.0.1:9605",
//!     "communication_type": "websocket",
//!     "on_chain_address": "0x0303030303030303030303030303030303030303"
//!   }
//! ]
//! ```

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use tandem_core::error::{Result, TandemError};
use tandem_core::types::ContactRecord;

use crate::ContactBook;

impl ContactBook {
    /// Reads a contact file.
    ///
    /// Unknown transport types and duplicate aliases fail the whole load.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read(path).await.map_err(|e| {
            TandemError::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to read contact file {}: {}", path.display(), e),
            ))
        })?;

        let records: Vec<ContactRecord> = serde_json::from_slice(&contents)
            .map_err(|e| TandemError::ContactError(format!("{}: {}", path.display(), e)))?;
        let book = Self::from_records(records)?;

        info!(count = book.len(), "contacts loaded");
        Ok(book)
    }

    /// Writes the book to `path`, replacing the file atomically.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let records = self.records();
        let serialized = serde_json::to_vec_pretty(&records)?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await?;

        debug!(count = records.len(), "contacts saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::types::{Address, TransportKind};
    use tokio_test::{assert_err, assert_ok};

    fn record(alias: &str, byte: u8) -> ContactRecord {
        ContactRecord {
            alias: alias.into(),
            communication_address: format!("127.0.0.1:96{:02}/tandem", byte),
            communication_type: TransportKind::WebSocket,
            on_chain_address: Address::from_array([byte; 20]),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");

        let book = ContactBook::from_records([record("alice", 1), record("bob", 2)]).unwrap();
        assert_ok!(book.save(&path).await);

        let loaded = assert_ok!(ContactBook::load(&path).await);
        assert_eq!(loaded.records(), book.records());
        assert_eq!(loaded.off_chain_id("bob").unwrap().listener_endpoint, "/tandem");
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_transport() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");
        let json = r#"[{
            "alias": "bob",
            "communication_address": "127.0.0.1:9605",
            "communication_type": "carrier-pigeon",
            "on_chain_address": "0x0303030303030303030303030303030303030303"
        }]"#;
        fs::write(&path, json).await.unwrap();

        let err = assert_err!(ContactBook::load(&path).await);
        assert!(matches!(err, TandemError::ContactError(_)));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContactBook::load(dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, TandemError::IoError(_)));
    }
}
