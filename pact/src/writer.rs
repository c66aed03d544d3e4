//! Contract file output.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::WriteMode;
use crate::contract::{Contract, ContractInteraction};
use crate::error::PactError;
use crate::interaction::Interaction;

static MERGE_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Writes contract documents atomically.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractWriter {
    mode: WriteMode,
}

impl ContractWriter {
    /// Create a writer with the given update policy.
    #[must_use]
    pub const fn new(mode: WriteMode) -> Self {
        Self { mode }
    }

    /// Update policy in use.
    #[must_use]
    pub const fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Persist `interactions` as the contract between `consumer` and
    /// `provider` at `destination`.
    ///
    /// The file is either fully replaced or left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Serialization`] if the document cannot be
    /// written, or [`PactError::InvalidContract`] if merge mode finds an
    /// existing file that is not a contract.
    pub fn write(
        &self,
        consumer: &str,
        provider: &str,
        interactions: &[Interaction],
        destination: &Path,
    ) -> Result<(), PactError> {
        let contract = match self.mode {
            WriteMode::Overwrite => {
                let contract = Contract::from_interactions(consumer, provider, interactions);
                write_document(&contract, destination)?;
                contract
            }
            WriteMode::Merge => {
                let _guard = MERGE_LOCK.lock();
                let contract = merged(consumer, provider, interactions, destination)?;
                write_document(&contract, destination)?;
                contract
            }
        };
        info!(
            path = %destination.display(),
            mode = ?self.mode,
            interactions = contract.interactions.len(),
            "Contract written"
        );
        Ok(())
    }
}

fn merged(
    consumer: &str,
    provider: &str,
    interactions: &[Interaction],
    destination: &Path,
) -> Result<Contract, PactError> {
    if !destination.exists() {
        return Ok(Contract::from_interactions(consumer, provider, interactions));
    }
    let mut contract = Contract::read(destination)?;
    debug!(
        path = %destination.display(),
        existing = contract.interactions.len(),
        "Merging into existing contract"
    );
    contract.merge(interactions.iter().map(ContractInteraction::from).collect());
    Ok(contract)
}

fn write_document(contract: &Contract, destination: &Path) -> Result<(), PactError> {
    let text = contract
        .to_json_pretty()
        .map_err(|e| PactError::serialization(destination, e))?;
    write_atomic(destination, text.as_bytes())
}

/// Write through a temp file in the destination directory, then rename.
fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<(), PactError> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = destination
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| PactError::serialization(destination, "destination has no file name"))?;

    fs::create_dir_all(dir).map_err(|e| PactError::serialization(destination, e))?;

    let temp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    if let Err(e) = fs::write(&temp, bytes).and_then(|()| fs::rename(&temp, destination)) {
        let _ = fs::remove_file(&temp);
        return Err(PactError::serialization(destination, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{RequestSpec, ResponseSpec};
    use tempfile::TempDir;

    fn interaction(description: &str, status: u16) -> Interaction {
        Interaction::new(description, RequestSpec::get("/Products"), ResponseSpec::new(status))
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_overwrite_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ApiClient-ProductService.json");
        let writer = ContractWriter::default();

        writer.write("ApiClient", "ProductService", &[interaction("a", 200)], &path).unwrap();
        let first = fs::read(&path).unwrap();
        writer.write("ApiClient", "ProductService", &[interaction("a", 200)], &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
        assert!(first.ends_with(b"}\n"));

        writer.write("ApiClient", "ProductService", &[interaction("b", 200)], &path).unwrap();
        let contract = Contract::read(&path).unwrap();
        assert_eq!(contract.interactions.len(), 1);
        assert_eq!(contract.interactions[0].description, "b");
    }

    #[test]
    fn test_merge_keeps_earlier_interactions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c-p.json");
        let writer = ContractWriter::new(WriteMode::Merge);

        writer.write("c", "p", &[interaction("a", 200), interaction("b", 200)], &path).unwrap();
        writer.write("c", "p", &[interaction("b", 404), interaction("c", 200)], &path).unwrap();

        let contract = Contract::read(&path).unwrap();
        let described: Vec<_> = contract
            .interactions
            .iter()
            .map(|i| (i.description.as_str(), i.response.status))
            .collect();
        assert_eq!(described, vec![("a", 200), ("b", 404), ("c", 200)]);
    }

    #[test]
    fn test_merge_rejects_foreign_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c-p.json");
        fs::write(&path, "not a contract").unwrap();

        let err = ContractWriter::new(WriteMode::Merge)
            .write("c", "p", &[interaction("a", 200)], &path)
            .unwrap_err();
        assert!(matches!(err, PactError::InvalidContract(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not a contract");
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blocker"), "").unwrap();

        let under_file = dir.path().join("blocker").join("c-p.json");
        let err = ContractWriter::default()
            .write("c", "p", &[interaction("a", 200)], &under_file)
            .unwrap_err();
        assert!(matches!(err, PactError::Serialization { .. }));

        let occupied = dir.path().join("occupied");
        fs::create_dir(&occupied).unwrap();
        fs::write(occupied.join("keep"), "").unwrap();
        let err = ContractWriter::default()
            .write("c", "p", &[interaction("a", 200)], &occupied)
            .unwrap_err();
        assert!(matches!(err, PactError::Serialization { .. }));

        assert_eq!(entries(dir.path()), vec!["blocker", "occupied"]);
    }
}
