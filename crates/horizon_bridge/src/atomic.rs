//! Whole-document persistence: atomic writes and lenient reads.

use crate::error::{BridgeError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

/// Atomic write: temp file in the target directory, fsync, then rename.
///
/// Readers observe either the previous document or the new one, never a
/// partial write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| BridgeError::io("creating", parent, e))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".tmp_")
        .tempfile_in(parent)
        .map_err(|e| BridgeError::io("creating temp file in", parent, e))?;
    temp.write_all(content)
        .map_err(|e| BridgeError::io("writing temp file for", path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| BridgeError::io("syncing temp file for", path, e))?;

    temp.persist(path).map_err(|source| BridgeError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Pretty-print `value` and write it atomically, with a trailing newline.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    atomic_write(path, &json)
}

/// Read a JSON document the bridge wrote on an earlier run.
///
/// A missing file is `Ok(None)`. A file that exists but does not parse is
/// also `Ok(None)` with a warning: the bridge rebuilds from whatever other
/// state survives rather than refusing to run. Only an unreadable file (for
/// example a permissions problem) is an error.
pub fn load_json_lenient<T: DeserializeOwned>(path: &Path, label: &str) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(BridgeError::io("reading", path, err)),
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Ignoring unparseable prior {}; treating it as empty",
                label
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent_and_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("doc.json");

        atomic_write_json(&path, &json!({"a": 1})).unwrap();

        let loaded: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, json!({"a": 1}));
    }

    #[test]
    fn test_atomic_write_overwrites_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp = TempDir::new().unwrap();
        let loaded: Option<Value> =
            load_json_lenient(&temp.path().join("absent.json"), "queue").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_corrupt_is_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        fs::write(&path, "{ truncated").unwrap();

        let loaded: Option<Value> = load_json_lenient(&path, "state").unwrap();
        assert!(loaded.is_none());
    }
}
