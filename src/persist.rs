//! Atomic single-file persistence.
//!
//! Both store files are written with the write-temp-then-rename
//! protocol: serialise to `<target>.tmp`, then rename over `<target>`.
//! A reader therefore always observes either the previously committed
//! file or the newly committed one, never a half-written mix. Any error
//! while producing the temp file deletes it before the error propagates.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Run `write` against `<target>.tmp`, then rename the temp file over
/// `target`. On any failure the temp file is removed and the error
/// re-raised; the committed file is left untouched.
pub(crate) fn write_atomic<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(target);
    let commit = File::create(&tmp)
        .map_err(StoreError::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            Ok(())
        })
        .and_then(|()| fs::rename(&tmp, target).map_err(StoreError::from));

    if commit.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    commit
}

/// Serialise `value` as JSON into `target` atomically.
pub(crate) fn save_json<T: Serialize>(target: &Path, value: &T) -> Result<()> {
    write_atomic(target, |writer| {
        serde_json::to_writer(writer, value).map_err(|source| StoreError::Encode {
            path: target.to_path_buf(),
            source,
        })
    })
}

/// Load a JSON store file.
pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let mut value = BTreeMap::new();
        value.insert("k".to_string(), vec![1, 2, 3]);

        save_json(&path, &value).unwrap();
        let loaded: BTreeMap<String, Vec<i32>> = load_json(&path).unwrap();
        assert_eq!(loaded, value);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_creates_missing_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/deeper/store.json");
        save_json(&path, &vec!["x"]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_failed_write_keeps_committed_file_and_cleans_temp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        save_json(&path, &vec!["committed"]).unwrap();

        // Simulate a failure mid-serialisation: partial bytes have been
        // written to the temp file when the error occurs.
        let err = write_atomic(&path, |writer| {
            writer.write_all(b"{\"partial\":").unwrap();
            Err(StoreError::Io(std::io::Error::new(
                ErrorKind::Other,
                "injected",
            )))
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));

        assert!(!temp_path(&path).exists(), "temp file must be cleaned up");
        let intact: Vec<String> = load_json(&path).unwrap();
        assert_eq!(intact, vec!["committed".to_string()]);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_json::<Vec<String>>(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn test_load_garbage_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("garbage.json");
        fs::write(&path, b"not json at all").unwrap();
        let err = load_json::<Vec<String>>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
