//! File-backed hash registry
//!
//! The registry is a flat file of 64-byte records. Every read-modify-write
//! happens under an exclusive advisory lock (fs2), so several processes can
//! share one registry file.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use tracing::debug;

use crate::crypto::DIGEST_SIZE;
use crate::domain::result::{Error, Result};
use crate::domain::AccountHash;
use crate::ports::HashRegistry;

/// Hash registry persisted to a single file
pub struct FileHashRegistry {
    path: PathBuf,
    // Serializes threads within this process; the file lock covers other processes
    guard: Mutex<()>,
}

impl FileHashRegistry {
    /// Open (creating if needed) the registry at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_failure(&path, e))?;
            }
        }
        let registry = Self {
            path,
            guard: Mutex::new(()),
        };
        // Validate up front so a corrupt file fails at startup
        registry.read_all()?;
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| io_failure(&self.path, e))
    }

    fn read_all(&self) -> Result<BTreeSet<AccountHash>> {
        let _guard = self.guard.lock();
        let mut file = self.open_file()?;
        FileExt::lock_shared(&file).map_err(|e| io_failure(&self.path, e))?;
        let result = read_records(&mut file, &self.path);
        FileExt::unlock(&file).map_err(|e| io_failure(&self.path, e))?;
        result
    }

    /// Apply `change` to the record set under an exclusive lock. The file
    /// is rewritten only if `change` reports a modification.
    fn alter<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeSet<AccountHash>) -> Result<bool>,
    {
        let _guard = self.guard.lock();
        let mut file = self.open_file()?;
        FileExt::lock_exclusive(&file).map_err(|e| io_failure(&self.path, e))?;
        let result = rewrite(&mut file, &self.path, change);
        FileExt::unlock(&file).map_err(|e| io_failure(&self.path, e))?;
        result
    }
}

fn rewrite<F>(file: &mut File, path: &Path, change: F) -> Result<()>
where
    F: FnOnce(&mut BTreeSet<AccountHash>) -> Result<bool>,
{
    let mut records = read_records(file, path)?;
    if !change(&mut records)? {
        return Ok(());
    }

    let mut buf = Vec::with_capacity(records.len() * DIGEST_SIZE);
    for hash in &records {
        buf.extend_from_slice(hash.as_bytes());
    }
    file.seek(SeekFrom::Start(0)).map_err(|e| io_failure(path, e))?;
    file.set_len(0).map_err(|e| io_failure(path, e))?;
    file.write_all(&buf).map_err(|e| io_failure(path, e))?;
    file.sync_data().map_err(|e| io_failure(path, e))?;
    debug!(path = %path.display(), records = records.len(), "hash registry rewritten");
    Ok(())
}

fn read_records(file: &mut File, path: &Path) -> Result<BTreeSet<AccountHash>> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0)).map_err(|e| io_failure(path, e))?;
    file.read_to_end(&mut buf).map_err(|e| io_failure(path, e))?;

    if buf.len() % DIGEST_SIZE != 0 {
        return Err(Error::adapter(format!(
            "hash registry {} is corrupt: {} bytes is not a whole number of records",
            path.display(),
            buf.len()
        )));
    }
    Ok(buf
        .chunks_exact(DIGEST_SIZE)
        .filter_map(AccountHash::from_slice)
        .collect())
}

fn io_failure(path: &Path, err: std::io::Error) -> Error {
    Error::adapter(format!("hash registry {}: {err}", path.display()))
}

impl HashRegistry for FileHashRegistry {
    fn insert_hash(&self, hash: &AccountHash) -> Result<()> {
        self.alter(|records| Ok(records.insert(*hash)))
    }

    fn remove_hash(&self, hash: &AccountHash) -> Result<()> {
        self.alter(|records| Ok(records.remove(hash)))
    }

    fn check_hash(&self, hash: &AccountHash) -> Result<()> {
        if self.read_all()?.contains(hash) {
            Ok(())
        } else {
            Err(Error::NotValid)
        }
    }

    fn hash_count(&self) -> Result<u64> {
        Ok(self.read_all()?.len() as u64)
    }

    fn export_hashes(&self) -> Result<Vec<AccountHash>> {
        Ok(self.read_all()?.into_iter().collect())
    }

    fn replace_hash(&self, old: &AccountHash, new: &AccountHash) -> Result<()> {
        self.alter(|records| {
            if !records.remove(old) {
                return Err(Error::NotValid);
            }
            records.insert(*new);
            Ok(true)
        })
    }
}
