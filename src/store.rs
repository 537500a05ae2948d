use crate::error::StoreError;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// MAC (or other key) to a single string value, as persisted in one two-column CSV file.
pub type MacMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backup {
    Skip,
    Rotate,
}

/// Two-column `key,value` CSV files with exclusive-lock writes and rotating backups.
#[derive(Debug, Clone)]
pub struct CsvStore {
    backup_dir: PathBuf,
    generations: usize,
}

impl CsvStore {
    pub fn new(backup_dir: impl Into<PathBuf>, generations: usize) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            generations,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Missing file reads as an empty map. Rows with fewer than two fields are skipped.
    pub fn load(&self, path: &Path) -> MacMap {
        let mut map = MacMap::new();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to open {}: {}", path.display(), e);
                }
                return map;
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .escape(Some(b'\\'))
            .from_reader(file);

        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                    break;
                }
                Err(_) => continue,
            };

            if let (Some(key), Some(value)) = (record.get(0), record.get(1)) {
                map.insert(storage_key(key), value.to_string());
            }
        }

        map
    }

    pub fn save(&self, path: &Path, map: &MacMap, backup: Backup) -> Result<(), StoreError> {
        self.save_at(path, map, backup, Local::now())
    }

    pub(crate) fn save_at(
        &self,
        path: &Path,
        map: &MacMap,
        backup: Backup,
        now: DateTime<Local>,
    ) -> Result<(), StoreError> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        if backup == Backup::Rotate {
            self.rotate(path, now)?;
        }

        // Truncate only once the lock is held so a concurrent writer never sees us clobber its rows.
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        file.lock().map_err(|source| StoreError::Lock {
            path: path.to_path_buf(),
            source,
        })?;

        let written = write_rows(&file, map);
        if let Err(e) = file.unlock() {
            tracing::debug!("Failed to unlock {}: {}", path.display(), e);
        }
        written.map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Saved {} rows to {}", map.len(), path.display());
        Ok(())
    }

    fn rotate(&self, path: &Path, now: DateTime<Local>) -> Result<(), StoreError> {
        fs::create_dir_all(&self.backup_dir).map_err(|source| StoreError::CreateDir {
            path: self.backup_dir.clone(),
            source,
        })?;

        let base = base_name(path);

        if path.exists() {
            let target = self
                .backup_dir
                .join(format!("{}_{}.csv", base, now.format("%Y%m%d%H%M%S")));
            let backup_err = |source| StoreError::Backup {
                path: target.clone(),
                source,
            };
            fs::copy(path, &target).map_err(backup_err)?;
            // Stamp the copy so retention order follows save order, not copy latency.
            let stamped = OpenOptions::new()
                .write(true)
                .open(&target)
                .and_then(|copy| copy.set_modified(SystemTime::from(now)));
            if let Err(e) = stamped {
                tracing::debug!("Failed to stamp {}: {}", target.display(), e);
            }
        }

        self.prune(&base);
        Ok(())
    }

    fn prune(&self, base: &str) {
        let prefix = format!("{}_", base);
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to list {}: {}", self.backup_dir.display(), e);
                return;
            }
        };

        let mut backups: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(&prefix) && name.ends_with(".csv")
            })
            .map(|entry| {
                let modified = entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, entry.path())
            })
            .collect();

        if backups.len() <= self.generations {
            return;
        }

        backups.sort();
        let excess = backups.len() - self.generations;
        for (_, stale) in backups.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&stale) {
                tracing::warn!("Failed to remove backup {}: {}", stale.display(), e);
            }
        }
    }
}

// Only `:` separates octets here; a `-` inside a stored key is kept as part of its octet.
fn storage_key(raw: &str) -> String {
    if raw.contains(':') && raw.len() >= 11 {
        raw.split(':')
            .map(|octet| format!("{:0>2}", octet.to_lowercase()))
            .collect::<Vec<_>>()
            .join(":")
    } else {
        raw.to_string()
    }
}

fn base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".csv") {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

/// Quotes a field so the backslash-escaping reader in [`CsvStore::load`] reads it back unchanged.
///
/// Inside quotes the reader drops an escape byte and keeps whatever follows it,
/// so a backslash is written as `\\` and a quote is doubled.
fn encode_field(field: &str) -> String {
    if !field.contains([',', '"', '\\', '\r', '\n']) {
        return field.to_string();
    }
    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('"');
    for c in field.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\"\""),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn write_rows(file: &File, map: &MacMap) -> Result<(), csv::Error> {
    file.set_len(0)?;
    // Fields arrive already quoted by `encode_field`.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(file);
    for (key, value) in map {
        writer.write_record([encode_field(key), encode_field(value)])?;
    }
    writer.flush()?;
    Ok(())
}
