use crate::mac::{is_locally_administered, oui_prefix};
use crate::store::CsvStore;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::PathBuf;

pub const RANDOMIZED_VENDOR: &str = "randomized MAC";
pub const UNKNOWN_VENDOR: &str = "unknown";

/// OUI prefix ("AABBCC") to organization name.
#[derive(Debug, Clone, Default)]
pub struct OuiTable {
    vendors: HashMap<String, String>,
}

impl OuiTable {
    /// Prefixes may be written with or without hyphens, in any case.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vendors = pairs
            .into_iter()
            .map(|(prefix, vendor)| {
                let prefix = prefix.as_ref().trim().to_uppercase().replace('-', "");
                (prefix, vendor.into())
            })
            .collect();
        Self { vendors }
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.vendors.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

enum Source {
    File { path: PathBuf, store: CsvStore },
    Table(OuiTable),
}

/// Vendor lookup backed by an OUI table that is read at most once, on first use.
pub struct VendorResolver {
    source: Source,
    table: OnceCell<OuiTable>,
}

impl VendorResolver {
    pub fn from_file(path: impl Into<PathBuf>, store: CsvStore) -> Self {
        Self {
            source: Source::File {
                path: path.into(),
                store,
            },
            table: OnceCell::new(),
        }
    }

    pub fn with_table(table: OuiTable) -> Self {
        Self {
            source: Source::Table(table),
            table: OnceCell::new(),
        }
    }

    fn table(&self) -> &OuiTable {
        self.table.get_or_init(|| match &self.source {
            Source::File { path, store } => {
                let table = OuiTable::from_pairs(store.load(path));
                tracing::info!("Loaded {} OUI prefixes from {}", table.len(), path.display());
                table
            }
            Source::Table(table) => table.clone(),
        })
    }

    /// `mac` is expected in canonical form.
    pub fn resolve(&self, mac: &str) -> String {
        if is_locally_administered(mac) {
            return RANDOMIZED_VENDOR.to_string();
        }

        oui_prefix(mac)
            .and_then(|prefix| self.table().get(&prefix).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_VENDOR.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resolver() -> VendorResolver {
        VendorResolver::with_table(OuiTable::from_pairs([
            ("00-17-F2", "Apple, Inc."),
            ("b827eb", "Raspberry Pi Foundation"),
            ("020000", "Should never match"),
        ]))
    }

    #[test]
    fn resolves_known_prefix() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("00:17:f2:01:02:03"), "Apple, Inc.");
        assert_eq!(resolver.resolve("b8:27:eb:00:00:01"), "Raspberry Pi Foundation");
    }

    #[test]
    fn unknown_prefix_falls_back() {
        assert_eq!(resolver().resolve("00:00:01:00:00:00"), UNKNOWN_VENDOR);
        assert_eq!(resolver().resolve("00:17"), UNKNOWN_VENDOR);
    }

    #[test]
    fn locally_administered_wins_over_table() {
        assert_eq!(resolver().resolve("02:00:00:00:00:01"), RANDOMIZED_VENDOR);
    }

    #[test]
    fn file_is_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oui.csv");
        fs::write(&path, "00-17-F2,\"Apple, Inc.\"\n").unwrap();

        let resolver = VendorResolver::from_file(&path, CsvStore::new(dir.path(), 5));
        assert_eq!(resolver.resolve("00:17:f2:00:00:00"), "Apple, Inc.");

        fs::write(&path, "00-17-F2,Changed\n").unwrap();
        assert_eq!(resolver.resolve("00:17:f2:00:00:00"), "Apple, Inc.");
    }

    #[test]
    fn missing_file_resolves_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let resolver =
            VendorResolver::from_file(dir.path().join("absent.csv"), CsvStore::new(dir.path(), 5));
        assert_eq!(resolver.resolve("00:17:f2:00:00:00"), UNKNOWN_VENDOR);
    }
}
