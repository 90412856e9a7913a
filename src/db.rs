use crate::constants::{BUILTIN_OUI, LEARNED_VENDOR_FILE};
use crate::errors::ScanError;
use crate::net::mac::{is_locally_administered, normalize_mac, oui_prefix};
use ::oui::OuiDatabase;
use eui48::MacAddress;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Wireshark `manuf.txt` database, loaded lazily on first use
static OUI_DB: OnceCell<Option<Arc<OuiDatabase>>> = OnceCell::new();

/// Fallback prefixes compiled into the binary
static BUILTIN: Lazy<HashMap<String, String>> = Lazy::new(|| {
    BUILTIN_OUI
        .lines()
        .filter_map(|line| {
            let (prefix, name) = line.trim().split_once(char::is_whitespace)?;
            Some((normalize_prefix(prefix)?, name.trim().to_string()))
        })
        .collect()
});

fn oui_database() -> Option<Arc<OuiDatabase>> {
    OUI_DB
        .get_or_init(|| match OuiDatabase::new_from_file("manuf.txt") {
            Ok(db) => Some(Arc::new(db)),
            Err(e) => {
                debug!(error = ?e, "manuf.txt unavailable, using built-in OUI table");
                None
            }
        })
        .clone()
}

/// Default location of the learned-vendor file: next to the executable
pub fn default_learned_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(LEARNED_VENDOR_FILE)))
        .unwrap_or_else(|| PathBuf::from(LEARNED_VENDOR_FILE))
}

/// Parse `AA:BB:CC = Vendor Name` lines; comments and malformed lines are skipped
pub fn parse_learned(content: &str) -> HashMap<String, String> {
    let mut learned = HashMap::new();
    for (n, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((prefix, name)) = line.split_once('=') else {
            debug!(line = n + 1, "skipping malformed learned vendor line");
            continue;
        };
        match (normalize_prefix(prefix), name.trim()) {
            (Some(prefix), name) if !name.is_empty() => {
                learned.insert(prefix, name.to_string());
            }
            _ => debug!(line = n + 1, "skipping malformed learned vendor line"),
        }
    }
    learned
}

/// `aa-bb-cc`, `AA:BB:CC` or `aabbcc` to `AA:BB:CC`
fn normalize_prefix(prefix: &str) -> Option<String> {
    let hex: String = prefix
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let hex = hex.to_uppercase();
    Some(format!("{}:{}:{}", &hex[0..2], &hex[2..4], &hex[4..6]))
}

/// MAC vendor lookup with a per-run cache and a user-taught overlay
pub struct VendorDb {
    cache: Mutex<HashMap<String, Option<String>>>,
    learned: Mutex<HashMap<String, String>>,
    learned_path: Option<PathBuf>,
}

impl VendorDb {
    /// Database backed by the learned file beside the executable
    pub fn new() -> Self {
        Self::with_learned_file(default_learned_path())
    }

    /// Database that reads and appends learned vendors at `path`
    pub fn with_learned_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let learned = match std::fs::read_to_string(&path) {
            Ok(content) => parse_learned(&content),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no learned vendor file");
                HashMap::new()
            }
        };
        Self {
            cache: Mutex::new(HashMap::new()),
            learned: Mutex::new(learned),
            learned_path: Some(path),
        }
    }

    /// Database without any learned-vendor persistence
    pub fn in_memory() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            learned: Mutex::new(HashMap::new()),
            learned_path: None,
        }
    }

    pub fn learned_path(&self) -> Option<&Path> {
        self.learned_path.as_deref()
    }

    /// Vendor for `mac`. Locally administered addresses never have one.
    pub fn lookup(&self, mac: &str) -> Option<String> {
        let mac = normalize_mac(mac)?;
        if is_locally_administered(&mac) {
            return None;
        }
        let prefix = oui_prefix(&mac)?;

        if let Some(name) = lock(&self.learned).get(&prefix) {
            return Some(name.clone());
        }
        if let Some(hit) = lock(&self.cache).get(&mac) {
            return hit.clone();
        }

        let vendor = oui_database().and_then(|db| {
            let addr = MacAddress::parse_str(&mac).ok()?;
            let entry = db.query_by_mac(&addr).ok()??;
            let name = entry.name_long.clone().unwrap_or_default();
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .or_else(|| BUILTIN.get(&prefix).cloned());
        lock(&self.cache).insert(mac, vendor.clone());
        vendor
    }

    /// Teach a vendor for a three-octet prefix and append it to the learned file
    pub fn learn(&self, prefix: &str, name: &str) -> Result<(), ScanError> {
        let prefix = normalize_prefix(prefix)
            .ok_or_else(|| ScanError::InvalidArgument(format!("invalid OUI prefix '{}'", prefix)))?;
        let name = name.trim();
        if name.is_empty() || name.contains('\n') {
            return Err(ScanError::InvalidArgument("vendor name is empty".to_string()));
        }

        if let Some(path) = &self.learned_path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{} = {}", prefix, name)?;
        }
        lock(&self.learned).insert(prefix, name.to_string());
        lock(&self.cache).clear();
        Ok(())
    }
}

impl Default for VendorDb {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learned_lines_parse() {
        let learned = parse_learned(
            "# taught by hand\n\naa-bb-cc = Lab Switch\nnot a line\nzz:zz:zz = Bad\n001122=Kitchen Hub\n",
        );
        assert_eq!(learned.len(), 2);
        assert_eq!(learned.get("AA:BB:CC").map(String::as_str), Some("Lab Switch"));
        assert_eq!(learned.get("00:11:22").map(String::as_str), Some("Kitchen Hub"));
    }

    #[test]
    fn privacy_macs_have_no_vendor() {
        let db = VendorDb::in_memory();
        db.learn("02:11:22", "Nobody").unwrap();
        assert_eq!(db.lookup("02:11:22:33:44:55"), None);
    }

    #[test]
    fn learned_vendor_overrides_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = VendorDb::with_learned_file(dir.path().join(LEARNED_VENDOR_FILE));
        assert_eq!(db.lookup("b8:27:eb:01:02:03").as_deref(), Some("Raspberry Pi Foundation"));
        db.learn("B8:27:EB", "Garage Pi").unwrap();
        assert_eq!(db.lookup("b8:27:eb:01:02:03").as_deref(), Some("Garage Pi"));

        let reloaded = VendorDb::with_learned_file(dir.path().join(LEARNED_VENDOR_FILE));
        assert_eq!(reloaded.lookup("B8-27-EB-01-02-03").as_deref(), Some("Garage Pi"));
    }
}
