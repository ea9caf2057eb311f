//! Configuration surface, layered the way the teacher's `PackOptions`
//! composes compiled-in defaults with caller overrides — except here the
//! outermost layer is environment variables, read once at `serve` startup,
//! matching the `VELESDB_*` convention its HTTP-front-door counterpart uses.

use std::path::PathBuf;

const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024 * 1024; // 100 GiB

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub directory: PathBuf,
    pub max_size: u64,
    pub sync_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./data"),
            max_size: DEFAULT_MAX_SIZE,
            sync_on_write: true,
        }
    }
}

impl StoreConfig {
    /// Apply `HAYSTORE_DATA_DIR` / `HAYSTORE_MAX_SIZE` / `HAYSTORE_SYNC_ON_WRITE`
    /// on top of the current values. Unset or unparsable variables leave the
    /// corresponding field untouched.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("HAYSTORE_DATA_DIR") {
            self.directory = PathBuf::from(dir);
        }
        if let Ok(max_size) = std::env::var("HAYSTORE_MAX_SIZE") {
            if let Ok(parsed) = max_size.parse() {
                self.max_size = parsed;
            }
        }
        if let Ok(sync) = std::env::var("HAYSTORE_SYNC_ON_WRITE") {
            if let Ok(parsed) = sync.parse() {
                self.sync_on_write = parsed;
            }
        }
        self
    }
}
