/*
 * Persistent workspace state. A workspace's state is a JSON object file acting
 * as the host's key/value store; the selection lives under `selectedItems`.
 *
 * `StateManagerOperations` is the key/value seam and `CoreStateManager` its
 * file-backed implementation. `SelectionPersistenceOperations` is the narrow
 * `load`/`save` contract the selection store is constructed with; it is
 * implemented on top of any key/value store and, for tests and throwaway
 * sessions, purely in memory.
 */
use crate::core::{checksum_utils, path_utils};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const SELECTED_ITEMS_KEY: &str = "selectedItems";
const WORKSPACES_SUBFOLDER_NAME: &str = "workspaces";
const STATE_FILE_EXTENSION: &str = "json";

#[derive(Debug)]
pub enum StateError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoStateDirectory,
    MalformedValue(String),
}

impl From<io::Error> for StateError {
    fn from(err: io::Error) -> Self {
        StateError::Io(err)
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serde(err)
    }
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::Io(e) => write!(f, "State I/O error: {e}"),
            StateError::Serde(e) => write!(f, "State serialization error: {e}"),
            StateError::NoStateDirectory => {
                write!(f, "Could not determine a directory for workspace state")
            }
            StateError::MalformedValue(key) => {
                write!(f, "Stored value for '{key}' has an unexpected shape")
            }
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::Io(e) => Some(e),
            StateError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StateError>;

pub trait StateManagerOperations: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/*
 * File-backed key/value store. The whole object is rewritten on every `set`,
 * keeping keys it does not know about. A missing or empty file reads as an
 * empty store.
 */
pub struct CoreStateManager {
    file_path: PathBuf,
}

impl CoreStateManager {
    pub fn new(file_path: PathBuf) -> Self {
        CoreStateManager { file_path }
    }

    /*
     * Opens the state file belonging to `workspace_root` inside the application's
     * local config directory. The file name is derived from a SHA-256 digest of
     * the root path so that each workspace gets its own file.
     */
    pub fn for_workspace(app_name: &str, workspace_root: &Path) -> Result<Self> {
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(StateError::NoStateDirectory)?;
        let digest = checksum_utils::calculate_sha256_for_text(&workspace_root.to_string_lossy());
        let file_path = config_dir
            .join(WORKSPACES_SUBFOLDER_NAME)
            .join(format!("{}.{STATE_FILE_EXTENSION}", &digest[..16]));
        log::debug!("CoreStateManager: State for {workspace_root:?} lives in {file_path:?}.");
        Ok(CoreStateManager::new(file_path))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn read_object(&self) -> Result<Map<String, Value>> {
        if !self.file_path.exists() {
            return Ok(Map::new());
        }
        let contents = fs::read_to_string(&self.file_path)?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(map) => Ok(map),
            _ => Err(StateError::MalformedValue("<root>".to_string())),
        }
    }
}

impl StateManagerOperations for CoreStateManager {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut object = self.read_object()?;
        Ok(object.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut object = self.read_object()?;
        object.insert(key.to_string(), value);
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(&Value::Object(object))?;
        fs::write(&self.file_path, serialized)?;
        log::trace!("CoreStateManager: Wrote key '{key}' to {:?}.", self.file_path);
        Ok(())
    }
}

pub trait SelectionPersistenceOperations: Send + Sync {
    fn load(&self) -> Result<Vec<String>>;
    fn save(&self, paths: &[String]) -> Result<()>;
}

/*
 * Stores the selection as a JSON string array under `selectedItems` in a
 * key/value store.
 */
pub struct KeyValueSelectionPersistence {
    store: Arc<dyn StateManagerOperations>,
}

impl KeyValueSelectionPersistence {
    pub fn new(store: Arc<dyn StateManagerOperations>) -> Self {
        KeyValueSelectionPersistence { store }
    }
}

impl SelectionPersistenceOperations for KeyValueSelectionPersistence {
    fn load(&self) -> Result<Vec<String>> {
        match self.store.get(SELECTED_ITEMS_KEY)? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|_| StateError::MalformedValue(SELECTED_ITEMS_KEY.to_string())),
        }
    }

    fn save(&self, paths: &[String]) -> Result<()> {
        self.store.set(SELECTED_ITEMS_KEY, serde_json::to_value(paths)?)
    }
}

#[derive(Default)]
pub struct InMemorySelectionPersistence {
    saved: Mutex<Vec<String>>,
}

impl InMemorySelectionPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths(paths: Vec<String>) -> Self {
        InMemorySelectionPersistence {
            saved: Mutex::new(paths),
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        match self.saved.lock() {
            Ok(saved) => saved.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SelectionPersistenceOperations for InMemorySelectionPersistence {
    fn load(&self) -> Result<Vec<String>> {
        Ok(self.snapshot())
    }

    fn save(&self, paths: &[String]) -> Result<()> {
        match self.saved.lock() {
            Ok(mut saved) => *saved = paths.to_vec(),
            Err(poisoned) => *poisoned.into_inner() = paths.to_vec(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_state_file_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let manager = CoreStateManager::new(dir.path().join("state.json"));
        assert_eq!(manager.get(SELECTED_ITEMS_KEY)?, None);
        Ok(())
    }

    #[test]
    fn test_set_preserves_unrelated_keys() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("nested").join("state.json");
        fs::create_dir_all(file.parent().unwrap())?;
        fs::write(&file, r#"{ "otherKey": 42 }"#)?;
        let manager = CoreStateManager::new(file.clone());

        manager.set(SELECTED_ITEMS_KEY, json!(["/a", "/b"]))?;

        assert_eq!(manager.get("otherKey")?, Some(json!(42)));
        assert_eq!(manager.get(SELECTED_ITEMS_KEY)?, Some(json!(["/a", "/b"])));
        Ok(())
    }

    #[test]
    fn test_set_creates_parent_directories() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("workspaces").join("abc.json");
        let manager = CoreStateManager::new(file.clone());
        manager.set("k", json!("v"))?;
        assert!(file.exists());
        Ok(())
    }

    #[test]
    fn test_non_object_state_file_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("state.json");
        fs::write(&file, "[1, 2, 3]")?;
        let manager = CoreStateManager::new(file);
        assert!(matches!(
            manager.get(SELECTED_ITEMS_KEY),
            Err(StateError::MalformedValue(_))
        ));
        Ok(())
    }

    #[test]
    fn test_key_value_selection_roundtrip_through_file() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(CoreStateManager::new(dir.path().join("state.json")));
        let persistence = KeyValueSelectionPersistence::new(store.clone());

        assert!(persistence.load()?.is_empty());
        persistence.save(&["/w/a.txt".to_string(), "/w/b.txt".to_string()])?;
        assert_eq!(persistence.load()?, vec!["/w/a.txt", "/w/b.txt"]);

        let raw = fs::read_to_string(store.file_path())?;
        assert!(raw.contains("\"selectedItems\""));
        Ok(())
    }

    #[test]
    fn test_malformed_selected_items_value() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("state.json");
        fs::write(&file, r#"{ "selectedItems": "not-a-list" }"#)?;
        let persistence =
            KeyValueSelectionPersistence::new(Arc::new(CoreStateManager::new(file)));
        assert!(matches!(persistence.load(), Err(StateError::MalformedValue(k)) if k == SELECTED_ITEMS_KEY));
        Ok(())
    }

    #[test]
    fn test_in_memory_persistence_keeps_last_save() -> Result<()> {
        let persistence = InMemorySelectionPersistence::with_paths(vec!["/x".into()]);
        assert_eq!(persistence.load()?, vec!["/x"]);
        persistence.save(&[])?;
        assert!(persistence.snapshot().is_empty());
        Ok(())
    }
}
