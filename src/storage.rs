//! Persisted key-value capability.
//!
//! Models the browser's `localStorage`: one area shared by every browsing
//! context of an origin, with change events delivered only to the contexts
//! that did not make the change.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::warn;
use uuid::Uuid;

/// A change made to the storage area by another context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    pub fn is_removal(&self) -> bool {
        self.new_value.is_none()
    }
}

pub type StorageListener = Rc<dyn Fn(&StorageEvent)>;

pub trait KeyValueStore {
    /// `None` if the key is absent or the store is unreadable.
    fn get(&self, key: &str) -> Option<String>;

    /// `true` if the value was stored.
    fn set(&self, key: &str, value: &str) -> bool;

    /// `true` if the store is consistent afterwards (absent keys count).
    fn delete(&self, key: &str) -> bool;

    /// Registers for changes made by *other* contexts.
    fn subscribe(&self, listener: StorageListener);
}

// =========================================================
// MemoryStorage
// =========================================================

#[derive(Default)]
struct StorageArea {
    entries: RefCell<HashMap<String, String>>,
    listeners: RefCell<Vec<(Uuid, StorageListener)>>,
}

/// In-memory storage area seen through one browsing context.
///
/// Clones share the context; [`MemoryStorage::open_context`] opens a second
/// "tab" over the same area.
#[derive(Clone)]
pub struct MemoryStorage {
    area: Rc<StorageArea>,
    context: Uuid,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            area: Rc::new(StorageArea::default()),
            context: Uuid::new_v4(),
        }
    }

    /// Another browsing context over the same storage area.
    pub fn open_context(&self) -> Self {
        Self {
            area: self.area.clone(),
            context: Uuid::new_v4(),
        }
    }

    pub fn context_id(&self) -> Uuid {
        self.context
    }

    fn dispatch(&self, event: StorageEvent) {
        // Listeners may read the area again, so release the borrow first.
        let targets: Vec<StorageListener> = self
            .area
            .listeners
            .borrow()
            .iter()
            .filter(|(ctx, _)| *ctx != self.context)
            .map(|(_, l)| l.clone())
            .collect();
        for listener in targets {
            listener(&event);
        }
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.area.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        let old_value = self
            .area
            .entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        if old_value.as_deref() != Some(value) {
            self.dispatch(StorageEvent {
                key: key.to_string(),
                old_value,
                new_value: Some(value.to_string()),
            });
        }
        true
    }

    fn delete(&self, key: &str) -> bool {
        let old_value = self.area.entries.borrow_mut().remove(key);
        if old_value.is_some() {
            self.dispatch(StorageEvent {
                key: key.to_string(),
                old_value,
                new_value: None,
            });
        }
        true
    }

    fn subscribe(&self, listener: StorageListener) {
        self.area
            .listeners
            .borrow_mut()
            .push((self.context, listener));
    }
}

// =========================================================
// FileStorage
// =========================================================

/// Durable storage backed by a JSON object on disk.
///
/// Used by the command line front end; a single process is the only
/// context, so it never emits events.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "storage file is corrupt, starting empty");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read storage file");
                HashMap::new()
            }
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> bool {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(path = %parent.display(), error = %e, "failed to create storage directory");
                    return false;
                }
            }
        }
        let raw = match serde_json::to_string_pretty(entries) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to encode storage entries");
                return false;
            }
        };
        match std::fs::write(&self.path, raw) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to write storage file");
                false
            }
        }
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> bool {
        let mut entries = self.load();
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn delete(&self, key: &str) -> bool {
        let mut entries = self.load();
        if entries.remove(key).is_none() {
            return true;
        }
        self.save(&entries)
    }

    fn subscribe(&self, _listener: StorageListener) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder(storage: &MemoryStorage) -> Rc<RefCell<Vec<StorageEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        storage.subscribe(Rc::new(move |e: &StorageEvent| sink.borrow_mut().push(e.clone())));
        seen
    }

    #[test]
    fn contexts_share_one_area() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.open_context();

        tab_a.set("token", "abc");
        assert_eq!(tab_b.get("token").as_deref(), Some("abc"));

        tab_b.delete("token");
        assert_eq!(tab_a.get("token"), None);
    }

    #[test]
    fn events_reach_other_contexts_only() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.open_context();
        let seen_a = recorder(&tab_a);
        let seen_b = recorder(&tab_b);

        tab_a.set("token", "abc");
        tab_a.delete("token");

        assert!(seen_a.borrow().is_empty());
        let seen_b = seen_b.borrow();
        assert_eq!(seen_b.len(), 2);
        assert_eq!(seen_b[0].new_value.as_deref(), Some("abc"));
        assert!(seen_b[1].is_removal());
        assert_eq!(seen_b[1].old_value.as_deref(), Some("abc"));
    }

    #[test]
    fn deleting_an_absent_key_is_silent() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.open_context();
        let seen_b = recorder(&tab_b);

        assert!(tab_a.delete("token"));
        assert!(seen_b.borrow().is_empty());
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let path = std::env::temp_dir()
            .join(format!("apiary-console-{}", Uuid::new_v4()))
            .join("state.json");

        let first = FileStorage::new(&path);
        assert_eq!(first.get("token"), None);
        assert!(first.set("token", "abc"));

        let second = FileStorage::new(&path);
        assert_eq!(second.get("token").as_deref(), Some("abc"));
        assert!(second.delete("token"));
        assert_eq!(first.get("token"), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
