use crate::events::{EventBus, ScaleEvent};
use crate::preset::{filter_records, OverrideRecord, PresetSort};
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

pub const DEFAULT_CATEGORIES: [&str; 4] = ["Default", "Friends", "Guild", "Content Creators"];
pub const PRESET_FILE_NAME: &str = "scaleme_presets.json";

/// One immutable generation of the preset indexes.
#[derive(Debug, Clone)]
struct PresetIndex {
    by_id: HashMap<String, OverrideRecord>,
    by_name: HashMap<String, OverrideRecord>,
    categories: Vec<String>,
}

impl Default for PresetIndex {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            categories: DEFAULT_CATEGORIES.iter().map(|label| label.to_string()).collect(),
        }
    }
}

impl PresetIndex {
    fn from_records(records: Vec<OverrideRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            index.insert(record);
        }
        index
    }

    fn insert(&mut self, record: OverrideRecord) {
        let record = record.normalized();
        self.register_category(&record.category);
        let key = record.key();
        if record.is_stable_id() {
            self.by_id.insert(key, record);
        } else {
            self.by_name.insert(key, record);
        }
    }

    fn remove(&mut self, identifier: &str, is_stable_id: bool) -> Option<OverrideRecord> {
        let key = identifier.to_lowercase();
        if is_stable_id {
            self.by_id.remove(&key)
        } else {
            self.by_name.remove(&key)
        }
    }

    fn register_category(&mut self, label: &str) {
        let label = label.trim();
        if !label.is_empty() && !self.categories.iter().any(|known| known == label) {
            self.categories.push(label.to_string());
        }
    }

    fn find(&self, identifier: &str) -> Option<&OverrideRecord> {
        let key = identifier.to_lowercase();
        self.by_id.get(&key).or_else(|| self.by_name.get(&key))
    }

    fn records(&self) -> Vec<OverrideRecord> {
        self.by_id.values().chain(self.by_name.values()).cloned().collect()
    }

    fn len(&self) -> usize {
        self.by_id.len() + self.by_name.len()
    }
}

/// Override records indexed by stable ID and by name, persisted as one flat JSON list.
///
/// Readers take a cheap snapshot of the current index generation; writers build the
/// next generation and swap it in, so lookups never wait on a mutation or its file write.
pub struct PresetStore {
    path: Option<PathBuf>,
    index: RwLock<Arc<PresetIndex>>,
    writer: Mutex<()>,
    name_cache: DashMap<Uuid, String>,
    events: EventBus,
}

impl PresetStore {
    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            index: RwLock::new(Arc::new(PresetIndex::default())),
            writer: Mutex::new(()),
            name_cache: DashMap::new(),
            events: EventBus::default(),
        }
    }

    /// Loads the store at `path`. A missing file yields no records and writes the
    /// example set; an unreadable one yields no records and is left as-is.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self::in_memory();
        if path.exists() {
            match Self::load_from_path(&path) {
                Ok(records) => {
                    let count = records.len();
                    store.replace_index(PresetIndex::from_records(records));
                    log::info!("Loaded {count} presets from {}", path.display());
                    store.events.push(ScaleEvent::PresetsLoaded { count });
                }
                Err(err) => {
                    log::error!("Failed to load presets: {err:?}");
                }
            }
        } else {
            match Self::save_to_path(&path, &default_examples()) {
                Ok(()) => log::info!("Created example presets file {}", path.display()),
                Err(err) => log::error!("Failed to write example presets: {err:?}"),
            }
        }
        store.path = Some(path);
        store
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Vec<OverrideRecord>> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading preset file {}", path.display()))?;
        let records = serde_json::from_slice::<Option<Vec<OverrideRecord>>>(&bytes)
            .with_context(|| format!("Parsing preset file {}", path.display()))?
            .unwrap_or_default();
        Ok(records.into_iter().filter(|record| !record.identifier.trim().is_empty()).collect())
    }

    pub fn save_to_path(path: impl AsRef<Path>, records: &[OverrideRecord]) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating preset directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(records)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing preset file {}", path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn snapshot(&self) -> Arc<PresetIndex> {
        let guard = self.index.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    fn replace_index(&self, next: PresetIndex) {
        let mut guard = self.index.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(next);
    }

    /// Builds the next index generation from the current one, publishes it, then persists.
    fn mutate<T>(&self, apply: impl FnOnce(&mut PresetIndex) -> T) -> T {
        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (*self.snapshot()).clone();
        let result = apply(&mut next);
        let records = next.records();
        self.replace_index(next);
        self.persist(&records);
        result
    }

    fn persist(&self, records: &[OverrideRecord]) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        match Self::save_to_path(path, records) {
            Ok(()) => log::info!("Saved {} presets", records.len()),
            Err(err) => {
                log::error!("Failed to save presets: {err:?}");
                self.events.push(ScaleEvent::PresetSaveFailed { message: format!("{err:#}") });
            }
        }
    }

    /// Upserts a record; last write wins. Returns false when the identifier is blank.
    pub fn add(&self, record: OverrideRecord) -> bool {
        if record.identifier.trim().is_empty() {
            log::warn!("Ignoring preset with an empty identifier");
            self.events.push(ScaleEvent::PresetRejected { reason: "empty identifier".to_string() });
            return false;
        }
        let record = record.normalized();
        let event = ScaleEvent::PresetAdded { identifier: record.identifier.clone(), scale: record.scale };
        self.mutate(|index| index.insert(record));
        self.events.push(event);
        true
    }

    /// Removes from the index chosen by `is_stable_id`. Returns whether a record was dropped.
    pub fn remove(&self, identifier: &str, is_stable_id: bool) -> bool {
        let removed = self.mutate(|index| index.remove(identifier, is_stable_id)).is_some();
        if removed {
            self.events.push(ScaleEvent::PresetRemoved { identifier: identifier.to_string() });
        }
        removed
    }

    /// Enabled override for `entity`, by stable ID first and then by resolved name.
    pub fn resolve<F>(&self, entity: Uuid, name_resolver: F) -> Option<OverrideRecord>
    where
        F: FnOnce(Uuid) -> Option<String>,
    {
        let index = self.snapshot();
        if let Some(record) = index.by_id.get(&entity.to_string()).filter(|record| record.enabled) {
            return Some(record.clone());
        }
        let name = self.cached_name(entity, name_resolver)?;
        index.by_name.get(&name.to_lowercase()).filter(|record| record.enabled).cloned()
    }

    fn cached_name<F>(&self, entity: Uuid, name_resolver: F) -> Option<String>
    where
        F: FnOnce(Uuid) -> Option<String>,
    {
        if let Some(name) = self.name_cache.get(&entity) {
            return Some(name.clone());
        }
        let name = name_resolver(entity)?;
        self.name_cache.insert(entity, name.clone());
        Some(name)
    }

    pub fn clear_name_cache(&self) {
        self.name_cache.clear();
    }

    pub fn list_all(&self) -> Vec<OverrideRecord> {
        self.snapshot().records()
    }

    pub fn filtered(&self, search: Option<&str>, category: Option<&str>, sort: PresetSort) -> Vec<OverrideRecord> {
        filter_records(self.list_all(), search, category, sort)
    }

    pub fn categories(&self) -> Vec<String> {
        self.snapshot().categories.clone()
    }

    pub fn add_category(&self, label: &str) {
        if label.trim().is_empty() {
            return;
        }
        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = (*self.snapshot()).clone();
        next.register_category(label);
        self.replace_index(next);
    }

    /// Case-insensitive lookup across both indexes, ignoring the enabled flag.
    pub fn find(&self, identifier: &str) -> Option<OverrideRecord> {
        self.snapshot().find(identifier).cloned()
    }

    /// Flips the enabled flag. Returns the new state, or `None` when no record matches.
    pub fn toggle(&self, identifier: &str) -> Option<bool> {
        self.edit(identifier, |record| record.enabled = !record.enabled).map(|record| record.enabled)
    }

    pub fn set_category(&self, identifier: &str, category: &str) -> bool {
        self.edit(identifier, |record| record.category = category.to_string()).is_some()
    }

    /// Removes the matching record and re-inserts the edited copy under the same identifier.
    /// The lookup runs on the writer's copy so concurrent edits never see a stale record.
    fn edit(&self, identifier: &str, change: impl FnOnce(&mut OverrideRecord)) -> Option<OverrideRecord> {
        // Skip the file rewrite when nothing matches; the edit itself re-checks under the writer.
        self.find(identifier)?;
        self.mutate(|index| {
            let mut record = index.find(identifier).cloned()?;
            index.remove(&record.identifier, record.is_stable_id());
            change(&mut record);
            index.insert(record);
            index.find(identifier).cloned()
        })
    }

    /// Re-reads the backing file and swaps in the result. Current state is kept on error.
    pub fn reload(&self) -> Result<usize> {
        let Some(path) = self.path.as_deref() else {
            return Ok(self.len());
        };
        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let records = if path.exists() { Self::load_from_path(path)? } else { Vec::new() };
        let count = records.len();
        self.replace_index(PresetIndex::from_records(records));
        self.name_cache.clear();
        log::info!("Reloaded {count} presets from {}", path.display());
        self.events.push(ScaleEvent::PresetsLoaded { count });
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn default_examples() -> Vec<OverrideRecord> {
    vec![
        OverrideRecord::new("example_uuid_here", 1.5).with_display_name("Guild Leader").with_category("guild"),
        OverrideRecord::new("another_example_uuid", 2.0)
            .with_display_name("Best Friend")
            .with_category("friends"),
        OverrideRecord::new("Notch", 1.2).with_display_name("").with_category("special"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "a1b2c3d4-0000-4000-8000-000000000000";

    fn no_names(_: Uuid) -> Option<String> {
        None
    }

    #[test]
    fn records_route_to_the_matching_index() {
        let store = PresetStore::in_memory();
        store.add(OverrideRecord::new(ID, 2.0));
        store.add(OverrideRecord::new("Notch", 1.2));
        let index = store.snapshot();
        assert!(index.by_id.contains_key(ID));
        assert!(index.by_name.contains_key("notch"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn uppercase_stable_id_is_lowercased_before_routing() {
        let store = PresetStore::in_memory();
        store.add(OverrideRecord::new(ID.to_uppercase(), 1.4));
        let entity = Uuid::parse_str(ID).expect("uuid");
        assert_eq!(store.resolve(entity, no_names).map(|r| r.scale), Some(1.4));
    }

    #[test]
    fn blank_identifier_is_rejected() {
        let store = PresetStore::in_memory();
        assert!(!store.add(OverrideRecord::new("   ", 1.0)));
        assert!(store.is_empty());
        assert!(matches!(store.events().drain().as_slice(), [ScaleEvent::PresetRejected { .. }]));
    }

    #[test]
    fn name_lookup_uses_the_resolver_and_caches_it() {
        let store = PresetStore::in_memory();
        store.add(OverrideRecord::new("Notch", 1.2));
        let entity = Uuid::new_v4();
        let found = store.resolve(entity, |_| Some("NOTCH".to_string())).expect("name match");
        assert_eq!(found.scale, 1.2);
        let cached = store.resolve(entity, |_| panic!("cache should answer"));
        assert!(cached.is_some());
        store.clear_name_cache();
        assert!(store.resolve(entity, no_names).is_none());
    }

    #[test]
    fn disabled_records_are_treated_as_absent() {
        let store = PresetStore::in_memory();
        store.add(OverrideRecord::new(ID, 2.0).with_enabled(false));
        let entity = Uuid::parse_str(ID).expect("uuid");
        assert!(store.resolve(entity, no_names).is_none());
        assert_eq!(store.toggle(ID), Some(true));
        assert_eq!(store.resolve(entity, no_names).map(|r| r.scale), Some(2.0));
    }

    #[test]
    fn categories_keep_defaults_and_insertion_order() {
        let store = PresetStore::in_memory();
        store.add(OverrideRecord::new("a", 1.0).with_category(" raid "));
        store.add(OverrideRecord::new("b", 1.0).with_category("Friends"));
        store.add_category("zeta");
        store.add_category("  ");
        assert_eq!(store.categories(), ["Default", "Friends", "Guild", "Content Creators", "raid", "zeta"]);
    }

    #[test]
    fn set_category_reinserts_under_the_same_identifier() {
        let store = PresetStore::in_memory();
        store.add(OverrideRecord::new("Notch", 1.2));
        assert!(store.set_category("notch", "special"));
        let record = store.find("NOTCH").expect("record");
        assert_eq!(record.identifier, "Notch");
        assert_eq!(record.category, "special");
        assert_eq!(store.len(), 1);
        assert!(!store.set_category("nobody", "x"));
    }

    #[test]
    fn missing_file_writes_examples_but_starts_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join(PRESET_FILE_NAME);
        let store = PresetStore::open(&path);
        assert!(store.is_empty());
        let written = PresetStore::load_from_path(&path).expect("examples written");
        assert_eq!(written.len(), 3);
        assert_eq!(store.reload().expect("reload"), 3);
        assert_eq!(store.categories().last().map(String::as_str), Some("special"));
    }

    #[test]
    fn corrupt_file_is_left_untouched() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(PRESET_FILE_NAME);
        fs::write(&path, "{ not json").expect("write corrupt");
        let store = PresetStore::open(&path);
        assert!(store.is_empty());
        assert_eq!(fs::read_to_string(&path).expect("read back"), "{ not json");
        assert!(store.reload().is_err());
    }
}
