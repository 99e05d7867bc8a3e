//! # Module graph query surface
//!
//! The compilation context answers lookups by file, by id and for
//! importers. `InMemoryModuleGraph` is the host's implementation; the compat
//! layer only ever sees the `ModuleRecordSource` trait.

mod errors;
mod record;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use futures_util::future::{self, BoxFuture};

pub use errors::{GraphError, GraphResult};
pub use record::{ModuleRecord, ModuleType};

/// Query surface of a compilation context
pub trait ModuleRecordSource: Send + Sync {
    /// Every module compiled from `file`
    fn modules_by_file(&self, file: &str) -> Vec<Arc<ModuleRecord>>;

    fn module_by_id(&self, id: &str) -> Option<Arc<ModuleRecord>>;

    /// Modules importing `id`, sorted by id
    fn importers(&self, id: &str) -> Vec<Arc<ModuleRecord>>;

    /// Id lookup that may wait on pending compilation
    fn resolve_module_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Option<Arc<ModuleRecord>>> {
        Box::pin(future::ready(self.module_by_id(id)))
    }
}

#[derive(Default)]
struct GraphInner {
    modules: BTreeMap<String, Arc<ModuleRecord>>,
    by_file: BTreeMap<String, BTreeSet<String>>,
    /// dependency id -> importer ids
    importers: BTreeMap<String, BTreeSet<String>>,
}

/// In-memory module graph
#[derive(Default)]
pub struct InMemoryModuleGraph {
    inner: RwLock<GraphInner>,
}

impl InMemoryModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a module; edges are kept
    pub fn insert(&self, record: ModuleRecord) -> Arc<ModuleRecord> {
        let record = Arc::new(record);
        let mut inner = self.write();

        if let Some(previous) = inner.modules.insert(record.id.clone(), Arc::clone(&record)) {
            if let Some(file) = &previous.file {
                remove_from_index(&mut inner.by_file, file, &previous.id);
            }
        }
        if let Some(file) = &record.file {
            inner
                .by_file
                .entry(file.clone())
                .or_default()
                .insert(record.id.clone());
        }
        record
    }

    /// Record that `importer` imports `dependency`
    pub fn add_dependency(&self, importer: &str, dependency: &str) -> GraphResult<()> {
        if importer == dependency {
            return Err(GraphError::SelfImport(importer.to_string()));
        }
        let mut inner = self.write();
        for id in [importer, dependency] {
            if !inner.modules.contains_key(id) {
                return Err(GraphError::UnknownModule(id.to_string()));
            }
        }
        inner
            .importers
            .entry(dependency.to_string())
            .or_default()
            .insert(importer.to_string());
        Ok(())
    }

    /// Remove a module and every edge touching it
    pub fn remove(&self, id: &str) -> Option<Arc<ModuleRecord>> {
        let mut inner = self.write();
        let removed = inner.modules.remove(id)?;

        if let Some(file) = &removed.file {
            remove_from_index(&mut inner.by_file, file, id);
        }
        inner.importers.remove(id);
        for importers in inner.importers.values_mut() {
            importers.remove(id);
        }
        inner.importers.retain(|_, importers| !importers.is_empty());
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, GraphInner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, GraphInner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn remove_from_index(index: &mut BTreeMap<String, BTreeSet<String>>, key: &str, id: &str) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

impl ModuleRecordSource for InMemoryModuleGraph {
    fn modules_by_file(&self, file: &str) -> Vec<Arc<ModuleRecord>> {
        let inner = self.read();
        inner
            .by_file
            .get(file)
            .map(|ids| ids.iter().filter_map(|id| inner.modules.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    fn module_by_id(&self, id: &str) -> Option<Arc<ModuleRecord>> {
        self.read().modules.get(id).cloned()
    }

    fn importers(&self, id: &str) -> Vec<Arc<ModuleRecord>> {
        let inner = self.read();
        inner
            .importers
            .get(id)
            .map(|ids| ids.iter().filter_map(|i| inner.modules.get(i).cloned()).collect())
            .unwrap_or_default()
    }
}
