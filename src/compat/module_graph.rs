//! Module graph adapter
//!
//! The compilation context does not exist when a plugin is attached; the
//! host injects it once compilation starts. Until then every query fails
//! with `ContextNotReady`.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use super::errors::{CompatError, CompatResult};
use super::policy::{CapabilitySurface, ModuleGraphMethod, ModuleNodeField, MODULE_GRAPH_CONTEXT_KEY};
use crate::module_graph::{ModuleRecord, ModuleRecordSource, ModuleType};

/// Restricted query surface over the module graph for one plugin
pub struct ModuleGraphAdapter {
    plugin_name: Arc<str>,
    context: OnceLock<Arc<dyn ModuleRecordSource>>,
}

impl ModuleGraphAdapter {
    pub fn new(plugin_name: &str) -> Self {
        Self {
            plugin_name: Arc::from(plugin_name),
            context: OnceLock::new(),
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Whether the context has been injected
    pub fn is_ready(&self) -> bool {
        self.context.get().is_some()
    }

    /// Host-side channel for the compilation context; succeeds once
    pub(crate) fn inject_context(&self, context: Arc<dyn ModuleRecordSource>) -> CompatResult<()> {
        self.context
            .set(context)
            .map_err(|_| CompatError::ContextAlreadyInjected {
                plugin: self.plugin_name.to_string(),
            })
    }

    /// Plugin-facing write; no key is writable from here
    pub fn set(&self, name: &str, _value: Value) -> CompatResult<()> {
        Err(CompatError::incompatible(
            &self.plugin_name,
            ModuleGraphMethod::CAPABILITY,
            &[MODULE_GRAPH_CONTEXT_KEY],
            name,
        ))
    }

    /// Look up a method by its foreign name
    pub fn capability(&self, name: &str) -> CompatResult<ModuleGraphMethod> {
        ModuleGraphMethod::resolve(&self.plugin_name, name)
    }

    fn context(&self) -> CompatResult<&Arc<dyn ModuleRecordSource>> {
        self.context.get().ok_or_else(|| CompatError::ContextNotReady {
            plugin: self.plugin_name.to_string(),
        })
    }

    fn view(&self, record: Arc<ModuleRecord>, context: &Arc<dyn ModuleRecordSource>) -> ModuleRecordView {
        ModuleRecordView {
            record,
            plugin_name: Arc::clone(&self.plugin_name),
            context: Arc::clone(context),
        }
    }

    pub fn get_modules_by_file(&self, file: &str) -> CompatResult<Vec<ModuleRecordView>> {
        let context = self.context()?;
        Ok(context
            .modules_by_file(file)
            .into_iter()
            .map(|record| self.view(record, context))
            .collect())
    }

    /// `Ok(None)` when no module has this id
    pub fn get_module_by_id(&self, id: &str) -> CompatResult<Option<ModuleRecordView>> {
        let context = self.context()?;
        Ok(context.module_by_id(id).map(|record| self.view(record, context)))
    }

    /// Lookup by served URL
    ///
    /// Only `/`-prefixed URLs map to module ids; anything else is absent
    /// without consulting the context.
    pub async fn get_module_by_url(&self, url: &str) -> CompatResult<Option<ModuleRecordView>> {
        let Some(id) = url.strip_prefix('/') else {
            return Ok(None);
        };
        let context = self.context()?;
        let record = context.resolve_module_by_id(id).await;
        Ok(record.map(|record| self.view(record, context)))
    }

    /// No-op. Invalidation follows the host's own watcher pipeline.
    pub fn invalidate_module(&self) {}
}

impl fmt::Debug for ModuleGraphAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleGraphAdapter")
            .field("plugin_name", &self.plugin_name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Value of one module record field
#[derive(Debug, Clone)]
pub enum NodeFieldValue {
    Url(String),
    Id(String),
    File(Option<String>),
    Type(ModuleType),
    Importers(Vec<ModuleRecordView>),
}

/// Module record filtered to url, id, file, type and importers
#[derive(Clone)]
pub struct ModuleRecordView {
    record: Arc<ModuleRecord>,
    plugin_name: Arc<str>,
    context: Arc<dyn ModuleRecordSource>,
}

impl ModuleRecordView {
    pub fn url(&self) -> &str {
        &self.record.url
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn file(&self) -> Option<&str> {
        self.record.file.as_deref()
    }

    pub fn module_type(&self) -> &ModuleType {
        &self.record.module_type
    }

    /// Current importers, queried from the context on each call
    pub fn importers(&self) -> Vec<ModuleRecordView> {
        self.context
            .importers(&self.record.id)
            .into_iter()
            .map(|record| ModuleRecordView {
                record,
                plugin_name: Arc::clone(&self.plugin_name),
                context: Arc::clone(&self.context),
            })
            .collect()
    }

    /// Read a field by its foreign name
    pub fn get(&self, field: &str) -> CompatResult<NodeFieldValue> {
        Ok(match ModuleNodeField::resolve(&self.plugin_name, field)? {
            ModuleNodeField::Url => NodeFieldValue::Url(self.record.url.clone()),
            ModuleNodeField::Id => NodeFieldValue::Id(self.record.id.clone()),
            ModuleNodeField::File => NodeFieldValue::File(self.record.file.clone()),
            ModuleNodeField::Type => NodeFieldValue::Type(self.record.module_type.clone()),
            ModuleNodeField::Importers => NodeFieldValue::Importers(self.importers()),
        })
    }
}

impl fmt::Debug for ModuleRecordView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecordView")
            .field("url", &self.record.url)
            .field("id", &self.record.id)
            .field("file", &self.record.file)
            .field("type", &self.record.module_type)
            .finish()
    }
}
