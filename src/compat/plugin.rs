//! Foreign plugin host
//!
//! Gives each attached plugin its own façade over the shared server and
//! hands the compilation context to every module graph adapter when the
//! build starts. The host keeps the context, so plugins attached after
//! build start get it on attach.

use std::sync::{Arc, OnceLock};

use super::dev_server::DevServerFacade;
use super::errors::{CompatError, CompatResult};
use crate::module_graph::ModuleRecordSource;
use crate::observability::{log_event_with_fields, Event};
use crate::server::InternalDevServer;

/// A plugin written against the foreign dev server API
pub trait ForeignPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called once with the plugin's façade
    fn configure_server(&self, _server: &mut DevServerFacade) -> CompatResult<()> {
        Ok(())
    }
}

struct Attached {
    plugin: Arc<dyn ForeignPlugin>,
    facade: DevServerFacade,
}

/// Attached plugins and their façades
pub struct PluginHost {
    server: Arc<InternalDevServer>,
    attached: Vec<Attached>,
    context: OnceLock<Arc<dyn ModuleRecordSource>>,
}

impl PluginHost {
    pub fn new(server: Arc<InternalDevServer>) -> Self {
        Self {
            server,
            attached: Vec::new(),
            context: OnceLock::new(),
        }
    }

    /// Whether `build_start` has run
    pub fn is_build_started(&self) -> bool {
        self.context.get().is_some()
    }

    pub fn server(&self) -> &Arc<InternalDevServer> {
        &self.server
    }

    /// Create the plugin's façade and run `configure_server`
    ///
    /// A plugin whose hook fails is not attached. After build start the
    /// module graph is ready before `configure_server` runs.
    pub fn attach(&mut self, plugin: Arc<dyn ForeignPlugin>) -> CompatResult<()> {
        let mut facade = DevServerFacade::new(
            plugin.name(),
            Arc::clone(self.server.config()),
            Arc::clone(&self.server),
        )?;
        if let Some(context) = self.context.get() {
            facade.module_graph().inject_context(Arc::clone(context))?;
        }
        plugin.configure_server(&mut facade)?;
        self.attached.push(Attached { plugin, facade });
        Ok(())
    }

    /// Inject the compilation context into every plugin's module graph
    ///
    /// Runs once. Every adapter is checked before any is written, so a
    /// failed call leaves all of them untouched.
    pub fn build_start(&self, context: Arc<dyn ModuleRecordSource>) -> CompatResult<()> {
        if self.is_build_started() {
            return Err(CompatError::BuildAlreadyStarted);
        }
        if let Some(ready) = self
            .attached
            .iter()
            .find(|attached| attached.facade.module_graph().is_ready())
        {
            return Err(CompatError::ContextAlreadyInjected {
                plugin: ready.plugin.name().to_string(),
            });
        }
        if self.context.set(Arc::clone(&context)).is_err() {
            return Err(CompatError::BuildAlreadyStarted);
        }

        for attached in &self.attached {
            attached
                .facade
                .module_graph()
                .inject_context(Arc::clone(&context))?;
        }
        log_event_with_fields(
            Event::ModuleContextInjected,
            &[("plugins", &self.attached.len().to_string())],
        );
        Ok(())
    }

    pub fn facade(&self, plugin_name: &str) -> Option<&DevServerFacade> {
        self.attached
            .iter()
            .find(|a| a.plugin.name() == plugin_name)
            .map(|a| &a.facade)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.attached.iter().map(|a| a.plugin.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}
