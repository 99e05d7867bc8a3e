//! # Foreign plugin compatibility layer
//!
//! Capability-restricted façades that let plugins written for the vite dev
//! server API run against this host. Each façade exposes a fixed set of
//! names and fails with `IncompatibleCapability` for anything else.
//!
//! `printUrls` is the only property a plugin can write through to the
//! shared server; see `dispatch`.

mod dev_server;
mod dispatch;
mod errors;
mod module_graph;
mod plugin;
mod policy;

pub use dev_server::{CapabilityValue, DevServerFacade};
pub use dispatch::{default_write, handler_for, print_urls_write, WriteHandler};
pub use errors::{CompatError, CompatResult};
pub use module_graph::{ModuleGraphAdapter, ModuleRecordView, NodeFieldValue};
pub use plugin::{ForeignPlugin, PluginHost};
pub use policy::{
    CapabilitySurface, DevServerProperty, ModuleGraphMethod, ModuleNodeField,
    MODULE_GRAPH_CONTEXT_KEY,
};
