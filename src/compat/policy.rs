//! Capability surfaces
//!
//! Each façade type exposes a fixed set of names. The sets are `const`
//! enumerations, so no name can be added at runtime.

use super::errors::{CompatError, CompatResult};

/// A fixed, named set of accessible members
pub trait CapabilitySurface: Copy + Sized + 'static {
    /// Name of the foreign surface, used in diagnostics
    const CAPABILITY: &'static str;

    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|member| member.as_str() == name)
    }

    fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|member| member.as_str()).collect()
    }

    /// Look up `name`, rejecting it on behalf of `plugin` if unknown
    fn resolve(plugin: &str, name: &str) -> CompatResult<Self> {
        Self::from_name(name)
            .ok_or_else(|| CompatError::incompatible(plugin, Self::CAPABILITY, &Self::names(), name))
    }
}

/// Readable properties of the dev server façade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevServerProperty {
    ServerOptions,
    ResolvedUrls,
    PrintUrls,
    ModuleGraph,
    Config,
    Watcher,
    Middlewares,
    Ws,
    HttpServer,
}

impl CapabilitySurface for DevServerProperty {
    const CAPABILITY: &'static str = "viteDevServer";

    const ALL: &'static [Self] = &[
        DevServerProperty::ServerOptions,
        DevServerProperty::ResolvedUrls,
        DevServerProperty::PrintUrls,
        DevServerProperty::ModuleGraph,
        DevServerProperty::Config,
        DevServerProperty::Watcher,
        DevServerProperty::Middlewares,
        DevServerProperty::Ws,
        DevServerProperty::HttpServer,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            DevServerProperty::ServerOptions => "serverOptions",
            DevServerProperty::ResolvedUrls => "resolvedUrls",
            DevServerProperty::PrintUrls => "printUrls",
            DevServerProperty::ModuleGraph => "moduleGraph",
            DevServerProperty::Config => "config",
            DevServerProperty::Watcher => "watcher",
            DevServerProperty::Middlewares => "middlewares",
            DevServerProperty::Ws => "ws",
            DevServerProperty::HttpServer => "httpServer",
        }
    }
}

/// Methods of the module graph adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleGraphMethod {
    GetModulesByFile,
    GetModuleById,
    GetModuleByUrl,
    InvalidateModule,
}

impl CapabilitySurface for ModuleGraphMethod {
    const CAPABILITY: &'static str = "viteModuleGraph";

    const ALL: &'static [Self] = &[
        ModuleGraphMethod::GetModulesByFile,
        ModuleGraphMethod::GetModuleById,
        ModuleGraphMethod::GetModuleByUrl,
        ModuleGraphMethod::InvalidateModule,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            ModuleGraphMethod::GetModulesByFile => "getModulesByFile",
            ModuleGraphMethod::GetModuleById => "getModuleById",
            ModuleGraphMethod::GetModuleByUrl => "getModuleByUrl",
            ModuleGraphMethod::InvalidateModule => "invalidateModule",
        }
    }
}

/// The one module graph key written by the host, never by plugins
pub const MODULE_GRAPH_CONTEXT_KEY: &str = "context";

/// Fields of a filtered module record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleNodeField {
    Url,
    Id,
    File,
    Type,
    /// Computed from the context on every access
    Importers,
}

impl CapabilitySurface for ModuleNodeField {
    const CAPABILITY: &'static str = "viteModuleNode";

    const ALL: &'static [Self] = &[
        ModuleNodeField::Url,
        ModuleNodeField::Id,
        ModuleNodeField::File,
        ModuleNodeField::Type,
        ModuleNodeField::Importers,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            ModuleNodeField::Url => "url",
            ModuleNodeField::Id => "id",
            ModuleNodeField::File => "file",
            ModuleNodeField::Type => "type",
            ModuleNodeField::Importers => "importers",
        }
    }
}
