//! Module records as the compilation context stores them

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind of compiled unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Js,
    Jsx,
    Ts,
    Tsx,
    Css,
    Html,
    Json,
    Asset,
    #[serde(untagged)]
    Custom(String),
}

impl ModuleType {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleType::Js => "js",
            ModuleType::Jsx => "jsx",
            ModuleType::Ts => "ts",
            ModuleType::Tsx => "tsx",
            ModuleType::Css => "css",
            ModuleType::Html => "html",
            ModuleType::Json => "json",
            ModuleType::Asset => "asset",
            ModuleType::Custom(name) => name.as_str(),
        }
    }

    /// Infer from a file extension; anything unknown is an asset
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("js") | Some("mjs") | Some("cjs") => ModuleType::Js,
            Some("jsx") => ModuleType::Jsx,
            Some("ts") | Some("mts") | Some("cts") => ModuleType::Ts,
            Some("tsx") => ModuleType::Tsx,
            Some("css") => ModuleType::Css,
            Some("html") | Some("htm") => ModuleType::Html,
            Some("json") => ModuleType::Json,
            _ => ModuleType::Asset,
        }
    }
}

/// One compiled unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    /// Module id, relative to the project root
    pub id: String,
    /// Served URL, `/` + id
    pub url: String,
    /// Source file on disk, absent for virtual modules
    pub file: Option<String>,
    pub module_type: ModuleType,
    /// Compiled size in bytes
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Never changes once compiled
    #[serde(default)]
    pub immutable: bool,
    #[serde(default = "default_side_effects")]
    pub side_effects: bool,
}

fn default_side_effects() -> bool {
    true
}

impl ModuleRecord {
    /// Record for a source file; type inferred from the extension
    pub fn new(id: impl Into<String>, file: Option<String>) -> Self {
        let id = id.into();
        let module_type = ModuleType::from_path(file.as_deref().unwrap_or(&id));
        Self {
            url: format!("/{}", id.trim_start_matches('/')),
            id,
            file,
            module_type,
            size: 0,
            content_hash: None,
            immutable: false,
            side_effects: true,
        }
    }

    pub fn with_type(mut self, module_type: ModuleType) -> Self {
        self.module_type = module_type;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}
