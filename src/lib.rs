//! devhost - a dev server host that runs plugins written for the vite dev
//! server API behind capability-restricted façades
//!
//! The host owns the real server (`server`), its HMR channel (`hmr`), file
//! watcher (`watcher`) and module graph (`module_graph`). Plugins only ever
//! see the views in `compat`.

pub mod cli;
pub mod compat;
pub mod config;
pub mod hmr;
pub mod module_graph;
pub mod observability;
pub mod server;
pub mod watcher;
