//! # Dev server
//!
//! Bootstrap, the HTTP(S) listener, the middleware chain and the internal
//! server instance plugin façades wrap.

mod bootstrap;
mod errors;
mod http;
mod instance;
mod middleware;
mod public_dir;
mod urls;

pub use bootstrap::{DevServer, DEFAULT_HMR_PATH};
pub use errors::{ServerError, ServerResult};
pub use http::{
    cors_layer, resolve_http_server, resolve_https_config, HttpServerHandle, HttpsOptions,
    SocketHandler,
};
pub use instance::InternalDevServer;
pub use middleware::{Middleware, MiddlewareStack, Next};
pub use public_dir::{init_public_files, PublicFiles, PublicFilesMiddleware};
pub use urls::{resolve_server_urls, PrintUrls, PrintUrlsHook, ResolvedUrls};
