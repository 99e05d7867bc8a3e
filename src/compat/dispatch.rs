//! Write dispatch table
//!
//! Maps each dev server property to its write handler. `printUrls` is the
//! one property whose writes reach the shared server; everything else,
//! including names outside the read surface, is stored on the writing
//! façade only.

use std::sync::Arc;

use super::dev_server::{CapabilityValue, DevServerFacade};
use super::policy::DevServerProperty;
use crate::observability::{log_event_with_fields, Event};
use crate::server::{InternalDevServer, PrintUrls};

/// `(façade, name, value, server) -> handled`
pub type WriteHandler = fn(&mut DevServerFacade, &str, CapabilityValue, &Arc<InternalDevServer>) -> bool;

/// Handler for a property; unknown names get the default
pub fn handler_for(property: Option<DevServerProperty>) -> WriteHandler {
    match property {
        Some(DevServerProperty::PrintUrls) => print_urls_write,
        _ => default_write,
    }
}

/// Bind a plugin's `printUrls` to the real server
///
/// The hook is wrapped so it receives the server, not the façade, and the
/// wrapper replaces the server's live callback for every façade. Values
/// that are not callbacks shadow like any other write.
pub fn print_urls_write(
    facade: &mut DevServerFacade,
    name: &str,
    value: CapabilityValue,
    server: &Arc<InternalDevServer>,
) -> bool {
    let print_urls = match value {
        CapabilityValue::PrintUrlsHook(hook) => PrintUrls::bind(Arc::downgrade(server), hook),
        CapabilityValue::PrintUrls(Some(print_urls)) => print_urls,
        other => return default_write(facade, name, other, server),
    };

    server.set_print_urls(print_urls);
    facade.clear_shadow(name);
    log_event_with_fields(Event::PrintUrlsRebound, &[("plugin", facade.plugin_name())]);
    true
}

/// Store on the façade; the server is never touched
pub fn default_write(
    facade: &mut DevServerFacade,
    name: &str,
    value: CapabilityValue,
    _server: &Arc<InternalDevServer>,
) -> bool {
    facade.store_shadow(name, value);
    true
}
