//! Dev Server Façade Tests
//!
//! - Names outside the read surface are rejected with the full surface
//! - Whitelisted names forward the live, identity-equal server field
//! - printUrls writes rebind onto the real server
//! - Other writes stay on the writing façade

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use devhost::compat::{
    CapabilitySurface, CapabilityValue, CompatError, DevServerFacade, DevServerProperty,
};
use devhost::config::DevConfig;
use devhost::hmr::{DisabledChannel, HmrChannel};
use devhost::server::{
    HttpServerHandle, InternalDevServer, MiddlewareStack, PrintUrlsHook, ResolvedUrls,
};
use devhost::watcher::FileWatcher;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn server_with_listener() -> Arc<InternalDevServer> {
    let middlewares = MiddlewareStack::new();
    let http = Arc::new(HttpServerHandle::new(
        "127.0.0.1",
        0,
        None,
        middlewares.clone(),
    ));
    InternalDevServer::new(
        Arc::new(DevConfig::default()),
        Some(http),
        middlewares,
        Arc::new(FileWatcher::disabled()),
    )
}

fn facade(name: &str, server: &Arc<InternalDevServer>) -> DevServerFacade {
    DevServerFacade::new(name, Arc::clone(server.config()), Arc::clone(server)).unwrap()
}

// =============================================================================
// Read Policy
// =============================================================================

/// Every name outside the surface fails with that name and the full list.
#[test]
fn test_unknown_names_rejected() {
    let server = server_with_listener();
    let facade = facade("vite-plugin-inspect", &server);

    for name in ["restart", "pluginContainer", "transformRequest", "middlewareCallbacks", ""] {
        match facade.get(name).unwrap_err() {
            CompatError::IncompatibleCapability {
                plugin,
                capability,
                allowed,
                key,
            } => {
                assert_eq!(plugin, "vite-plugin-inspect");
                assert_eq!(capability, "viteDevServer");
                assert_eq!(allowed, DevServerProperty::names());
                assert_eq!(key, name);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[test]
fn test_rejection_reads_as_compatibility_report() {
    let server = server_with_listener();
    let err = facade("p", &server).get("restart").unwrap_err();
    let message = err.to_string();

    assert!(message.starts_with("plugin 'p' accessed viteDevServer.restart which is not supported"));
    assert!(message.contains("supported: [serverOptions, resolvedUrls, printUrls"));
}

/// Every whitelisted name returns the server's own value, not a copy.
#[test]
fn test_whitelisted_names_identity_equal() {
    let server = server_with_listener();
    server.set_ws(Arc::new(HmrChannel::Disabled(DisabledChannel)));
    server.set_resolved_urls(ResolvedUrls {
        local: vec!["http://localhost:9000/".into()],
        network: Vec::new(),
    });
    let facade = facade("p", &server);

    let expected = [
        ("serverOptions", CapabilityValue::ServerOptions(Arc::clone(server.server_options()))),
        ("resolvedUrls", CapabilityValue::ResolvedUrls(server.resolved_urls())),
        ("printUrls", CapabilityValue::PrintUrls(server.print_urls())),
        ("moduleGraph", CapabilityValue::ModuleGraph(Arc::clone(facade.module_graph()))),
        ("config", CapabilityValue::Config(Arc::clone(server.config()))),
        ("watcher", CapabilityValue::Watcher(Arc::clone(server.watcher()))),
        ("middlewares", CapabilityValue::Middlewares(server.middlewares().clone())),
        ("ws", CapabilityValue::Ws(server.ws())),
        ("httpServer", CapabilityValue::HttpServer(server.http_server().cloned())),
    ];
    assert_eq!(expected.len(), DevServerProperty::ALL.len());

    for (name, value) in expected {
        let got = facade.get(name).unwrap();
        assert!(got.same_as(&value), "{name} was not forwarded: {got:?}");
    }
}

/// Slots the host fills after the façade exists show through.
#[test]
fn test_late_server_fields_visible() {
    let server = server_with_listener();
    let facade = facade("p", &server);
    assert!(matches!(facade.get("ws").unwrap(), CapabilityValue::Ws(None)));

    let channel = Arc::new(HmrChannel::Disabled(DisabledChannel));
    server.set_ws(Arc::clone(&channel));
    assert!(facade
        .get("ws")
        .unwrap()
        .same_as(&CapabilityValue::Ws(Some(channel))));
}

// =============================================================================
// printUrls Rebind
// =============================================================================

/// The hook runs with the real server, and every façade sees the swap.
#[test]
fn test_print_urls_rebinds_to_server() {
    let server = server_with_listener();
    server.set_resolved_urls(ResolvedUrls {
        local: vec!["http://localhost:4000/".into()],
        network: Vec::new(),
    });
    let mut writer = facade("writer", &server);
    let reader = facade("reader", &server);

    let seen = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));
    let (seen_in_hook, calls_in_hook) = (Arc::clone(&seen), Arc::clone(&calls));
    let server_ptr = Arc::as_ptr(&server) as usize;
    writer
        .set_print_urls(PrintUrlsHook::new(move |srv: &InternalDevServer| {
            assert_eq!(srv as *const InternalDevServer as usize, server_ptr);
            *seen_in_hook.lock().unwrap() = srv.resolved_urls().map(|u| u.local.clone());
            calls_in_hook.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

    let live = server.print_urls().unwrap();
    for value in [writer.get("printUrls").unwrap(), reader.get("printUrls").unwrap()] {
        assert!(value.same_as(&CapabilityValue::PrintUrls(Some(live.clone()))));
    }

    live.call();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *seen.lock().unwrap(),
        Some(vec!["http://localhost:4000/".to_string()])
    );
}

/// A non-callable value for printUrls only shadows the writing façade.
#[test]
fn test_print_urls_non_callable_shadows() {
    let server = server_with_listener();
    let before = server.print_urls().unwrap();
    let mut facade = facade("p", &server);

    facade
        .set("printUrls", CapabilityValue::Json(json!(false)))
        .unwrap();
    assert!(facade
        .get("printUrls")
        .unwrap()
        .same_as(&CapabilityValue::Json(json!(false))));
    assert!(server.print_urls().unwrap().ptr_eq(&before));
}

// =============================================================================
// Default Writes
// =============================================================================

/// Any other write is readable back from the façade and leaves the server alone.
#[test]
fn test_default_writes_stay_on_facade() {
    let server = server_with_listener();
    let mut writer = facade("writer", &server);
    let other = facade("other", &server);
    let original_http = server.http_server().cloned();

    let replacement = Arc::new(HttpServerHandle::new(
        "127.0.0.1",
        0,
        None,
        MiddlewareStack::new(),
    ));
    let value = CapabilityValue::HttpServer(Some(Arc::clone(&replacement)));
    writer.set("httpServer", value.clone()).unwrap();

    assert!(writer.get("httpServer").unwrap().same_as(&value));
    assert!(other
        .get("httpServer")
        .unwrap()
        .same_as(&CapabilityValue::HttpServer(original_http.clone())));
    assert!(Arc::ptr_eq(
        server.http_server().unwrap(),
        original_http.as_ref().unwrap()
    ));
}

/// Unknown names can be written but stay unreadable.
#[test]
fn test_unknown_name_write_is_not_readable() {
    let server = server_with_listener();
    let mut facade = facade("p", &server);

    facade
        .set("customState", CapabilityValue::Json(json!({"n": 1})))
        .unwrap();
    assert!(matches!(
        facade.get("customState"),
        Err(CompatError::IncompatibleCapability { .. })
    ));
}
