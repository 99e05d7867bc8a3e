//! Observability for the dev server host
//!
//! Structured JSON logging of typed lifecycle events.
//!
//! ```ignore
//! use devhost::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::HttpListening, &[("port", "9000")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}
