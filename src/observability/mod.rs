//! Observability
//!
//! - Structured JSON logging to stderr
//! - Atomic counters
//! - Lifecycle events
//!
//! Nothing here feeds back into engine behavior. A failed log write is dropped.
//!
//! ```ignore
//! use shardlog::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::StreamCreated, &[("stream", "orders")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.record_put(12);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

fn severity_for(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_severity() {
        assert_eq!(severity_for(Event::JournalCorruption), Severity::Fatal);
        assert_eq!(severity_for(Event::IteratorExpired), Severity::Warn);
        assert_eq!(severity_for(Event::StreamCreated), Severity::Info);
    }

    #[test]
    fn test_log_event() {
        log_event(Event::RegistryOpen);
        log_event_with_fields(Event::StreamCreated, &[("stream", "orders"), ("shards", "2")]);
    }
}
