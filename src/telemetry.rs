//! Hooks invoked around every remote call.
//!
//! The client ticks a statistics sink before each call, reports the outcome
//! afterwards, and hands the decoded response to a debug logger. Backends for
//! these hooks live outside this crate; [`TracingTelemetry`] forwards them to
//! `tracing` so they show up in the normal log stream.

use std::panic::Location;
use tracing::{debug, error, info, trace, warn, Level};

/// Component name reported to the statistics sink.
pub const COMPONENT: &str = "Fantastico";

/// Subsystem name used for debug logging.
pub const SUBSYSTEM: &str = "fantastico";

/// Message reported when a remote call fails.
pub const FAILURE_MESSAGE: &str = "Soap Client Error";

/// Receiver for call statistics and debug logs.
pub trait Telemetry: Send + Sync {
    /// Called immediately before a remote call.
    fn tick(&self, component: &str, operation: &str);

    /// Called after a remote call completes, successfully or not.
    fn report(
        &self,
        component: &str,
        operation: &str,
        success: bool,
        error_count: u32,
        message: &str,
        destination: &str,
    );

    /// Structured debug log entry.
    fn log(&self, subsystem: &str, level: Level, message: &str, location: &'static Location<'static>) {
        emit(subsystem, level, message, location);
    }
}

fn emit(subsystem: &str, level: Level, message: &str, location: &'static Location<'static>) {
    let file = location.file();
    let line = location.line();
    match level {
        Level::ERROR => error!(subsystem, file, line, "{message}"),
        Level::WARN => warn!(subsystem, file, line, "{message}"),
        Level::INFO => info!(subsystem, file, line, "{message}"),
        Level::DEBUG => debug!(subsystem, file, line, "{message}"),
        Level::TRACE => trace!(subsystem, file, line, "{message}"),
    }
}

/// Telemetry that forwards everything to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn tick(&self, component: &str, operation: &str) {
        trace!(component, operation, "remote call started");
    }

    fn report(
        &self,
        component: &str,
        operation: &str,
        success: bool,
        error_count: u32,
        message: &str,
        destination: &str,
    ) {
        if success {
            debug!(component, operation, destination, "remote call succeeded");
        } else {
            warn!(
                component,
                operation,
                error_count,
                destination,
                reason = %message,
                "remote call failed"
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// One observed hook invocation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Tick(String),
        Report {
            operation: String,
            success: bool,
            error_count: u32,
            message: String,
        },
        Log(String),
    }

    /// Telemetry that records every call for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingTelemetry {
        pub events: Mutex<Vec<Event>>,
    }

    impl RecordingTelemetry {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Telemetry for RecordingTelemetry {
        fn tick(&self, _component: &str, operation: &str) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Tick(operation.to_string()));
        }

        fn report(
            &self,
            _component: &str,
            operation: &str,
            success: bool,
            error_count: u32,
            message: &str,
            _destination: &str,
        ) {
            self.events.lock().unwrap().push(Event::Report {
                operation: operation.to_string(),
                success,
                error_count,
                message: message.to_string(),
            });
        }

        fn log(&self, subsystem: &str, _: Level, message: &str, _: &'static Location<'static>) {
            self.events
                .lock()
                .unwrap()
                .push(Event::Log(format!("{subsystem}: {message}")));
        }
    }
}
