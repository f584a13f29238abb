//! # rass-telemetry
//!
//! Structured logging for RASS services.
//!
//! Verbosity comes from `RUST_LOG` (default `info`); output is either
//! human-readable lines or one JSON object per event.
//!
//! ```rust,no_run
//! use rass_telemetry::{LogFormat, init_logging};
//!
//! init_logging(LogFormat::Json).expect("logging initialized once");
//! tracing::info!(port = 8000, "server listening");
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Filter directive used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown log format '{0}', expected 'pretty' or 'json'")]
    UnknownFormat(String),

    #[error("failed to install global subscriber: {0}")]
    Init(String),
}

/// How log events are rendered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

/// Build the level filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Build a formatting layer writing to `writer`.
///
/// JSON events are flattened so their fields sit next to `message` and
/// `level`; span context is omitted.
pub fn fmt_layer<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer().with_target(true).with_writer(writer).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_span_list(false)
            .flatten_event(true)
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global subscriber, logging to stdout.
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global subscriber is already set.
pub fn init_logging(format: LogFormat) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer(format, std::io::stdout))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!(matches!("xml".parse::<LogFormat>(), Err(TelemetryError::UnknownFormat(_))));
    }

    #[test]
    fn json_events_are_flattened() {
        let buffer = Buffer::default();
        let subscriber =
            tracing_subscriber::registry().with(fmt_layer(LogFormat::Json, buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(document.id = "doc-1", processed = 3, "embedded document");
        });

        let output = buffer.contents();
        let line = output.lines().next().unwrap();
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(event["message"], "embedded document");
        assert_eq!(event["document.id"], "doc-1");
        assert_eq!(event["processed"], 3);
        assert_eq!(event["level"], "INFO");
    }

    #[test]
    fn pretty_events_carry_message() {
        let buffer = Buffer::default();
        let subscriber =
            tracing_subscriber::registry().with(fmt_layer(LogFormat::Pretty, buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(errors = 1, "refresh completed");
        });

        let output = buffer.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("refresh completed"));
    }
}
