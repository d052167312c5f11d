use std::fmt;

use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// Installs the global `tracing` subscriber.
///
/// Reads the filter from `RUST_LOG`, falling back to `info`. Safe to call
/// more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = subscriber_fmt().with_env_filter(filter).try_init();
}

/// A request-scoped logger.
///
/// Every event carries the request id, so all lines produced while handling
/// one search can be correlated. Values wrapped in [`Secret`](crate::Secret)
/// stay redacted when formatted through it.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
}

impl<'a> RequestLog<'a> {
    /// Creates a logger for the request with the given id.
    pub fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs an info-level message with request ID.
    ///
    /// ```
    /// # use item_search_proxy::RequestLog;
    /// let log = RequestLog::new("req-1");
    /// log.info(format_args!("searching for {}", "phone"));
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a warning-level message with request ID.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }

    /// Logs an error-level message with request ID.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a debug-level message with request ID.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }
}
