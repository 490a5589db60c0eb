//! Structured span for outgoing requests.

use std::time::Instant;

use tracing::{Level, Span, field, span};

/// Span covering one call to the server.
///
/// Carries the verb and endpoint name only; rendered URLs can hold resource ids
/// and are kept out of the span.
pub struct RequestSpan {
    span: Span,
    start: Instant,
}

impl RequestSpan {
    pub fn new(verb: &str, endpoint: &str) -> Self {
        let span = span!(
            Level::DEBUG,
            "conjur.request",
            verb = verb,
            endpoint = endpoint,
            status = field::Empty,
            latency_ms = field::Empty,
            error = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn record_status(&self, status: u16) {
        self.span.record("status", status);
    }

    pub fn finish(self) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("latency_ms", latency_ms);
    }

    /// Finish a request that never produced a response.
    pub fn fail(self, error: &dyn std::fmt::Display) {
        self.span.record("error", field::display(error));
        self.finish();
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_span() {
        let span = RequestSpan::new("GET", "Whoami");
        span.record_status(200);
        span.finish();

        RequestSpan::new("POST", "Authenticate").fail(&"connection refused");
    }
}
