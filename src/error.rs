use std::fmt::Display;

use tracing_error::{ExtractSpanTrace, SpanTrace};

/// An error paired with the span trace captured where it was raised.
#[derive(Debug)]
pub struct SpannedErr<T> {
    pub err: T,
    pub span_trace: SpanTrace,
}

impl<T> SpannedErr<T> {
    pub fn new(err: T) -> Self {
        SpannedErr {
            err,
            span_trace: SpanTrace::capture(),
        }
    }

    /// Converts the inner error while keeping the original span trace.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SpannedErr<U> {
        SpannedErr {
            err: f(self.err),
            span_trace: self.span_trace,
        }
    }

    pub fn inner(&self) -> &T {
        &self.err
    }
}

pub trait SpannedExt<T, E> {
    fn with_span_trace(self) -> Result<T, SpannedErr<E>>;
}

impl<T, E> SpannedExt<T, E> for Result<T, E> {
    fn with_span_trace(self) -> Result<T, SpannedErr<E>> {
        self.map_err(SpannedErr::new)
    }
}

impl<E> ExtractSpanTrace for SpannedErr<E> {
    fn span_trace(&self) -> Option<&SpanTrace> {
        Some(&self.span_trace)
    }
}

impl<T: Display> Display for SpannedErr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.err, f)
    }
}

impl<U: std::error::Error> std::error::Error for SpannedErr<U> {}

/// Logs an error and prints its span trace, if any, to stderr.
pub(crate) fn report_error(context: &str, e: &(impl Display + ExtractSpanTrace)) {
    tracing::error!("{context}: {e}");
    if let Some(span_trace) = e.span_trace() {
        eprintln!("\n{}\n", color_spantrace::colorize(span_trace));
    }
}
