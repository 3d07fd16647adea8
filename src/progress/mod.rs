//! Deployment progress reporting
//!
//! The orchestrator, builders and the execution shim report what they do as
//! typed [`ProgressEvent`]s. Where the events end up (tracing, a test
//! collector, nowhere) is up to the [`ProgressHandler`].

mod handler;
mod logging;

pub use handler::{CollectingHandler, NoOpHandler, OutputStream, ProgressEvent, ProgressHandler};
pub use logging::LoggingHandler;
