//! Structured logging helpers.
//!
//! The library only emits [`tracing`] events; it never installs a
//! subscriber itself (that's a decision for the CLI shell the spec treats
//! as an external collaborator). Tests that want to see the trace use
//! [`tracing_subscriber`]'s `fmt().with_test_writer()`.

/// Logs one event per file as it streams through an emitter, at `trace`
/// verbosity so normal runs stay quiet.
macro_rules! trace_file {
    ($dest:expr, $size:expr) => {
        tracing::trace!(destination = %$dest, size = $size, "streaming content entry");
    };
}

/// Logs once an archive has been fully written and digested.
macro_rules! info_archive_done {
    ($format:expr, $bytes:expr) => {
        tracing::info!(format = %$format, bytes = $bytes, "archive emitted");
    };
}

pub(crate) use info_archive_done;
pub(crate) use trace_file;
