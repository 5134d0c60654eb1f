//! Observer capabilities attached to a [`Var`](crate::Var).
//!
//! Two capability levels:
//!
//! - [`Sink`]: one-way, receives the new value after a committed change.
//! - [`Adapter`]: two-way, additionally reports the current value of the
//!   external control it bridges (a checkbox, a spin button, ...).
//!
//! # Failure Isolation
//!
//! `Sink::notify` is fallible. A sink that returns an error is logged and
//! skipped; delivery to the remaining sinks continues. A failing sink can
//! never block its siblings.

use std::fmt;
use std::rc::Rc;

/// Error produced by a sink that could not accept a value.
#[derive(Debug, Clone)]
pub struct SinkError {
    message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink error: {}", self.message)
    }
}

impl std::error::Error for SinkError {}

/// A one-way observer of a cell's value.
///
/// Notification is synchronous and happens in attachment order, once per
/// distinct value transition.
pub trait Sink<T> {
    fn notify(&self, value: &T) -> Result<(), SinkError>;
}

/// A two-way bridge between a cell and a live external control.
///
/// The cell pushes committed changes through `notify`; the glue around the
/// control reads `current()` back when the control's user-visible state
/// changes. The re-entrance break lives in
/// [`Var::refresh_from_adapter`](crate::Var::refresh_from_adapter): the
/// adapter's current value is compared against the cell's before any write,
/// so a round trip through the control cannot loop.
pub trait Adapter<T>: Sink<T> {
    /// The value the external control currently shows.
    fn current(&self) -> T;
}

/// Closure-backed [`Sink`], for callers that don't want a named type.
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F: Fn(&T)> Sink<T> for FnSink<F> {
    fn notify(&self, value: &T) -> Result<(), SinkError> {
        (self.f)(value);
        Ok(())
    }
}

/// Wrap a closure into a shareable sink handle.
pub fn sink_fn<T: 'static>(f: impl Fn(&T) + 'static) -> Rc<dyn Sink<T>> {
    Rc::new(FnSink::new(f))
}
