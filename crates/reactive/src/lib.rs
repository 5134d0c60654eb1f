//! Reactive value cells for application settings.
//!
//! A [`Var`] wraps one value and notifies attached observers exactly when
//! the value actually changes. Observers come in two capabilities:
//! [`Sink`] (one-way, e.g. a widget that gets enabled/disabled) and
//! [`Adapter`] (two-way bridge to a live control). Everything here is
//! single-threaded; access is serialized by RAII guards, and the release
//! of a write guard is the boundary at which change comparisons and
//! notifications happen.

pub mod cell;
pub mod observer;

pub use cell::{ReadGuard, Var, WriteGuard};
pub use observer::{sink_fn, Adapter, FnSink, Sink, SinkError};
