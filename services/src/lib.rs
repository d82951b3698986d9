//! Shared, no-I/O-port-specific helpers used by the review pipeline's
//! workers. Currently just the shallow git clone C9 needs; grows only when
//! another component needs a small cross-cutting helper like this one.

pub mod git;
