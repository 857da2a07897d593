//! Pacekeeper common core types.

pub mod id;

pub use id::{CallId, IdParseError, RequesterId};
