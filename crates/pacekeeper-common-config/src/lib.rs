//! Configuration types for Pacekeeper.
//!
//! Settings live in `.pacekeeper/config.yaml`; every field has a default,
//! `${VAR}` references are expanded before parsing and `PACEKEEPER_*`
//! variables override the parsed values.

pub mod env;
pub mod loader;
pub mod types;


pub use env::*;
pub use loader::*;
pub use types::*;
