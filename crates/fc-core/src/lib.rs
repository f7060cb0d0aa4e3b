//! fc-core: shared foundation for the fuel-cell parameter-study workspace.
//!
//! Contains:
//! - value (dynamically typed parameter values)
//! - literal (safe literal parser for user-entered variation values)
//! - coerce (string to number coercion for form-style inputs)
//! - numeric (tolerances + float helpers)
//! - error (shared error types)

pub mod coerce;
pub mod error;
pub mod literal;
pub mod numeric;
pub mod value;

// Re-exports: nice ergonomics for downstream crates
pub use coerce::{Coerced, coerce_list, coerce_str};
pub use error::{CoreError, CoreResult};
pub use literal::{ParseError, parse_literal};
pub use numeric::*;
pub use value::Value;
