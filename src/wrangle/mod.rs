//! Data-shape normalisation and column-type inference.
//!
//! This is the heart of the tool: deciding whether a table is wide or long,
//! melting wide tables into tidy long form, stripping units out of numeric
//! strings and assigning each column a semantic type that drives the
//! wizard's advisory guard.

pub mod infer;
pub mod io;
pub mod naming;
pub mod shape;
pub mod transform;
pub mod units;

pub use infer::{profile_columns, ColumnKind, ColumnProfile};
pub use shape::{detect_shape, melt, ShapeReport, TableShape};
pub use transform::{sanitize, SanitizeOutcome};
pub use units::UnitValue;
