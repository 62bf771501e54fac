//! Field Schema DSL
//!
//! # Philosophy: Schema first, then rows
//!
//! A list's shape is declared as data: an ordered set of typed field
//! definitions with constraints and conditional visibility. The lifecycle:
//!
//! 1. **Author**: the list owner writes a schema document (plain JSON)
//! 2. **Parse**: [`parse::parse_schema`] normalizes it into [`ParsedField`]s
//!    or rejects it wholesale - no partial acceptance
//! 3. **Validate**: every row write runs through [`validate::validate_row`],
//!    which either coerces the row or reports every field error at once
//!
//! Parsing owns the schema boundary: downstream code only ever sees a closed
//! [`FieldKind`] union and can match exhaustively. The validator never
//! rejects a schema - a malformed schema cannot reach it.
//!
//! # Modules
//!
//! - [`field`]: normalized field model ([`ParsedField`], [`FieldKind`],
//!   [`VisibilityRule`])
//! - [`parse`]: raw document -> normalized fields, or [`parse::SchemaError`]
//! - [`validate`]: row validation and coercion

pub mod field;
pub mod parse;
pub mod validate;

pub use field::{
    FieldKind, NumberRules, ParsedField, StringRules, VisibilityOp, VisibilityRule,
};
pub use parse::{parse_schema, parse_schema_str, SchemaError};
pub use validate::{validate_row, FieldError, FieldErrorKind, RowValidation};
