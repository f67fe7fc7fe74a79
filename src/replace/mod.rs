//! Search/replace engine.
//!
//! The field registry ([`Fields`], built by [`FieldsBuilder`]) mirrors the
//! schemas of the record types being processed. Picking a field and a
//! search/replace pair yields an [`Operation`] whose `process` mutates a
//! record and reports whether anything changed.
//!
//! ```text
//! Schema ─▶ FieldsBuilder ─▶ Fields ─▶ Fields::operation(field, search, replace)
//!                                             │
//!                              Record ─▶ Operation::process ─▶ changed?
//! ```

pub mod builder;
pub mod field;
pub mod operation;
mod process;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::FieldsBuilder;
pub use field::{Field, FieldId, FieldKind, Fields, OptionLayout, SelectOption};
pub use operation::{Behavior, Operation, OperationKind};
