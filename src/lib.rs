//! `docbatch` -- bulk operations over document databases.
//!
//! Two layers:
//!
//! - [`replace`]: a registry of the fields found in record schemas and the
//!   search/replace operations (replace, remove, inject, clear) that can be
//!   applied to them, including typed fields that target one occurrence kind
//!   of a repeatable composite.
//! - [`batch`]: a controller that runs a bulk operation (delete, change
//!   status, change author, move to another database, search and replace)
//!   over the records matched by a search, with a parameter form and a
//!   confirmation step before anything is written.
//!
//! The crate ships an in-memory JSON store ([`store`]) and exposes both layers
//! as tools over the Model Context Protocol (JSON-RPC 2.0 on stdio).
//!
//! # Architecture
//!
//! ```text
//! stdin (JSON-RPC) → server → ToolRouter → fields / explain / batch
//!                                                   ↓
//!                                      BatchRunner → MemoryStore
//! stdout (JSON-RPC) ←─────────────────────────────────┘
//! ```

pub mod batch;
pub mod error;
pub mod record;
pub mod replace;
pub mod schema;
pub mod server;
pub mod store;
pub mod tools;
pub mod util;

pub use error::{BatchError, BatchResult};
pub use server::run_server;
