//! domcast core crate.
//!
//! Builds replayable client instruction streams on the server:
//!
//! - `response`: the chainable builder. Each call records a
//!   `(selector, command, args)` triple, grouped by selector key.
//! - `typecast`: turns arguments into wire-ready trees (nested builders,
//!   deferred functions, numeric strings, objects).
//! - `merge`: folds other builders' snapshots in at render time.
//! - `render`: the ordered JSON wire object.
//! - `context`: per-request registry and shared value store.
//!
//! A typical request builds one or more responses from a `BuildContext`,
//! merges them, and renders the result once.

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod function;
pub mod merge;
pub mod render;
pub mod response;
pub mod typecast;
pub mod value;

pub use command::{Builtin, Command, CommandId, CommandMap, Marker};
pub use config::BuildConfig;
pub use context::BuildContext;
pub use error::{DomcastError, DomcastResult};
pub use function::JsFunction;
pub use merge::MergeSource;
pub use response::Response;
pub use typecast::{CastOptions, typecast};
pub use value::{Arg, ArgObject, Fields, ResponseSnapshot};
