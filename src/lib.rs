//! Versioned, multilingual content-repository persistence core.
//!
//! The crate maintains a multi-version, multi-language, tree-structured
//! content graph over a relational store it never queries directly: all SQL
//! lives behind the gateway traits in [`application::gateway`], and field
//! types with out-of-row data plug in through
//! [`application::storage::FieldStorage`] engines.
//!
//! Entry points are the three handlers:
//!
//! - [`application::content::ContentHandler`] — create, publish, draft,
//!   load, update, copy, delete and relations.
//! - [`application::location::LocationHandler`] — placement, movement,
//!   visibility and subtree copies.
//! - [`application::tree::TreeHandler`] — subtree removal, section
//!   propagation, main-location re-election and draft cleanup.
//!
//! Handlers hold no locks and run no compensation logic: callers wrap each
//! top-level operation in a store-level transaction.

pub mod application;
pub mod config;
pub mod domain;
pub mod telemetry;

pub use application::content::ContentHandler;
pub use application::error::HandlerError;
pub use application::fields::FieldHandler;
pub use application::location::LocationHandler;
pub use application::mapper::Mapper;
pub use application::storage::{StorageHandler, StorageRegistry};
pub use application::tree::TreeHandler;
