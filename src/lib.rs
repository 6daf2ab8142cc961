//! Query/update builder and result iteration over a document-oriented
//! store.
//!
//! Callers describe what to fetch or mutate — conditions, projections,
//! sort, paging, update deltas — without hand-assembling wire-level query
//! documents. [`Expression`] accumulates conditions, [`Operator`]
//! accumulates update modifiers, [`Query`] materializes cursors against a
//! collection handle, and [`Paginator`]/[`CachedResultSet`] wrap queries
//! for higher-level access patterns. The store itself sits behind the
//! [`CollectionHandle`] capability; [`MemStore`] is the bundled in-process
//! implementation.

pub mod client;
pub mod collection;
pub mod database;
pub mod errors;
pub mod expression;
pub mod handle;
pub mod mem;
pub mod operator;
pub mod pipeline;
pub mod query;
pub mod types;

pub use client::{Client, Connector};
pub use collection::Collection;
pub use database::Database;
pub use errors::Error;
pub use expression::Expression;
pub use handle::{CollectionHandle, FindAndModifyOptions, StoreCursor};
pub use mem::{MemCollection, MemStore};
pub use operator::Operator;
pub use pipeline::Pipeline;
pub use query::{CachedResultSet, Cursor, CursorShape, Paginator, Query};
pub use types::{Order, ReadPreference, SortSpec, WriteConcern};
