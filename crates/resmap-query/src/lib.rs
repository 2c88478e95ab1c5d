//! Query helpers for Resmap.
//!
//! `resmap-query` is the **lookup layer** between the mapping engine and the
//! `Storage` collaborator:
//!
//! - **Identity keys**: `IdentityKey` turns a tuple of identifying field
//!   values into a hashable key with SQL NULL awareness.
//! - **Existence lookups**: `in_bulk` finds stored rows for many identifying
//!   tuples with one OR-of-AND predicate per batch.
//! - **Bounded statements**: the `*_in_batches` helpers split `IN` lists and
//!   bulk writes so no statement exceeds the storage's parameter limit.

pub mod batch;
pub mod bulk;
pub mod key;

pub use batch::{create_in_batches, delete_in_batches, select_in_batches, update_in_batches};
pub use bulk::{batch_size, in_bulk};
pub use key::{IdentityKey, record_tuple};

/// Fallback number of tuples per existence lookup when the storage reports
/// no parameter limit.
pub const DEFAULT_BATCH_SIZE: usize = 500;
