//! # nx-connector-fs
//!
//! The Executor: the only code in Nexus that writes a dispatch file.
//!
//! It accepts nothing but a [`ValidatedPath`](nx_policy::ValidatedPath), so a
//! path must have passed containment before it can get here. Each write is
//! staged to a temp file in the target directory, synced, and then moved into
//! place in one step:
//!
//! 1. [`FsDispatchSink::stage`] writes the [`DispatchRecord`] to a temp file
//! 2. [`StagedDispatch::commit`] publishes it under the final name
//!
//! Without overwrite the publish is create-exclusive, so two missions racing
//! for the same filename get one success and one
//! [`ExecutionFailure::AlreadyExists`]. A staged write that is dropped
//! without commit leaves nothing behind.

pub mod error;
pub mod record;
pub mod sink;

pub use error::ExecutionFailure;
pub use record::DispatchRecord;
pub use sink::{DispatchSink, FsDispatchSink, StagedDispatch};
