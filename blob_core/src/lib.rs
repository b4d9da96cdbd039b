//! Core domain types shared by every crate in the workspace.
//!
//! This crate defines the wire- and disk-stable vocabulary of the blob
//! storage service: [`Bucket`] and [`Reference`] identifiers, the [`Key`]
//! they combine into, the [`BlobRecord`] persisted for each key, and the
//! [`ServiceError`] hierarchy every other crate reports through.

pub mod blob;
pub mod bucket;
pub mod error;
pub mod key;
pub mod reference;
pub mod time;

pub use blob::BlobRecord;
pub use bucket::Bucket;
pub use error::ServiceError;
pub use key::Key;
pub use reference::Reference;
pub use time::now_ms;
