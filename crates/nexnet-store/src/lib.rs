//! Content-addressed, per-owner-namespaced file storage.
//!
//! A file for `(owner_id, key)` lives at
//! `{root}/{owner_id}/{dir_path}/{filename}`, where `dir_path`/`filename`
//! are derived deterministically from `key` by a [`PathTransformFn`]
//! (default: SHA-1 CAS, see [`cas_transform`]).

#![deny(unsafe_code)]

mod error;
mod path_key;
mod store;

pub use error::StoreError;
pub use path_key::{cas_transform, PathKey};
pub use store::{PathTransformFn, Store};
