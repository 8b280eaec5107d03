//! Core types and trait definitions for the confstore configuration store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the schema language, the validator, the form projector, the storage trait
//! and the reference reader built on top of it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod entry;
pub mod error;
pub mod form;
pub mod namespace;
pub mod node;
pub mod path;
pub mod reference;
pub mod schema;
pub mod secret;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
