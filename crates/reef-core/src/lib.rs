//! Core types and trait definitions for the Reef rewards program.
//!
//! This crate has no HTTP or database dependencies.
//! All other crates depend on it; storage backends implement
//! [`store::ProfileStore`], and everything above them is generic over it.

// Native `async fn` in traits; the store trait spells out `Send` futures itself.
#![allow(async_fn_in_trait)]

pub mod display;
pub mod error;
pub mod job;
pub mod maintenance;
pub mod memory;
pub mod profile;
pub mod store;
pub mod tier;

pub use error::{Error, Result};
