//! # ante-cli
//!
//! Error reporting and logging setup shared by the `ante` binary.

#[macro_use]
extern crate tracing;

pub mod handler;
pub mod utils;
