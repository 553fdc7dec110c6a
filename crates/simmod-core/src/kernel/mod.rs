//! # Simmod Core Kernel
//!
//! Crate-wide pieces shared by every subsystem:
//!
//! - **Constants**: API revision, entry symbol, registry and validation limits
//!   in the `constants` submodule.
//! - **Error Handling**: the top-level [`Error`](error::Error) that wraps the
//!   module system and configuration errors, and a `Result` alias.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
