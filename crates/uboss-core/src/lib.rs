//! # uboss Core
//!
//! Core types shared by every uboss crate:
//!
//! - [`UbossError`] - The error taxonomy (registration, composition,
//!   authorization and execution failures)
//! - [`ErrorCategory`] - Coarse classification of errors
//! - [`EntryKind`] - The three kinds of registry entries
//! - [`Phase`] - The middleware slots around the gate and the method
//! - [`DuplicatePolicy`] / [`DefaultDecision`] - Per-deployment policies
//! - [`value`] - Dotted-path lookup over JSON metadata

#![doc(html_root_url = "https://docs.rs/uboss-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod phase;
mod policy;
pub mod value;

pub use error::{EntryKind, ErrorCategory, UbossError, UbossResult};
pub use phase::Phase;
pub use policy::{DefaultDecision, DuplicatePolicy};
pub use value::{lookup_path, metadata_of, Value};
