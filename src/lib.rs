#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::pedantic)]
#![allow(
	clippy::let_unit_value,
	clippy::module_name_repetitions,
	clippy::missing_errors_doc,
	clippy::missing_panics_doc,
	clippy::redundant_closure_for_method_calls,
	clippy::struct_excessive_bools
)]

//! Builds Debian, RPM, Alpine, and Arch Linux packages from an in-memory
//! description, without shelling out to any packaging tool.
//!
//! A caller builds a [`model::Package`], resolves its content entries with
//! [`glob::resolve`], then hands both to one of the [`formats`] emitters.

pub mod archive;
pub mod config;
pub mod error;
pub mod formats;
pub mod glob;
pub mod logging;
pub mod model;
pub mod sign;

pub use error::{PackagerError, Result};
pub use model::{Format, NormalizedPackage, Package};
