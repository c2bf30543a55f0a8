//! Core domain types
//!
//! These types represent the fundamental entities of one code submission
//! and are shared between the processing engine (writes) and the serving
//! layer (reads).

pub mod sdk;
pub mod status;

pub use sdk::Sdk;
pub use status::Status;
