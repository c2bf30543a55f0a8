//! Playpen Core
//!
//! Core types for the Playpen multi-language playground backend.
//!
//! This crate contains:
//! - Domain types: the pipeline lifecycle status and the SDK tag shared
//!   between the processing engine and the serving layer
//!
//! Note: all runtime logic (cache, executors, pipeline driver) lives in
//! `playpen-runner`.

pub mod domain;
