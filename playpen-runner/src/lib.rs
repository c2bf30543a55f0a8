//! Playpen Runner
//!
//! The code-processing engine of the Playpen playground backend. A
//! submitted snippet, identified by a pipeline UUID, is driven through
//! validate → prepare → compile → run; status and output are published to
//! a shared cache so concurrent clients can poll progress, cancel
//! execution, or fetch results.
//!
//! Architecture:
//! - Configuration: application settings and per-SDK executor commands
//! - Cache: keyed key/sub-key store holding status, outputs, cancel flag
//! - Fs: per-pipeline scratch workspace (source, base, executable paths)
//! - Executors: in-process validate/prepare callables plus external
//!   compile/run commands, assembled by a builder
//! - Streaming: incremental run-output writer over the cache
//! - Processing: the stage orchestrator (driver, arbiter, cancel watcher,
//!   status reporter) and the public read API
//! - Service: the submission surface an RPC layer would call
//!
//! The surrounding RPC server, authentication, and request routing live
//! outside this crate.

pub mod cache;
pub mod config;
pub mod errors;
pub mod executors;
pub mod fs;
pub mod logging;
pub mod processing;
pub mod service;
pub mod streaming;
