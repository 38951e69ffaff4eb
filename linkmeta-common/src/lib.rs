//! Common utilities shared across linkmeta crates.
//!
//! Kept dependency-light so every crate (and every integration test) can pull
//! it in for the same logging setup.
//!
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use linkmeta_common::observability::{LogConfig, LogFormat};
//!
//! let cfg = LogConfig {
//!     format: LogFormat::Json,
//!     emit_stderr: true,
//!     ..LogConfig::default()
//! };
//! assert_eq!(cfg.app_name, "linkmeta");
//! assert_eq!(cfg.default_filter, "info");
//! ```

pub mod observability;

pub use observability::{LogConfig, LogFormat, init_logging};
