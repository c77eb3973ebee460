//! Configuration module for the PDF printer.
//!
//! This module provides configuration management, including:
//! - Loading settings from files (TOML/JSON)
//! - Environment variable overrides
//! - CLI argument merging
//! - Validation and defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use browser_pdf_printer::config::PrinterSettings;
//!
//! let settings = PrinterSettings::from_file("printer.toml").unwrap();
//! let settings = settings.merge_with_env();
//! ```

mod settings;

pub use settings::{CliArgs, ConfigError, PrinterSettings};
