//! Printer settings and configuration management.
//!
//! This module provides the configuration options for the PDF printer,
//! supporting multiple configuration sources with proper precedence.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML configuration.
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    /// Failed to serialize TOML configuration.
    #[error("Failed to serialize TOML configuration: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    /// Failed to parse JSON configuration.
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Unsupported file format.
    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// Main printer settings.
///
/// Settings can be loaded from files, environment variables, or CLI arguments.
///
/// # Configuration Precedence
///
/// Settings are applied in the following order (later sources override earlier):
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
/// 4. CLI arguments
///
/// # Example
///
/// ```rust
/// use browser_pdf_printer::config::PrinterSettings;
///
/// let settings = PrinterSettings::default()
///     .with_browser_endpoint("chrome", 9222)
///     .with_render_host("host.docker.internal");
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterSettings {
    /// Host of the browser exposing the remote debugging endpoint.
    #[serde(default = "default_browser_host")]
    pub browser_host: String,

    /// Port of the remote debugging endpoint.
    #[serde(default = "default_browser_port")]
    pub browser_port: u16,

    /// Host name under which the rendering browser reaches the web application
    /// when the caller's host is not reachable from inside its network.
    #[serde(default = "default_render_host")]
    pub render_host: String,

    /// Path prefix of the web application, used to locate the probe endpoint.
    #[serde(default)]
    pub context_path: String,

    /// Enable the HTTP API server.
    #[serde(default = "default_api_enabled")]
    pub api_enabled: bool,

    /// Port for the HTTP API server.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Timeout applied to every remote browser operation, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

// Default value functions for serde
fn default_browser_host() -> String {
    "127.0.0.1".to_string()
}

fn default_browser_port() -> u16 {
    9222
}

fn default_render_host() -> String {
    "host.docker.internal".to_string()
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_port() -> u16 {
    8080
}

fn default_timeout_ms() -> u64 {
    60000
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            browser_host: default_browser_host(),
            browser_port: default_browser_port(),
            render_host: default_render_host(),
            context_path: String::new(),
            api_enabled: default_api_enabled(),
            api_port: default_api_port(),
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

impl PrinterSettings {
    /// Creates a new PrinterSettings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from a configuration file.
    ///
    /// Supports both TOML and JSON formats, detected by file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "toml" => Ok(toml::from_str(&content)?),
            "json" => Ok(serde_json::from_str(&content)?),
            ext => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    /// Saves settings to a configuration file.
    ///
    /// The format is determined by the file extension.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let content = match extension.as_str() {
            "toml" => toml::to_string_pretty(self)?,
            "json" => serde_json::to_string_pretty(self)?,
            ext => return Err(ConfigError::UnsupportedFormat(ext.to_string())),
        };

        fs::write(path, content)?;
        Ok(())
    }

    /// Loads settings from environment variables.
    ///
    /// Environment variables are prefixed with `PDF_PRINTER_`:
    /// - `PDF_PRINTER_BROWSER_HOST`
    /// - `PDF_PRINTER_BROWSER_PORT`
    /// - `PDF_PRINTER_RENDER_HOST`
    /// - `PDF_PRINTER_CONTEXT_PATH`
    /// - `PDF_PRINTER_API_ENABLED`
    /// - `PDF_PRINTER_API_PORT`
    /// - `PDF_PRINTER_DEFAULT_TIMEOUT_MS`
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env_overrides();
        settings
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PDF_PRINTER_BROWSER_HOST") {
            self.browser_host = val;
        }

        if let Ok(val) = env::var("PDF_PRINTER_BROWSER_PORT") {
            if let Ok(port) = val.parse() {
                self.browser_port = port;
            }
        }

        if let Ok(val) = env::var("PDF_PRINTER_RENDER_HOST") {
            self.render_host = val;
        }

        if let Ok(val) = env::var("PDF_PRINTER_CONTEXT_PATH") {
            self.context_path = val;
        }

        if let Ok(val) = env::var("PDF_PRINTER_API_ENABLED") {
            self.api_enabled = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = env::var("PDF_PRINTER_API_PORT") {
            if let Ok(port) = val.parse() {
                self.api_port = port;
            }
        }

        if let Ok(val) = env::var("PDF_PRINTER_DEFAULT_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.default_timeout_ms = timeout;
            }
        }
    }

    /// Merges current settings with environment variable overrides.
    pub fn merge_with_env(mut self) -> Self {
        self.apply_env_overrides();
        self
    }

    /// Merges settings with CLI arguments.
    ///
    /// ```rust
    /// use browser_pdf_printer::config::{CliArgs, PrinterSettings};
    ///
    /// let args = CliArgs {
    ///     render_host: Some("render-host".to_string()),
    ///     ..Default::default()
    /// };
    ///
    /// let settings = PrinterSettings::default().merge_with_args(&args);
    /// assert_eq!(settings.render_host, "render-host");
    /// ```
    pub fn merge_with_args(mut self, args: &CliArgs) -> Self {
        if let Some(ref host) = args.browser_host {
            self.browser_host = host.clone();
        }
        if let Some(port) = args.browser_port {
            self.browser_port = port;
        }
        if let Some(ref render_host) = args.render_host {
            self.render_host = render_host.clone();
        }
        if let Some(ref context_path) = args.context_path {
            self.context_path = context_path.clone();
        }
        if let Some(api_enabled) = args.api_enabled {
            self.api_enabled = api_enabled;
        }
        if let Some(api_port) = args.api_port {
            self.api_port = api_port;
        }
        if let Some(timeout) = args.timeout_ms {
            self.default_timeout_ms = timeout;
        }
        self
    }

    /// Validates all settings.
    ///
    /// The render host is not parsed here; a malformed value is reported per
    /// request, when candidate addresses are built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.browser_host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Browser host cannot be empty".to_string(),
            ));
        }
        if self.browser_port == 0 {
            return Err(ConfigError::ValidationError(
                "Browser port cannot be 0".to_string(),
            ));
        }

        if self.api_enabled && self.api_port == 0 {
            return Err(ConfigError::ValidationError(
                "API port cannot be 0 when API is enabled".to_string(),
            ));
        }

        if !self.context_path.is_empty() && !self.context_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Context path must start with '/': {}",
                self.context_path
            )));
        }

        // Remote calls must never hang forever on an unresponsive browser
        if self.default_timeout_ms < 1000 {
            return Err(ConfigError::ValidationError(
                "Default timeout must be at least 1000ms".to_string(),
            ));
        }
        if self.default_timeout_ms > 600000 {
            return Err(ConfigError::ValidationError(
                "Default timeout cannot exceed 600000ms (10 minutes)".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the HTTP address of the remote debugging endpoint.
    pub fn browser_endpoint(&self) -> String {
        format!("http://{}:{}", self.browser_host, self.browser_port)
    }

    // Builder-style methods for convenient configuration

    /// Sets the remote debugging endpoint.
    pub fn with_browser_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.browser_host = host.into();
        self.browser_port = port;
        self
    }

    /// Sets the override host used for alternative print preview addresses.
    pub fn with_render_host(mut self, host: impl Into<String>) -> Self {
        self.render_host = host.into();
        self
    }

    /// Sets the web application path prefix.
    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = path.into();
        self
    }

    /// Enables or disables the API server.
    pub fn with_api(mut self, enabled: bool, port: u16) -> Self {
        self.api_enabled = enabled;
        self.api_port = port;
        self
    }

    /// Sets the default timeout in milliseconds.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }
}

/// CLI argument structure for parsing command line options.
///
/// All fields are optional to allow partial overrides.
#[derive(Debug, Default, Clone)]
pub struct CliArgs {
    /// Remote debugging host.
    pub browser_host: Option<String>,
    /// Remote debugging port.
    pub browser_port: Option<u16>,
    /// Override host for alternative print preview addresses.
    pub render_host: Option<String>,
    /// Web application path prefix.
    pub context_path: Option<String>,
    /// Enable API server.
    pub api_enabled: Option<bool>,
    /// API server port.
    pub api_port: Option<u16>,
    /// Remote operation timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Configuration file path.
    pub config_file: Option<PathBuf>,
}

impl CliArgs {
    /// Creates an empty CliArgs instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the final settings by applying the full configuration chain:
    /// defaults, configuration file, environment variables, then `self`.
    pub fn load_settings(&self) -> Result<PrinterSettings, ConfigError> {
        let mut settings = if let Some(ref config_file) = self.config_file {
            PrinterSettings::from_file(config_file)?
        } else {
            PrinterSettings::default()
        };

        settings = settings.merge_with_env();
        settings = settings.merge_with_args(self);
        settings.validate()?;

        Ok(settings)
    }
}
