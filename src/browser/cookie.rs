//! Caller cookies forwarded to the rendering browser.

use serde::{Deserialize, Serialize};

/// A cookie taken from the caller's HTTP request.
///
/// Name and value are forwarded to the browser session exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    /// Creates a session cookie with only a name and a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Parses the value of a `Cookie` request header.
    ///
    /// Pairs keep their order; values are not unquoted or decoded.
    ///
    /// ```rust
    /// use browser_pdf_printer::browser::Cookie;
    ///
    /// let cookies = Cookie::parse_header("JSESSIONID=abc; remember=a=b");
    /// assert_eq!(cookies.len(), 2);
    /// assert_eq!(cookies[1].value, "a=b");
    /// ```
    pub fn parse_header(header: &str) -> Vec<Cookie> {
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = match pair.split_once('=') {
                    Some((name, value)) => (name.trim(), value.trim()),
                    None => (pair.trim(), ""),
                };
                if name.is_empty() {
                    None
                } else {
                    Some(Cookie::new(name, value))
                }
            })
            .collect()
    }

    /// Parses a `NAME=VALUE` command line argument.
    pub fn parse_pair(pair: &str) -> Option<Cookie> {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Cookie::new(name, value))
    }
}
