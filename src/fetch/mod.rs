//! Rate-limited HTTP fetching
//!
//! This module handles:
//! - The [`Transport`] seam and its `reqwest`-backed [`HttpSession`]
//! - Response shapes (decoded text or raw bytes)
//! - The [`RequestHandler`] that funnels every GET through a dispatcher

mod handler;
mod transport;

pub use handler::RequestHandler;
pub use transport::{HttpSession, Transport};

/// User-Agent strings rotated across requests
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// How a response body should be delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseShape {
    /// Body decoded as text using the response charset
    #[default]
    Text,

    /// Body bytes, untouched
    Raw,
}

impl ResponseShape {
    /// Returns the string representation used in logs and the archive
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseShape::Text => "text",
            ResponseShape::Raw => "raw",
        }
    }
}

impl std::fmt::Display for ResponseShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fetched response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Raw(Vec<u8>),
}

impl Body {
    /// Shape this body was fetched with
    pub fn shape(&self) -> ResponseShape {
        match self {
            Body::Text(_) => ResponseShape::Text,
            Body::Raw(_) => ResponseShape::Raw,
        }
    }

    /// Length of the body in bytes
    pub fn len(&self) -> usize {
        match self {
            Body::Text(text) => text.len(),
            Body::Raw(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the text, decoding raw bytes lossily as UTF-8
    pub fn into_text(self) -> String {
        match self {
            Body::Text(text) => text,
            Body::Raw(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// Returns the body bytes
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Body::Text(text) => text.into_bytes(),
            Body::Raw(bytes) => bytes,
        }
    }
}
