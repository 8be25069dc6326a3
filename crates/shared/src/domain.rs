use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

pub const GIF_MIME_TYPE: &str = "image/gif";

/// File name of a GIF stored on the balloon server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GifName(pub String);

impl GifName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GifName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GifName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for GifName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for GifName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for GifName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for GifName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
