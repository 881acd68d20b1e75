use std::fmt::{Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

/// A string that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObfuscatedString(String);

impl ObfuscatedString {
    pub fn as_string(&self) -> &String {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ObfuscatedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "***")
    }
}

impl Debug for ObfuscatedString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "***")
    }
}

impl From<String> for ObfuscatedString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ObfuscatedString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
