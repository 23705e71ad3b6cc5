#![forbid(unsafe_code)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;

mod error;

pub use error::{PromexecError, PromexecResult, SubprocessError};

/// Token substituted with the bound port in commands and environment values.
pub const PORT_PLACEHOLDER: &str = "{{port}}";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn has_placeholder(&self) -> bool {
        self.value.contains(PORT_PLACEHOLDER)
    }
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}
