// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("interface name is empty")]
    Empty,
    #[error("interface name '{0}' is longer than {max} characters", max = InterfaceName::MAX_LEN)]
    TooLong(String),
    #[error("interface name '{0}' contains illegal characters")]
    IllegalCharacters(String),
    #[error("interface name '{0}' has no scheme suffix")]
    NoSuffix(String),
}

/// A kernel network interface name.
///
/// The kernel limits names to `IF_NAMESIZE - 1` bytes and rejects `/`, `:` and whitespace.
/// Names are further restricted to ASCII here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(transparent)]
pub struct InterfaceName(String);

impl InterfaceName {
    pub const MAX_LEN: usize = 15;

    /// Build a name already known to satisfy the contract.
    pub(crate) fn new_unchecked(name: String) -> Self {
        debug_assert!(Self::validate(&name).is_ok(), "invalid interface name {name}");
        Self(name)
    }

    fn validate(name: &str) -> Result<(), NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if name.len() > Self::MAX_LEN {
            return Err(NameError::TooLong(name.to_string()));
        }
        if name == "." || name == ".." {
            return Err(NameError::IllegalCharacters(name.to_string()));
        }
        let legal = |c: char| c.is_ascii_graphic() && c != '/' && c != ':';
        if !name.chars().all(legal) {
            return Err(NameError::IllegalCharacters(name.to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InterfaceName {
    type Error = NameError;
    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::validate(&name)?;
        Ok(Self(name))
    }
}

impl TryFrom<&str> for InterfaceName {
    type Error = NameError;
    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::try_from(name.to_string())
    }
}

impl From<InterfaceName> for String {
    fn from(name: InterfaceName) -> Self {
        name.0
    }
}

impl AsRef<str> for InterfaceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for InterfaceName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for InterfaceName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Display for InterfaceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
