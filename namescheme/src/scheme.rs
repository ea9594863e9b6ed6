// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The two pod interface naming schemes.

use crate::ifname::{InterfaceName, NameError};
use sha2::{Digest, Sha256};

/// Prefix of ordinal secondary interface names (`net1`, `net2`, ...).
pub const ORDINAL_PREFIX: &str = "net";

/// Prefix of hashed secondary interface names.
pub const HASHED_PREFIX: &str = "pod";

/// Prefix of the tap device backing a pod interface.
pub const TAP_PREFIX: &str = "tap";

/// All scheme prefixes have the same length; a pod interface suffix is what follows it.
pub const SCHEME_PREFIX_LEN: usize = 3;

/// Number of hex digits of the network name digest kept in a hashed name.
pub const HASHED_DIGITS: usize = 11;

/// Pod interface of the primary (default) network.
pub const PRIMARY_POD_INTERFACE: &str = "eth0";

/// Scheme a pod interface name was generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    /// `net<index>`, where index counts non-default networks from 1
    Ordinal(u32),
    Hashed,
}

/// Tell the naming scheme of a pod interface name.
#[must_use]
pub fn naming_scheme(name: &str) -> NamingScheme {
    let Some(digits) = name.strip_prefix(ORDINAL_PREFIX) else {
        return NamingScheme::Hashed;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return NamingScheme::Hashed;
    }
    match digits.parse() {
        Ok(index) => NamingScheme::Ordinal(index),
        Err(_) => NamingScheme::Hashed,
    }
}

/// True if `name` is an ordinal secondary interface name.
#[must_use]
pub fn is_ordinal(name: &str) -> bool {
    matches!(naming_scheme(name), NamingScheme::Ordinal(_))
}

/// Predict the hashed pod interface name of the VM network called `network_name`.
///
/// This must stay identical to the algorithm the virtualization layer uses when it asks the CNI
/// for an interface: the first [`HASHED_DIGITS`] lowercase hex digits of the SHA-256 digest of the
/// network name, prefixed with [`HASHED_PREFIX`].
#[must_use]
pub fn hashed_interface_name(network_name: &str) -> InterfaceName {
    let digest = Sha256::digest(network_name.as_bytes());
    let mut name = String::with_capacity(HASHED_PREFIX.len() + HASHED_DIGITS);
    name.push_str(HASHED_PREFIX);
    for byte in digest.iter() {
        name.push_str(&format!("{byte:02x}"));
        if name.len() >= HASHED_PREFIX.len() + HASHED_DIGITS {
            break;
        }
    }
    name.truncate(HASHED_PREFIX.len() + HASHED_DIGITS);
    InterfaceName::new_unchecked(name)
}

/// Name of the tap device that backs pod interface `pod_interface`.
pub fn tap_name(pod_interface: &str) -> Result<InterfaceName, NameError> {
    let suffix = pod_interface
        .get(SCHEME_PREFIX_LEN..)
        .filter(|suffix| !suffix.is_empty())
        .ok_or_else(|| NameError::NoSuffix(pod_interface.to_string()))?;
    InterfaceName::try_from(format!("{TAP_PREFIX}{suffix}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_naming_scheme() {
        assert_eq!(naming_scheme("net1"), NamingScheme::Ordinal(1));
        assert_eq!(naming_scheme("net12"), NamingScheme::Ordinal(12));
        assert_eq!(naming_scheme("pod37a8eec1ce1"), NamingScheme::Hashed);
        assert_eq!(naming_scheme("eth0"), NamingScheme::Hashed);
        assert_eq!(naming_scheme("net"), NamingScheme::Hashed);
        assert_eq!(naming_scheme("net+1"), NamingScheme::Hashed);
        assert_eq!(naming_scheme("net1a"), NamingScheme::Hashed);
        assert_eq!(naming_scheme("netfoo"), NamingScheme::Hashed);
        assert!(is_ordinal("net3"));
        assert!(!is_ordinal("tap3"));
    }

    #[test]
    fn test_hashed_name_known_vector() {
        // sha256("default") = 37a8eec1ce19687d...
        assert_eq!(hashed_interface_name("default"), "pod37a8eec1ce1");
    }

    #[test]
    fn test_hashed_name_is_deterministic() {
        let first = hashed_interface_name("workload-a");
        let second = hashed_interface_name("workload-a");
        assert_eq!(first, second);
        assert_ne!(first, hashed_interface_name("workload-b"));
        assert_eq!(first.as_str().len(), HASHED_PREFIX.len() + HASHED_DIGITS);
        assert!(first.as_str().starts_with(HASHED_PREFIX));
        assert!(first.as_str().len() <= InterfaceName::MAX_LEN);
        assert_eq!(naming_scheme(first.as_str()), NamingScheme::Hashed);
    }

    #[test]
    fn test_tap_name() {
        assert_eq!(tap_name("net1").unwrap(), "tap1");
        assert_eq!(tap_name("pod37a8eec1ce1").unwrap(), "tap37a8eec1ce1");
        assert_eq!(
            tap_name("net"),
            Err(NameError::NoSuffix("net".to_string()))
        );
        assert!(tap_name("ab").is_err());
    }
}
