/*
 * Copyright (c) Huawei Technologies Co., Ltd. 2025. All rights reserved.
 * Global Trust Authority is licensed under the Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *     http://license.coscl.org.cn/MulanPSL2
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND, EITHER EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR
 * PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

//! TCG digest algorithm registry.
//!
//! Algorithm identifiers are 16-bit tags from the TCG algorithm registry.
//! The registry maps each known id to its digest size; unknown ids are
//! preserved with their raw value so that a log declaring them in its spec-id
//! event can still be decoded, with their digests carried opaquely.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::EventLogError;

/// A digest algorithm identifier from the TCG registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlgorithmId {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Sm3,
    /// An id the built-in registry does not know. Digests for such
    /// algorithms can be carried but not recomputed.
    Unknown(u16),
}

impl From<u16> for AlgorithmId {
    fn from(value: u16) -> Self {
        match value {
            0x0004 => AlgorithmId::Sha1,
            0x000B => AlgorithmId::Sha256,
            0x000C => AlgorithmId::Sha384,
            0x000D => AlgorithmId::Sha512,
            0x0012 => AlgorithmId::Sm3,
            other => AlgorithmId::Unknown(other),
        }
    }
}

impl AlgorithmId {
    /// The raw 16-bit registry value.
    pub fn raw(&self) -> u16 {
        match self {
            AlgorithmId::Sha1 => 0x0004,
            AlgorithmId::Sha256 => 0x000B,
            AlgorithmId::Sha384 => 0x000C,
            AlgorithmId::Sha512 => 0x000D,
            AlgorithmId::Sm3 => 0x0012,
            AlgorithmId::Unknown(value) => *value,
        }
    }

    /// Digest size in bytes for algorithms the registry knows.
    pub fn known_digest_size(&self) -> Option<usize> {
        match self {
            AlgorithmId::Sha1 => Some(20),
            AlgorithmId::Sha256 => Some(32),
            AlgorithmId::Sha384 => Some(48),
            AlgorithmId::Sha512 => Some(64),
            AlgorithmId::Sm3 => Some(32),
            AlgorithmId::Unknown(_) => None,
        }
    }

    /// Parse an algorithm name as used in PCR selections.
    ///
    /// # Errors
    /// * `EventLogError::UnsupportedAlgorithm` - If the name is not in the registry
    pub fn from_str(s: &str) -> Result<Self, EventLogError> {
        match s.to_lowercase().as_str() {
            "sha1" => Ok(AlgorithmId::Sha1),
            "sha256" => Ok(AlgorithmId::Sha256),
            "sha384" => Ok(AlgorithmId::Sha384),
            "sha512" => Ok(AlgorithmId::Sha512),
            "sm3" => Ok(AlgorithmId::Sm3),
            other => Err(EventLogError::UnsupportedAlgorithm(format!(
                "unknown algorithm name: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmId::Sha1 => write!(f, "sha1"),
            AlgorithmId::Sha256 => write!(f, "sha256"),
            AlgorithmId::Sha384 => write!(f, "sha384"),
            AlgorithmId::Sha512 => write!(f, "sha512"),
            AlgorithmId::Sm3 => write!(f, "sm3"),
            AlgorithmId::Unknown(value) => write!(f, "unknown_0x{:04x}", value),
        }
    }
}

impl Serialize for AlgorithmId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_id_round_trip() {
        for raw in [0x0004u16, 0x000B, 0x000C, 0x000D, 0x0012] {
            assert_eq!(AlgorithmId::from(raw).raw(), raw);
        }
        assert_eq!(AlgorithmId::from(0x0010).raw(), 0x0010);
    }

    #[test]
    fn test_registry_digest_sizes() {
        assert_eq!(AlgorithmId::Sha1.known_digest_size(), Some(20));
        assert_eq!(AlgorithmId::Sha256.known_digest_size(), Some(32));
        assert_eq!(AlgorithmId::Sha384.known_digest_size(), Some(48));
        assert_eq!(AlgorithmId::Sha512.known_digest_size(), Some(64));
        assert_eq!(AlgorithmId::Sm3.known_digest_size(), Some(32));
        assert_eq!(AlgorithmId::Unknown(0x0010).known_digest_size(), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(AlgorithmId::Sha256.to_string(), "sha256");
        assert_eq!(AlgorithmId::Unknown(0x0010).to_string(), "unknown_0x0010");
    }
}
