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

//! Digest computation helpers.
//!
//! Maps registry algorithm ids to the OpenSSL message digest backend and
//! implements the two operations the replay engine needs: one-shot hashing of
//! event data and the TPM PCR extend operation.

use openssl::hash::{Hasher, MessageDigest};

use crate::error::EventLogError;
use crate::structure::AlgorithmId;

pub struct CryptoVerifier;

impl CryptoVerifier {
    /// Map an algorithm id to the backend message digest.
    ///
    /// # Errors
    /// * `EventLogError::UnsupportedAlgorithm` - If the backend cannot compute the algorithm
    pub fn algorithm_to_message_digest(alg: AlgorithmId) -> Result<MessageDigest, EventLogError> {
        match alg {
            AlgorithmId::Sha1 => Ok(MessageDigest::sha1()),
            AlgorithmId::Sha256 => Ok(MessageDigest::sha256()),
            AlgorithmId::Sha384 => Ok(MessageDigest::sha384()),
            AlgorithmId::Sha512 => Ok(MessageDigest::sha512()),
            AlgorithmId::Sm3 => Ok(MessageDigest::sm3()),
            AlgorithmId::Unknown(value) => Err(EventLogError::UnsupportedAlgorithm(format!(
                "no hash backend for algorithm 0x{:04x}",
                value
            ))),
        }
    }

    /// Hash a byte slice with the given algorithm.
    ///
    /// # Errors
    /// * `EventLogError::UnsupportedAlgorithm` - If the algorithm has no backend
    pub fn hash(alg: AlgorithmId, data: &[u8]) -> Result<Vec<u8>, EventLogError> {
        let digest_alg = Self::algorithm_to_message_digest(alg)?;
        let mut hasher = Hasher::new(digest_alg)
            .map_err(|e| EventLogError::UnsupportedAlgorithm(format!("failed to create hasher: {}", e)))?;
        hasher
            .update(data)
            .map_err(|e| EventLogError::UnsupportedAlgorithm(format!("failed to update hasher: {}", e)))?;
        let digest = hasher
            .finish()
            .map_err(|e| EventLogError::UnsupportedAlgorithm(format!("failed to finish hasher: {}", e)))?;
        Ok(digest.to_vec())
    }

    /// The TPM PCR extend operation: `pcr' = H(pcr || incoming)`.
    ///
    /// # Errors
    /// * `EventLogError::UnsupportedAlgorithm` - If the algorithm has no backend
    pub fn extend(
        alg: AlgorithmId,
        current: &[u8],
        incoming: &[u8],
    ) -> Result<Vec<u8>, EventLogError> {
        let digest_alg = Self::algorithm_to_message_digest(alg)?;
        let mut hasher = Hasher::new(digest_alg)
            .map_err(|e| EventLogError::UnsupportedAlgorithm(format!("failed to create hasher: {}", e)))?;
        hasher
            .update(current)
            .map_err(|e| EventLogError::UnsupportedAlgorithm(format!("failed to update hasher: {}", e)))?;
        hasher
            .update(incoming)
            .map_err(|e| EventLogError::UnsupportedAlgorithm(format!("failed to update hasher: {}", e)))?;
        let digest = hasher
            .finish()
            .map_err(|e| EventLogError::UnsupportedAlgorithm(format!("failed to finish hasher: {}", e)))?;
        Ok(digest.to_vec())
    }
}
