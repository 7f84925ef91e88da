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

//! PCR value bank.
//!
//! Holds per-PCR, per-algorithm accumulators for the replay fold and compares
//! a replayed bank against PCR values read from a live TPM. How those live
//! values are obtained (TPM1.2 vs TPM2, transport) is the caller's concern.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::crypto_utils::CryptoVerifier;
use crate::error::EventLogError;
use crate::structure::AlgorithmId;

/// PCR index to per-algorithm digest map, as used for both replayed and
/// live PCR values.
pub type PcrValueMap = BTreeMap<u32, BTreeMap<AlgorithmId, Vec<u8>>>;

/// A mismatch between a replayed PCR value and the value read from the TPM.
#[derive(Debug, Clone, Serialize)]
pub struct PcrDiscrepancy {
    pub pcr_index: u32,
    pub algorithm_id: AlgorithmId,
    #[serde(serialize_with = "serialize_hex")]
    pub expected: Vec<u8>,
    #[serde(serialize_with = "serialize_hex")]
    pub actual: Vec<u8>,
}

fn serialize_hex<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&hex::encode(bytes))
}

/// Per-PCR, per-algorithm accumulators emulating the TPM extend behaviour.
///
/// A PCR entry is created lazily at first touch with the algorithm's initial
/// value: all zeros, except PCR 0 which takes a startup-locality byte when a
/// startup locality event was seen before the first extend.
#[derive(Debug, Clone)]
pub struct PcrBank {
    algorithms: Vec<AlgorithmId>,
    locality: u8,
    pcr0_extended: bool,
    values: PcrValueMap,
}

impl PcrBank {
    /// Create a bank tracking the given algorithm set.
    ///
    /// # Errors
    /// * `EventLogError::UnsupportedAlgorithm` - If any algorithm has no hash backend
    pub fn new(algorithms: &[AlgorithmId]) -> Result<Self, EventLogError> {
        for alg in algorithms {
            CryptoVerifier::algorithm_to_message_digest(*alg)?;
        }
        Ok(Self {
            algorithms: algorithms.to_vec(),
            locality: 0,
            pcr0_extended: false,
            values: BTreeMap::new(),
        })
    }

    pub fn algorithms(&self) -> &[AlgorithmId] {
        &self.algorithms
    }

    /// Record the TPM startup locality declared by the log.
    ///
    /// Reseeds PCR 0 if it has been touched but not yet extended; a startup
    /// locality event precedes the first PCR 0 extend in a conformant log
    /// and is ignored afterwards.
    pub fn set_startup_locality(&mut self, locality: u8) {
        if self.pcr0_extended {
            return;
        }
        self.locality = locality;
        let seeded = self.initial_values(0);
        self.values.insert(0, seeded);
    }

    /// Ensure an accumulator entry exists for the PCR.
    pub fn touch(&mut self, pcr_index: u32) {
        if !self.values.contains_key(&pcr_index) {
            let seeded = self.initial_values(pcr_index);
            self.values.insert(pcr_index, seeded);
        }
    }

    fn initial_values(&self, pcr_index: u32) -> BTreeMap<AlgorithmId, Vec<u8>> {
        self.algorithms
            .iter()
            .map(|alg| (*alg, Self::initial_value(*alg, pcr_index, self.locality)))
            .collect()
    }

    /// The reset value of a PCR: all zeros, with the trailing byte of PCR 0
    /// set to the startup locality for localities 3 and 4.
    pub fn initial_value(alg: AlgorithmId, pcr_index: u32, locality: u8) -> Vec<u8> {
        let size = alg.known_digest_size().unwrap_or(0);
        let mut value = vec![0u8; size];
        if pcr_index == 0 && (locality == 3 || locality == 4) {
            if let Some(last) = value.last_mut() {
                *last = locality;
            }
        }
        value
    }

    /// Extend the accumulator for one PCR and algorithm with a digest.
    ///
    /// # Errors
    /// * `EventLogError::UnsupportedAlgorithm` - If the algorithm has no backend
    /// * `EventLogError::MalformedEvent` - If the algorithm is not tracked by this bank
    pub fn extend(
        &mut self,
        pcr_index: u32,
        alg: AlgorithmId,
        digest: &[u8],
    ) -> Result<(), EventLogError> {
        if !self.algorithms.contains(&alg) {
            return Err(EventLogError::MalformedEvent(format!(
                "digest for undeclared algorithm {} extended into PCR {}",
                alg, pcr_index
            )));
        }
        self.touch(pcr_index);
        let entry = self
            .values
            .get_mut(&pcr_index)
            .and_then(|bank| bank.get_mut(&alg))
            .ok_or_else(|| {
                EventLogError::MalformedEvent(format!("no accumulator for PCR {} {}", pcr_index, alg))
            })?;
        let extended = CryptoVerifier::extend(alg, entry, digest)?;
        *entry = extended;
        if pcr_index == 0 {
            self.pcr0_extended = true;
        }
        Ok(())
    }

    /// The current accumulator value for one PCR and algorithm.
    pub fn value(&self, pcr_index: u32, alg: AlgorithmId) -> Option<&[u8]> {
        self.values
            .get(&pcr_index)
            .and_then(|bank| bank.get(&alg))
            .map(|digest| digest.as_slice())
    }

    pub fn values(&self) -> &PcrValueMap {
        &self.values
    }

    /// Compare the bank against values read from a live TPM.
    ///
    /// Only the PCR/algorithm pairs present in `live` are compared; a pair
    /// the bank never tracked compares against the PCR initial value.
    pub fn compare(&self, live: &PcrValueMap) -> Vec<PcrDiscrepancy> {
        let mut discrepancies = Vec::new();
        for (pcr_index, bank) in live {
            for (alg, actual) in bank {
                let expected = match self.value(*pcr_index, *alg) {
                    Some(value) => value.to_vec(),
                    None => Self::initial_value(*alg, *pcr_index, self.locality),
                };
                if &expected != actual {
                    discrepancies.push(PcrDiscrepancy {
                        pcr_index: *pcr_index,
                        algorithm_id: *alg,
                        expected,
                        actual: actual.clone(),
                    });
                }
            }
        }
        discrepancies
    }
}
