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

//! Replay Engine
//!
//! Walks decoded events in log order, emulating the PCR extend operation for
//! every algorithm the log carries, and checks each event's recorded digests
//! against the digest of its measured bytes. Two classes of firmware quirks
//! are discovered on the way: trailing bytes that were hashed but sit past
//! the decoded event structure (or past the declared event data entirely),
//! and EV_EFI_VARIABLE_BOOT events that measured only the variable data
//! instead of the whole UEFI_VARIABLE_DATA structure.
//!
//! A digest mismatch is never an error; it is recorded as a finding.

use std::borrow::Cow;

use log::{debug, warn};
use serde::Serialize;
use serde_json::{json, Value};
use tcg_common_verifier::{
    AlgorithmId, CryptoVerifier, EventLogError, PcrBank, PcrDiscrepancy, PcrValueMap,
};

use crate::event::log::EventLog;
use crate::event::model::{Event, EventData, EventType, SpecKind};

/// Upper bound for the trailing-bytes scan: unconsumed raw bytes first, NUL
/// bytes beyond the declared end of event data after that.
const MAX_MEASURED_TRAILING_BYTES: usize = 32;

/// How EV_EFI_VARIABLE_BOOT events were measured by the firmware, latched
/// from the first event whose digests can be reproduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EfiBootVariableBehaviour {
    Unknown,
    /// The whole UEFI_VARIABLE_DATA structure was measured.
    Full,
    /// Only the variable data was measured.
    VarDataOnly,
}

/// A recorded digest that cannot be reproduced from the event's data.
#[derive(Debug, Clone, Serialize)]
pub struct IncorrectDigestValue {
    pub algorithm_id: AlgorithmId,
    /// The digest of the measured bytes, i.e. what an honest event would
    /// have recorded.
    #[serde(serialize_with = "serialize_hex")]
    pub expected: Vec<u8>,
}

fn serialize_hex<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&hex::encode(bytes))
}

/// One event together with its replay findings.
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    pub event: Event,
    /// The byte range whose hash reproduces every recorded digest, when the
    /// event data is self-measured and a match was found (possibly with
    /// trailing bytes appended).
    pub measured_bytes: Option<Vec<u8>>,
    /// Number of bytes past the decoded event data that had to be included
    /// to make the digests match.
    pub measured_trailing_bytes_count: usize,
    /// Recorded digests that cannot be reproduced from the event data.
    pub incorrect_digest_values: Vec<IncorrectDigestValue>,
}

/// The outcome of replaying a log.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub spec: SpecKind,
    pub algorithms: Vec<AlgorithmId>,
    pub validated_events: Vec<ValidatedEvent>,
    /// Per-PCR, per-algorithm values the TPM should hold if the log is
    /// complete and honest.
    pub expected_pcr_values: PcrBank,
    pub efi_boot_variable_behaviour: EfiBootVariableBehaviour,
}

impl ValidationResult {
    /// Compare the replayed PCR values against values read from a live TPM.
    ///
    /// Reading the values is the caller's concern; acquiring the TPM after
    /// decoding keeps the hold on that resource minimal.
    pub fn check_against_pcrs(&self, live: &PcrValueMap) -> Vec<PcrDiscrepancy> {
        self.expected_pcr_values.compare(live)
    }

    /// Project the result to JSON for embedding in attestation reports.
    pub fn to_json_value(&self) -> Value {
        let events: Vec<Value> = self
            .validated_events
            .iter()
            .map(|validated| {
                let mut digests = serde_json::Map::new();
                for entry in &validated.event.digests {
                    digests.insert(
                        entry.algorithm_id.to_string(),
                        json!(hex::encode(&entry.digest)),
                    );
                }
                json!({
                    "event_number": validated.event.index,
                    "pcr_index": validated.event.pcr_index,
                    "event_type": validated.event.event_type.to_string(),
                    "digests": digests,
                    "event": validated.event.data.to_string(),
                    "measured_trailing_bytes_count": validated.measured_trailing_bytes_count,
                    "incorrect_digest_values": &validated.incorrect_digest_values,
                })
            })
            .collect();

        let mut pcr_values = serde_json::Map::new();
        for (pcr_index, bank) in self.expected_pcr_values.values() {
            let mut by_algorithm = serde_json::Map::new();
            for (alg, digest) in bank {
                by_algorithm.insert(alg.to_string(), json!(hex::encode(digest)));
            }
            pcr_values.insert(pcr_index.to_string(), Value::Object(by_algorithm));
        }

        json!({
            "spec": self.spec,
            "algorithms": &self.algorithms,
            "efi_boot_variable_behaviour": self.efi_boot_variable_behaviour,
            "events": events,
            "expected_pcr_values": pcr_values,
        })
    }
}

impl EventLog {
    /// Replay the log and validate every event's digests.
    ///
    /// # Errors
    /// * `EventLogError::UnsupportedAlgorithm` - If the log carries an algorithm the backend cannot compute
    /// * `EventLogError::MalformedEvent` - If an event is missing a digest for a declared algorithm
    pub fn replay_and_validate(self) -> Result<ValidationResult, EventLogError> {
        replay_and_validate(self)
    }
}

/// See [`EventLog::replay_and_validate`].
pub fn replay_and_validate(log: EventLog) -> Result<ValidationResult, EventLogError> {
    let algorithms = log.algorithms.clone();
    let mut bank = PcrBank::new(&algorithms)?;
    let mut behaviour = EfiBootVariableBehaviour::Unknown;
    let mut validated_events = Vec::with_capacity(log.events.len());

    for event in log.events {
        bank.touch(event.pcr_index);

        // No-action events are never extended, but they still carry replay
        // relevant payloads (startup locality, spec-id).
        if event.event_type == EventType::NoAction {
            if let EventData::StartupLocality(locality) = &event.data {
                debug!("startup locality {} declared by event {}", locality.locality, event.index);
                bank.set_startup_locality(locality.locality);
            }
            validated_events.push(ValidatedEvent {
                event,
                measured_bytes: None,
                measured_trailing_bytes_count: 0,
                incorrect_digest_values: Vec::new(),
            });
            continue;
        }

        for alg in &algorithms {
            let digest = event.digest(*alg).ok_or_else(|| {
                EventLogError::MalformedEvent(format!(
                    "event {} is missing a digest for declared algorithm {}",
                    event.index, alg
                ))
            })?;
            bank.extend(event.pcr_index, *alg, digest)?;
        }

        let (measured_bytes, trailing_count, incorrect) =
            check_event_digests(&event, &algorithms, &mut behaviour)?;

        if trailing_count > 0 {
            debug!(
                "event {} in PCR {} measured {} byte(s) past its event data",
                event.index, event.pcr_index, trailing_count
            );
        }
        for finding in &incorrect {
            warn!(
                "event {} in PCR {} (type: {}, alg: {}): recorded digest is not generated from the event data",
                event.index, event.pcr_index, event.event_type, finding.algorithm_id
            );
        }

        validated_events.push(ValidatedEvent {
            event,
            measured_bytes,
            measured_trailing_bytes_count: trailing_count,
            incorrect_digest_values: incorrect,
        });
    }

    Ok(ValidationResult {
        spec: log.spec,
        algorithms,
        validated_events,
        expected_pcr_values: bank,
        efi_boot_variable_behaviour: behaviour,
    })
}

fn digests_match(
    event: &Event,
    algorithms: &[AlgorithmId],
    candidate: &[u8],
) -> Result<bool, EventLogError> {
    for alg in algorithms {
        let recorded = event.digest(*alg).ok_or_else(|| {
            EventLogError::MalformedEvent(format!(
                "event {} is missing a digest for declared algorithm {}",
                event.index, alg
            ))
        })?;
        if CryptoVerifier::hash(*alg, candidate)? != recorded {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Try to reproduce every recorded digest from one candidate view.
///
/// Order of attempts: the view itself; the view extended byte by byte with
/// the unconsumed raw tail and then with NUL bytes past the declared end of
/// event data; the view stripped of trailing NULs that the firmware never
/// measured (a match there is not a trailing-bytes finding).
fn match_view(
    event: &Event,
    algorithms: &[AlgorithmId],
    view: &[u8],
    tail: &[u8],
) -> Result<Option<(Vec<u8>, usize)>, EventLogError> {
    if digests_match(event, algorithms, view)? {
        return Ok(Some((view.to_vec(), 0)));
    }

    let mut extended = view.to_vec();
    for count in 1..=MAX_MEASURED_TRAILING_BYTES {
        extended.push(tail.get(count - 1).copied().unwrap_or(0));
        if digests_match(event, algorithms, &extended)? {
            return Ok(Some((extended, count)));
        }
    }

    let mut prefix = view;
    while let Some((&0, rest)) = prefix.split_last() {
        prefix = rest;
        if digests_match(event, algorithms, prefix)? {
            return Ok(Some((prefix.to_vec(), 0)));
        }
    }

    Ok(None)
}

/// Compare an event's recorded digests with the digest of its measured
/// bytes, trying the known firmware variants before recording a finding.
fn check_event_digests(
    event: &Event,
    algorithms: &[AlgorithmId],
    behaviour: &mut EfiBootVariableBehaviour,
) -> Result<(Option<Vec<u8>>, usize, Vec<IncorrectDigestValue>), EventLogError> {
    let primary = match event.data.measured_bytes() {
        Some(bytes) => bytes,
        None => return Ok((None, 0, Vec::new())),
    };
    let tail = event.data.unmeasured_tail();

    // Candidate views in latch order. For EV_EFI_VARIABLE_BOOT the firmware
    // may have measured only the variable data; the first view that
    // reproduces every digest latches the process wide behaviour.
    let mut views: Vec<(Cow<'_, [u8]>, bool)> = Vec::new();
    if event.event_type == EventType::EfiVariableBoot {
        if let EventData::EfiVariable(variable) = &event.data {
            let var_data_only = (Cow::Borrowed(variable.variable_data.as_slice()), true);
            if *behaviour == EfiBootVariableBehaviour::VarDataOnly {
                views.push(var_data_only);
                views.push((primary.clone(), false));
            } else {
                views.push((primary.clone(), false));
                views.push(var_data_only);
            }
        } else {
            views.push((primary.clone(), false));
        }
    } else {
        views.push((primary.clone(), false));
    }

    for (view, is_var_data_only) in &views {
        if let Some((matched, trailing_count)) = match_view(event, algorithms, view, tail)? {
            if event.event_type == EventType::EfiVariableBoot
                && *behaviour == EfiBootVariableBehaviour::Unknown
            {
                *behaviour = if *is_var_data_only {
                    EfiBootVariableBehaviour::VarDataOnly
                } else {
                    EfiBootVariableBehaviour::Full
                };
                debug!("EV_EFI_VARIABLE_BOOT behaviour latched as {:?}", behaviour);
            }
            return Ok((Some(matched), trailing_count, Vec::new()));
        }
    }

    // No variant matched: record, per algorithm, the digest an honest event
    // would carry.
    let mut incorrect = Vec::new();
    for alg in algorithms {
        let expected = CryptoVerifier::hash(*alg, &primary)?;
        if event.digest(*alg) != Some(expected.as_slice()) {
            incorrect.push(IncorrectDigestValue {
                algorithm_id: *alg,
                expected,
            });
        }
    }
    Ok((Some(primary.into_owned()), 0, incorrect))
}
