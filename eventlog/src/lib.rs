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

//! TCG measurement event log parser and PCR replay validator.
//!
//! Decodes the binary measurement log produced by platform firmware and
//! early boot components, in both the PC Client 1.2 (single SHA-1) and the
//! Crypto Agile (TPM 2.0) formats, replays the PCR extend operations it
//! records, and reports inconsistencies between recorded digests and the
//! data carried by the events. Live PCR acquisition, option parsing and
//! report formatting are the embedding application's concern: the library
//! consumes a byte slice and returns structured events plus a validation
//! result.

mod byte_reader;
mod event;
mod replay;

pub use byte_reader::{ByteParseable, ByteReader};
pub use event::device_path::{read_device_path, EfiDevicePath, EfiDevicePathNode};
pub use event::log::{EventLog, LogOptions};
pub use event::model::{
    AsciiStringEventData, BimReferenceManifestEventData, EfiGptEventData, EfiGptPartitionEntry,
    EfiGuid, EfiImageLoadEventData, EfiVariableEventData, Event, EventData, EventDigest,
    EventType, GrubCmdEventData, KernelCmdlineEventData, OpaqueEventData, SeparatorEventData,
    SeparatorKind, SpecIdAlgorithmSize, SpecIdEventData, SpecKind, StartupLocalityEventData,
    SystemdEfiStubEventData, BIM_REFERENCE_MANIFEST_SIGNATURE, GRUB_CMD_PREFIX,
    KERNEL_CMDLINE_PREFIX, SPEC_ID_EVENT00_SIGNATURE, SPEC_ID_EVENT02_SIGNATURE,
    SPEC_ID_EVENT03_SIGNATURE, STARTUP_LOCALITY_SIGNATURE,
};
pub use event::parser::{
    has_spec_id_signature, make_event_data, parse_efi_variable, parse_gpt, parse_image_load,
    parse_spec_id_event,
};
pub use replay::{
    replay_and_validate, EfiBootVariableBehaviour, IncorrectDigestValue, ValidatedEvent,
    ValidationResult,
};
pub use tcg_common_verifier::{
    AlgorithmId, CryptoVerifier, EventLogError, PcrBank, PcrDiscrepancy, PcrValueMap,
};

/// Parse an event log from its on-disk bytes.
///
/// # Errors
/// See [`EventLog::parse`].
pub fn parse(data: &[u8], options: &LogOptions) -> Result<EventLog, EventLogError> {
    EventLog::parse(data, options)
}
