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

//! Event Data Parsing Module
//!
//! The event-data sub-decoders, dispatched on `(PCRIndex, EventType)`. The
//! framing layer fails hard; a failure in an individual sub-decoder degrades
//! gracefully: the event is kept with opaque data, retaining the raw bytes so
//! that replay can still attempt a digest match against the whole payload.

use log::warn;
use tcg_common_verifier::{AlgorithmId, EventLogError};

use crate::byte_reader::{ByteParseable, ByteReader};
use crate::event::device_path::{read_device_path, EfiDevicePath};
use crate::event::log::LogOptions;
use crate::event::model::{
    AsciiStringEventData, BimReferenceManifestEventData, EfiGptEventData,
    EfiGptPartitionEntry, EfiGuid, EfiImageLoadEventData, EfiVariableEventData, EventData,
    EventType, GrubCmdEventData, KernelCmdlineEventData, OpaqueEventData, SeparatorEventData,
    SeparatorKind, SpecIdAlgorithmSize, SpecIdEventData, SpecKind, StartupLocalityEventData,
    SystemdEfiStubEventData, BIM_REFERENCE_MANIFEST_SIGNATURE, GRUB_CMD_PREFIX,
    KERNEL_CMDLINE_PREFIX, SPEC_ID_EVENT00_SIGNATURE, SPEC_ID_EVENT02_SIGNATURE,
    SPEC_ID_EVENT03_SIGNATURE, STARTUP_LOCALITY_SIGNATURE,
};

/// Size of the GPT partition header fields preceding the disk GUID.
const GPT_HEADER_PREFIX_SIZE: u64 = 56;
/// Fixed fields of a GPT partition entry preceding the partition name.
const GPT_PARTITION_ENTRY_FIXED_SIZE: u32 = 56;
/// Signature field length shared by all no-action event payloads.
const NO_ACTION_SIGNATURE_SIZE: usize = 16;

impl ByteParseable for EfiGuid {
    fn parse_from(reader: &mut ByteReader<'_>) -> Result<Self, EventLogError> {
        Ok(EfiGuid::from_bytes(reader.read_array_16()?))
    }
}

/// Whether a first-event payload starts with any recognised spec-id
/// signature.
pub fn has_spec_id_signature(data: &[u8]) -> bool {
    data.len() >= NO_ACTION_SIGNATURE_SIZE
        && [
            SPEC_ID_EVENT00_SIGNATURE,
            SPEC_ID_EVENT02_SIGNATURE,
            SPEC_ID_EVENT03_SIGNATURE,
        ]
        .contains(&&data[..NO_ACTION_SIGNATURE_SIZE])
}

/// Parse a spec-id event payload, dispatching on its signature.
///
/// # Errors
/// * `EventLogError::TruncatedLog` - If the payload ends mid-field
/// * `EventLogError::InvalidSpecIdEvent` - If the signature is unrecognised,
///   no algorithms are declared, or a declared digest size disagrees with
///   the registry
pub fn parse_spec_id_event(data: &[u8]) -> Result<SpecIdEventData, EventLogError> {
    let mut reader = ByteReader::new(data);
    let signature = reader.read_bytes(NO_ACTION_SIGNATURE_SIZE)?;

    let spec = if signature == SPEC_ID_EVENT00_SIGNATURE {
        SpecKind::PcClient
    } else if signature == SPEC_ID_EVENT02_SIGNATURE {
        SpecKind::Efi12
    } else if signature == SPEC_ID_EVENT03_SIGNATURE {
        SpecKind::Efi2
    } else {
        return Err(EventLogError::InvalidSpecIdEvent(format!(
            "unrecognised signature {:?}",
            String::from_utf8_lossy(&signature)
        )));
    };

    let platform_class = reader.read_u32()?;
    let spec_version_minor = reader.read_u8()?;
    let spec_version_major = reader.read_u8()?;
    let spec_errata = reader.read_u8()?;
    let uintn_size = reader.read_u8()?;

    let mut digest_sizes = Vec::new();
    if spec == SpecKind::Efi2 {
        let number_of_algorithms = reader.read_u32()?;
        if number_of_algorithms == 0 {
            return Err(EventLogError::InvalidSpecIdEvent(
                "numberOfAlgorithms is zero".to_string(),
            ));
        }
        for _ in 0..number_of_algorithms {
            let algorithm_id = AlgorithmId::from(reader.read_u16()?);
            let digest_size = reader.read_u16()?;
            if let Some(known_size) = algorithm_id.known_digest_size() {
                if known_size != digest_size as usize {
                    return Err(EventLogError::InvalidSpecIdEvent(format!(
                        "digestSize for algorithmId 0x{:04x} doesn't match expected size (got: {}, expected: {})",
                        algorithm_id.raw(),
                        digest_size,
                        known_size
                    )));
                }
            }
            digest_sizes.push(SpecIdAlgorithmSize {
                algorithm_id,
                digest_size,
            });
        }
    }

    let vendor_info_size = reader.read_u8()?;
    let vendor_info = reader.read_bytes(vendor_info_size as usize)?;

    Ok(SpecIdEventData {
        raw: data.to_vec(),
        spec,
        platform_class,
        spec_version_minor,
        spec_version_major,
        spec_errata,
        uintn_size,
        digest_sizes,
        vendor_info,
    })
}

fn parse_startup_locality(data: &[u8]) -> Result<StartupLocalityEventData, EventLogError> {
    let mut reader = ByteReader::new(data);
    reader.skip(NO_ACTION_SIGNATURE_SIZE as u64)?;
    let locality = reader.read_u8()?;
    Ok(StartupLocalityEventData {
        raw: data.to_vec(),
        locality,
    })
}

fn parse_bim_reference_manifest(data: &[u8]) -> Result<BimReferenceManifestEventData, EventLogError> {
    let mut reader = ByteReader::new(data);
    reader.skip(NO_ACTION_SIGNATURE_SIZE as u64)?;
    let vendor_id = reader.read_u32()?;
    let guid = EfiGuid::parse_from(&mut reader)?;
    Ok(BimReferenceManifestEventData {
        raw: data.to_vec(),
        vendor_id,
        guid,
    })
}

fn parse_separator(data: &[u8]) -> Result<SeparatorEventData, EventLogError> {
    if data.len() != 4 {
        return Err(EventLogError::MalformedEvent(format!(
            "separator event data is {} bytes, expected 4",
            data.len()
        )));
    }
    let value = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let kind = if value == 0 || value == u32::MAX {
        SeparatorKind::Normal
    } else {
        SeparatorKind::Error
    };
    Ok(SeparatorEventData {
        raw: data.to_vec(),
        kind,
    })
}

/// Parse a `UEFI_VARIABLE_DATA` payload.
///
/// The unicode name length is counted in characters; surrogate handling
/// lives in the byte reader. Bytes past the decoded structure are preserved
/// in `raw` and surface through `unmeasured_tail`.
pub fn parse_efi_variable(data: &[u8]) -> Result<EfiVariableEventData, EventLogError> {
    let mut reader = ByteReader::new(data);
    let variable_name = EfiGuid::parse_from(&mut reader)?;
    let unicode_name_length = reader.read_u64()?;
    let variable_data_length = reader.read_u64()?;
    let unicode_name = reader.read_utf16_string(unicode_name_length)?;
    let variable_data = reader.read_bytes(variable_data_length as usize)?;
    let consumed = reader.position() as usize;

    Ok(EfiVariableEventData {
        raw: data.to_vec(),
        variable_name,
        unicode_name,
        variable_data,
        consumed,
    })
}

/// Parse a `UEFI_IMAGE_LOAD_EVENT` payload, including its device path.
pub fn parse_image_load(data: &[u8]) -> Result<EfiImageLoadEventData, EventLogError> {
    let mut reader = ByteReader::new(data);
    let location_in_memory = reader.read_u64()?;
    let length_in_memory = reader.read_u64()?;
    let link_time_address = reader.read_u64()?;
    let device_path_length = reader.read_u64()?;
    let device_path_buf = reader.read_bytes(device_path_length as usize)?;

    let device_path = if device_path_buf.is_empty() {
        EfiDevicePath::default()
    } else {
        read_device_path(&device_path_buf)?
    };

    Ok(EfiImageLoadEventData {
        raw: data.to_vec(),
        location_in_memory,
        length_in_memory,
        link_time_address,
        device_path,
    })
}

/// Parse a `UEFI_GPT_DATA` payload.
pub fn parse_gpt(data: &[u8]) -> Result<EfiGptEventData, EventLogError> {
    let mut reader = ByteReader::new(data);

    // Skip UEFIPartitionHeader.{Header, MyLBA, AlternateLBA, FirstUsableLBA, LastUsableLBA}
    reader.skip(GPT_HEADER_PREFIX_SIZE)?;
    let disk_guid = EfiGuid::parse_from(&mut reader)?;
    // Skip UEFIPartitionHeader.{PartitionEntryLBA, NumberOfPartitionEntries}
    reader.skip(12)?;
    let size_of_partition_entry = reader.read_u32()?;
    // Skip UEFIPartitionHeader.PartitionEntryArrayCRC32
    reader.skip(4)?;
    let number_of_partitions = reader.read_u64()?;

    if size_of_partition_entry < GPT_PARTITION_ENTRY_FIXED_SIZE {
        return Err(EventLogError::MalformedEvent(format!(
            "GPT partition entry size {} below the {} byte fixed fields",
            size_of_partition_entry, GPT_PARTITION_ENTRY_FIXED_SIZE
        )));
    }

    let mut partitions = Vec::new();
    for _ in 0..number_of_partitions {
        let entry_data = reader.read_bytes(size_of_partition_entry as usize)?;
        let mut entry_reader = ByteReader::new(&entry_data);
        let type_guid = EfiGuid::parse_from(&mut entry_reader)?;
        let unique_guid = EfiGuid::parse_from(&mut entry_reader)?;
        // Skip {StartingLBA, EndingLBA}
        entry_reader.skip(16)?;
        let attrs = entry_reader.read_u64()?;
        let name = entry_reader.read_utf16_until_nul(entry_reader.remaining() / 2)?;
        partitions.push(EfiGptPartitionEntry {
            type_guid,
            unique_guid,
            attrs,
            name,
        });
    }

    Ok(EfiGptEventData {
        raw: data.to_vec(),
        disk_guid,
        partitions,
    })
}

fn make_no_action_data(pcr_index: u32, data: &[u8]) -> EventData {
    if pcr_index != 0 || data.len() < NO_ACTION_SIGNATURE_SIZE {
        return opaque(EventType::NoAction, data);
    }
    let signature = &data[..NO_ACTION_SIGNATURE_SIZE];
    if has_spec_id_signature(data) {
        decoded_or_opaque(EventType::NoAction, data, parse_spec_id_event(data).map(EventData::SpecId))
    } else if signature == STARTUP_LOCALITY_SIGNATURE {
        decoded_or_opaque(
            EventType::NoAction,
            data,
            parse_startup_locality(data).map(EventData::StartupLocality),
        )
    } else if signature == BIM_REFERENCE_MANIFEST_SIGNATURE {
        decoded_or_opaque(
            EventType::NoAction,
            data,
            parse_bim_reference_manifest(data).map(EventData::BimReferenceManifest),
        )
    } else {
        opaque(EventType::NoAction, data)
    }
}

fn make_ipl_data(pcr_index: u32, data: &[u8], options: &LogOptions) -> EventData {
    if options.enable_grub && pcr_index == 8 {
        if data.starts_with(KERNEL_CMDLINE_PREFIX) {
            let text = String::from_utf8_lossy(&data[KERNEL_CMDLINE_PREFIX.len()..]);
            let cmdline = text.strip_suffix('\0').unwrap_or(&text).to_string();
            return EventData::KernelCmdline(KernelCmdlineEventData {
                raw: data.to_vec(),
                cmdline,
            });
        }
        if data.starts_with(GRUB_CMD_PREFIX) {
            let text = String::from_utf8_lossy(&data[GRUB_CMD_PREFIX.len()..]);
            let cmd = text.strip_suffix('\0').unwrap_or(&text).to_string();
            return EventData::GrubCmd(GrubCmdEventData {
                raw: data.to_vec(),
                cmd,
            });
        }
    }
    if options.enable_grub && pcr_index == 9 {
        return EventData::AsciiString(AsciiStringEventData {
            raw: data.to_vec(),
            informational: true,
        });
    }
    if options.enable_systemd_efi_stub && pcr_index == options.systemd_efi_stub_pcr {
        let text = String::from_utf8_lossy(data);
        let description = text.strip_suffix('\0').unwrap_or(&text).to_string();
        return EventData::SystemdEfiStub(SystemdEfiStubEventData {
            raw: data.to_vec(),
            description,
        });
    }
    opaque(EventType::Ipl, data)
}

fn opaque(event_type: EventType, data: &[u8]) -> EventData {
    EventData::Opaque(OpaqueEventData {
        raw: data.to_vec(),
        informational: !event_type.opaque_data_is_measured(),
    })
}

fn decoded_or_opaque(
    event_type: EventType,
    data: &[u8],
    result: Result<EventData, EventLogError>,
) -> EventData {
    match result {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("failed to decode {} event data, keeping it opaque: {}", event_type, e);
            opaque(event_type, data)
        }
    }
}

/// Decode event data for one log entry.
///
/// Unknown event types are preserved verbatim; individual sub-decoder
/// failures degrade to opaque data rather than aborting the log.
pub fn make_event_data(
    pcr_index: u32,
    event_type: EventType,
    data: &[u8],
    options: &LogOptions,
) -> EventData {
    match event_type {
        EventType::NoAction => make_no_action_data(pcr_index, data),
        EventType::Separator => {
            decoded_or_opaque(event_type, data, parse_separator(data).map(EventData::Separator))
        }
        EventType::Action | EventType::EfiAction => EventData::AsciiString(AsciiStringEventData {
            raw: data.to_vec(),
            informational: false,
        }),
        EventType::Ipl => make_ipl_data(pcr_index, data, options),
        EventType::EfiVariableDriverConfig
        | EventType::EfiVariableBoot
        | EventType::EfiVariableAuthority => {
            decoded_or_opaque(event_type, data, parse_efi_variable(data).map(EventData::EfiVariable))
        }
        EventType::EfiBootServicesApplication
        | EventType::EfiBootServicesDriver
        | EventType::EfiRuntimeServicesDriver => {
            decoded_or_opaque(event_type, data, parse_image_load(data).map(EventData::EfiImageLoad))
        }
        EventType::EfiGptEvent => {
            decoded_or_opaque(event_type, data, parse_gpt(data).map(EventData::EfiGpt))
        }
        _ => opaque(event_type, data),
    }
}
