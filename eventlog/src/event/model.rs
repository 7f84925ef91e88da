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

//! Event Type Definitions
//!
//! Event types, decoded event-data structures and the event model for TCG
//! measurement logs. Every decoded event exposes two views of its payload:
//! the raw bytes exactly as stored in the log, and the measured bytes that a
//! correctly behaved firmware would have hashed to produce the recorded
//! digest. The two differ for several event families and the replay engine
//! leans on that distinction.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use tcg_common_verifier::AlgorithmId;
use uuid::Uuid;

use crate::event::device_path::EfiDevicePath;

/// Signature of a TCG 2.0 ("Crypto Agile") spec-id event.
pub const SPEC_ID_EVENT03_SIGNATURE: &[u8] = b"Spec ID Event03\0";
/// Signature of a PC Client 1.2 spec-id event.
pub const SPEC_ID_EVENT00_SIGNATURE: &[u8] = b"Spec ID Event00\0";
/// Signature of an EFI 1.2 spec-id event.
pub const SPEC_ID_EVENT02_SIGNATURE: &[u8] = b"Spec ID Event02\0";
/// Signature of the startup locality no-action event.
pub const STARTUP_LOCALITY_SIGNATURE: &[u8] = b"StartupLocality\0";
/// Signature of the SP800-155 reference manifest no-action event.
pub const BIM_REFERENCE_MANIFEST_SIGNATURE: &[u8] = b"SP800-155 Event\0";

/// Prefix of GRUB kernel command line measurements in PCR 8.
pub const KERNEL_CMDLINE_PREFIX: &[u8] = b"kernel_cmdline: ";
/// Prefix of GRUB command measurements in PCR 8.
pub const GRUB_CMD_PREFIX: &[u8] = b"grub_cmd: ";

/// Which specification the log was written against, as declared by the
/// spec-id event (or its absence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpecKind {
    PcClient,
    Efi12,
    Efi2,
}

/// TCG Event Type Enumeration
///
/// Standard TPM event types and UEFI-specific event types. Unrecognised
/// values keep their raw tag so they can be rendered and carried opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    PrebootCert,
    PostCode,
    Unused,
    NoAction,
    Separator,
    Action,
    EventTag,
    SCrtmContents,
    SCrtmVersion,
    CpuMicrocode,
    PlatformConfigFlags,
    TableOfDevices,
    CompactHash,
    Ipl,
    IplPartitionData,
    NonhostCode,
    NonhostConfig,
    NonhostInfo,
    OmitBootDeviceEvents,
    EfiVariableDriverConfig,
    EfiVariableBoot,
    EfiBootServicesApplication,
    EfiBootServicesDriver,
    EfiRuntimeServicesDriver,
    EfiGptEvent,
    EfiAction,
    EfiPlatformFirmwareBlob,
    EfiHandoffTables,
    EfiVariableAuthority,
    Unknown(u32),
}

impl EventType {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0x00000000 => Self::PrebootCert,
            0x00000001 => Self::PostCode,
            0x00000002 => Self::Unused,
            0x00000003 => Self::NoAction,
            0x00000004 => Self::Separator,
            0x00000005 => Self::Action,
            0x00000006 => Self::EventTag,
            0x00000007 => Self::SCrtmContents,
            0x00000008 => Self::SCrtmVersion,
            0x00000009 => Self::CpuMicrocode,
            0x0000000A => Self::PlatformConfigFlags,
            0x0000000B => Self::TableOfDevices,
            0x0000000C => Self::CompactHash,
            0x0000000D => Self::Ipl,
            0x0000000E => Self::IplPartitionData,
            0x0000000F => Self::NonhostCode,
            0x00000010 => Self::NonhostConfig,
            0x00000011 => Self::NonhostInfo,
            0x00000012 => Self::OmitBootDeviceEvents,
            0x80000001 => Self::EfiVariableDriverConfig,
            0x80000002 => Self::EfiVariableBoot,
            0x80000003 => Self::EfiBootServicesApplication,
            0x80000004 => Self::EfiBootServicesDriver,
            0x80000005 => Self::EfiRuntimeServicesDriver,
            0x80000006 => Self::EfiGptEvent,
            0x80000007 => Self::EfiAction,
            0x80000008 => Self::EfiPlatformFirmwareBlob,
            0x80000009 => Self::EfiHandoffTables,
            0x800000E0 => Self::EfiVariableAuthority,
            other => Self::Unknown(other),
        }
    }

    /// Whether an undecodable payload of this type is still known to have
    /// been hashed verbatim into the PCR. Payloads of other types are
    /// carried as informational so that no spurious digest finding is
    /// raised for them.
    pub fn opaque_data_is_measured(&self) -> bool {
        matches!(
            self,
            Self::EventTag
                | Self::SCrtmVersion
                | Self::PlatformConfigFlags
                | Self::TableOfDevices
                | Self::NonhostInfo
                | Self::OmitBootDeviceEvents
                | Self::EfiGptEvent
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrebootCert => write!(f, "EV_PREBOOT_CERT"),
            Self::PostCode => write!(f, "EV_POST_CODE"),
            Self::Unused => write!(f, "EV_UNUSED"),
            Self::NoAction => write!(f, "EV_NO_ACTION"),
            Self::Separator => write!(f, "EV_SEPARATOR"),
            Self::Action => write!(f, "EV_ACTION"),
            Self::EventTag => write!(f, "EV_EVENT_TAG"),
            Self::SCrtmContents => write!(f, "EV_S_CRTM_CONTENTS"),
            Self::SCrtmVersion => write!(f, "EV_S_CRTM_VERSION"),
            Self::CpuMicrocode => write!(f, "EV_CPU_MICROCODE"),
            Self::PlatformConfigFlags => write!(f, "EV_PLATFORM_CONFIG_FLAGS"),
            Self::TableOfDevices => write!(f, "EV_TABLE_OF_DEVICES"),
            Self::CompactHash => write!(f, "EV_COMPACT_HASH"),
            Self::Ipl => write!(f, "EV_IPL"),
            Self::IplPartitionData => write!(f, "EV_IPL_PARTITION_DATA"),
            Self::NonhostCode => write!(f, "EV_NONHOST_CODE"),
            Self::NonhostConfig => write!(f, "EV_NONHOST_CONFIG"),
            Self::NonhostInfo => write!(f, "EV_NONHOST_INFO"),
            Self::OmitBootDeviceEvents => write!(f, "EV_OMIT_BOOT_DEVICE_EVENTS"),
            Self::EfiVariableDriverConfig => write!(f, "EV_EFI_VARIABLE_DRIVER_CONFIG"),
            Self::EfiVariableBoot => write!(f, "EV_EFI_VARIABLE_BOOT"),
            Self::EfiBootServicesApplication => write!(f, "EV_EFI_BOOT_SERVICES_APPLICATION"),
            Self::EfiBootServicesDriver => write!(f, "EV_EFI_BOOT_SERVICES_DRIVER"),
            Self::EfiRuntimeServicesDriver => write!(f, "EV_EFI_RUNTIME_SERVICES_DRIVER"),
            Self::EfiGptEvent => write!(f, "EV_EFI_GPT_EVENT"),
            Self::EfiAction => write!(f, "EV_EFI_ACTION"),
            Self::EfiPlatformFirmwareBlob => write!(f, "EV_EFI_PLATFORM_FIRMWARE_BLOB"),
            Self::EfiHandoffTables => write!(f, "EV_EFI_HANDOFF_TABLES"),
            Self::EfiVariableAuthority => write!(f, "EV_EFI_VARIABLE_AUTHORITY"),
            Self::Unknown(value) => write!(f, "UNKNOWN_0x{:08x}", value),
        }
    }
}

/// A UEFI GUID as stored in the log: three little-endian groups followed by
/// eight verbatim bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EfiGuid {
    bytes: [u8; 16],
}

impl EfiGuid {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }
}

impl fmt::Display for EfiGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", Uuid::from_bytes_le(self.bytes).hyphenated())
    }
}

/// A digest size declaration from the spec-id event.
#[derive(Debug, Clone, Copy)]
pub struct SpecIdAlgorithmSize {
    pub algorithm_id: AlgorithmId,
    pub digest_size: u16,
}

/// Specification ID event payload: the first event of every log, declaring
/// the spec the log follows and, for Crypto Agile logs, the active digest
/// algorithms.
#[derive(Debug, Clone)]
pub struct SpecIdEventData {
    pub raw: Vec<u8>,
    pub spec: SpecKind,
    pub platform_class: u32,
    pub spec_version_minor: u8,
    pub spec_version_major: u8,
    pub spec_errata: u8,
    pub uintn_size: u8,
    pub digest_sizes: Vec<SpecIdAlgorithmSize>,
    pub vendor_info: Vec<u8>,
}

impl fmt::Display for SpecIdEventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpecIdEvent{{ spec={:?}, platformClass={}, specVersionMinor={}, specVersionMajor={}, specErrata={}",
            self.spec,
            self.platform_class,
            self.spec_version_minor,
            self.spec_version_major,
            self.spec_errata
        )?;
        if self.spec == SpecKind::Efi2 {
            write!(f, ", digestSizes=[")?;
            for (i, size) in self.digest_sizes.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(
                    f,
                    "{{ algorithmId=0x{:04x}, digestSize={} }}",
                    size.algorithm_id.raw(),
                    size.digest_size
                )?;
            }
            write!(f, "]")?;
        }
        write!(f, " }}")
    }
}

/// Startup locality no-action event payload.
#[derive(Debug, Clone)]
pub struct StartupLocalityEventData {
    pub raw: Vec<u8>,
    pub locality: u8,
}

impl fmt::Display for StartupLocalityEventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EfiStartupLocalityEvent{{ StartupLocality: {} }}", self.locality)
    }
}

/// SP800-155 BIOS integrity measurement reference manifest event payload.
#[derive(Debug, Clone)]
pub struct BimReferenceManifestEventData {
    pub raw: Vec<u8>,
    pub vendor_id: u32,
    pub guid: EfiGuid,
}

impl fmt::Display for BimReferenceManifestEventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sp800_155_PlatformId_Event{{ VendorId: {}, ReferenceManifestGuid: {} }}",
            self.vendor_id, self.guid
        )
    }
}

/// Whether a separator records a normal stage transition or an error
/// condition. Error separators measure an error code rather than the
/// recorded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeparatorKind {
    Normal,
    Error,
}

#[derive(Debug, Clone)]
pub struct SeparatorEventData {
    pub raw: Vec<u8>,
    pub kind: SeparatorKind,
}

#[derive(Debug, Clone)]
pub struct AsciiStringEventData {
    pub raw: Vec<u8>,
    pub informational: bool,
}

impl AsciiStringEventData {
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.raw).to_string()
    }
}

/// GRUB kernel command line measurement (`kernel_cmdline: ` prefix, PCR 8).
/// The measured bytes are the command line without the prefix and without
/// the terminating NUL.
#[derive(Debug, Clone)]
pub struct KernelCmdlineEventData {
    pub raw: Vec<u8>,
    pub cmdline: String,
}

/// GRUB command measurement (`grub_cmd: ` prefix, PCR 8).
#[derive(Debug, Clone)]
pub struct GrubCmdEventData {
    pub raw: Vec<u8>,
    pub cmd: String,
}

/// systemd EFI stub measurement. The stub measures the UTF-16LE encoding of
/// the string without a terminating NUL, but records the ASCII form.
#[derive(Debug, Clone)]
pub struct SystemdEfiStubEventData {
    pub raw: Vec<u8>,
    pub description: String,
}

impl SystemdEfiStubEventData {
    pub fn measured_utf16_bytes(&self) -> Vec<u8> {
        self.description
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect()
    }
}

/// A measured UEFI variable (`UEFI_VARIABLE_DATA`).
///
/// `consumed` is the number of raw bytes covered by the decoded structure;
/// any bytes beyond it are padding that some firmware nevertheless hashed.
#[derive(Debug, Clone)]
pub struct EfiVariableEventData {
    pub raw: Vec<u8>,
    pub variable_name: EfiGuid,
    pub unicode_name: String,
    pub variable_data: Vec<u8>,
    pub consumed: usize,
}

impl fmt::Display for EfiVariableEventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UEFI_VARIABLE_DATA{{ VariableName: {}, UnicodeName: \"{}\" }}",
            self.variable_name, self.unicode_name
        )
    }
}

/// A PE/COFF image load (`UEFI_IMAGE_LOAD_EVENT`). Never self-measured: the
/// digest covers the image itself, not this structure.
#[derive(Debug, Clone)]
pub struct EfiImageLoadEventData {
    pub raw: Vec<u8>,
    pub location_in_memory: u64,
    pub length_in_memory: u64,
    pub link_time_address: u64,
    pub device_path: EfiDevicePath,
}

impl fmt::Display for EfiImageLoadEventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UEFI_IMAGE_LOAD_EVENT{{ ImageLocationInMemory: 0x{:016x}, ImageLengthInMemory: {}, ImageLinkTimeAddress: 0x{:016x}, DevicePath: {} }}",
            self.location_in_memory, self.length_in_memory, self.link_time_address, self.device_path
        )
    }
}

/// One partition entry from a measured GPT (`UEFI_GPT_DATA`).
#[derive(Debug, Clone)]
pub struct EfiGptPartitionEntry {
    pub type_guid: EfiGuid,
    pub unique_guid: EfiGuid,
    pub attrs: u64,
    pub name: String,
}

impl fmt::Display for EfiGptPartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PartitionTypeGUID: {}, UniquePartitionGUID: {}, Name: \"{}\"",
            self.type_guid, self.unique_guid, self.name
        )
    }
}

#[derive(Debug, Clone)]
pub struct EfiGptEventData {
    pub raw: Vec<u8>,
    pub disk_guid: EfiGuid,
    pub partitions: Vec<EfiGptPartitionEntry>,
}

impl fmt::Display for EfiGptEventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UEFI_GPT_DATA{{ DiskGUID: {}, Partitions: [", self.disk_guid)?;
        for (i, partition) in self.partitions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{{ {} }}", partition)?;
        }
        write!(f, "] }}")
    }
}

/// Event data the decoder does not interpret. `informational` distinguishes
/// payloads that are known not to be self-measured from payloads that were
/// hashed verbatim.
#[derive(Debug, Clone)]
pub struct OpaqueEventData {
    pub raw: Vec<u8>,
    pub informational: bool,
}

/// Decoded event data, keyed on `(PCRIndex, EventType)` during parsing.
///
/// The set of variants is closed: unknown sub-types land in `Opaque` and are
/// preserved verbatim, not rejected.
#[derive(Debug, Clone)]
pub enum EventData {
    SpecId(SpecIdEventData),
    Separator(SeparatorEventData),
    AsciiString(AsciiStringEventData),
    KernelCmdline(KernelCmdlineEventData),
    GrubCmd(GrubCmdEventData),
    SystemdEfiStub(SystemdEfiStubEventData),
    EfiVariable(EfiVariableEventData),
    EfiImageLoad(EfiImageLoadEventData),
    EfiGpt(EfiGptEventData),
    StartupLocality(StartupLocalityEventData),
    BimReferenceManifest(BimReferenceManifestEventData),
    Opaque(OpaqueEventData),
}

impl EventData {
    /// The exact payload as stored in the log.
    pub fn raw_bytes(&self) -> &[u8] {
        match self {
            EventData::SpecId(d) => &d.raw,
            EventData::Separator(d) => &d.raw,
            EventData::AsciiString(d) => &d.raw,
            EventData::KernelCmdline(d) => &d.raw,
            EventData::GrubCmd(d) => &d.raw,
            EventData::SystemdEfiStub(d) => &d.raw,
            EventData::EfiVariable(d) => &d.raw,
            EventData::EfiImageLoad(d) => &d.raw,
            EventData::EfiGpt(d) => &d.raw,
            EventData::StartupLocality(d) => &d.raw,
            EventData::BimReferenceManifest(d) => &d.raw,
            EventData::Opaque(d) => &d.raw,
        }
    }

    /// The bytes that would produce the recorded digest if the event is
    /// honest. `None` means the event data is not itself measured; the
    /// replay engine performs no digest comparison for such events.
    pub fn measured_bytes(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            EventData::SpecId(_) => None,
            EventData::StartupLocality(_) => None,
            EventData::BimReferenceManifest(_) => None,
            EventData::Separator(d) => match d.kind {
                SeparatorKind::Normal => Some(Cow::Borrowed(d.raw.as_slice())),
                SeparatorKind::Error => None,
            },
            EventData::AsciiString(d) => {
                if d.informational {
                    None
                } else {
                    Some(Cow::Borrowed(d.raw.as_slice()))
                }
            }
            EventData::KernelCmdline(d) => Some(Cow::Borrowed(d.cmdline.as_bytes())),
            EventData::GrubCmd(d) => Some(Cow::Borrowed(d.cmd.as_bytes())),
            EventData::SystemdEfiStub(d) => Some(Cow::Owned(d.measured_utf16_bytes())),
            EventData::EfiVariable(d) => Some(Cow::Borrowed(&d.raw[..d.consumed])),
            EventData::EfiImageLoad(_) => None,
            EventData::EfiGpt(d) => Some(Cow::Borrowed(d.raw.as_slice())),
            EventData::Opaque(d) => {
                if d.informational {
                    None
                } else {
                    Some(Cow::Borrowed(d.raw.as_slice()))
                }
            }
        }
    }

    /// Raw payload bytes past the end of the measured view. These are the
    /// first candidates for the trailing-bytes scan.
    pub fn unmeasured_tail(&self) -> &[u8] {
        match self {
            EventData::EfiVariable(d) => &d.raw[d.consumed..],
            EventData::KernelCmdline(d) => {
                let end = KERNEL_CMDLINE_PREFIX.len() + d.cmdline.len();
                &d.raw[end.min(d.raw.len())..]
            }
            EventData::GrubCmd(d) => {
                let end = GRUB_CMD_PREFIX.len() + d.cmd.len();
                &d.raw[end.min(d.raw.len())..]
            }
            _ => &[],
        }
    }
}

impl fmt::Display for EventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventData::SpecId(d) => write!(f, "{}", d),
            EventData::Separator(d) => match d.kind {
                SeparatorKind::Error => write!(f, "Error"),
                SeparatorKind::Normal => Ok(()),
            },
            EventData::AsciiString(d) => write!(f, "{}", d.as_string()),
            EventData::KernelCmdline(d) => write!(f, "kernel_cmdline{{ {} }}", d.cmdline),
            EventData::GrubCmd(d) => write!(f, "grub_cmd{{ {} }}", d.cmd),
            EventData::SystemdEfiStub(d) => write!(f, "systemd_efi_stub{{ {} }}", d.description),
            EventData::EfiVariable(d) => write!(f, "{}", d),
            EventData::EfiImageLoad(d) => write!(f, "{}", d),
            EventData::EfiGpt(d) => write!(f, "{}", d),
            EventData::StartupLocality(d) => write!(f, "{}", d),
            EventData::BimReferenceManifest(d) => write!(f, "{}", d),
            EventData::Opaque(_) => Ok(()),
        }
    }
}

/// One recorded digest of an event.
#[derive(Debug, Clone)]
pub struct EventDigest {
    pub algorithm_id: AlgorithmId,
    pub digest: Vec<u8>,
}

/// A decoded log entry.
///
/// `index` is assigned by the decoder in log order; it is not present in the
/// on-disk format.
#[derive(Debug, Clone)]
pub struct Event {
    pub index: u32,
    pub pcr_index: u32,
    pub event_type: EventType,
    pub digests: Vec<EventDigest>,
    pub data: EventData,
}

impl Event {
    /// The recorded digest for one algorithm, if present.
    pub fn digest(&self, alg: AlgorithmId) -> Option<&[u8]> {
        self.digests
            .iter()
            .find(|entry| entry.algorithm_id == alg)
            .map(|entry| entry.digest.as_slice())
    }
}
