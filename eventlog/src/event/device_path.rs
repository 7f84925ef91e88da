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

//! UEFI device paths.
//!
//! A device path is a chain of type/sub-type tagged nodes terminated by an
//! End-of-Hardware node. The chain is decoded into an owned vector; rendering
//! is diagnostic only and recognises the common node combinations, falling
//! back to a generic `TypeName(subType, 0xRAW)` form.

use std::fmt;

use tcg_common_verifier::EventLogError;

use crate::byte_reader::ByteReader;
use crate::event::model::EfiGuid;

const NODE_TYPE_HARDWARE: u8 = 0x01;
const NODE_TYPE_ACPI: u8 = 0x02;
const NODE_TYPE_MSG: u8 = 0x03;
const NODE_TYPE_MEDIA: u8 = 0x04;
const NODE_TYPE_BBS: u8 = 0x05;
const NODE_TYPE_END_OF_HARDWARE: u8 = 0x7F;

const HARDWARE_NODE_PCI: u8 = 0x01;

const ACPI_NODE_NORMAL: u8 = 0x01;

const MSG_NODE_LU: u8 = 0x11;
const MSG_NODE_SATA: u8 = 0x12;

const MEDIA_NODE_HARD_DRIVE: u8 = 0x01;
const MEDIA_NODE_FILE_PATH: u8 = 0x04;
const MEDIA_NODE_FV_FILE: u8 = 0x06;
const MEDIA_NODE_FV: u8 = 0x07;
const MEDIA_NODE_REL_OFFSET_RANGE: u8 = 0x08;

/// One node of a device path. `data` excludes the four framing bytes.
#[derive(Debug, Clone)]
pub struct EfiDevicePathNode {
    pub node_type: u8,
    pub sub_type: u8,
    pub data: Vec<u8>,
}

/// A decoded device path: the node chain without its End-of-Hardware
/// terminator.
#[derive(Debug, Clone, Default)]
pub struct EfiDevicePath {
    pub nodes: Vec<EfiDevicePathNode>,
}

/// Decode a device path from a byte buffer.
///
/// # Errors
/// * `EventLogError::MalformedEvent` - If a node declares a length below the
///   four framing bytes or the buffer ends before an End-of-Hardware node
pub fn read_device_path(data: &[u8]) -> Result<EfiDevicePath, EventLogError> {
    let mut reader = ByteReader::new(data);
    let mut nodes = Vec::new();

    loop {
        let node = read_device_path_node(&mut reader)?;
        if node.node_type == NODE_TYPE_END_OF_HARDWARE {
            break;
        }
        nodes.push(node);
    }

    Ok(EfiDevicePath { nodes })
}

fn read_device_path_node(reader: &mut ByteReader<'_>) -> Result<EfiDevicePathNode, EventLogError> {
    let unterminated =
        |_| EventLogError::MalformedEvent("device path ends without an End-of-Hardware node".to_string());

    let node_type = reader.read_u8().map_err(unterminated)?;
    let sub_type = reader.read_u8().map_err(unterminated)?;
    let length = reader.read_u16().map_err(unterminated)?;
    if length < 4 {
        return Err(EventLogError::MalformedEvent(format!(
            "device path node with length {} below the 4 byte header",
            length
        )));
    }
    let data = reader.read_bytes(length as usize - 4).map_err(unterminated)?;

    Ok(EfiDevicePathNode {
        node_type,
        sub_type,
        data,
    })
}

fn node_type_name(node_type: u8) -> String {
    match node_type {
        NODE_TYPE_HARDWARE => "HardwarePath".to_string(),
        NODE_TYPE_ACPI => "AcpiPath".to_string(),
        NODE_TYPE_MSG => "Msg".to_string(),
        NODE_TYPE_MEDIA => "MediaPath".to_string(),
        NODE_TYPE_BBS => "BbsPath".to_string(),
        other => format!("Path[{:02x}]", other),
    }
}

fn read_guid(reader: &mut ByteReader<'_>) -> Option<EfiGuid> {
    reader.read_array_16().ok().map(EfiGuid::from_bytes)
}

fn firmware_node_to_string(node: &EfiDevicePathNode) -> Option<String> {
    let mut reader = ByteReader::new(&node.data);
    let name = read_guid(&mut reader)?;
    let label = match node.sub_type {
        MEDIA_NODE_FV_FILE => "FvFile",
        MEDIA_NODE_FV => "Fv",
        _ => return None,
    };
    Some(format!("{}({})", label, name))
}

fn acpi_node_to_string(node: &EfiDevicePathNode) -> Option<String> {
    if node.sub_type != ACPI_NODE_NORMAL {
        // No support for the extended path node
        return None;
    }
    let mut reader = ByteReader::new(&node.data);
    let hid = reader.read_u32().ok()?;
    let uid = reader.read_u32().ok()?;

    if hid & 0xffff == 0x41d0 {
        match hid >> 16 {
            0x0a03 => Some(format!("PciRoot(0x{:x})", uid)),
            0x0a08 => Some(format!("PcieRoot(0x{:x})", uid)),
            0x0604 => Some(format!("Floppy(0x{:x})", uid)),
            other => Some(format!("Acpi(PNP{:04x},0x{:x})", other, uid)),
        }
    } else {
        Some(format!("Acpi(0x{:08x},0x{:x})", hid, uid))
    }
}

fn pci_node_to_string(node: &EfiDevicePathNode) -> Option<String> {
    let mut reader = ByteReader::new(&node.data);
    let function = reader.read_u8().ok()?;
    let device = reader.read_u8().ok()?;
    Some(format!("Pci(0x{:x},0x{:x})", device, function))
}

fn lu_node_to_string(node: &EfiDevicePathNode) -> Option<String> {
    let mut reader = ByteReader::new(&node.data);
    let lun = reader.read_u8().ok()?;
    Some(format!("Unit(0x{:x})", lun))
}

fn sata_node_to_string(node: &EfiDevicePathNode) -> Option<String> {
    let mut reader = ByteReader::new(&node.data);
    let hba_port = reader.read_u16().ok()?;
    let port_multiplier_port = reader.read_u16().ok()?;
    let lun = reader.read_u16().ok()?;
    Some(format!("Sata(0x{:x},0x{:x},0x{:x})", hba_port, port_multiplier_port, lun))
}

fn hard_drive_node_to_string(node: &EfiDevicePathNode) -> Option<String> {
    let mut reader = ByteReader::new(&node.data);
    let partition_number = reader.read_u32().ok()?;
    let partition_start = reader.read_u64().ok()?;
    let partition_size = reader.read_u64().ok()?;
    let signature = reader.read_array_16().ok()?;
    let _partition_format = reader.read_u8().ok()?;
    let signature_type = reader.read_u8().ok()?;

    let prefix = match signature_type {
        0x01 => {
            let mbr_id = u32::from_le_bytes([signature[0], signature[1], signature[2], signature[3]]);
            format!("HD({},MBR,0x{:08x},", partition_number, mbr_id)
        }
        0x02 => format!("HD({},GPT,{},", partition_number, EfiGuid::from_bytes(signature)),
        other => format!("HD({},{},0,", partition_number, other),
    };
    Some(format!("{}0x{:016x}, 0x{:016x})", prefix, partition_start, partition_size))
}

fn file_path_node_to_string(node: &EfiDevicePathNode) -> Option<String> {
    let mut reader = ByteReader::new(&node.data);
    reader.read_utf16_until_nul(node.data.len() as u64 / 2).ok()
}

fn rel_offset_range_node_to_string(node: &EfiDevicePathNode) -> Option<String> {
    let mut reader = ByteReader::new(&node.data);
    reader.skip(4).ok()?;
    let start = reader.read_u64().ok()?;
    let end = reader.read_u64().ok()?;
    Some(format!("Offset(0x{:x},0x{:x})", start, end))
}

impl EfiDevicePathNode {
    fn to_pretty_string(&self) -> Option<String> {
        match (self.node_type, self.sub_type) {
            (NODE_TYPE_MEDIA, MEDIA_NODE_FV_FILE) | (NODE_TYPE_MEDIA, MEDIA_NODE_FV) => {
                firmware_node_to_string(self)
            }
            (NODE_TYPE_MEDIA, MEDIA_NODE_HARD_DRIVE) => hard_drive_node_to_string(self),
            (NODE_TYPE_MEDIA, MEDIA_NODE_FILE_PATH) => file_path_node_to_string(self),
            (NODE_TYPE_ACPI, _) => acpi_node_to_string(self),
            (NODE_TYPE_HARDWARE, HARDWARE_NODE_PCI) => pci_node_to_string(self),
            (NODE_TYPE_MSG, MSG_NODE_LU) => lu_node_to_string(self),
            (NODE_TYPE_MSG, MSG_NODE_SATA) => sata_node_to_string(self),
            (NODE_TYPE_MEDIA, MEDIA_NODE_REL_OFFSET_RANGE) => rel_offset_range_node_to_string(self),
            _ => None,
        }
    }
}

impl fmt::Display for EfiDevicePathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pretty) = self.to_pretty_string() {
            return write!(f, "{}", pretty);
        }
        write!(f, "{}({}", node_type_name(self.node_type), self.sub_type)?;
        if !self.data.is_empty() {
            write!(f, ", 0x{}", hex::encode(&self.data))?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for EfiDevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}
