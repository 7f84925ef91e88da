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

// Builders for hand-assembled synthetic logs shared by the integration
// tests. All records are little-endian, matching the on-disk format.

#![allow(dead_code)]

use openssl::hash::{hash, MessageDigest};

pub const TPM_ALG_SHA1: u16 = 0x0004;
pub const TPM_ALG_SHA256: u16 = 0x000B;

pub fn sha1(data: &[u8]) -> Vec<u8> {
    hash(MessageDigest::sha1(), data).unwrap().to_vec()
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    hash(MessageDigest::sha256(), data).unwrap().to_vec()
}

/// A `"Spec ID Event03\0"` payload declaring the given algorithms.
pub fn spec_id_event03_payload(algorithms: &[(u16, u16)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"Spec ID Event03\0");
    data.extend_from_slice(&0u32.to_le_bytes()); // platformClass
    data.push(0); // specVersionMinor
    data.push(2); // specVersionMajor
    data.push(0); // specErrata
    data.push(2); // uintnSize
    data.extend_from_slice(&(algorithms.len() as u32).to_le_bytes());
    for (algorithm_id, digest_size) in algorithms {
        data.extend_from_slice(&algorithm_id.to_le_bytes());
        data.extend_from_slice(&digest_size.to_le_bytes());
    }
    data.push(0); // vendorInfoSize
    data
}

/// A PC Client 1.2 shaped record.
pub fn pc_client_record(pcr_index: u32, event_type: u32, digest: &[u8], data: &[u8]) -> Vec<u8> {
    assert_eq!(digest.len(), 20);
    let mut record = Vec::new();
    record.extend_from_slice(&pcr_index.to_le_bytes());
    record.extend_from_slice(&event_type.to_le_bytes());
    record.extend_from_slice(digest);
    record.extend_from_slice(&(data.len() as u32).to_le_bytes());
    record.extend_from_slice(data);
    record
}

/// A Crypto Agile shaped record.
pub fn crypto_agile_record(
    pcr_index: u32,
    event_type: u32,
    digests: &[(u16, &[u8])],
    data: &[u8],
) -> Vec<u8> {
    let mut record = Vec::new();
    record.extend_from_slice(&pcr_index.to_le_bytes());
    record.extend_from_slice(&event_type.to_le_bytes());
    record.extend_from_slice(&(digests.len() as u32).to_le_bytes());
    for (algorithm_id, digest) in digests {
        record.extend_from_slice(&algorithm_id.to_le_bytes());
        record.extend_from_slice(digest);
    }
    record.extend_from_slice(&(data.len() as u32).to_le_bytes());
    record.extend_from_slice(data);
    record
}

/// The opening no-action spec-id record of a Crypto Agile log.
pub fn crypto_agile_log_header(algorithms: &[(u16, u16)]) -> Vec<u8> {
    pc_client_record(0, 0x03, &[0u8; 20], &spec_id_event03_payload(algorithms))
}

/// A `UEFI_VARIABLE_DATA` payload with the name given as raw UTF-16LE
/// bytes and its length in characters.
pub fn efi_variable_payload(
    guid: &[u8; 16],
    name_bytes: &[u8],
    name_chars: u64,
    variable_data: &[u8],
) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(guid);
    data.extend_from_slice(&name_chars.to_le_bytes());
    data.extend_from_slice(&(variable_data.len() as u64).to_le_bytes());
    data.extend_from_slice(name_bytes);
    data.extend_from_slice(variable_data);
    data
}

pub fn utf16_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// One device path node with its four byte header.
pub fn device_path_node(node_type: u8, sub_type: u8, data: &[u8]) -> Vec<u8> {
    let mut node = vec![node_type, sub_type];
    node.extend_from_slice(&((data.len() as u16 + 4).to_le_bytes()));
    node.extend_from_slice(data);
    node
}

pub fn end_of_hardware_node() -> Vec<u8> {
    vec![0x7F, 0xFF, 0x04, 0x00]
}

/// A `UEFI_IMAGE_LOAD_EVENT` payload wrapping the given device path bytes.
pub fn image_load_payload(device_path: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&0x76543210u64.to_le_bytes()); // location in memory
    data.extend_from_slice(&(0xC000u64).to_le_bytes()); // length in memory
    data.extend_from_slice(&0u64.to_le_bytes()); // link time address
    data.extend_from_slice(&(device_path.len() as u64).to_le_bytes());
    data.extend_from_slice(device_path);
    data
}
