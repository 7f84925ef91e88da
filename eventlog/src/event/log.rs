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

//! Event Log Framing
//!
//! Record framing for both on-disk formats and the in-band format
//! negotiation. The first event is by definition PC Client 1.2 shaped; if
//! its payload is a recognised spec-id event the remainder of the stream
//! switches to the Crypto Agile shape and the digest algorithm set declared
//! there governs how every subsequent record is parsed.

use std::io::Read;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::debug;
use tcg_common_verifier::{AlgorithmId, EventLogError};

use crate::byte_reader::ByteReader;
use crate::event::model::{
    Event, EventData, EventDigest, EventType, SpecIdAlgorithmSize, SpecKind,
};
use crate::event::parser::{has_spec_id_signature, make_event_data, parse_spec_id_event};

/// Length of the single SHA-1 digest in a PC Client 1.2 record.
const SHA1_DIGEST_SIZE: usize = 20;

/// Options influencing which IPL sub-decoders apply.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Decode GRUB measurements into PCRs 8 and 9.
    pub enable_grub: bool,
    /// Interpret measurements made by systemd's EFI stub loader.
    pub enable_systemd_efi_stub: bool,
    /// The PCR systemd's EFI stub measures to.
    pub systemd_efi_stub_pcr: u32,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            enable_grub: false,
            enable_systemd_efi_stub: false,
            systemd_efi_stub_pcr: 8,
        }
    }
}

/// A fully decoded measurement log.
#[derive(Debug, Clone)]
pub struct EventLog {
    /// The specification the log was written against.
    pub spec: SpecKind,
    /// Digest algorithms carried by every event after the first.
    pub algorithms: Vec<AlgorithmId>,
    /// Decoded events in log order.
    pub events: Vec<Event>,
}

impl EventLog {
    /// Parse a log from its on-disk bytes.
    ///
    /// # Errors
    /// * `EventLogError::TruncatedLog` - If the data ends mid-record
    /// * `EventLogError::MalformedEvent` - If record framing fields are self-inconsistent
    /// * `EventLogError::InvalidSpecIdEvent` - If the first event carries an unusable spec-id payload
    pub fn parse(data: &[u8], options: &LogOptions) -> Result<Self, EventLogError> {
        let mut reader = ByteReader::new(data);

        // The first event is always PC Client 1.2 shaped.
        let pcr_index = reader.read_u32()?;
        let event_type = EventType::from_u32(reader.read_u32()?);
        let first_digest = reader.read_bytes(SHA1_DIGEST_SIZE)?;
        let first_data = Self::read_event_payload(&mut reader)?;

        let mut spec = SpecKind::PcClient;
        let mut digest_sizes = vec![SpecIdAlgorithmSize {
            algorithm_id: AlgorithmId::Sha1,
            digest_size: SHA1_DIGEST_SIZE as u16,
        }];

        let decoded_first = if event_type == EventType::NoAction
            && pcr_index == 0
            && has_spec_id_signature(&first_data)
        {
            let spec_id = parse_spec_id_event(&first_data)?;
            spec = spec_id.spec;
            if spec == SpecKind::Efi2 {
                digest_sizes = spec_id.digest_sizes.clone();
                Self::check_unique_algorithms(&digest_sizes)?;
            }
            EventData::SpecId(spec_id)
        } else {
            // Not a recognised spec-id: the whole log is PC Client / SHA-1.
            make_event_data(pcr_index, event_type, &first_data, options)
        };

        debug!("log format detected: {:?}, {} algorithm(s)", spec, digest_sizes.len());

        let mut events = vec![Event {
            index: 0,
            pcr_index,
            event_type,
            digests: vec![EventDigest {
                algorithm_id: AlgorithmId::Sha1,
                digest: first_digest,
            }],
            data: decoded_first,
        }];

        while !reader.is_end() {
            let index = events.len() as u32;
            let event = match spec {
                SpecKind::Efi2 => {
                    Self::parse_crypto_agile_event(&mut reader, index, &digest_sizes, options)?
                }
                SpecKind::PcClient | SpecKind::Efi12 => {
                    Self::parse_pc_client_event(&mut reader, index, options)?
                }
            };
            debug!(
                "event {}: PCR {} {} ({} byte payload)",
                event.index,
                event.pcr_index,
                event.event_type,
                event.data.raw_bytes().len()
            );
            events.push(event);
        }

        Ok(Self {
            spec,
            algorithms: digest_sizes.iter().map(|size| size.algorithm_id).collect(),
            events,
        })
    }

    /// Parse a log from a reader, consuming it to the end.
    ///
    /// # Errors
    /// * `EventLogError::Io` - If reading from the stream fails
    /// * Any error `parse` produces
    pub fn parse_reader<R: Read>(reader: &mut R, options: &LogOptions) -> Result<Self, EventLogError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::parse(&data, options)
    }

    /// Parse a base64 encoded log, as shipped by attestation pipelines.
    ///
    /// # Errors
    /// * `EventLogError::MalformedEvent` - If the base64 encoding is invalid
    /// * Any error `parse` produces
    pub fn parse_base64(log_data: &str, options: &LogOptions) -> Result<Self, EventLogError> {
        let data = BASE64
            .decode(log_data.as_bytes())
            .map_err(|e| EventLogError::MalformedEvent(format!("failed to decode base64 log data: {}", e)))?;
        Self::parse(&data, options)
    }

    fn check_unique_algorithms(digest_sizes: &[SpecIdAlgorithmSize]) -> Result<(), EventLogError> {
        for (i, size) in digest_sizes.iter().enumerate() {
            if digest_sizes[..i]
                .iter()
                .any(|other| other.algorithm_id == size.algorithm_id)
            {
                return Err(EventLogError::InvalidSpecIdEvent(format!(
                    "algorithm 0x{:04x} declared more than once",
                    size.algorithm_id.raw()
                )));
            }
        }
        Ok(())
    }

    fn read_event_payload(reader: &mut ByteReader<'_>) -> Result<Vec<u8>, EventLogError> {
        let event_data_size = reader.read_u32()?;
        if event_data_size as u64 > reader.remaining() {
            return Err(EventLogError::TruncatedLog(format!(
                "event data size {} exceeds remaining {} bytes",
                event_data_size,
                reader.remaining()
            )));
        }
        reader.read_bytes(event_data_size as usize)
    }

    fn parse_pc_client_event(
        reader: &mut ByteReader<'_>,
        index: u32,
        options: &LogOptions,
    ) -> Result<Event, EventLogError> {
        let pcr_index = reader.read_u32()?;
        let event_type = EventType::from_u32(reader.read_u32()?);
        let digest = reader.read_bytes(SHA1_DIGEST_SIZE)?;
        let event_data = Self::read_event_payload(reader)?;

        Ok(Event {
            index,
            pcr_index,
            event_type,
            digests: vec![EventDigest {
                algorithm_id: AlgorithmId::Sha1,
                digest,
            }],
            data: make_event_data(pcr_index, event_type, &event_data, options),
        })
    }

    fn parse_crypto_agile_event(
        reader: &mut ByteReader<'_>,
        index: u32,
        digest_sizes: &[SpecIdAlgorithmSize],
        options: &LogOptions,
    ) -> Result<Event, EventLogError> {
        let pcr_index = reader.read_u32()?;
        let event_type = EventType::from_u32(reader.read_u32()?);

        let digest_count = reader.read_u32()?;
        if digest_count as usize != digest_sizes.len() {
            return Err(EventLogError::MalformedEvent(format!(
                "event {} carries {} digest(s), the spec-id event declared {}",
                index,
                digest_count,
                digest_sizes.len()
            )));
        }

        let mut digests: Vec<EventDigest> = Vec::with_capacity(digest_count as usize);
        for _ in 0..digest_count {
            let algorithm_id = AlgorithmId::from(reader.read_u16()?);
            let declared = digest_sizes
                .iter()
                .find(|size| size.algorithm_id == algorithm_id)
                .ok_or_else(|| {
                    EventLogError::MalformedEvent(format!(
                        "event {} carries a digest for undeclared algorithm 0x{:04x}",
                        index,
                        algorithm_id.raw()
                    ))
                })?;
            if digests.iter().any(|entry| entry.algorithm_id == algorithm_id) {
                return Err(EventLogError::MalformedEvent(format!(
                    "event {} carries algorithm 0x{:04x} more than once",
                    index,
                    algorithm_id.raw()
                )));
            }
            let digest = reader.read_bytes(declared.digest_size as usize)?;
            digests.push(EventDigest {
                algorithm_id,
                digest,
            });
        }

        let event_data = Self::read_event_payload(reader)?;

        Ok(Event {
            index,
            pcr_index,
            event_type,
            digests,
            data: make_event_data(pcr_index, event_type, &event_data, options),
        })
    }
}
