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

//! Byte Reader Module
//!
//! Binary parsing helpers for the event log decoder: little-endian
//! fixed-width integers, bounded byte reads, position control for the skip-N
//! patterns in the GPT decoder, and UTF-16LE string extraction whose length
//! is counted in characters rather than code units.
//!
//! The module contains two components:
//! - `ByteReader`: a cursor over an in-memory byte slice
//! - `ByteParseable`: a trait for types that parse themselves from a reader

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use tcg_common_verifier::EventLogError;

/// Binary data parsing helper over an in-memory byte slice.
///
/// The log format needs rewinding (UTF-16 pushback) and relative skips, so
/// the reader wraps a `Cursor` rather than a forward-only stream.
pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

/// Trait for types that can be parsed from a byte stream.
pub trait ByteParseable: Sized {
    /// Parse an instance of the implementing type from the reader.
    ///
    /// # Errors
    /// Returns an `EventLogError` when the stream contains insufficient data
    /// or the encoded fields are self-inconsistent.
    fn parse_from(reader: &mut ByteReader<'_>) -> Result<Self, EventLogError>;
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Current reading position (byte offset).
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Move the cursor to an absolute byte offset.
    ///
    /// # Errors
    /// * `EventLogError::TruncatedLog` - If the position exceeds the data range
    pub fn set_position(&mut self, pos: u64) -> Result<(), EventLogError> {
        if pos > self.cursor.get_ref().len() as u64 {
            return Err(EventLogError::TruncatedLog(format!(
                "position {} exceeds data length {}",
                pos,
                self.cursor.get_ref().len()
            )));
        }
        self.cursor.set_position(pos);
        Ok(())
    }

    /// Skip `count` bytes forward.
    ///
    /// # Errors
    /// * `EventLogError::TruncatedLog` - If fewer than `count` bytes remain
    pub fn skip(&mut self, count: u64) -> Result<(), EventLogError> {
        let target = self.position().saturating_add(count);
        self.set_position(target)
    }

    /// Number of unread bytes remaining.
    pub fn remaining(&self) -> u64 {
        let total = self.cursor.get_ref().len() as u64;
        total.saturating_sub(self.cursor.position())
    }

    /// Whether the cursor has reached the end of the data.
    pub fn is_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Total number of bytes in the underlying data.
    pub fn get_length(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn read_u8(&mut self) -> Result<u8, EventLogError> {
        self.cursor
            .read_u8()
            .map_err(|e| EventLogError::TruncatedLog(format!("failed to read u8: {}", e)))
    }

    pub fn read_u16(&mut self) -> Result<u16, EventLogError> {
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|e| EventLogError::TruncatedLog(format!("failed to read u16: {}", e)))
    }

    pub fn read_u32(&mut self) -> Result<u32, EventLogError> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| EventLogError::TruncatedLog(format!("failed to read u32: {}", e)))
    }

    pub fn read_u64(&mut self) -> Result<u64, EventLogError> {
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|e| EventLogError::TruncatedLog(format!("failed to read u64: {}", e)))
    }

    /// Read `length` bytes.
    ///
    /// # Errors
    /// * `EventLogError::TruncatedLog` - If fewer than `length` bytes remain
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, EventLogError> {
        if length as u64 > self.remaining() {
            return Err(EventLogError::TruncatedLog(format!(
                "requested {} bytes but only {} remain",
                length,
                self.remaining()
            )));
        }
        let mut buffer = vec![0u8; length];
        self.cursor
            .read_exact(&mut buffer)
            .map_err(|e| EventLogError::TruncatedLog(format!("failed to read bytes: {}", e)))?;
        Ok(buffer)
    }

    /// Read a fixed 16-byte array, as used for GUIDs and signatures.
    pub fn read_array_16(&mut self) -> Result<[u8; 16], EventLogError> {
        let bytes = self.read_bytes(16)?;
        let mut array = [0u8; 16];
        array.copy_from_slice(&bytes);
        Ok(array)
    }

    /// Read a UTF-16LE string of `nchars` characters.
    ///
    /// UEFI variable payloads give the name length in characters, not code
    /// units: a surrogate pair counts as one character. When a high surrogate
    /// is followed by a unit that is not a low surrogate, the high surrogate
    /// decodes to the replacement character and the cursor is rewound by one
    /// byte, matching observed firmware behaviour where one byte of the
    /// would-be low surrogate is consumed.
    ///
    /// # Errors
    /// * `EventLogError::TruncatedLog` - If the stream ends inside the string
    pub fn read_utf16_string(&mut self, nchars: u64) -> Result<String, EventLogError> {
        let mut units: Vec<u16> = Vec::new();
        for _ in 0..nchars {
            let unit = self.read_u16()?;
            units.push(unit);
            if (0xD800..0xDC00).contains(&unit) {
                let low = self.read_u16()?;
                if (0xDC00..0xE000).contains(&low) {
                    units.push(low);
                } else {
                    let pos = self.position();
                    self.set_position(pos - 1)?;
                }
            }
        }
        Ok(String::from_utf16_lossy(&units))
    }

    /// Read UTF-16LE code units until a NUL terminator or `max_units` units,
    /// as used for partition names and file path nodes.
    pub fn read_utf16_until_nul(&mut self, max_units: u64) -> Result<String, EventLogError> {
        let mut units: Vec<u16> = Vec::new();
        for _ in 0..max_units {
            if self.remaining() < 2 {
                break;
            }
            let unit = self.read_u16()?;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        Ok(String::from_utf16_lossy(&units))
    }
}
