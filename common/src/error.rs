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

// Error definitions shared by the log decoder and the replay engine.

use thiserror::Error;

/// Errors produced while decoding or replaying a TCG event log.
///
/// Decoding failures in the framing layer abort the whole log; a replay
/// digest mismatch is never an error, it is recorded as a finding in the
/// validation result.
#[derive(Error, Debug)]
pub enum EventLogError {
    /// Ran out of bytes mid-record or mid-field.
    #[error("truncated log: {0}")]
    TruncatedLog(String),

    /// Fixed-width framing fields are self-inconsistent.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The spec-id event is unusable: unknown signature where one is
    /// required, no algorithms, or a digest size that disagrees with the
    /// built-in registry.
    #[error("invalid spec id event: {0}")]
    InvalidSpecIdEvent(String),

    /// A digest algorithm appears in the log but the hashing backend cannot
    /// compute it. Fatal for replay; decoding can still succeed.
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Underlying stream failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
