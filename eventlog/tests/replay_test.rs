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

use tcg_eventlog_verifier::{
    AlgorithmId, EfiBootVariableBehaviour, EventLog, EventLogError, LogOptions, PcrValueMap,
};

mod utils;
use utils::*;

fn parse_and_validate(
    log_data: &[u8],
    options: &LogOptions,
) -> tcg_eventlog_verifier::ValidationResult {
    EventLog::parse(log_data, options)
        .unwrap()
        .replay_and_validate()
        .unwrap()
}

/// Replay of the minimum Crypto Agile log
/// Expected result: PCR 0 stays at the sha256 initial value and the spec-id
/// event carries no findings
#[test]
fn test_minimum_log_replay() {
    let log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    let result = parse_and_validate(&log_data, &LogOptions::default());

    assert_eq!(result.algorithms, vec![AlgorithmId::Sha256]);
    assert_eq!(result.validated_events.len(), 1);
    assert!(result.validated_events[0].incorrect_digest_values.is_empty());
    assert_eq!(
        result.expected_pcr_values.value(0, AlgorithmId::Sha256).unwrap(),
        &[0u8; 32]
    );
    assert_eq!(result.efi_boot_variable_behaviour, EfiBootVariableBehaviour::Unknown);
}

/// Replay soundness for an honest action event
/// Expected result: the PCR 7 value equals the manual extend fold and no
/// trailing bytes are reported
#[test]
fn test_honest_action_event_replay() {
    let data = b"TEST\0";
    let digest = sha1(data);
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA1, 20)]);
    log_data.extend_from_slice(&crypto_agile_record(7, 0x05, &[(TPM_ALG_SHA1, &digest)], data));

    let result = parse_and_validate(&log_data, &LogOptions::default());

    let mut fold = vec![0u8; 20];
    fold.extend_from_slice(&digest);
    let expected = sha1(&fold);
    assert_eq!(
        result.expected_pcr_values.value(7, AlgorithmId::Sha1).unwrap(),
        expected.as_slice()
    );

    let validated = &result.validated_events[1];
    assert_eq!(validated.measured_trailing_bytes_count, 0);
    assert!(validated.incorrect_digest_values.is_empty());
    assert_eq!(validated.measured_bytes.as_deref(), Some(data.as_slice()));
}

/// A recorded NUL the firmware never measured
/// Expected result: the shorter prefix matches with a trailing count of zero
/// and no incorrect digests
#[test]
fn test_unmeasured_recorded_nul_matches_prefix() {
    let data = b"TEST\0";
    let digest = sha1(b"TEST");
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA1, 20)]);
    log_data.extend_from_slice(&crypto_agile_record(7, 0x05, &[(TPM_ALG_SHA1, &digest)], data));

    let result = parse_and_validate(&log_data, &LogOptions::default());
    let validated = &result.validated_events[1];
    assert_eq!(validated.measured_trailing_bytes_count, 0);
    assert!(validated.incorrect_digest_values.is_empty());
    assert_eq!(validated.measured_bytes.as_deref(), Some(b"TEST".as_slice()));
}

/// Trailing-bytes detection
/// Objective: the stored digest covers the data plus a NUL the declared
/// length excludes
/// Expected result: one measured trailing byte, no incorrect digests
#[test]
fn test_measured_trailing_nul_is_detected() {
    let data = b"TEST";
    let digest = sha1(b"TEST\0");
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA1, 20)]);
    log_data.extend_from_slice(&crypto_agile_record(7, 0x05, &[(TPM_ALG_SHA1, &digest)], data));

    let result = parse_and_validate(&log_data, &LogOptions::default());
    let validated = &result.validated_events[1];
    assert_eq!(validated.measured_trailing_bytes_count, 1);
    assert!(validated.incorrect_digest_values.is_empty());
    assert_eq!(validated.measured_bytes.as_deref(), Some(b"TEST\0".as_slice()));
}

/// Variable event padding
/// Objective: the firmware hashed two padding bytes past the decoded
/// UEFI_VARIABLE_DATA structure
/// Expected result: a trailing count of two drawn from the raw tail
#[test]
fn test_variable_event_padding_is_detected() {
    let mut payload = efi_variable_payload(
        &[0x11; 16],
        &utf16_bytes("SecureBoot"),
        10,
        &[0x01],
    );
    payload.extend_from_slice(&[0x00, 0x00]); // padding past the structure
    let digest = sha256(&payload); // the whole record payload was hashed

    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        7,
        0x80000001,
        &[(TPM_ALG_SHA256, &digest)],
        &payload,
    ));

    let result = parse_and_validate(&log_data, &LogOptions::default());
    let validated = &result.validated_events[1];
    assert_eq!(validated.measured_trailing_bytes_count, 2);
    assert!(validated.incorrect_digest_values.is_empty());
    assert_eq!(validated.measured_bytes.as_deref(), Some(payload.as_slice()));
}

/// Variable-boot quirk
/// Objective: EV_EFI_VARIABLE_BOOT digests cover only the variable data
/// Expected result: the behaviour latches to VarDataOnly and both events are
/// clean
#[test]
fn test_efi_boot_variable_var_data_only_quirk() {
    let boot_order_data = [0x01u8, 0x00, 0x02, 0x00];
    let boot_order = efi_variable_payload(
        &[
            0x61, 0xDF, 0xE4, 0x8B, 0xCA, 0x93, 0xD2, 0x11, 0xAA, 0x0D, 0x00, 0xE0, 0x98, 0x03,
            0x2B, 0x8C,
        ],
        &utf16_bytes("BootOrder"),
        9,
        &boot_order_data,
    );
    let boot_entry_data = [0x09u8, 0x01, 0x00, 0x00, 0x7F, 0xFF, 0x04, 0x00];
    let boot_entry = efi_variable_payload(
        &[
            0x61, 0xDF, 0xE4, 0x8B, 0xCA, 0x93, 0xD2, 0x11, 0xAA, 0x0D, 0x00, 0xE0, 0x98, 0x03,
            0x2B, 0x8C,
        ],
        &utf16_bytes("Boot0001"),
        8,
        &boot_entry_data,
    );

    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        1,
        0x80000002,
        &[(TPM_ALG_SHA256, &sha256(&boot_order_data))],
        &boot_order,
    ));
    log_data.extend_from_slice(&crypto_agile_record(
        1,
        0x80000002,
        &[(TPM_ALG_SHA256, &sha256(&boot_entry_data))],
        &boot_entry,
    ));

    let result = parse_and_validate(&log_data, &LogOptions::default());
    assert_eq!(
        result.efi_boot_variable_behaviour,
        EfiBootVariableBehaviour::VarDataOnly
    );
    for validated in &result.validated_events[1..] {
        assert!(validated.incorrect_digest_values.is_empty());
        assert_eq!(validated.measured_trailing_bytes_count, 0);
    }
    assert_eq!(
        result.validated_events[1].measured_bytes.as_deref(),
        Some(boot_order_data.as_slice())
    );
}

/// The complementary outcome: a variable-boot digest over the whole
/// structure latches Full
#[test]
fn test_efi_boot_variable_full_behaviour() {
    let boot_order = efi_variable_payload(
        &[0x33; 16],
        &utf16_bytes("BootOrder"),
        9,
        &[0x01, 0x00],
    );
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        1,
        0x80000002,
        &[(TPM_ALG_SHA256, &sha256(&boot_order))],
        &boot_order,
    ));

    let result = parse_and_validate(&log_data, &LogOptions::default());
    assert_eq!(result.efi_boot_variable_behaviour, EfiBootVariableBehaviour::Full);
    assert!(result.validated_events[1].incorrect_digest_values.is_empty());
}

/// A digest that no variant reproduces is recorded as a finding, and the
/// recorded digest is still what extends the PCR
#[test]
fn test_incorrect_digest_is_a_finding_not_an_error() {
    let data = b"TEST\0";
    let wrong_digest = sha1(b"SOMETHING ELSE");
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA1, 20)]);
    log_data.extend_from_slice(&crypto_agile_record(
        7,
        0x05,
        &[(TPM_ALG_SHA1, &wrong_digest)],
        data,
    ));

    let result = parse_and_validate(&log_data, &LogOptions::default());
    let validated = &result.validated_events[1];
    assert_eq!(validated.incorrect_digest_values.len(), 1);
    assert_eq!(validated.incorrect_digest_values[0].algorithm_id, AlgorithmId::Sha1);
    assert_eq!(validated.incorrect_digest_values[0].expected, sha1(data));

    let mut fold = vec![0u8; 20];
    fold.extend_from_slice(&wrong_digest);
    assert_eq!(
        result.expected_pcr_values.value(7, AlgorithmId::Sha1).unwrap(),
        sha1(&fold).as_slice()
    );
}

/// An error separator is extended but its payload is not compared
#[test]
fn test_error_separator_extends_without_comparison() {
    let error_code = [0x01u8, 0x00, 0x00, 0x00];
    let digest = sha256(&error_code);
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        2,
        0x04,
        &[(TPM_ALG_SHA256, &digest)],
        &error_code,
    ));

    let result = parse_and_validate(&log_data, &LogOptions::default());
    let validated = &result.validated_events[1];
    assert!(validated.measured_bytes.is_none());
    assert!(validated.incorrect_digest_values.is_empty());

    let mut fold = vec![0u8; 32];
    fold.extend_from_slice(&digest);
    assert_eq!(
        result.expected_pcr_values.value(2, AlgorithmId::Sha256).unwrap(),
        sha256(&fold).as_slice()
    );
}

/// Startup locality seeding
/// Expected result: PCR 0 starts from zeros with the trailing byte set to
/// the locality, and extends fold from that value
#[test]
fn test_startup_locality_seeds_pcr0() {
    let mut locality_payload = b"StartupLocality\0".to_vec();
    locality_payload.push(3);

    let post_code = b"POST CODE";
    let digest = sha256(post_code);

    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        0,
        0x03,
        &[(TPM_ALG_SHA256, &[0u8; 32])],
        &locality_payload,
    ));
    log_data.extend_from_slice(&crypto_agile_record(
        0,
        0x01,
        &[(TPM_ALG_SHA256, &digest)],
        post_code,
    ));

    let result = parse_and_validate(&log_data, &LogOptions::default());

    let mut initial = vec![0u8; 32];
    initial[31] = 3;
    let mut fold = initial;
    fold.extend_from_slice(&digest);
    assert_eq!(
        result.expected_pcr_values.value(0, AlgorithmId::Sha256).unwrap(),
        sha256(&fold).as_slice()
    );
}

/// Replay soundness over multiple algorithms
/// Expected result: every finding list is empty and both banks match the
/// manual fold
#[test]
fn test_replay_soundness_multi_algorithm() {
    let separator = [0u8; 4];
    let action = b"Calling EFI Application from Boot Option";
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA1, 20), (TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        4,
        0x80000007,
        &[(TPM_ALG_SHA1, &sha1(action)), (TPM_ALG_SHA256, &sha256(action))],
        action,
    ));
    log_data.extend_from_slice(&crypto_agile_record(
        4,
        0x04,
        &[(TPM_ALG_SHA1, &sha1(&separator)), (TPM_ALG_SHA256, &sha256(&separator))],
        &separator,
    ));

    let result = parse_and_validate(&log_data, &LogOptions::default());
    for validated in &result.validated_events {
        assert!(validated.incorrect_digest_values.is_empty());
        assert_eq!(validated.measured_trailing_bytes_count, 0);
    }

    for (alg, hash_fn) in [
        (AlgorithmId::Sha1, sha1 as fn(&[u8]) -> Vec<u8>),
        (AlgorithmId::Sha256, sha256 as fn(&[u8]) -> Vec<u8>),
    ] {
        let size = alg.known_digest_size().unwrap();
        let mut value = vec![0u8; size];
        for data in [action.as_slice(), separator.as_slice()] {
            let mut fold = value.clone();
            fold.extend_from_slice(&hash_fn(data));
            value = hash_fn(&fold);
        }
        assert_eq!(result.expected_pcr_values.value(4, alg).unwrap(), value.as_slice());
    }
}

/// systemd EFI stub measurements hash the UTF-16 form of the recorded
/// ASCII string
#[test]
fn test_systemd_efi_stub_measured_bytes() {
    let options = LogOptions {
        enable_systemd_efi_stub: true,
        systemd_efi_stub_pcr: 8,
        ..LogOptions::default()
    };
    let recorded = b"initrd=\\initrd.img root=/dev/sda2\0";
    let measured = utf16_bytes("initrd=\\initrd.img root=/dev/sda2");
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        8,
        0x0D,
        &[(TPM_ALG_SHA256, &sha256(&measured))],
        recorded,
    ));

    let result = parse_and_validate(&log_data, &options);
    let validated = &result.validated_events[1];
    assert!(validated.incorrect_digest_values.is_empty());
    assert_eq!(validated.measured_trailing_bytes_count, 0);
    assert_eq!(validated.measured_bytes.as_deref(), Some(measured.as_slice()));
}

/// A log declaring an algorithm without a hash backend decodes but refuses
/// to replay
#[test]
fn test_unknown_algorithm_fails_replay_only() {
    let mut log_data = crypto_agile_log_header(&[(0x0010, 48)]);
    log_data.extend_from_slice(&crypto_agile_record(
        0,
        0x01,
        &[(0x0010, &[0xAB; 48])],
        b"data",
    ));

    let log = EventLog::parse(&log_data, &LogOptions::default()).unwrap();
    assert_eq!(log.algorithms, vec![AlgorithmId::Unknown(0x0010)]);
    assert!(matches!(
        log.replay_and_validate(),
        Err(EventLogError::UnsupportedAlgorithm(_))
    ));
}

/// Live PCR comparison through the validation result
#[test]
fn test_check_against_live_pcr_values() {
    let data = b"TEST\0";
    let digest = sha256(data);
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        7,
        0x05,
        &[(TPM_ALG_SHA256, &digest)],
        data,
    ));
    let result = parse_and_validate(&log_data, &LogOptions::default());

    let mut live = PcrValueMap::new();
    live.entry(7).or_default().insert(
        AlgorithmId::Sha256,
        result
            .expected_pcr_values
            .value(7, AlgorithmId::Sha256)
            .unwrap()
            .to_vec(),
    );
    assert!(result.check_against_pcrs(&live).is_empty());

    live.get_mut(&7)
        .unwrap()
        .insert(AlgorithmId::Sha256, vec![0x55; 32]);
    let discrepancies = result.check_against_pcrs(&live);
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].pcr_index, 7);
    assert_eq!(discrepancies[0].actual, vec![0x55; 32]);
}

/// JSON projection of the validation result
#[test]
fn test_validation_result_json_projection() {
    let data = b"TEST\0";
    let mut log_data = crypto_agile_log_header(&[(TPM_ALG_SHA256, 32)]);
    log_data.extend_from_slice(&crypto_agile_record(
        7,
        0x05,
        &[(TPM_ALG_SHA256, &sha256(data))],
        data,
    ));
    let result = parse_and_validate(&log_data, &LogOptions::default());
    let json = result.to_json_value();

    assert_eq!(json["algorithms"][0], "sha256");
    assert_eq!(json["events"][1]["pcr_index"], 7);
    assert_eq!(json["events"][1]["event_type"], "EV_ACTION");
    assert_eq!(
        json["events"][1]["digests"]["sha256"],
        hex::encode(sha256(data))
    );
    assert_eq!(
        json["expected_pcr_values"]["7"]["sha256"],
        hex::encode(
            result
                .expected_pcr_values
                .value(7, AlgorithmId::Sha256)
                .unwrap()
        )
    );
}
