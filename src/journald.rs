// SPDX-License-Identifier: Apache-2.0

//! Parser for systemd's Journal Export Format.
//!
//! Decodes a byte slice into `processor.add_row(ts_ns, fields, None)` calls,
//! buffering no more than the current record. Framing errors abort the
//! remainder of the request; rows already emitted via a blank-line
//! terminator are not retracted.

use crate::config::JournaldConfig;
use crate::field::Field;
use crate::sink::LogMessageProcessor;
use crate::stream_id::TenantId;

/// A hard parse failure. Aborts the remainder of the request; rows already
/// flushed by an earlier blank-line terminator are kept.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JournaldError {
    /// A line ran to the end of input without a terminating `\n`.
    #[error("record truncated: {0} bytes remain with no terminating newline")]
    MissingSeparator(usize),
    /// Fewer than 8 bytes remained to hold the binary length prefix.
    #[error("only {available} bytes remain, too few for an 8-byte binary length prefix")]
    TruncatedLengthPrefix {
        /// Bytes actually available.
        available: usize,
    },
    /// The 8-byte length prefix decoded to zero.
    #[error("binary field length prefix is zero")]
    ZeroLengthBinaryValue,
    /// The declared length exceeds what remains in the buffer.
    #[error("binary field declares length {declared}, but only {remaining} bytes remain")]
    BinaryLengthExceedsBuffer {
        /// The declared length.
        declared: u64,
        /// Bytes actually available after the length prefix.
        remaining: usize,
    },
    /// Input ended exactly at the end of a binary value, with no byte left
    /// for the required trailing newline.
    #[error("input ends immediately after a binary field value, with no trailing newline")]
    EmptyBufferAfterBinaryValue,
    /// A byte followed a binary value but it was not `\n`.
    #[error("binary field value is not followed by a newline")]
    MissingNewlineAfterBinaryValue,
    /// A field name exceeded 64 bytes or used a disallowed character.
    #[error("field name {0:?} exceeds 64 bytes or uses characters outside [A-Z_][A-Z0-9_]*")]
    BadFieldName(String),
    /// The configured time field's value did not parse as a decimal integer.
    #[error("timestamp value {0:?} is not a valid decimal integer")]
    NonNumericTimestamp(String),
    /// The configured `tenant_id` string was malformed.
    #[error(transparent)]
    TenantId(#[from] crate::config::TenantIdParseError),
}

fn is_valid_field_name(name: &[u8]) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    let first_ok = matches!(name[0], b'A'..=b'Z' | b'_');
    first_ok && name[1..].iter().all(|&b| matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b'_'))
}

fn bad_name_error(name: &[u8]) -> JournaldError {
    JournaldError::BadFieldName(String::from_utf8_lossy(name).into_owned())
}

/// Parses `input` using `now_ns` as the fallback timestamp for any record
/// that never supplies the configured time field, dispatching accepted rows
/// to `processor`.
///
/// `now_ns` is taken as a parameter, captured once by the caller, rather
/// than sampled internally, so a record without a timestamp field gets one
/// fixed value for the whole parse — matching "`now_ns()` captured once at
/// parse start" — and so this function stays a pure, deterministically
/// testable transform.
pub fn parse(
    input: &[u8],
    config: &JournaldConfig,
    tenant_id: TenantId,
    now_ns: i64,
    processor: &mut dyn LogMessageProcessor,
) -> Result<(), JournaldError> {
    let mut fields: Vec<Field<'_>> = Vec::new();
    let mut ts_ns: Option<i64> = None;
    let mut pos = 0usize;

    loop {
        if pos >= input.len() {
            emit_row(&fields, ts_ns, now_ns, tenant_id, processor);
            return Ok(());
        }

        let rest = &input[pos..];
        let Some(nl_idx) = rest.iter().position(|&b| b == b'\n') else {
            return Err(JournaldError::MissingSeparator(rest.len()));
        };
        let line = &rest[..nl_idx];
        let line_end_abs = pos + nl_idx;

        if line.is_empty() {
            emit_row(&fields, ts_ns, now_ns, tenant_id, processor);
            fields.clear();
            ts_ns = None;
            pos = line_end_abs + 1;
            continue;
        }

        match line.iter().position(|&b| b == b'=') {
            Some(eq_idx) => {
                let name = &line[..eq_idx];
                let value = &line[eq_idx + 1..];
                if !is_valid_field_name(name) {
                    return Err(bad_name_error(name));
                }
                handle_field(name, value, &mut fields, &mut ts_ns, config)?;
                pos = line_end_abs + 1;
            }
            None => {
                let name = line;
                if !is_valid_field_name(name) {
                    return Err(bad_name_error(name));
                }
                let after_name_nl = line_end_abs + 1;
                let available = input.len() - after_name_nl;
                if available < 8 {
                    return Err(JournaldError::TruncatedLengthPrefix { available });
                }
                let mut len_bytes = [0u8; 8];
                len_bytes.copy_from_slice(&input[after_name_nl..after_name_nl + 8]);
                let declared = u64::from_le_bytes(len_bytes);
                if declared == 0 {
                    return Err(JournaldError::ZeroLengthBinaryValue);
                }
                let value_start = after_name_nl + 8;
                let remaining = input.len() - value_start;
                if declared > remaining as u64 {
                    return Err(JournaldError::BinaryLengthExceedsBuffer { declared, remaining });
                }
                let declared = declared as usize;
                let value = &input[value_start..value_start + declared];
                let value_end = value_start + declared;
                if value_end >= input.len() {
                    return Err(JournaldError::EmptyBufferAfterBinaryValue);
                }
                if input[value_end] != b'\n' {
                    return Err(JournaldError::MissingNewlineAfterBinaryValue);
                }
                handle_field(name, value, &mut fields, &mut ts_ns, config)?;
                pos = value_end + 1;
            }
        }
    }
}

fn handle_field<'a>(
    name: &'a [u8],
    value: &'a [u8],
    fields: &mut Vec<Field<'a>>,
    ts_ns: &mut Option<i64>,
    config: &JournaldConfig,
) -> Result<(), JournaldError> {
    if name == config.time_field.as_bytes() {
        let text = std::str::from_utf8(value)
            .map_err(|_| JournaldError::NonNumericTimestamp(String::from_utf8_lossy(value).into_owned()))?;
        let micros: i64 = text
            .parse()
            .map_err(|_| JournaldError::NonNumericTimestamp(text.to_string()))?;
        *ts_ns = Some(micros.saturating_mul(1_000));
        return Ok(());
    }

    if !config.include_entry_metadata && name.starts_with(b"__") {
        return Ok(());
    }

    let out_name: &'a [u8] = if config.message_fields.iter().any(|m| m.as_bytes() == name) {
        b"_msg"
    } else {
        name
    };

    fields.push(Field::new(out_name, value));
    Ok(())
}

/// Resolves `config.tenant_id` and the current wall-clock time once, then
/// delegates to [`parse`]. Convenience entry point for callers that don't
/// need to control either independently (tests and scenario replay do).
pub fn parse_request(
    input: &[u8],
    config: &JournaldConfig,
    processor: &mut dyn LogMessageProcessor,
) -> Result<(), JournaldError> {
    let tenant_id = config.parsed_tenant_id()?;
    let now_ns = now_unix_nanos();
    parse(input, config, tenant_id, now_ns, processor)
}

fn now_unix_nanos() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as i64)
}

fn emit_row(
    fields: &[Field<'_>],
    ts_ns: Option<i64>,
    now_ns: i64,
    tenant_id: TenantId,
    processor: &mut dyn LogMessageProcessor,
) {
    if fields.is_empty() {
        return;
    }
    processor.add_row(tenant_id, ts_ns.unwrap_or(now_ns), fields, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingProcessor {
        rows: Vec<(TenantId, i64, Vec<(Vec<u8>, Vec<u8>)>)>,
    }

    impl LogMessageProcessor for RecordingProcessor {
        fn add_row(
            &mut self,
            tenant_id: TenantId,
            timestamp_ns: i64,
            fields: &[Field<'_>],
            _stream_fields_override: Option<&[Field<'_>]>,
        ) {
            self.rows.push((
                tenant_id,
                timestamp_ns,
                fields.iter().map(|f| (f.name.to_vec(), f.value.to_vec())).collect(),
            ));
        }

        fn must_close(&mut self) {}
    }

    fn tenant() -> TenantId {
        TenantId::new(0, 0)
    }

    #[test]
    fn s5_text_record_resolves_timestamp_and_aliases_message() {
        let input = b"MESSAGE=hi\n__REALTIME_TIMESTAMP=1700000000000000\n\n";
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        parse(input, &config, tenant(), 0, &mut proc).unwrap();

        assert_eq!(proc.rows.len(), 1);
        let (_, ts, fields) = &proc.rows[0];
        assert_eq!(*ts, 1_700_000_000_000_000_000);
        assert_eq!(fields, &vec![(b"_msg".to_vec(), b"hi".to_vec())]);
    }

    #[test]
    fn s6_binary_record_yields_raw_bytes_and_falls_back_to_now() {
        // "DATA" introduces a 5-byte binary value containing an embedded
        // NUL and newline, followed by the mandatory trailing newline and a
        // blank-line terminator.
        let value: &[u8] = b"a\x00b\nc";
        let mut input = Vec::new();
        input.extend_from_slice(b"DATA\n");
        input.extend_from_slice(&(value.len() as u64).to_le_bytes());
        input.extend_from_slice(value);
        input.push(b'\n');
        input.push(b'\n');

        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        parse(&input, &config, tenant(), 42, &mut proc).unwrap();

        assert_eq!(proc.rows.len(), 1);
        let (_, ts, fields) = &proc.rows[0];
        assert_eq!(*ts, 42, "record without a timestamp field falls back to now_ns");
        assert_eq!(fields, &vec![(b"DATA".to_vec(), value.to_vec())]);
    }

    #[test]
    fn s7_bad_name_is_a_hard_error_with_no_rows_emitted() {
        let input = b"1BAD=x\n";
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        let err = parse(input, &config, tenant(), 0, &mut proc).unwrap_err();
        assert!(matches!(err, JournaldError::BadFieldName(_)));
        assert!(proc.rows.is_empty());
    }

    #[test]
    fn metadata_fields_are_dropped_unless_configured_to_be_kept() {
        let input = b"__CURSOR=abc\nMESSAGE=hi\n\n";
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        parse(input, &config, tenant(), 1, &mut proc).unwrap();
        let (_, _, fields) = &proc.rows[0];
        assert_eq!(fields, &vec![(b"_msg".to_vec(), b"hi".to_vec())]);

        let config = JournaldConfig {
            include_entry_metadata: true,
            ..Default::default()
        };
        let mut proc = RecordingProcessor::default();
        parse(input, &config, tenant(), 1, &mut proc).unwrap();
        let (_, _, fields) = &proc.rows[0];
        assert!(fields.contains(&(b"__CURSOR".to_vec(), b"abc".to_vec())));
    }

    #[test]
    fn eof_without_blank_line_still_flushes_the_open_record() {
        let input = b"MESSAGE=hi\n";
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        parse(input, &config, tenant(), 7, &mut proc).unwrap();
        assert_eq!(proc.rows.len(), 1);
        assert_eq!(proc.rows[0].1, 7);
    }

    #[test]
    fn row_with_zero_fields_after_filtering_is_not_emitted() {
        let input = b"__CURSOR=abc\n\n";
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        parse(input, &config, tenant(), 0, &mut proc).unwrap();
        assert!(proc.rows.is_empty());
    }

    #[test]
    fn zero_length_binary_value_is_a_hard_error() {
        let mut input = Vec::new();
        input.extend_from_slice(b"DATA\n");
        input.extend_from_slice(&0u64.to_le_bytes());
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        let err = parse(&input, &config, tenant(), 0, &mut proc).unwrap_err();
        assert_eq!(err, JournaldError::ZeroLengthBinaryValue);
    }

    #[test]
    fn binary_length_exceeding_buffer_is_a_hard_error() {
        let mut input = Vec::new();
        input.extend_from_slice(b"DATA\n");
        input.extend_from_slice(&100u64.to_le_bytes());
        input.extend_from_slice(b"short");
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        let err = parse(&input, &config, tenant(), 0, &mut proc).unwrap_err();
        assert!(matches!(err, JournaldError::BinaryLengthExceedsBuffer { .. }));
    }

    #[test]
    fn missing_trailing_newline_after_binary_value_is_a_hard_error() {
        let mut input = Vec::new();
        input.extend_from_slice(b"DATA\n");
        input.extend_from_slice(&3u64.to_le_bytes());
        input.extend_from_slice(b"abcX"); // 3-byte value then a non-newline byte
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        let err = parse(&input, &config, tenant(), 0, &mut proc).unwrap_err();
        assert_eq!(err, JournaldError::MissingNewlineAfterBinaryValue);
    }

    #[test]
    fn empty_buffer_immediately_after_binary_value_is_a_hard_error() {
        let mut input = Vec::new();
        input.extend_from_slice(b"DATA\n");
        input.extend_from_slice(&3u64.to_le_bytes());
        input.extend_from_slice(b"abc"); // ends exactly at the value, no trailing newline byte at all
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        let err = parse(&input, &config, tenant(), 0, &mut proc).unwrap_err();
        assert_eq!(err, JournaldError::EmptyBufferAfterBinaryValue);
    }

    #[test]
    fn truncated_length_prefix_is_a_hard_error() {
        let mut input = Vec::new();
        input.extend_from_slice(b"DATA\n");
        input.extend_from_slice(&[1, 2, 3]); // fewer than 8 bytes
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        let err = parse(&input, &config, tenant(), 0, &mut proc).unwrap_err();
        assert!(matches!(err, JournaldError::TruncatedLengthPrefix { .. }));
    }

    #[test]
    fn non_numeric_timestamp_is_a_hard_error() {
        let input = b"__REALTIME_TIMESTAMP=not-a-number\n\n";
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        let err = parse(input, &config, tenant(), 0, &mut proc).unwrap_err();
        assert!(matches!(err, JournaldError::NonNumericTimestamp(_)));
    }

    #[test]
    fn missing_separator_before_eof_is_a_hard_error() {
        let input = b"MESSAGE=hi"; // no trailing newline at all
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        let err = parse(input, &config, tenant(), 0, &mut proc).unwrap_err();
        assert!(matches!(err, JournaldError::MissingSeparator(_)));
    }

    #[test]
    fn invariant_6_round_trip_preserves_order_after_filters() {
        let input = b"host=h1\nenv=prod\n\n";
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        parse(input, &config, tenant(), 0, &mut proc).unwrap();
        let (_, _, fields) = &proc.rows[0];
        assert_eq!(
            fields,
            &vec![(b"host".to_vec(), b"h1".to_vec()), (b"env".to_vec(), b"prod".to_vec())]
        );
    }

    #[test]
    fn multiple_blank_line_separated_records_each_emit_a_row() {
        let input = b"MESSAGE=first\n\nMESSAGE=second\n\n";
        let config = JournaldConfig::default();
        let mut proc = RecordingProcessor::default();
        parse(input, &config, tenant(), 0, &mut proc).unwrap();
        assert_eq!(proc.rows.len(), 2);
        assert_eq!(proc.rows[0].2, vec![(b"_msg".to_vec(), b"first".to_vec())]);
        assert_eq!(proc.rows[1].2, vec![(b"_msg".to_vec(), b"second".to_vec())]);
    }
}
