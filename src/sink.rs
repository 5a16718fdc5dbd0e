// SPDX-License-Identifier: Apache-2.0

//! The narrow sink interface that decouples producers (e.g. the journald
//! parser) from the batch and the downstream block writer.

use crate::field::Field;
use crate::stream_id::TenantId;

/// The contract a batch exposes to producers.
///
/// `stream_fields_override`, when `Some`, replaces the configured
/// `stream_fields` set for this one row only, without mutating shared
/// configuration.
pub trait LogMessageProcessor {
    /// Appends a row. Never fails: rows that violate a cap are dropped and
    /// logged, not returned as an error.
    fn add_row(
        &mut self,
        tenant_id: TenantId,
        timestamp_ns: i64,
        fields: &[Field<'_>],
        stream_fields_override: Option<&[Field<'_>]>,
    );

    /// Flushes and releases any resources the processor holds. Idempotent
    /// is not required; callers invoke it exactly once per lifecycle.
    fn must_close(&mut self);
}
