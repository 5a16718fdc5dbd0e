// SPDX-License-Identifier: Apache-2.0

//! Configuration types for the batch and the journald parser.
//!
//! Plain `serde`-derived structs with `#[serde(default = "...")]` per
//! optional field, so this config can be embedded in a larger pipeline
//! configuration document.

use serde::Deserialize;

use crate::stream_id::TenantId;

/// Configuration for a [`crate::log_rows::LogRows`] batch. Immutable across
/// `reset_keep_settings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogRowsConfig {
    /// Field names that participate in the stream identity by default.
    #[serde(default)]
    pub stream_fields: Vec<String>,
    /// Literal or `prefix*` field names dropped from the row and from
    /// stream derivation.
    #[serde(default)]
    pub ignore_fields: Vec<String>,
    /// Fields appended to every row. Their names are implicitly added to
    /// `ignore_fields` so a producer cannot override them.
    #[serde(default)]
    pub extra_fields: Vec<(String, String)>,
    /// String substituted for `_msg` when an accepted row has none, after
    /// filtering. Empty string disables the substitution.
    #[serde(default)]
    pub default_msg_value: String,
}

fn default_time_field() -> String {
    "__REALTIME_TIMESTAMP".to_string()
}

fn default_tenant_id() -> String {
    "0:0".to_string()
}

fn default_message_fields() -> Vec<String> {
    vec!["MESSAGE".to_string()]
}

const fn default_max_request_size() -> usize {
    64 * 1024 * 1024
}

/// Configuration for the journald Journal Export Format parser.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournaldConfig {
    /// Default stream fields.
    #[serde(default)]
    pub stream_fields: Vec<String>,
    /// Default ignored fields, supports `prefix*`.
    #[serde(default)]
    pub ignore_fields: Vec<String>,
    /// Field name carrying the entry's timestamp.
    #[serde(default = "default_time_field")]
    pub time_field: String,
    /// Field names that get renamed to `_msg` (journald's own convention is
    /// `MESSAGE`).
    #[serde(default = "default_message_fields")]
    pub message_fields: Vec<String>,
    /// `"acct:proj"` tenant id.
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    /// Whether journald's own `__`-prefixed metadata fields are kept.
    #[serde(default)]
    pub include_entry_metadata: bool,
    /// Maximum accepted request body size in bytes, enforced by the
    /// external decompression/transport layer ahead of this parser, not by
    /// [`crate::journald::parse`] itself. Carried here only so a single
    /// config document can configure both layers.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

impl Default for JournaldConfig {
    fn default() -> Self {
        Self {
            stream_fields: Vec::new(),
            ignore_fields: Vec::new(),
            time_field: default_time_field(),
            message_fields: default_message_fields(),
            tenant_id: default_tenant_id(),
            include_entry_metadata: false,
            max_request_size: default_max_request_size(),
        }
    }
}

/// Error returned by [`JournaldConfig::parsed_tenant_id`] for a malformed
/// `"acct:proj"` string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid tenant id {0:?}, expected \"account:project\"")]
pub struct TenantIdParseError(pub String);

impl JournaldConfig {
    /// Parses `tenant_id` (`"acct:proj"`) into a [`TenantId`].
    pub fn parsed_tenant_id(&self) -> Result<TenantId, TenantIdParseError> {
        parse_tenant_id(&self.tenant_id)
    }
}

/// Parses a `"acct:proj"` string into a [`TenantId`].
pub fn parse_tenant_id(s: &str) -> Result<TenantId, TenantIdParseError> {
    let (acct, proj) = s
        .split_once(':')
        .ok_or_else(|| TenantIdParseError(s.to_string()))?;
    let account_id: u32 = acct.parse().map_err(|_| TenantIdParseError(s.to_string()))?;
    let project_id: u32 = proj.parse().map_err(|_| TenantIdParseError(s.to_string()))?;
    Ok(TenantId::new(account_id, project_id))
}
