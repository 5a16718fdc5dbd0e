// SPDX-License-Identifier: Apache-2.0

//! The borrowed (name, value) pair producers hand to [`crate::sink`].

use serde::Serialize;

/// A single `(name, value)` pair as received from a producer, before
/// ingestion normalizes it.
///
/// Both `name` and `value` are opaque byte sequences — journald binary
/// field values may contain arbitrary bytes, including NULs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    /// Field name.
    pub name: &'a [u8],
    /// Field value.
    pub value: &'a [u8],
}

impl<'a> Field<'a> {
    /// Builds a field from a pair of byte slices.
    #[must_use]
    pub const fn new(name: &'a [u8], value: &'a [u8]) -> Self {
        Self { name, value }
    }
}

/// A lossy, UTF-8 JSON view of a [`Field`], used only for diagnostic log
/// lines when a dropped row is serialized into a warning. Ingestion itself
/// never lossily converts field bytes.
#[derive(Serialize)]
pub struct FieldJson<'a> {
    name: std::borrow::Cow<'a, str>,
    value: std::borrow::Cow<'a, str>,
}

impl<'a> From<Field<'a>> for FieldJson<'a> {
    fn from(f: Field<'a>) -> Self {
        Self {
            name: String::from_utf8_lossy(f.name),
            value: String::from_utf8_lossy(f.value),
        }
    }
}
