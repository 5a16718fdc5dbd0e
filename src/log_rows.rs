// SPDX-License-Identifier: Apache-2.0

//! The batch: accepts rows, derives stream identity, interns field bytes
//! into an arena with adjacent-row reuse, and exposes a pre-flush sort.
//!
//! A [`LogRows`] is acquired from [`get_log_rows`], filled by repeated
//! [`LogRows::must_add`] calls, flushed (sorted, read, `reset_keep_settings`),
//! and eventually returned via [`put_log_rows`].

use tracing::warn;

use crate::arena::Arena;
use crate::config::LogRowsConfig;
use crate::field::{Field, FieldJson};
use crate::fields_filter::FieldsFilter;
use crate::pool::{Pool, Poolable};
use crate::sink::LogMessageProcessor;
use crate::stream_id::{StreamId, TenantId};
use crate::stream_tags::StreamTags;
use crate::timefmt::format_rfc3339_nano;

use ahash::AHashSet;

/// Maximum number of fields accepted in a single row.
pub const MAX_COLUMNS_PER_BLOCK: usize = 2_000;
/// Maximum length, in bytes, of a single field name.
pub const MAX_FIELD_NAME_SIZE: usize = 128;
/// Soft cap on a batch's total arena usage. Drives both per-row admission
/// and [`LogRows::need_flush`].
pub const MAX_UNCOMPRESSED_BLOCK_SIZE: usize = 128 * 1024 * 1024;

/// An empty name or value never needs arena storage: any zero-length range
/// slices to `&[]` regardless of which arena or offset it names.
const EMPTY: ByteRef = ByteRef::Config((0, 0));

/// A byte range into either the row arena or the long-lived configuration
/// arena, so `extra_fields`/`default_msg_value` bytes are copied once at
/// configure time and never re-copied per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRef {
    Row((usize, usize)),
    Config((usize, usize)),
}

fn resolve_ref<'a>(arena: &'a Arena, config_arena: &'a Arena, r: ByteRef) -> &'a [u8] {
    match r {
        ByteRef::Row(range) => arena.slice(range),
        ByteRef::Config(range) => config_arena.slice(range),
    }
}

#[derive(Debug, Clone, Copy)]
struct StoredField {
    name: ByteRef,
    value: ByteRef,
}

#[derive(Debug, Clone, Copy)]
struct ExtraField {
    name: ByteRef,
    value: ByteRef,
    is_msg: bool,
}

/// Why a row was dropped at admission. Never surfaced as a `Result::Err` —
/// row-level cap violations are bounded-loss, logged, and ingestion
/// continues with the next row.
#[derive(Debug)]
enum DropReason {
    TooManyFields { count: usize },
    FieldNameTooLong { name_len: usize },
    RowTooLarge { estimated: usize },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooManyFields { count } => write!(
                f,
                "row has {count} fields, exceeding the {MAX_COLUMNS_PER_BLOCK}-field cap"
            ),
            Self::FieldNameTooLong { name_len } => write!(
                f,
                "field name is {name_len} bytes, exceeding the {MAX_FIELD_NAME_SIZE}-byte cap"
            ),
            Self::RowTooLarge { estimated } => write!(
                f,
                "row's estimated size is {estimated} bytes, exceeding the {MAX_UNCOMPRESSED_BLOCK_SIZE}-byte cap"
            ),
        }
    }
}

/// Estimates the JSON-encoded size of a row, used only for admission
/// accounting: `3 + 12 + |RFC3339Nano| + sum(6 + max(|name|, 4) + |value|)`.
fn estimate_row_json_size(timestamp_ns: i64, fields: &[Field<'_>]) -> usize {
    let rfc3339_len = format_rfc3339_nano(timestamp_ns).len();
    let mut n = 3 + 12 + rfc3339_len;
    for f in fields {
        n += 6 + f.name.len().max(4) + f.value.len();
    }
    n
}

static STREAM_TAGS_POOL: Pool<StreamTags> = Pool::new(StreamTags::default);

/// The batch: accumulates rows, derives stream identity, and exposes a
/// pre-flush sort over `(stream_id, timestamp_ns)`.
#[derive(Debug, Default)]
pub struct LogRows {
    // Configuration, cleared only by `reset` (not `reset_keep_settings`).
    stream_fields: AHashSet<Vec<u8>>,
    ignore_fields: FieldsFilter,
    extra_fields: Vec<ExtraField>,
    extra_stream_fields: Vec<(Vec<u8>, Vec<u8>)>,
    default_msg_value: Option<ByteRef>,
    config_arena: Arena,

    // Row data, cleared by `reset_keep_settings`.
    arena: Arena,
    fields_buf: Vec<StoredField>,
    rows: Vec<(usize, usize)>,
    stream_ids: Vec<StreamId>,
    timestamps: Vec<i64>,
    stream_tags_canonicals: Vec<(usize, usize)>,
    last_canonical: Option<(usize, usize)>,
    prev_input_fields: Vec<StoredField>,
    canon_scratch: Vec<u8>,
}

impl LogRows {
    /// Builds a configured, empty batch directly (bypassing the pool).
    /// Prefer [`get_log_rows`]/[`put_log_rows`] on a hot ingestion path.
    #[must_use]
    pub fn new(config: LogRowsConfig) -> Self {
        let mut rows = Self::default();
        rows.configure(config);
        rows
    }

    /// Applies `config`, replacing any prior settings. Only meaningful on a
    /// freshly reset batch — call sites acquiring from the pool always see
    /// one, since `put` fully resets before returning a batch to the pool.
    pub fn configure(&mut self, config: LogRowsConfig) {
        let mut stream_fields: AHashSet<Vec<u8>> = config
            .stream_fields
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect();

        let mut ignore_fields = FieldsFilter::new();
        for name in &config.ignore_fields {
            ignore_fields.add(name);
        }

        let mut extra_fields = Vec::with_capacity(config.extra_fields.len());
        let mut extra_stream_fields = Vec::new();
        for (name, value) in &config.extra_fields {
            // Auto-added so a producer cannot override a configured extra field.
            ignore_fields.add(name);

            let is_msg = name == "_msg";
            let name_ref = if is_msg {
                EMPTY
            } else {
                ByteRef::Config(self.config_arena.copy_bytes(name.as_bytes()))
            };
            let value_ref = ByteRef::Config(self.config_arena.copy_bytes(value.as_bytes()));
            extra_fields.push(ExtraField {
                name: name_ref,
                value: value_ref,
                is_msg,
            });

            if stream_fields.remove(name.as_bytes()) {
                extra_stream_fields.push((name.as_bytes().to_vec(), value.as_bytes().to_vec()));
            }
        }

        self.default_msg_value = if config.default_msg_value.is_empty() {
            None
        } else {
            Some(ByteRef::Config(
                self.config_arena
                    .copy_bytes(config.default_msg_value.as_bytes()),
            ))
        };

        self.stream_fields = stream_fields;
        self.ignore_fields = ignore_fields;
        self.extra_fields = extra_fields;
        self.extra_stream_fields = extra_stream_fields;
    }

    /// Number of accepted rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows have been accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row `i`'s stream id.
    #[must_use]
    pub fn stream_id(&self, i: usize) -> StreamId {
        self.stream_ids[i]
    }

    /// Row `i`'s timestamp, in nanoseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_ns(&self, i: usize) -> i64 {
        self.timestamps[i]
    }

    /// Row `i`'s canonical stream-tag bytes (the hash pre-image).
    #[must_use]
    pub fn stream_tags_canonical(&self, i: usize) -> &[u8] {
        self.arena.slice(self.stream_tags_canonicals[i])
    }

    /// Row `i`'s fields as `(name, value)` byte-slice pairs, in their
    /// current order (sorted by name if [`LogRows::sort`] has run).
    pub fn row_fields(&self, i: usize) -> impl Iterator<Item = (&[u8], &[u8])> {
        let (start, end) = self.rows[i];
        self.fields_buf[start..end].iter().map(move |f| {
            (
                resolve_ref(&self.arena, &self.config_arena, f.name),
                resolve_ref(&self.arena, &self.config_arena, f.value),
            )
        })
    }

    /// `true` once arena usage crosses 7/8 of the block cap; the sole
    /// backpressure signal. The caller decides when to flush.
    #[must_use]
    pub fn need_flush(&self) -> bool {
        self.arena.len() > (MAX_UNCOMPRESSED_BLOCK_SIZE / 8) * 7
    }

    fn resolve(&self, r: ByteRef) -> &[u8] {
        resolve_ref(&self.arena, &self.config_arena, r)
    }

    fn check_caps(&self, timestamp_ns: i64, fields: &[Field<'_>]) -> Option<DropReason> {
        if fields.len() > MAX_COLUMNS_PER_BLOCK {
            return Some(DropReason::TooManyFields {
                count: fields.len(),
            });
        }
        if let Some(f) = fields.iter().find(|f| f.name.len() > MAX_FIELD_NAME_SIZE) {
            return Some(DropReason::FieldNameTooLong {
                name_len: f.name.len(),
            });
        }
        let estimated = estimate_row_json_size(timestamp_ns, fields);
        if estimated > MAX_UNCOMPRESSED_BLOCK_SIZE {
            return Some(DropReason::RowTooLarge { estimated });
        }
        None
    }

    fn log_drop(&self, reason: &DropReason, timestamp_ns: i64, fields: &[Field<'_>]) {
        let json_fields: Vec<FieldJson<'_>> = fields.iter().map(|f| FieldJson::from(*f)).collect();
        let row = serde_json::json!({
            "timestamp_ns": timestamp_ns,
            "fields": json_fields,
        });
        warn!(
            reason = %reason,
            row = %row,
            "dropping row: exceeds an ingestion cap, see the ingestion limits documentation",
        );
    }

    fn assemble_stream_tags(
        &self,
        tags: &mut StreamTags,
        fields: &[Field<'_>],
        stream_fields_override: Option<&[Field<'_>]>,
    ) {
        match stream_fields_override {
            Some(over) => {
                for f in over {
                    if !self.ignore_fields.matches(f.name) {
                        tags.add(f.name, f.value);
                    }
                }
            }
            None => {
                for f in fields {
                    if self.stream_fields.contains(f.name) {
                        tags.add(f.name, f.value);
                    }
                }
                for (name, value) in &self.extra_stream_fields {
                    tags.add(name, value);
                }
            }
        }
    }

    fn intern_canonical(&mut self) -> (usize, usize) {
        if let Some(prev_range) = self.last_canonical {
            if self.arena.slice(prev_range) == self.canon_scratch.as_slice() {
                return prev_range;
            }
        }
        let range = self.arena.copy_bytes(&self.canon_scratch);
        self.last_canonical = Some(range);
        range
    }

    fn intern_bytes(&mut self, prev: Option<ByteRef>, bytes: &[u8]) -> ByteRef {
        if bytes.is_empty() {
            return EMPTY;
        }
        if let Some(p) = prev {
            if self.resolve(p) == bytes {
                return p;
            }
        }
        ByteRef::Row(self.arena.copy_bytes(bytes))
    }

    /// Appends one row, in order: validates caps, derives the stream id,
    /// interns field bytes with adjacent-row reuse, and appends
    /// `extra_fields` and the default `_msg` substitution. Never fails —
    /// a row that violates a cap is dropped, logged, and ingestion
    /// continues.
    pub fn must_add(
        &mut self,
        tenant_id: TenantId,
        timestamp_ns: i64,
        fields: &[Field<'_>],
        stream_fields_override: Option<&[Field<'_>]>,
    ) {
        if let Some(reason) = self.check_caps(timestamp_ns, fields) {
            self.log_drop(&reason, timestamp_ns, fields);
            return;
        }

        let mut tags = STREAM_TAGS_POOL.get();
        self.assemble_stream_tags(&mut tags, fields, stream_fields_override);
        self.canon_scratch.clear();
        tags.marshal_canonical(&mut self.canon_scratch);
        let stream_id = StreamId::new(tenant_id, &self.canon_scratch);
        STREAM_TAGS_POOL.put(tags);

        let canonical_view = self.intern_canonical();

        let row_start = self.fields_buf.len();
        let mut has_msg = false;
        let mut cur_input_fields = Vec::with_capacity(fields.len());

        for f in fields {
            if self.ignore_fields.matches(f.name) || f.value.is_empty() {
                continue;
            }
            let is_msg_name = f.name == b"_msg";
            let name_bytes: &[u8] = if is_msg_name { b"" } else { f.name };
            if is_msg_name {
                has_msg = true;
            }

            let pos = cur_input_fields.len();
            let prev: Option<StoredField> = self.prev_input_fields.get(pos).copied();
            let name_ref = self.intern_bytes(prev.map(|p| p.name), name_bytes);
            let value_ref = self.intern_bytes(prev.map(|p| p.value), f.value);

            let stored = StoredField {
                name: name_ref,
                value: value_ref,
            };
            cur_input_fields.push(stored);
            self.fields_buf.push(stored);
        }

        self.prev_input_fields = cur_input_fields;

        for ef in &self.extra_fields {
            self.fields_buf.push(StoredField {
                name: ef.name,
                value: ef.value,
            });
            if ef.is_msg {
                has_msg = true;
            }
        }

        if !has_msg {
            if let Some(default_ref) = self.default_msg_value {
                self.fields_buf.push(StoredField {
                    name: EMPTY,
                    value: default_ref,
                });
            }
        }

        let row_end = self.fields_buf.len();
        self.rows.push((row_start, row_end));
        self.stream_ids.push(stream_id);
        self.timestamps.push(timestamp_ns);
        self.stream_tags_canonicals.push(canonical_view);
    }

    /// Sorts each row's fields by name (stable), then sorts rows by
    /// `(stream_id, timestamp_ns)`. The row sort does not reorder fields
    /// within a row a second time.
    pub fn sort(&mut self) {
        self.sort_fields_within_rows();
        self.sort_rows();
    }

    fn sort_fields_within_rows(&mut self) {
        let arena = &self.arena;
        let config_arena = &self.config_arena;
        for &(start, end) in &self.rows {
            self.fields_buf[start..end].sort_by(|a, b| {
                resolve_ref(arena, config_arena, a.name).cmp(resolve_ref(arena, config_arena, b.name))
            });
        }
    }

    fn sort_rows(&mut self) {
        let n = self.rows.len();
        let mut idx: Vec<usize> = (0..n).collect();
        idx.sort_by(|&a, &b| {
            self.stream_ids[a]
                .cmp(&self.stream_ids[b])
                .then_with(|| self.timestamps[a].cmp(&self.timestamps[b]))
        });

        self.stream_ids = idx.iter().map(|&i| self.stream_ids[i]).collect();
        self.timestamps = idx.iter().map(|&i| self.timestamps[i]).collect();
        self.stream_tags_canonicals = idx.iter().map(|&i| self.stream_tags_canonicals[i]).collect();
        self.rows = idx.iter().map(|&i| self.rows[i]).collect();
    }

    /// Clears the arena and all per-row vectors; configuration and
    /// capacities are untouched.
    pub fn reset_keep_settings(&mut self) {
        self.arena.reset();
        self.fields_buf.clear();
        self.rows.clear();
        self.stream_ids.clear();
        self.timestamps.clear();
        self.stream_tags_canonicals.clear();
        self.last_canonical = None;
        self.prev_input_fields.clear();
        self.canon_scratch.clear();
    }

    /// Full reset: [`LogRows::reset_keep_settings`] plus clearing all
    /// configuration. Required before a batch can be reused for a
    /// different caller (enforced by [`Pool::put`] via [`Poolable`]).
    pub fn reset(&mut self) {
        self.reset_keep_settings();
        self.stream_fields.clear();
        self.ignore_fields.reset();
        self.extra_fields.clear();
        self.extra_stream_fields.clear();
        self.default_msg_value = None;
        self.config_arena.reset();
    }
}

impl Poolable for LogRows {
    fn reset(&mut self) {
        LogRows::reset(self);
    }
}

impl LogMessageProcessor for LogRows {
    fn add_row(
        &mut self,
        tenant_id: TenantId,
        timestamp_ns: i64,
        fields: &[Field<'_>],
        stream_fields_override: Option<&[Field<'_>]>,
    ) {
        self.must_add(tenant_id, timestamp_ns, fields, stream_fields_override);
    }

    fn must_close(&mut self) {
        // No resources beyond the arena and configuration, both reclaimed
        // by `reset` when the batch is returned to its pool.
    }
}

static LOG_ROWS_POOL: Pool<LogRows> = Pool::new(LogRows::default);

/// Acquires a batch from the shared pool and applies `config`.
#[must_use]
pub fn get_log_rows(config: LogRowsConfig) -> LogRows {
    let mut rows = LOG_ROWS_POOL.get();
    rows.configure(config);
    rows
}

/// Returns `rows` to the shared pool after a full reset.
pub fn put_log_rows(rows: LogRows) {
    LOG_ROWS_POOL.put(rows);
}

/// Guards tests that assert on the process-wide pool's idle count, since
/// `cargo test` runs test functions concurrently within one process.
#[cfg(test)]
static POOL_TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
