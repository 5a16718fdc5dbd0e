// SPDX-License-Identifier: Apache-2.0

//! # logstream-ingest
//!
//! The log-row ingestion front-end of a columnar log store: accepts batches
//! of structured log entries (a timestamp plus an ordered list of
//! name/value fields), normalizes them, derives a stream identity from a
//! configurable subset of fields, validates and deduplicates content into
//! compact backing storage, and hands a sort-ready batch to a downstream
//! block writer.
//!
//! Also included: a parser for systemd's Journal Export Format, the most
//! intricate external producer of such batches.
//!
//! ## Modules
//! - [`arena`]: append-only byte storage backing a batch.
//! - [`pool`]: a small generic object pool used for batches and stream tags.
//! - [`fields_filter`]: literal/prefix-wildcard field name matching.
//! - [`stream_tags`]: ordered (name, value) pairs and their canonical form.
//! - [`stream_id`]: `(tenant, hash128)` stream identity and its ordering.
//! - [`log_rows`]: the batch itself — `MustAdd`, flush/sort, reset.
//! - [`sink`]: the narrow producer-facing contract batches are fed through.
//! - [`journald`]: the Journal Export Format parser.
//! - [`config`]: configuration types shared by the batch and the parser.

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod arena;
pub mod config;
pub mod field;
pub mod fields_filter;
pub mod journald;
pub mod log_rows;
pub mod pool;
pub mod sink;
pub mod stream_id;
pub mod stream_tags;

mod timefmt;

pub use config::{JournaldConfig, LogRowsConfig};
pub use field::Field;
pub use journald::{parse as parse_journald, parse_request as parse_journald_request, JournaldError};
pub use log_rows::{get_log_rows, put_log_rows, LogRows};
pub use sink::LogMessageProcessor;
pub use stream_id::{StreamId, TenantId};
