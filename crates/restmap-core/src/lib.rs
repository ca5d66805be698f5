//! Core types for restmap.
//!
//! `restmap-core` is the foundation layer: it defines the schema descriptor
//! model, the type caster, the record representation, the error taxonomy,
//! and the transport contract every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Data model**: [`SchemaDescriptor`] with tagged [`FieldDescriptor`]
//!   variants (`Column` / `BelongsTo` / `HasMany`), resolved once at schema
//!   construction so query-time code never sniffs field shapes.
//! - **Contract layer**: [`Transport`] is implemented by storage drivers;
//!   everything above it sees raw rows as [`Record`]s.
//! - **Normalization**: the [`cast`] module converts the engine's textual
//!   values into typed ones per the declared column types.
//!
//! # Who Uses This Crate
//!
//! - `restmap-query` consumes descriptors to build SQL strings.
//! - `restmap` composes caster + builder + transport into per-entity
//!   gateways, the relations engine, and the request pipeline.

pub mod cast;
pub mod error;
pub mod record;
pub mod resolve;
pub mod schema;
pub mod transport;

pub use cast::{NOT_A_NUMBER, cast_field, cast_record, cast_records, cast_value};
pub use error::{Error, Result};
pub use record::{Record, dedupe_ids, id_key, id_ref, record_id, ref_id};
pub use resolve::{find_inverse, validate_schemas};
pub use schema::{
    BelongsTo, BelongsToLink, ColumnType, FieldDescriptor, HasMany, HasManyLink, SchemaBuilder,
    SchemaDescriptor, camel_case,
};
pub use transport::{SharedTransport, Transport, scope, shared, transaction};
