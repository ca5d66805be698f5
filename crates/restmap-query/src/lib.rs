//! SQL statement construction for restmap.
//!
//! This crate turns a [`restmap_core::SchemaDescriptor`] into SQL query
//! strings: projections, select-many with correlated `whereIn` subqueries,
//! select-one by id or by value match, positional inserts, updates, and
//! deletes. Everything here is pure string generation — execution lives in
//! the `restmap` facade, and quoting (this mapper's entire injection story)
//! lives in [`quote`].

pub mod builder;
pub mod options;
pub mod quote;

pub use builder::{SchemaMixin, SqlBuilder};
pub use options::{
    FIELDS_ID, FIELDS_ID_AND_RELATIONS, OneOrMany, SelectManyOptions, SelectOneOptions, WhereIn,
};
pub use quote::{equality_predicate, quote_untyped, quote_value_if_string};
