//! Per-schema SQL statement construction.
//!
//! A [`SqlBuilder`] is constructed once per schema descriptor; every method
//! is pure string generation with no I/O. Statements it produces:
//!
//! - select-many with flat equality filters, correlated `whereIn`
//!   subqueries, ordering, and projection control
//! - select-one by primary key or by value equality over declared fields
//! - insert/update from the intersection of declared fields with the fields
//!   actually present in the data
//! - delete by primary key
//!
//! Column/value ordering follows schema declaration order throughout, so
//! insert field lists and value lists correspond positionally.

use std::sync::Arc;

use serde_json::Value;

use restmap_core::error::{Error, Result};
use restmap_core::record::{Record, ref_id};
use restmap_core::schema::{ColumnType, FieldDescriptor, SchemaDescriptor};

use crate::options::{
    FIELDS_ID, FIELDS_ID_AND_RELATIONS, OneOrMany, SelectManyOptions, SelectOneOptions, WhereIn,
};
use crate::quote::{equality_predicate, quote_untyped, quote_value_if_string};

/// Additional private field declarations merged in for a single insert
/// (the "schema mixin"); never part of the public schema.
pub type SchemaMixin = Vec<(String, ColumnType)>;

/// Statement builder bound to one entity schema.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    schema: Arc<SchemaDescriptor>,
}

impl SqlBuilder {
    /// Bind a builder to a schema.
    #[must_use]
    pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
        Self { schema }
    }

    /// The schema this builder generates statements for.
    #[must_use]
    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    // ------------------------------------------------------------------
    // Projection
    // ------------------------------------------------------------------

    /// The projection clause for a `fieldsOnly` option.
    ///
    /// Default: primary key aliased to `id`, all plain columns, all
    /// belongs-to foreign keys under their aliases. `"id"` selects only the
    /// primary-key clause; `"idAndRelations"` adds the foreign keys but no
    /// plain columns. An explicit list filters columns and belongs-to
    /// fields to the intersection; has-many fields never project.
    #[must_use]
    pub fn projection(&self, fields_only: Option<&OneOrMany>) -> String {
        self.projection_clauses(fields_only).join(", ")
    }

    fn projection_clauses(&self, fields_only: Option<&OneOrMany>) -> Vec<String> {
        let id_field = self.schema.id_field();
        let pk_clause = if id_field == "id" {
            "id".to_string()
        } else {
            format!("{id_field} as id")
        };

        let bt_clause = |link: &restmap_core::schema::BelongsTo| {
            if link.fk_column == link.fk_alias {
                link.fk_column.clone()
            } else {
                format!("{} as {}", link.fk_column, link.fk_alias)
            }
        };

        let mut clauses = vec![pk_clause];
        match fields_only {
            Some(OneOrMany::One(s)) if s == FIELDS_ID => {}
            Some(OneOrMany::One(s)) if s == FIELDS_ID_AND_RELATIONS => {
                clauses.extend(self.schema.belongs_to_links().map(bt_clause));
            }
            None => {
                for (name, _) in self.schema.columns() {
                    clauses.push(name.to_string());
                }
                clauses.extend(self.schema.belongs_to_links().map(bt_clause));
            }
            Some(list) => {
                let wanted = list.items();
                for (name, _) in self.schema.columns() {
                    if wanted.contains(&name) {
                        clauses.push(name.to_string());
                    }
                }
                clauses.extend(
                    self.schema
                        .belongs_to_links()
                        .filter(|b| {
                            wanted.contains(&b.field_name.as_str())
                                || wanted.contains(&b.fk_alias.as_str())
                        })
                        .map(bt_clause),
                );
            }
        }
        clauses
    }

    // ------------------------------------------------------------------
    // Selects
    // ------------------------------------------------------------------

    /// Build a multi-row select.
    ///
    /// A scalar `id` filter is rejected here — single-row lookups are
    /// [`select_one`](Self::select_one)'s contract. An id *set* (array
    /// value) is the batched fetch and passes.
    pub fn select_many(&self, opts: &SelectManyOptions) -> Result<String> {
        if let Some(where_) = &opts.where_ {
            for key in ["id", self.schema.id_field()] {
                if where_.get(key).is_some_and(|v| !v.is_array()) {
                    return Err(Error::usage(
                        "single-row `id` filter passed to selectMany; use selectOne",
                    ));
                }
            }
        }

        let mut predicates = Vec::new();
        if let Some(where_) = &opts.where_ {
            predicates.extend(self.where_predicates(where_)?);
        }
        if let Some(where_in) = &opts.where_in {
            predicates.push(self.where_in_predicate(where_in)?);
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            self.projection(opts.fields_only.as_ref()),
            self.schema.table_name()
        );
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        if let Some(order_by) = &opts.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by.items().join(", "));
        }
        Ok(sql)
    }

    /// Build the batched `WHERE <id> IN (...)` fetch over an id set.
    pub fn select_by_ids(&self, ids: &[Value], fields_only: Option<&OneOrMany>) -> Result<String> {
        if ids.is_empty() {
            return Err(Error::usage("select_by_ids requires at least one id"));
        }
        let quoted: Result<Vec<String>> = ids.iter().map(|id| quote_untyped(Some(id))).collect();
        Ok(format!(
            "SELECT {} FROM {} WHERE {} IN ({})",
            self.projection(fields_only),
            self.schema.table_name(),
            self.schema.id_field(),
            quoted?.join(", ")
        ))
    }

    /// Build a single-row select.
    ///
    /// Exactly one of `id`/`data` must identify the row; `where` may only
    /// accompany `id`.
    pub fn select_one(&self, opts: &SelectOneOptions) -> Result<String> {
        let predicates = match (&opts.id, &opts.data) {
            (Some(_), Some(_)) => {
                return Err(Error::usage("both `id` and `data` options are provided"));
            }
            (None, None) => {
                return Err(Error::usage("neither `id` nor `data` option is provided"));
            }
            (Some(id), None) => {
                let mut predicates = vec![format!(
                    "{}={}",
                    self.schema.id_field(),
                    quote_untyped(Some(id))?
                )];
                if let Some(where_) = &opts.where_ {
                    predicates.extend(self.where_predicates(where_)?);
                }
                predicates
            }
            (None, Some(data)) => {
                if opts.where_.is_some() {
                    return Err(Error::usage("`where` may only accompany `id`, not `data`"));
                }
                self.data_predicates(data)?
            }
        };

        let mut sql = format!(
            "SELECT {} FROM {}",
            self.projection(opts.fields_only.as_ref()),
            self.schema.table_name()
        );
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }
        Ok(sql)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Build an insert from the fields present in `data` that are declared
    /// plain columns, belongs-to references, or mixin private fields.
    pub fn insert(&self, data: &Record, mixin: Option<&SchemaMixin>) -> Result<String> {
        let (columns, values) = self.write_pairs(data, mixin)?;
        if columns.is_empty() {
            return Err(Error::usage("insert data contains no declared fields"));
        }
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.schema.table_name(),
            columns.join(", "),
            values.join(", ")
        ))
    }

    /// Build an update of the declared fields present in `data`, keyed by
    /// primary key. Has-many fields are never updatable this way.
    pub fn update(&self, id: &Value, data: &Record) -> Result<String> {
        let (columns, values) = self.write_pairs(data, None)?;
        if columns.is_empty() {
            return Err(Error::usage("update data contains no declared fields"));
        }
        let assignments: Vec<String> = columns
            .iter()
            .zip(&values)
            .map(|(c, v)| format!("{c}={v}"))
            .collect();
        Ok(format!(
            "UPDATE {} SET {} WHERE {}={}",
            self.schema.table_name(),
            assignments.join(", "),
            self.schema.id_field(),
            quote_untyped(Some(id))?
        ))
    }

    /// Build a delete by primary key.
    pub fn delete(&self, id: &Value) -> Result<String> {
        Ok(format!(
            "DELETE FROM {} WHERE {}={}",
            self.schema.table_name(),
            self.schema.id_field(),
            quote_untyped(Some(id))?
        ))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Column/value lists in schema declaration order, positionally aligned.
    fn write_pairs(
        &self,
        data: &Record,
        mixin: Option<&SchemaMixin>,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (name, descriptor) in self.schema.fields() {
            match descriptor {
                FieldDescriptor::Column(ty) => {
                    if let Some(value) = data.get(name) {
                        columns.push(name.clone());
                        values.push(quote_value_if_string(*ty, Some(value))?);
                    }
                }
                FieldDescriptor::BelongsTo(link) => {
                    let present = data.get(name).or_else(|| data.get(&link.fk_alias));
                    if let Some(value) = present {
                        columns.push(link.fk_column.clone());
                        values.push(quote_untyped(ref_id(value))?);
                    }
                }
                FieldDescriptor::HasMany(_) => {}
            }
        }
        if let Some(mixin) = mixin {
            for (name, ty) in mixin {
                if let Some(value) = data.get(name) {
                    columns.push(name.clone());
                    values.push(quote_value_if_string(*ty, Some(value))?);
                }
            }
        }
        Ok((columns, values))
    }

    /// AND-joined predicates for a flat equality map, resolving exposed
    /// field names to storage columns and types.
    fn where_predicates(&self, where_: &Record) -> Result<Vec<String>> {
        where_
            .iter()
            .map(|(field, value)| self.predicate_for(field, value))
            .collect()
    }

    fn predicate_for(&self, field: &str, value: &Value) -> Result<String> {
        if field == "id" || field == self.schema.id_field() {
            return untyped_predicate(self.schema.id_field(), Some(value));
        }
        if let Some(ty) = self.schema.column_type(field) {
            return equality_predicate(field, ty, Some(value));
        }
        if let Some(link) = self.schema.belongs_to(field) {
            return untyped_predicate(&link.fk_column, ref_id(value));
        }
        if let Some(link) = self
            .schema
            .belongs_to_links()
            .find(|b| b.fk_alias == field)
        {
            return untyped_predicate(&link.fk_column, Some(value));
        }
        untyped_predicate(field, Some(value))
    }

    /// Equality predicates over the data's schema-declared fields only.
    fn data_predicates(&self, data: &Record) -> Result<Vec<String>> {
        let mut predicates = Vec::new();
        for (name, descriptor) in self.schema.fields() {
            match descriptor {
                FieldDescriptor::Column(ty) => {
                    if let Some(value) = data.get(name) {
                        predicates.push(equality_predicate(name, *ty, Some(value))?);
                    }
                }
                FieldDescriptor::BelongsTo(link) => {
                    let present = data.get(name).or_else(|| data.get(&link.fk_alias));
                    if let Some(value) = present {
                        predicates.push(untyped_predicate(&link.fk_column, ref_id(value))?);
                    }
                }
                FieldDescriptor::HasMany(_) => {}
            }
        }
        Ok(predicates)
    }

    /// The `IN (subquery)` correlation predicate, in exactly one of the two
    /// parent modes.
    fn where_in_predicate(&self, where_in: &WhereIn) -> Result<String> {
        if where_in.parent_table.is_empty() {
            return Err(Error::usage("whereIn requires a parent table name"));
        }
        let parent_where = match &where_in.parent_where {
            Some(w) if !w.is_empty() => {
                let predicates: Result<Vec<String>> = w
                    .iter()
                    .map(|(field, value)| untyped_predicate(field, Some(value)))
                    .collect();
                format!(" WHERE {}", predicates?.join(" AND "))
            }
            _ => String::new(),
        };
        match (
            &where_in.parent_foreign_key,
            &where_in.parent_id_column,
            &where_in.own_foreign_key,
        ) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::usage(
                "ambiguous whereIn correlation: both belongs-to and has-many parent modes supplied",
            )),
            (Some(parent_fk), None, None) => Ok(format!(
                "{} IN (SELECT DISTINCT {} FROM {}{})",
                self.schema.id_field(),
                parent_fk,
                where_in.parent_table,
                parent_where
            )),
            (None, Some(parent_id), Some(own_fk)) => Ok(format!(
                "{} IN (SELECT {} FROM {}{})",
                own_fk, parent_id, where_in.parent_table, parent_where
            )),
            _ => Err(Error::usage(
                "whereIn requires a belongs-to or has-many parent correlation",
            )),
        }
    }
}

fn untyped_predicate(column: &str, value: Option<&Value>) -> Result<String> {
    match value {
        None | Some(Value::Null) => Err(Error::usage(format!(
            "undefined value for predicate on `{column}`"
        ))),
        Some(Value::Array(items)) => {
            let quoted: Result<Vec<String>> =
                items.iter().map(|v| quote_untyped(Some(v))).collect();
            Ok(format!("{column} IN ({})", quoted?.join(", ")))
        }
        Some(v) => Ok(format!("{column}={}", quote_untyped(Some(v))?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restmap_core::schema::{BelongsToLink, HasManyLink};
    use serde_json::json;
    use std::collections::HashSet;

    fn user_builder() -> SqlBuilder {
        let schema = SchemaDescriptor::new("user", "UserTable")
            .column("name", ColumnType::String)
            .column("hidden", ColumnType::Boolean)
            .belongs_to("group", BelongsToLink::to("userGroup").fk_column("GrpID"))
            .finish()
            .unwrap();
        SqlBuilder::new(Arc::new(schema))
    }

    fn group_builder() -> SqlBuilder {
        let schema = SchemaDescriptor::new("userGroup", "GroupTable")
            .column("label", ColumnType::String)
            .has_many("users", HasManyLink::to("user", "userGroupId"))
            .finish()
            .unwrap();
        SqlBuilder::new(Arc::new(schema))
    }

    fn record(value: serde_json::Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_default_projection_select() {
        let sql = user_builder()
            .select_many(&SelectManyOptions::default())
            .unwrap();
        assert_eq!(
            sql,
            "SELECT id, name, hidden, GrpID as userGroupId FROM UserTable"
        );
    }

    #[test]
    fn test_projection_subset_chain() {
        let builder = user_builder();
        let names = |fo: Option<&OneOrMany>| -> HashSet<String> {
            builder
                .projection_clauses(fo)
                .iter()
                .map(|c| {
                    c.rsplit(" as ")
                        .next()
                        .unwrap_or(c)
                        .trim()
                        .to_string()
                })
                .collect()
        };
        let id_only = names(Some(&OneOrMany::from(FIELDS_ID)));
        let id_rel = names(Some(&OneOrMany::from(FIELDS_ID_AND_RELATIONS)));
        let full = names(None);
        assert!(id_only.is_subset(&id_rel));
        assert!(id_rel.is_subset(&full));
    }

    #[test]
    fn test_explicit_field_list_filters() {
        let builder = user_builder();
        let fields = OneOrMany::from(vec!["name".to_string(), "group".to_string()]);
        assert_eq!(
            builder.projection(Some(&fields)),
            "id, name, GrpID as userGroupId"
        );
        let name_only = OneOrMany::from("name");
        assert_eq!(builder.projection(Some(&name_only)), "id, name");
    }

    #[test]
    fn test_aliased_id_field() {
        let schema = SchemaDescriptor::new("userGroup", "GroupTable")
            .id_field("GrpID")
            .column("label", ColumnType::String)
            .finish()
            .unwrap();
        let builder = SqlBuilder::new(Arc::new(schema));
        assert_eq!(
            builder.select_many(&SelectManyOptions::default()).unwrap(),
            "SELECT GrpID as id, label FROM GroupTable"
        );
    }

    #[test]
    fn test_select_many_rejects_scalar_id_filter() {
        let opts = SelectManyOptions {
            where_: Some(record(json!({"id": 3}))),
            ..SelectManyOptions::default()
        };
        let err = user_builder().select_many(&opts).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn test_select_many_allows_id_set() {
        let opts = SelectManyOptions {
            where_: Some(record(json!({"id": [3, 2]}))),
            ..SelectManyOptions::default()
        };
        let sql = user_builder().select_many(&opts).unwrap();
        assert!(sql.ends_with("WHERE id IN (3, 2)"));
    }

    #[test]
    fn test_where_and_order_by() {
        let opts = SelectManyOptions {
            where_: Some(record(json!({"hidden": "0", "name": "Ann"}))),
            order_by: Some(OneOrMany::from(vec![
                "name DESC".to_string(),
                "id".to_string(),
            ])),
            ..SelectManyOptions::default()
        };
        let sql = user_builder().select_many(&opts).unwrap();
        // serde_json object keys iterate sorted, so `hidden` precedes `name`.
        assert_eq!(
            sql,
            "SELECT id, name, hidden, GrpID as userGroupId FROM UserTable \
             WHERE hidden=0 AND name='Ann' ORDER BY name DESC, id"
        );
    }

    #[test]
    fn test_where_in_has_many_parent_mode() {
        let opts = SelectManyOptions {
            where_in: Some(
                WhereIn::has_many_parent("GroupTable", "id", "userGroupId")
                    .parent_where(record(json!({"label": "staff"}))),
            ),
            ..SelectManyOptions::default()
        };
        let sql = user_builder().select_many(&opts).unwrap();
        assert!(sql.ends_with(
            "WHERE userGroupId IN (SELECT id FROM GroupTable WHERE label='staff')"
        ));
    }

    #[test]
    fn test_where_in_belongs_to_parent_mode() {
        let opts = SelectManyOptions {
            where_in: Some(WhereIn::belongs_to_parent("UserTable", "GrpID")),
            ..SelectManyOptions::default()
        };
        let sql = group_builder().select_many(&opts).unwrap();
        assert!(sql.ends_with("WHERE id IN (SELECT DISTINCT GrpID FROM UserTable)"));
    }

    #[test]
    fn test_where_in_ambiguous_modes_rejected() {
        let mut where_in = WhereIn::belongs_to_parent("UserTable", "GrpID");
        where_in.parent_id_column = Some("id".to_string());
        let opts = SelectManyOptions {
            where_in: Some(where_in),
            ..SelectManyOptions::default()
        };
        let err = group_builder().select_many(&opts).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));

        let neither = SelectManyOptions {
            where_in: Some(WhereIn {
                parent_table: "UserTable".to_string(),
                ..WhereIn::default()
            }),
            ..SelectManyOptions::default()
        };
        assert!(group_builder().select_many(&neither).is_err());
    }

    #[test]
    fn test_select_one_requires_exactly_one_criterion() {
        let builder = user_builder();
        let both = SelectOneOptions {
            id: Some(json!("1")),
            data: Some(record(json!({"name": "x"}))),
            ..SelectOneOptions::default()
        };
        let err = builder.select_one(&both).unwrap_err();
        assert_eq!(
            err,
            Error::usage("both `id` and `data` options are provided")
        );
        assert!(builder.select_one(&SelectOneOptions::default()).is_err());
    }

    #[test]
    fn test_select_one_by_id_with_where() {
        let opts = SelectOneOptions {
            id: Some(json!(7)),
            where_: Some(record(json!({"hidden": "0"}))),
            ..SelectOneOptions::default()
        };
        let sql = user_builder().select_one(&opts).unwrap();
        assert!(sql.ends_with("WHERE id=7 AND hidden=0"));
    }

    #[test]
    fn test_select_one_by_data_uses_declared_fields_only() {
        let opts = SelectOneOptions::by_data(record(json!({
            "name": "Ann",
            "password": "secret",
            "group": {"id": 3},
        })));
        let sql = user_builder().select_one(&opts).unwrap();
        assert!(sql.ends_with("WHERE name='Ann' AND GrpID=3"));
        assert!(!sql.contains("password"));
    }

    #[test]
    fn test_select_one_data_rejects_where() {
        let opts = SelectOneOptions {
            data: Some(record(json!({"name": "Ann"}))),
            where_: Some(record(json!({"hidden": "0"}))),
            ..SelectOneOptions::default()
        };
        assert!(user_builder().select_one(&opts).is_err());
    }

    #[test]
    fn test_insert_intersection_and_mixin() {
        let data = record(json!({
            "name": "O'Hara",
            "group": {"id": 3},
            "password": "pw",
            "unknown": "dropped",
        }));
        let mixin: SchemaMixin = vec![("password".to_string(), ColumnType::String)];
        let sql = user_builder().insert(&data, Some(&mixin)).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO UserTable (name, GrpID, password) VALUES ('O Hara', 3, 'pw')"
        );
    }

    #[test]
    fn test_insert_with_no_declared_fields_is_usage_error() {
        let data = record(json!({"unknown": 1}));
        assert!(user_builder().insert(&data, None).is_err());
    }

    #[test]
    fn test_update_statement() {
        let data = record(json!({"name": "Ann", "hidden": true}));
        let sql = user_builder().update(&json!(5), &data).unwrap();
        assert_eq!(
            sql,
            "UPDATE UserTable SET name='Ann', hidden=1 WHERE id=5"
        );
    }

    #[test]
    fn test_delete_statement() {
        let sql = user_builder().delete(&json!("5")).unwrap();
        assert_eq!(sql, "DELETE FROM UserTable WHERE id='5'");
    }

    #[test]
    fn test_select_by_ids() {
        let sql = user_builder()
            .select_by_ids(&[json!(3), json!(2)], Some(&OneOrMany::from(FIELDS_ID)))
            .unwrap();
        assert_eq!(sql, "SELECT id FROM UserTable WHERE id IN (3, 2)");
        assert!(user_builder().select_by_ids(&[], None).is_err());
    }
}
