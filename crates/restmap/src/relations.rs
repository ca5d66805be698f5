//! Relation fetching and embedding.
//!
//! Two orchestration modes over a primary record set:
//!
//! - full embed: belongs-to targets are fetched in one batched query per
//!   link (never per row) and spliced into the rows; has-many children are
//!   fetched through one correlated subquery per link and distributed to
//!   their parents, each child tagged with a `{id: parentId}` back-reference.
//! - id-only embed: belongs-to fields reduce to `{id: fk}` with no fetch;
//!   has-many fields become an ordered id list via the same correlated
//!   subquery, projecting only identifier and relation columns.
//!
//! The stages run as an explicit sequential pipeline — fetch-belongs-to,
//! embed-belongs-to, fetch-has-many, embed-has-many — communicating through
//! typed batch values rather than nested callbacks. All queries for one
//! link go through the link target's gateway, so a target type without a
//! registered gateway fails fast as a configuration error naming both.

use std::collections::HashMap;

use serde_json::Value;

use restmap_core::error::{Error, Result};
use restmap_core::record::{Record, id_key, id_ref, record_id, ref_id};
use restmap_core::resolve::find_inverse;
use restmap_core::schema::{BelongsTo, HasMany, SchemaDescriptor};
use restmap_query::{FIELDS_ID_AND_RELATIONS, OneOrMany, SelectManyOptions, WhereIn};

use crate::gateway::EntityGateway;
use crate::registry::Registry;

/// Per-relation query constraints plus the primary query's own filter.
///
/// `parent_where` is the filter the primary rows were selected with; it
/// scopes the has-many correlation subqueries so children of rows outside
/// the primary result set are never fetched.
#[derive(Debug, Clone, Default)]
pub struct RelationOptions {
    /// Constraints keyed by relation field name.
    pub per_relation: HashMap<String, SelectManyOptions>,
    /// The primary query's own `where` filter.
    pub parent_where: Option<Record>,
}

impl RelationOptions {
    /// Options carrying only the primary query's filter.
    #[must_use]
    pub fn scoped(parent_where: Option<Record>) -> Self {
        Self {
            per_relation: HashMap::new(),
            parent_where,
        }
    }

    /// Attach constraints for one relation field.
    #[must_use]
    pub fn relation(mut self, field: impl Into<String>, opts: SelectManyOptions) -> Self {
        self.per_relation.insert(field.into(), opts);
        self
    }

    fn for_relation(&self, field: &str) -> Option<&SelectManyOptions> {
        self.per_relation.get(field)
    }
}

/// One fetched belongs-to link: target rows keyed by id.
struct BelongsToBatch<'a> {
    link: &'a BelongsTo,
    by_id: HashMap<String, Record>,
}

/// One fetched has-many link: children grouped by their foreign key, plus
/// the child-side inverse descriptor used for grouping and back-references.
struct HasManyBatch<'a> {
    link: &'a HasMany,
    inverse: BelongsTo,
    by_parent: HashMap<String, Vec<Record>>,
}

/// Relation orchestration over a registry.
#[derive(Debug, Clone, Copy)]
pub struct RelationsEngine<'a> {
    registry: &'a Registry,
}

impl<'a> RelationsEngine<'a> {
    /// Bind the engine to a registry.
    #[must_use]
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Fully fetch and embed every link of `schema` into `records`.
    pub fn fetch_and_embed_joined(
        &self,
        schema: &SchemaDescriptor,
        records: &mut [Record],
        opts: &RelationOptions,
    ) -> Result<()> {
        let belongs_to = self.fetch_belongs_to(schema, records, opts)?;
        embed_belongs_to(records, &belongs_to);
        let has_many = self.fetch_has_many(schema, opts, false)?;
        embed_has_many(records, has_many, true);
        Ok(())
    }

    /// Reduce belongs-to fields to `{id}` references and populate has-many
    /// fields with ordered id lists; no relation payload is materialized.
    pub fn just_embed_joined_ids(
        &self,
        schema: &SchemaDescriptor,
        records: &mut [Record],
        opts: &RelationOptions,
    ) -> Result<()> {
        for link in schema.belongs_to_links() {
            // No fetch happens in id mode, but an unregistered target is
            // still a configuration fault and fails fast here too.
            self.link_gateway(&link.field_name, &link.target_type)?;
            reduce_belongs_to_refs(records, link);
        }
        let has_many = self.fetch_has_many(schema, opts, true)?;
        embed_has_many(records, has_many, false);
        Ok(())
    }

    /// The gateway for a link target, failing fast with a config error
    /// naming the missing type and the link that required it.
    fn link_gateway(&self, link_field: &str, target_type: &str) -> Result<&'a EntityGateway> {
        self.registry.gateway(target_type).map_err(|_| {
            Error::config(format!(
                "relation `{link_field}` targets type `{target_type}`, which has no registered gateway"
            ))
        })
    }

    /// One batched fetch per belongs-to link over the distinct non-null
    /// foreign-key set — the N+1 avoidance mechanism.
    fn fetch_belongs_to<'s>(
        &self,
        schema: &'s SchemaDescriptor,
        records: &[Record],
        opts: &RelationOptions,
    ) -> Result<Vec<BelongsToBatch<'s>>> {
        let mut batches = Vec::new();
        for link in schema.belongs_to_links() {
            let gateway = self.link_gateway(&link.field_name, &link.target_type)?;

            let mut seen = std::collections::HashSet::new();
            let mut ids: Vec<Value> = Vec::new();
            for row in records {
                if let Some(fk) = row.get(&link.fk_alias).and_then(ref_id) {
                    if seen.insert(id_key(fk)) {
                        ids.push(fk.clone());
                    }
                }
            }

            let mut by_id = HashMap::new();
            if !ids.is_empty() {
                let fields_only = opts
                    .for_relation(&link.field_name)
                    .and_then(|o| o.fields_only.clone());
                let rows = gateway.select_by_ids(&ids, fields_only.as_ref())?;
                for row in rows {
                    let key = record_id(&row).map(id_key);
                    if let Some(key) = key {
                        by_id.insert(key, row);
                    }
                }
            }
            batches.push(BelongsToBatch { link, by_id });
        }
        Ok(batches)
    }

    /// One correlated-subquery fetch per has-many link, scoped to the
    /// primary query's own filter.
    fn fetch_has_many<'s>(
        &self,
        schema: &'s SchemaDescriptor,
        opts: &RelationOptions,
        ids_only: bool,
    ) -> Result<Vec<HasManyBatch<'s>>> {
        let mut batches = Vec::new();
        for link in schema.has_many_links() {
            let gateway = self.link_gateway(&link.field_name, &link.target_type)?;
            let child_schema = gateway.schema();
            let inverse = find_inverse(schema.entity_type(), link, child_schema)?.clone();

            let mut where_in = WhereIn::has_many_parent(
                schema.table_name(),
                schema.id_field(),
                link.fk_column.clone(),
            );
            if let Some(parent_where) = &opts.parent_where {
                where_in = where_in.parent_where(parent_where.clone());
            }

            let relation_opts = opts.for_relation(&link.field_name);
            let query = SelectManyOptions {
                fields_only: if ids_only {
                    Some(OneOrMany::from(FIELDS_ID_AND_RELATIONS))
                } else {
                    relation_opts.and_then(|o| o.fields_only.clone())
                },
                where_: relation_opts.and_then(|o| o.where_.clone()),
                where_in: Some(where_in),
                order_by: relation_opts.and_then(|o| o.order_by.clone()),
            };
            let children = gateway.select_many(&query)?;

            let mut by_parent: HashMap<String, Vec<Record>> = HashMap::new();
            for child in children {
                let key = child.get(&inverse.fk_alias).and_then(ref_id).map(id_key);
                if let Some(key) = key {
                    by_parent.entry(key).or_default().push(child);
                }
            }
            batches.push(HasManyBatch {
                link,
                inverse,
                by_parent,
            });
        }
        Ok(batches)
    }
}

impl<'a> RelationsEngine<'a> {
    /// Resolve one belongs-to link for the pipeline's `include` pass.
    ///
    /// Fetches the distinct foreign-key set in one batched query, reduces
    /// the rows' link field to `{id}` references, and returns the fetched
    /// target rows for the response's `included` section.
    pub(crate) fn include_belongs_to(
        &self,
        link: &BelongsTo,
        records: &mut [Record],
        opts: Option<&SelectManyOptions>,
    ) -> Result<Vec<Record>> {
        let gateway = self.link_gateway(&link.field_name, &link.target_type)?;

        let mut seen = std::collections::HashSet::new();
        let mut ids: Vec<Value> = Vec::new();
        for row in records.iter() {
            if let Some(fk) = row.get(&link.fk_alias).and_then(ref_id) {
                if seen.insert(id_key(fk)) {
                    ids.push(fk.clone());
                }
            }
        }
        let fetched = if ids.is_empty() {
            Vec::new()
        } else {
            let fields_only = opts.and_then(|o| o.fields_only.clone());
            gateway.select_by_ids(&ids, fields_only.as_ref())?
        };
        reduce_belongs_to_refs(records, link);
        Ok(fetched)
    }

    /// Resolve one has-many link for the pipeline's `include` pass, using
    /// the engine's correlated-subquery primitive.
    ///
    /// Parents receive the ordered child-id list under the link field; the
    /// returned children carry `{id: parentId}` back-references and go into
    /// the response's `included` section.
    pub(crate) fn include_has_many(
        &self,
        schema: &SchemaDescriptor,
        link: &HasMany,
        records: &mut [Record],
        parent_where: Option<&Record>,
        opts: Option<&SelectManyOptions>,
    ) -> Result<Vec<Record>> {
        let gateway = self.link_gateway(&link.field_name, &link.target_type)?;
        let inverse = find_inverse(schema.entity_type(), link, gateway.schema())?.clone();

        let mut where_in = WhereIn::has_many_parent(
            schema.table_name(),
            schema.id_field(),
            link.fk_column.clone(),
        );
        if let Some(parent_where) = parent_where {
            where_in = where_in.parent_where(parent_where.clone());
        }
        let query = SelectManyOptions {
            fields_only: opts.and_then(|o| o.fields_only.clone()),
            where_: opts.and_then(|o| o.where_.clone()),
            where_in: Some(where_in),
            order_by: opts.and_then(|o| o.order_by.clone()),
        };
        let children = gateway.select_many(&query)?;

        let mut ids_by_parent: HashMap<String, Vec<Value>> = HashMap::new();
        let mut tagged = Vec::with_capacity(children.len());
        for mut child in children {
            let fk = child
                .remove(&inverse.fk_alias)
                .and_then(|v| ref_id(&v).cloned());
            if let Some(fk) = fk {
                if let Some(child_id) = record_id(&child) {
                    ids_by_parent
                        .entry(id_key(&fk))
                        .or_default()
                        .push(child_id.clone());
                }
                child.insert(inverse.field_name.clone(), id_ref(fk));
            }
            tagged.push(child);
        }
        for row in records {
            let ids = record_id(row)
                .map(id_key)
                .and_then(|key| ids_by_parent.remove(&key))
                .unwrap_or_default();
            row.insert(link.field_name.clone(), Value::Array(ids));
        }
        Ok(tagged)
    }
}

/// Splice fetched belongs-to rows into the primary set, matching on id.
///
/// A row whose foreign-key alias is absent is left untouched, which makes
/// re-embedding already-embedded rows a no-op. A null foreign key keeps a
/// null relation rather than an empty object.
fn embed_belongs_to(records: &mut [Record], batches: &[BelongsToBatch<'_>]) {
    for row in records {
        for batch in batches {
            let Some(raw_fk) = row.remove(&batch.link.fk_alias) else {
                continue;
            };
            let embedded = ref_id(&raw_fk)
                .and_then(|fk| batch.by_id.get(&id_key(fk)))
                .map_or(Value::Null, |rec| Value::Object(rec.clone()));
            row.insert(batch.link.field_name.clone(), embedded);
        }
    }
}

/// Reduce a belongs-to foreign key to a bare `{id}` reference in place.
fn reduce_belongs_to_refs(records: &mut [Record], link: &BelongsTo) {
    for row in records {
        let Some(raw_fk) = row.remove(&link.fk_alias) else {
            continue;
        };
        let reduced = ref_id(&raw_fk).map_or(Value::Null, |fk| id_ref(fk.clone()));
        row.insert(link.field_name.clone(), reduced);
    }
}

/// Distribute fetched children to their parents.
///
/// Each child lands under exactly one parent (matched by foreign key). In
/// full mode the children are embedded whole, each tagged with a
/// `{id: parentId}` back-reference under its belongs-to field toward the
/// parent; in id mode the parent receives an ordered id list.
fn embed_has_many(records: &mut [Record], batches: Vec<HasManyBatch<'_>>, full: bool) {
    for batch in batches {
        let mut by_parent = batch.by_parent;
        for row in records.iter_mut() {
            let children = record_id(row)
                .map(id_key)
                .and_then(|key| by_parent.remove(&key))
                .unwrap_or_default();
            let value = if full {
                let parent_id = record_id(row).cloned();
                let tagged: Vec<Value> = children
                    .into_iter()
                    .map(|mut child| {
                        child.remove(&batch.inverse.fk_alias);
                        if let Some(pid) = &parent_id {
                            child.insert(batch.inverse.field_name.clone(), id_ref(pid.clone()));
                        }
                        Value::Object(child)
                    })
                    .collect();
                Value::Array(tagged)
            } else {
                Value::Array(
                    children
                        .iter()
                        .filter_map(|child| record_id(child).cloned())
                        .collect(),
                )
            };
            row.insert(batch.link.field_name.clone(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: serde_json::Value) -> Vec<Record> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::Object(map) => map,
                    _ => panic!("expected object"),
                })
                .collect(),
            _ => panic!("expected array"),
        }
    }

    fn group_link() -> BelongsTo {
        BelongsTo {
            field_name: "group".to_string(),
            target_type: "userGroup".to_string(),
            fk_column: "GrpID".to_string(),
            fk_alias: "userGroupId".to_string(),
            inverse: None,
        }
    }

    #[test]
    fn test_embed_belongs_to_splices_by_id() {
        let link = group_link();
        let mut records = rows(json!([
            {"id": 1, "name": "John", "userGroupId": 3},
            {"id": 2, "name": "Mary", "userGroupId": null},
        ]));
        let by_id: HashMap<String, Record> = rows(json!([{"id": 3, "label": "staff"}]))
            .into_iter()
            .map(|r| (id_key(record_id(&r).unwrap()), r))
            .collect();
        let batches = vec![BelongsToBatch {
            link: &link,
            by_id,
        }];
        embed_belongs_to(&mut records, &batches);

        assert_eq!(records[0]["group"], json!({"id": 3, "label": "staff"}));
        assert!(!records[0].contains_key("userGroupId"));
        // Null foreign key keeps a null relation, not an empty object.
        assert_eq!(records[1]["group"], Value::Null);
    }

    #[test]
    fn test_embed_belongs_to_is_idempotent() {
        let link = group_link();
        let mut records = rows(json!([
            {"id": 1, "name": "John", "group": {"id": 3, "label": "staff"}},
        ]));
        let before = records.clone();
        let batches = vec![BelongsToBatch {
            link: &link,
            by_id: HashMap::new(),
        }];
        embed_belongs_to(&mut records, &batches);
        embed_belongs_to(&mut records, &batches);
        assert_eq!(records, before);
    }

    #[test]
    fn test_reduce_belongs_to_refs() {
        let link = group_link();
        let mut records = rows(json!([
            {"id": 1, "userGroupId": 3},
            {"id": 2, "userGroupId": null},
        ]));
        reduce_belongs_to_refs(&mut records, &link);
        assert_eq!(records[0]["group"], json!({"id": 3}));
        assert_eq!(records[1]["group"], Value::Null);
    }

    fn users_batch(children: Vec<Record>) -> HasManyBatch<'static> {
        static LINK: std::sync::OnceLock<HasMany> = std::sync::OnceLock::new();
        let link = LINK.get_or_init(|| HasMany {
            field_name: "users".to_string(),
            target_type: "user".to_string(),
            fk_column: "userGroupId".to_string(),
            inverse: None,
        });
        let mut by_parent: HashMap<String, Vec<Record>> = HashMap::new();
        for child in children {
            let key = id_key(child.get("userGroupId").unwrap());
            by_parent.entry(key).or_default().push(child);
        }
        HasManyBatch {
            link,
            inverse: group_link(),
            by_parent,
        }
    }

    #[test]
    fn test_embed_has_many_partitions_children() {
        let children = rows(json!([
            {"id": 7, "name": "John", "userGroupId": 10},
            {"id": 8, "name": "Mary", "userGroupId": 10},
            {"id": 9, "name": "Lee", "userGroupId": 11},
        ]));
        let mut parents = rows(json!([{"id": 10}, {"id": 11}, {"id": 12}]));
        embed_has_many(&mut parents, vec![users_batch(children)], true);

        let group10 = parents[0]["users"].as_array().unwrap();
        assert_eq!(group10.len(), 2);
        assert_eq!(group10[0]["id"], json!(7));
        assert_eq!(group10[0]["group"], json!({"id": 10}));
        assert!(group10[0].get("userGroupId").is_none());

        let group11 = parents[1]["users"].as_array().unwrap();
        assert_eq!(group11.len(), 1);
        assert_eq!(group11[0]["id"], json!(9));

        // No child duplicated or dropped across parents.
        let total: usize = parents
            .iter()
            .map(|p| p["users"].as_array().unwrap().len())
            .sum();
        assert_eq!(total, 3);
        assert_eq!(parents[2]["users"], json!([]));
    }

    #[test]
    fn test_embed_has_many_id_mode() {
        let children = rows(json!([
            {"id": 7, "userGroupId": 10},
            {"id": 8, "userGroupId": 10},
        ]));
        let mut parents = rows(json!([{"id": 10}]));
        embed_has_many(&mut parents, vec![users_batch(children)], false);
        assert_eq!(parents[0]["users"], json!([7, 8]));
    }
}
