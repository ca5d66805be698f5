//! The data-mapper request pipeline.
//!
//! One [`Request`] describes a CRUD operation against a registered entity
//! type; [`DataMapper::process`] validates its shape, dispatches to the
//! matching gateway operation, resolves the `include` graph, applies
//! per-type output transforms, and derives the final status.
//!
//! The pipeline catches nothing: every error propagates to whatever
//! boundary (HTTP handler, test harness) invoked it, and nothing here
//! retries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use restmap_core::error::{Error, Result};
use restmap_core::record::{Record, dedupe_ids, id_key, record_id};
use restmap_core::schema::FieldDescriptor;
use restmap_query::{SelectManyOptions, SelectOneOptions};

use crate::gateway::EntityGateway;
use crate::registry::Registry;
use crate::relations::RelationsEngine;

/// The four request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Read: all rows, or the supplied id set.
    Find,
    /// Insert every payload record.
    Create,
    /// Update the identified row from the payload.
    Update,
    /// Delete the identified rows.
    Delete,
}

/// One `include` entry: a link name, optionally with per-link query
/// constraints.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IncludeItem {
    /// Just the link name.
    Bare(String),
    /// Link name plus constraints for the secondary fetch.
    WithOptions(String, SelectManyOptions),
}

impl IncludeItem {
    fn parts(&self) -> (&str, Option<&SelectManyOptions>) {
        match self {
            Self::Bare(name) => (name, None),
            Self::WithOptions(name, opts) => (name, Some(opts)),
        }
    }
}

/// An incoming CRUD request as the boundary hands it over.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Operation to perform.
    pub method: Method,
    /// Entity type name; must be registered.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Row ids; deduplicated first-seen before dispatch.
    #[serde(default)]
    pub ids: Vec<Value>,
    /// Query options for the primary fetch.
    #[serde(default)]
    pub options: SelectManyOptions,
    /// Relations to resolve into the response.
    #[serde(default)]
    pub include: Vec<IncludeItem>,
    /// Records to write (create/update).
    #[serde(default)]
    pub payload: Vec<Record>,
}

/// Final response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Read or update produced a payload.
    Ok,
    /// A create completed.
    Created,
    /// No payload resulted (delete, empty find).
    Empty,
}

/// The accumulated response: primary records, included records by type,
/// and the derived status.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Primary records of the requested type.
    pub records: Vec<Record>,
    /// Included relation records, keyed by entity type.
    pub included: BTreeMap<String, Vec<Record>>,
    /// Derived status.
    pub status: Status,
}

/// The request pipeline over a registry.
#[derive(Debug, Clone, Copy)]
pub struct DataMapper<'a> {
    registry: &'a Registry,
}

impl<'a> DataMapper<'a> {
    /// Bind the pipeline to a registry.
    #[must_use]
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Run one request through dispatch, include resolution, output
    /// transforms, and status derivation.
    #[tracing::instrument(level = "debug", skip(self, request), fields(entity = %request.entity_type))]
    pub fn process(&self, request: &Request) -> Result<Response> {
        let gateway = self.registry.gateway(&request.entity_type)?;
        let ids = dedupe_ids(&request.ids);

        let mut records = match request.method {
            Method::Find => self.find(gateway, &ids, &request.options)?,
            Method::Create => {
                let mut created = Vec::with_capacity(request.payload.len());
                for data in &request.payload {
                    created.push(gateway.create(self.registry, data, None)?);
                }
                created
            }
            Method::Update => {
                let id = ids
                    .first()
                    .ok_or_else(|| Error::usage("update requires an id"))?;
                let data = request
                    .payload
                    .first()
                    .ok_or_else(|| Error::usage("update requires a payload record"))?;
                vec![gateway.update(self.registry, id, data)?]
            }
            Method::Delete => {
                if ids.is_empty() {
                    return Err(Error::usage("delete requires at least one id"));
                }
                for id in &ids {
                    gateway.delete(self.registry, id)?;
                }
                Vec::new()
            }
        };

        let mut included = BTreeMap::new();
        if !request.include.is_empty() && !records.is_empty() {
            included = self.resolve_includes(gateway, &mut records, request, &ids)?;
        }

        // Output transforms: primary records, then every included type.
        for record in &mut records {
            gateway.transform_read(record);
        }
        for (entity_type, group) in &mut included {
            let target = self.registry.gateway(entity_type)?;
            for record in group.iter_mut() {
                target.transform_read(record);
            }
        }

        let status = match request.method {
            Method::Create => Status::Created,
            _ if records.is_empty() => Status::Empty,
            _ => Status::Ok,
        };
        Ok(Response {
            records,
            included,
            status,
        })
    }

    /// Find: everything matching the options, or the deduplicated id set.
    ///
    /// A single id propagates NotFound; a multi-id set tolerates absent
    /// rows, keeping first-seen id order in the result.
    fn find(
        &self,
        gateway: &EntityGateway,
        ids: &[Value],
        options: &SelectManyOptions,
    ) -> Result<Vec<Record>> {
        match ids {
            [] => gateway.select_many(options),
            [id] => {
                let opts = SelectOneOptions {
                    id: Some(id.clone()),
                    where_: options.where_.clone(),
                    fields_only: options.fields_only.clone(),
                    ..SelectOneOptions::default()
                };
                Ok(vec![gateway.select_one(&opts)?])
            }
            many => {
                // An id set rides in the `where` map, so any accompanying
                // filter still applies to the batched fetch.
                let mut where_ = options.where_.clone().unwrap_or_default();
                where_.insert("id".to_string(), Value::Array(many.to_vec()));
                let opts = SelectManyOptions {
                    where_: Some(where_),
                    fields_only: options.fields_only.clone(),
                    where_in: options.where_in.clone(),
                    order_by: options.order_by.clone(),
                };
                let rows = gateway.select_many(&opts)?;
                let mut by_id: BTreeMap<String, Record> = rows
                    .into_iter()
                    .filter_map(|row| record_id(&row).map(id_key).map(|key| (key, row)))
                    .collect();
                Ok(many
                    .iter()
                    .filter_map(|id| by_id.remove(&id_key(id)))
                    .collect())
            }
        }
    }

    /// Resolve each requested link into the `included` accumulator.
    ///
    /// Belongs-to links are batched by unique foreign-key set — no extra
    /// fetch per row. Has-many links go through the relations engine's
    /// correlated-subquery primitive, scoped by the primary query's filter
    /// and id set so children of rows outside the result set are never
    /// fetched.
    fn resolve_includes(
        &self,
        gateway: &EntityGateway,
        records: &mut Vec<Record>,
        request: &Request,
        ids: &[Value],
    ) -> Result<BTreeMap<String, Vec<Record>>> {
        let engine = RelationsEngine::new(self.registry);
        let schema = gateway.schema().clone();
        let mut included: BTreeMap<String, Vec<Record>> = BTreeMap::new();

        let mut parent_scope = request.options.where_.clone();
        if !ids.is_empty() {
            let mut scope = parent_scope.unwrap_or_default();
            scope.insert(schema.id_field().to_string(), Value::Array(ids.to_vec()));
            parent_scope = Some(scope);
        }

        for item in &request.include {
            let (name, link_opts) = item.parts();
            match schema.field(name) {
                Some(FieldDescriptor::BelongsTo(link)) => {
                    let fetched = engine.include_belongs_to(link, records, link_opts)?;
                    included
                        .entry(link.target_type.clone())
                        .or_default()
                        .extend(fetched);
                }
                Some(FieldDescriptor::HasMany(link)) => {
                    let fetched = engine.include_has_many(
                        &schema,
                        link,
                        records,
                        parent_scope.as_ref(),
                        link_opts,
                    )?;
                    included
                        .entry(link.target_type.clone())
                        .or_default()
                        .extend(fetched);
                }
                Some(FieldDescriptor::Column(_)) | None => {
                    return Err(Error::usage(format!(
                        "include names `{name}`, which is not a relation of `{}`",
                        schema.entity_type()
                    )));
                }
            }
        }
        Ok(included)
    }
}

// ============================================================================
// Tests
// ============================================================================
