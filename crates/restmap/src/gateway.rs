//! Per-entity data-access gateway.
//!
//! An [`EntityGateway`] composes the type caster and SQL builder against the
//! shared transport for one entity type. Reads cast every returned row;
//! writes run inside a single connection scope with a begin/commit/rollback
//! pair, and a create refetches the row by value match to recover the
//! generated primary key.
//!
//! Validation hooks are the extension point for entity-specific business
//! rules: they receive fully typed data plus the registry, so they can run
//! their own nested queries before approving or rejecting a mutation.

use std::sync::Arc;

use serde_json::Value;

use restmap_core::cast::{cast_record, cast_records};
use restmap_core::error::{Error, Result};
use restmap_core::record::Record;
use restmap_core::schema::SchemaDescriptor;
use restmap_core::transport::{self, SharedTransport};
use restmap_query::{SchemaMixin, SelectManyOptions, SelectOneOptions, SqlBuilder};

use crate::registry::Registry;

/// Entity-specific validation and output-transform hooks.
///
/// Every method defaults to a no-op. A returned error from a `before_*`
/// hook aborts the write before any SQL is issued and propagates verbatim.
pub trait EntityHooks: Send + Sync {
    /// Runs before an insert is built.
    fn before_create(&self, _registry: &Registry, _data: &Record) -> Result<()> {
        Ok(())
    }

    /// Runs before an update statement, receiving the typed previous row.
    fn before_update(
        &self,
        _registry: &Registry,
        _id: &Value,
        _new_data: &Record,
        _previous: &Record,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs before a delete statement.
    fn before_delete(&self, _registry: &Registry, _id: &Value) -> Result<()> {
        Ok(())
    }

    /// Post-read transform applied by the request pipeline to every
    /// outgoing record of this type.
    fn transform_read(&self, _record: &mut Record) {}
}

/// The default hook set: everything is a no-op.
#[derive(Debug, Default)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}

/// Data access for one entity type.
pub struct EntityGateway {
    schema: Arc<SchemaDescriptor>,
    builder: SqlBuilder,
    transport: SharedTransport,
    hooks: Arc<dyn EntityHooks>,
}

impl EntityGateway {
    pub(crate) fn new(
        schema: Arc<SchemaDescriptor>,
        transport: SharedTransport,
        hooks: Arc<dyn EntityHooks>,
    ) -> Self {
        Self {
            builder: SqlBuilder::new(schema.clone()),
            schema,
            transport,
            hooks,
        }
    }

    /// The schema this gateway serves.
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    /// The statement builder bound to this gateway's schema.
    #[must_use]
    pub fn builder(&self) -> &SqlBuilder {
        &self.builder
    }

    /// Apply this entity's post-read transform to a record.
    pub fn transform_read(&self, record: &mut Record) {
        self.hooks.transform_read(record);
    }

    /// Execute a multi-row select and cast every row.
    #[tracing::instrument(level = "debug", skip(self, opts), fields(entity = self.schema.entity_type()))]
    pub fn select_many(&self, opts: &SelectManyOptions) -> Result<Vec<Record>> {
        let sql = self.builder.select_many(opts)?;
        let mut rows = self.execute(&sql)?;
        cast_records(&self.schema, &mut rows);
        Ok(rows)
    }

    /// Fetch a batch of rows by id set, cast.
    pub fn select_by_ids(
        &self,
        ids: &[Value],
        fields_only: Option<&restmap_query::OneOrMany>,
    ) -> Result<Vec<Record>> {
        let sql = self.builder.select_by_ids(ids, fields_only)?;
        let mut rows = self.execute(&sql)?;
        cast_records(&self.schema, &mut rows);
        Ok(rows)
    }

    /// Execute a single-row select; `NotFound` when zero rows match.
    #[tracing::instrument(level = "debug", skip(self, opts), fields(entity = self.schema.entity_type()))]
    pub fn select_one(&self, opts: &SelectOneOptions) -> Result<Record> {
        let sql = self.builder.select_one(opts)?;
        let mut row = self
            .execute(&sql)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(self.schema.entity_type(), describe(opts)))?;
        cast_record(&self.schema, &mut row);
        Ok(row)
    }

    /// Insert a row and return it, refetched by value match so the
    /// generated primary key is present.
    ///
    /// The optional `mixin` declares private fields valid for this insert
    /// only; the refetch projects public fields, so mixin values are never
    /// echoed back.
    #[tracing::instrument(level = "debug", skip(self, registry, data, mixin), fields(entity = self.schema.entity_type()))]
    pub fn create(
        &self,
        registry: &Registry,
        data: &Record,
        mixin: Option<&SchemaMixin>,
    ) -> Result<Record> {
        self.hooks.before_create(registry, data)?;

        let insert_sql = self.builder.insert(data, mixin)?;
        let refetch_sql = self
            .builder
            .select_one(&SelectOneOptions::by_data(data.clone()))?;

        let entity = self.schema.entity_type().to_string();
        let mut row = transport::scope(&self.transport, |conn| {
            transport::transaction(conn, |conn| {
                tracing::debug!(sql = %insert_sql, "executing insert");
                conn.execute(&insert_sql)?;
                tracing::debug!(sql = %refetch_sql, "refetching inserted row");
                conn.execute(&refetch_sql)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::not_found(&entity, "refetch after insert"))
            })
        })?;
        cast_record(&self.schema, &mut row);
        Ok(row)
    }

    /// Update a row and return the fresh version.
    ///
    /// The previous row is fetched first (NotFound if absent) and handed,
    /// typed, to the before-update hook, which may veto the write.
    #[tracing::instrument(level = "debug", skip(self, registry, new_data), fields(entity = self.schema.entity_type()))]
    pub fn update(&self, registry: &Registry, id: &Value, new_data: &Record) -> Result<Record> {
        let previous = self.select_one(&SelectOneOptions::by_id(id.clone()))?;
        self.hooks.before_update(registry, id, new_data, &previous)?;

        let update_sql = self.builder.update(id, new_data)?;
        let refetch_sql = self
            .builder
            .select_one(&SelectOneOptions::by_id(id.clone()))?;

        let entity = self.schema.entity_type().to_string();
        let mut row = transport::scope(&self.transport, |conn| {
            transport::transaction(conn, |conn| {
                tracing::debug!(sql = %update_sql, "executing update");
                conn.execute(&update_sql)?;
                conn.execute(&refetch_sql)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::not_found(&entity, "refetch after update"))
            })
        })?;
        cast_record(&self.schema, &mut row);
        Ok(row)
    }

    /// Delete a row by id. Yields no payload.
    #[tracing::instrument(level = "debug", skip(self, registry), fields(entity = self.schema.entity_type()))]
    pub fn delete(&self, registry: &Registry, id: &Value) -> Result<()> {
        self.hooks.before_delete(registry, id)?;
        let sql = self.builder.delete(id)?;
        self.execute(&sql)?;
        Ok(())
    }

    fn execute(&self, sql: &str) -> Result<Vec<Record>> {
        tracing::debug!(sql = %sql, "executing statement");
        transport::scope(&self.transport, |conn| conn.execute(sql))
    }
}

impl std::fmt::Debug for EntityGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityGateway")
            .field("entity_type", &self.schema.entity_type())
            .field("table_name", &self.schema.table_name())
            .finish_non_exhaustive()
    }
}

fn describe(opts: &SelectOneOptions) -> String {
    match (&opts.id, &opts.data) {
        (Some(id), _) => format!("id={id}"),
        (_, Some(_)) => "data match".to_string(),
        _ => "no criterion".to_string(),
    }
}
