//! Explicit gateway registry.
//!
//! Cross-entity lookup goes through a [`Registry`] constructed once at
//! startup and passed by reference to whatever needs it (relations engine,
//! request pipeline, hooks) — never through a hidden process-wide global.
//!
//! [`RegistryBuilder::build`] runs the full cross-schema validation pass,
//! so every has-many inverse problem surfaces as a startup error and never
//! at request time. The registry is immutable after build; there is no hot
//! schema reload.

use std::collections::HashMap;
use std::sync::Arc;

use restmap_core::error::{Error, Result};
use restmap_core::resolve::validate_schemas;
use restmap_core::schema::SchemaDescriptor;
use restmap_core::transport::SharedTransport;

use crate::gateway::{EntityGateway, EntityHooks, NoHooks};

/// Immutable name-to-gateway map shared by one service instance.
#[derive(Debug)]
pub struct Registry {
    gateways: HashMap<String, EntityGateway>,
}

impl Registry {
    /// Start building a registry over a shared transport.
    #[must_use]
    pub fn builder(transport: SharedTransport) -> RegistryBuilder {
        RegistryBuilder {
            transport,
            schemas: Vec::new(),
            hooks: HashMap::new(),
        }
    }

    /// Look up the gateway for an entity type.
    pub fn gateway(&self, entity_type: &str) -> Result<&EntityGateway> {
        self.gateways.get(entity_type).ok_or_else(|| {
            Error::config(format!("no gateway registered for type `{entity_type}`"))
        })
    }

    /// Whether a gateway exists for an entity type.
    #[must_use]
    pub fn contains(&self, entity_type: &str) -> bool {
        self.gateways.contains_key(entity_type)
    }

    /// Registered entity type names.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.gateways.keys().map(String::as_str)
    }
}

/// Builder collecting schemas and per-entity hooks before validation.
pub struct RegistryBuilder {
    transport: SharedTransport,
    schemas: Vec<SchemaDescriptor>,
    hooks: HashMap<String, Arc<dyn EntityHooks>>,
}

impl RegistryBuilder {
    /// Register an entity schema.
    #[must_use]
    pub fn register(mut self, schema: SchemaDescriptor) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Attach validation/transform hooks for an entity type.
    #[must_use]
    pub fn hooks(mut self, entity_type: impl Into<String>, hooks: Arc<dyn EntityHooks>) -> Self {
        self.hooks.insert(entity_type.into(), hooks);
        self
    }

    /// Validate all schemas and construct the gateways.
    ///
    /// Fails with [`Error::Config`] on duplicate type names, missing
    /// has-many targets, or undiscoverable/ambiguous inverse links.
    pub fn build(mut self) -> Result<Registry> {
        let mut by_type: HashMap<String, SchemaDescriptor> = HashMap::new();
        for schema in self.schemas {
            let name = schema.entity_type().to_string();
            if by_type.insert(name.clone(), schema).is_some() {
                return Err(Error::config(format!(
                    "entity type `{name}` registered more than once"
                )));
            }
        }
        validate_schemas(&by_type)?;

        let mut gateways = HashMap::new();
        for (name, schema) in by_type {
            let hooks = self
                .hooks
                .remove(&name)
                .unwrap_or_else(|| Arc::new(NoHooks));
            tracing::debug!(entity = %name, table = schema.table_name(), "registering gateway");
            gateways.insert(
                name,
                EntityGateway::new(Arc::new(schema), self.transport.clone(), hooks),
            );
        }
        Ok(Registry { gateways })
    }
}
