//! restmap: a JSON-API relational data mapper.
//!
//! This facade crate composes the lower layers into the pieces a service
//! actually talks to:
//!
//! - [`EntityGateway`]: per-entity data access — typed selects, insert
//!   with refetch, update with a previous-state hook, delete — over a
//!   shared [`restmap_core::Transport`].
//! - [`Registry`]: explicit dependency container mapping entity type names
//!   to gateways, validated as a whole at build time.
//! - [`RelationsEngine`]: batched belongs-to embedding and correlated
//!   has-many resolution, so relation graphs never degrade into per-row
//!   queries.
//! - [`DataMapper`]: the request pipeline — one [`Request`] in, dispatch,
//!   include resolution, output transforms, one [`Response`] out.
//!
//! # Quick Start
//!
//! ```no_run
//! use restmap::prelude::*;
//!
//! fn build(transport: SharedTransport) -> Result<Registry> {
//!     let user = SchemaDescriptor::new("user", "UserTable")
//!         .column("name", ColumnType::String)
//!         .column("hidden", ColumnType::Boolean)
//!         .belongs_to("group", BelongsToLink::to("userGroup").fk_column("GrpID"))
//!         .finish()?;
//!     let group = SchemaDescriptor::new("userGroup", "GroupTable")
//!         .column("name", ColumnType::String)
//!         .has_many("users", HasManyLink::to("user", "GrpID"))
//!         .finish()?;
//!     Registry::builder(transport).register(user).register(group).build()
//! }
//! ```

pub mod gateway;
pub mod registry;
pub mod relations;
pub mod request;

pub use gateway::{EntityGateway, EntityHooks, NoHooks};
pub use registry::{Registry, RegistryBuilder};
pub use relations::{RelationOptions, RelationsEngine};
pub use request::{DataMapper, IncludeItem, Method, Request, Response, Status};

/// Everything a typical caller needs in one import.
pub mod prelude {
    pub use restmap_core::error::{Error, Result};
    pub use restmap_core::record::Record;
    pub use restmap_core::schema::{
        BelongsToLink, ColumnType, HasManyLink, SchemaBuilder, SchemaDescriptor,
    };
    pub use restmap_core::transport::{SharedTransport, Transport};
    pub use restmap_query::{
        OneOrMany, SchemaMixin, SelectManyOptions, SelectOneOptions, SqlBuilder, WhereIn,
    };

    pub use crate::gateway::{EntityGateway, EntityHooks, NoHooks};
    pub use crate::registry::{Registry, RegistryBuilder};
    pub use crate::relations::{RelationOptions, RelationsEngine};
    pub use crate::request::{DataMapper, IncludeItem, Method, Request, Response, Status};
}
