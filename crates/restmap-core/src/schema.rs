//! Declarative schema descriptors.
//!
//! A [`SchemaDescriptor`] describes one entity type: its storage table, its
//! primary-key column (always exposed as `id`), and an ordered field map in
//! which every field is **exactly one** of plain column, belongs-to link, or
//! has-many link. The link/column split is resolved once at construction into
//! tagged [`FieldDescriptor`] variants, so query-time code never sniffs field
//! shapes.
//!
//! Descriptors are immutable after [`SchemaBuilder::finish`]; there is no hot
//! schema reload.

use crate::error::{Error, Result};

/// Primitive type tag for a plain column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnType {
    /// Textual column. `null`/missing casts to the empty string.
    String,
    /// Stored as textual `0`/`1`; only the literal `1` casts to `true`.
    Boolean,
    /// Base-10 integer column.
    Integer,
    /// Untyped column; values pass through the caster unchanged.
    #[default]
    Passthrough,
}

/// A single foreign-key reference from this entity to a target entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BelongsTo {
    /// Name of the relation field on this entity (e.g. `"group"`).
    pub field_name: String,
    /// Target entity type (e.g. `"userGroup"`).
    pub target_type: String,
    /// Foreign-key column in this entity's table (e.g. `"GrpID"`).
    pub fk_column: String,
    /// Alias the foreign key is exposed under (e.g. `"userGroupId"`).
    pub fk_alias: String,
    /// Optional name of the has-many field on the target this link inverts.
    pub inverse: Option<String>,
}

/// The set of target rows whose own belongs-to link points back at this
/// entity. Never stored as a SQL column; populated by the relations engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasMany {
    /// Name of the relation field on this entity (e.g. `"users"`).
    pub field_name: String,
    /// Target entity type (e.g. `"user"`).
    pub target_type: String,
    /// Foreign-key column **on the target type**. Mandatory: it cannot be
    /// safely inferred.
    pub fk_column: String,
    /// Optional explicit name of the inverse belongs-to field on the target.
    pub inverse: Option<String>,
}

/// What a declared field is: plain column or one of the two link kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDescriptor {
    /// Plain stored column with a cast type.
    Column(ColumnType),
    /// Single foreign-key reference to another entity.
    BelongsTo(BelongsTo),
    /// Reverse one-to-many link; no storage column on this table.
    HasMany(HasMany),
}

/// Builder-side declaration of a belongs-to link.
///
/// Defaults resolved at [`SchemaBuilder::finish`]: the foreign-key column is
/// the camel-cased target type name, the exposed alias is the target type
/// name + `"Id"`.
#[derive(Debug, Clone)]
pub struct BelongsToLink {
    target_type: String,
    fk_column: Option<String>,
    fk_alias: Option<String>,
    inverse: Option<String>,
}

impl BelongsToLink {
    /// Declare a belongs-to link toward `target_type`.
    #[must_use]
    pub fn to(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            fk_column: None,
            fk_alias: None,
            inverse: None,
        }
    }

    /// Override the foreign-key column name in this entity's table.
    #[must_use]
    pub fn fk_column(mut self, column: impl Into<String>) -> Self {
        self.fk_column = Some(column.into());
        self
    }

    /// Override the exposed foreign-key alias.
    #[must_use]
    pub fn fk_alias(mut self, alias: impl Into<String>) -> Self {
        self.fk_alias = Some(alias.into());
        self
    }

    /// Name the has-many field on the target this link is the inverse of.
    /// Used to disambiguate when the target has several candidate links.
    #[must_use]
    pub fn inverse(mut self, field: impl Into<String>) -> Self {
        self.inverse = Some(field.into());
        self
    }
}

/// Builder-side declaration of a has-many link.
#[derive(Debug, Clone)]
pub struct HasManyLink {
    target_type: String,
    fk_column: String,
    inverse: Option<String>,
}

impl HasManyLink {
    /// Declare a has-many link toward `target_type`, correlated through
    /// `fk_column` on the target's table.
    #[must_use]
    pub fn to(target_type: impl Into<String>, fk_column: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            fk_column: fk_column.into(),
            inverse: None,
        }
    }

    /// Name the belongs-to field on the target that points back here.
    #[must_use]
    pub fn inverse(mut self, field: impl Into<String>) -> Self {
        self.inverse = Some(field.into());
        self
    }
}

/// Immutable description of one entity type.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    entity_type: String,
    table_name: String,
    id_field: String,
    fields: Vec<(String, FieldDescriptor)>,
}

impl SchemaDescriptor {
    /// Start building a descriptor for `entity_type` stored in `table_name`.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, table_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            entity_type: entity_type.into(),
            table_name: table_name.into(),
            id_field: "id".to_string(),
            fields: Vec::new(),
        }
    }

    /// The entity type name this descriptor was registered under.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Storage table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Primary-key column name in storage. Always exposed as `id`.
    #[must_use]
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// All declared fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[(String, FieldDescriptor)] {
        &self.fields
    }

    /// Plain columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.fields.iter().filter_map(|(name, fd)| match fd {
            FieldDescriptor::Column(ty) => Some((name.as_str(), *ty)),
            _ => None,
        })
    }

    /// Belongs-to link descriptors in declaration order.
    pub fn belongs_to_links(&self) -> impl Iterator<Item = &BelongsTo> {
        self.fields.iter().filter_map(|(_, fd)| match fd {
            FieldDescriptor::BelongsTo(link) => Some(link),
            _ => None,
        })
    }

    /// Has-many link descriptors in declaration order.
    pub fn has_many_links(&self) -> impl Iterator<Item = &HasMany> {
        self.fields.iter().filter_map(|(_, fd)| match fd {
            FieldDescriptor::HasMany(link) => Some(link),
            _ => None,
        })
    }

    /// Look up a field descriptor by field name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, fd)| fd)
    }

    /// The belongs-to descriptor for `name`, if that field is one.
    #[must_use]
    pub fn belongs_to(&self, name: &str) -> Option<&BelongsTo> {
        match self.field(name) {
            Some(FieldDescriptor::BelongsTo(link)) => Some(link),
            _ => None,
        }
    }

    /// The has-many descriptor for `name`, if that field is one.
    #[must_use]
    pub fn has_many(&self, name: &str) -> Option<&HasMany> {
        match self.field(name) {
            Some(FieldDescriptor::HasMany(link)) => Some(link),
            _ => None,
        }
    }

    /// Cast type for a field. `None` for links and undeclared names, which
    /// the caster treats as pass-through.
    #[must_use]
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        match self.field(name) {
            Some(FieldDescriptor::Column(ty)) => Some(*ty),
            _ => None,
        }
    }
}

/// Fluent builder for [`SchemaDescriptor`].
#[derive(Debug)]
pub struct SchemaBuilder {
    entity_type: String,
    table_name: String,
    id_field: String,
    fields: Vec<(String, FieldDescriptor)>,
}

impl SchemaBuilder {
    /// Override the primary-key column name (default `"id"`).
    #[must_use]
    pub fn id_field(mut self, column: impl Into<String>) -> Self {
        self.id_field = column.into();
        self
    }

    /// Declare a plain column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.fields
            .push((name.into(), FieldDescriptor::Column(ty)));
        self
    }

    /// Declare a belongs-to link field.
    #[must_use]
    pub fn belongs_to(mut self, name: impl Into<String>, link: BelongsToLink) -> Self {
        let name = name.into();
        let fk_column = link
            .fk_column
            .unwrap_or_else(|| camel_case(&link.target_type));
        let fk_alias = link
            .fk_alias
            .unwrap_or_else(|| format!("{}Id", link.target_type));
        self.fields.push((
            name.clone(),
            FieldDescriptor::BelongsTo(BelongsTo {
                field_name: name,
                target_type: link.target_type,
                fk_column,
                fk_alias,
                inverse: link.inverse,
            }),
        ));
        self
    }

    /// Declare a has-many link field.
    #[must_use]
    pub fn has_many(mut self, name: impl Into<String>, link: HasManyLink) -> Self {
        let name = name.into();
        self.fields.push((
            name.clone(),
            FieldDescriptor::HasMany(HasMany {
                field_name: name,
                target_type: link.target_type,
                fk_column: link.fk_column,
                inverse: link.inverse,
            }),
        ));
        self
    }

    /// Seal the descriptor.
    ///
    /// Fails with [`Error::Config`] if a field name was declared more than
    /// once (a field has exactly one role) or the table name is empty.
    pub fn finish(self) -> Result<SchemaDescriptor> {
        if self.table_name.is_empty() {
            return Err(Error::config(format!(
                "schema `{}` has no table name",
                self.entity_type
            )));
        }
        for (i, (name, _)) in self.fields.iter().enumerate() {
            if self.fields[i + 1..].iter().any(|(other, _)| other == name) {
                return Err(Error::config(format!(
                    "schema `{}` declares field `{}` more than once",
                    self.entity_type, name
                )));
            }
        }
        Ok(SchemaDescriptor {
            entity_type: self.entity_type,
            table_name: self.table_name,
            id_field: self.id_field,
            fields: self.fields,
        })
    }
}

/// Lower-case the first character: `UserGroup` -> `userGroup`.
#[must_use]
pub fn camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
