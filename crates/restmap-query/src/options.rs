//! Query-option surface consumed by the statement builders.
//!
//! These structures deserialize straight off a request body: `fieldsOnly`
//! and `orderBy` accept a single string or a list, `where` is a flat
//! equality map, and `whereIn` describes a correlated subquery against a
//! parent table in one of two mutually exclusive modes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use restmap_core::record::Record;

/// A single string or a list of strings, as the wire sends both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// A single item.
    One(String),
    /// An explicit list.
    Many(Vec<String>),
}

impl OneOrMany {
    /// View the contents as a slice of items.
    #[must_use]
    pub fn items(&self) -> Vec<&str> {
        match self {
            Self::One(s) => vec![s.as_str()],
            Self::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(list: Vec<String>) -> Self {
        Self::Many(list)
    }
}

/// `fieldsOnly` special value selecting just the primary-key clause.
pub const FIELDS_ID: &str = "id";
/// `fieldsOnly` special value selecting the primary key plus every
/// belongs-to foreign key, and no plain columns.
pub const FIELDS_ID_AND_RELATIONS: &str = "idAndRelations";

/// Options for a multi-row select.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectManyOptions {
    /// Projection control: absent for the full default projection, `"id"`,
    /// `"idAndRelations"`, or an explicit field list.
    pub fields_only: Option<OneOrMany>,
    /// Flat equality filter, AND-joined.
    #[serde(rename = "where")]
    pub where_: Option<Record>,
    /// Correlated subquery constraint against a parent table.
    pub where_in: Option<WhereIn>,
    /// Ordering fields; items may carry a trailing ` DESC`/` ASC`.
    pub order_by: Option<OneOrMany>,
}

/// A `WHERE x IN (SELECT ...)` correlation toward a parent table.
///
/// Exactly one mode must be supplied:
///
/// - **belongs-to parent**: `parent_foreign_key` names the fk column on the
///   parent's table; the subquery is matched against this table's own
///   primary key.
/// - **has-many parent**: `parent_id_column` + `own_foreign_key`; the
///   parent's ids are matched against this table's foreign-key column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhereIn {
    /// The parent's table name.
    pub parent_table: String,
    /// The parent query's own filter, scoping the subquery.
    pub parent_where: Option<Record>,
    /// Belongs-to parent mode: fk column selected (DISTINCT) from the parent.
    pub parent_foreign_key: Option<String>,
    /// Has-many parent mode: the parent's id column.
    pub parent_id_column: Option<String>,
    /// Has-many parent mode: this table's fk column toward the parent.
    pub own_foreign_key: Option<String>,
}

impl WhereIn {
    /// Belongs-to-parent correlation.
    #[must_use]
    pub fn belongs_to_parent(parent_table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            parent_table: parent_table.into(),
            parent_foreign_key: Some(foreign_key.into()),
            ..Self::default()
        }
    }

    /// Has-many-parent correlation.
    #[must_use]
    pub fn has_many_parent(
        parent_table: impl Into<String>,
        parent_id_column: impl Into<String>,
        own_foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            parent_table: parent_table.into(),
            parent_id_column: Some(parent_id_column.into()),
            own_foreign_key: Some(own_foreign_key.into()),
            ..Self::default()
        }
    }

    /// Scope the subquery with the parent query's own filter.
    #[must_use]
    pub fn parent_where(mut self, where_: Record) -> Self {
        self.parent_where = Some(where_);
        self
    }
}

/// Options for a single-row select. Exactly one of `id`/`data` identifies
/// the row; `where_` may only accompany `id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectOneOptions {
    /// Primary-key lookup.
    pub id: Option<Value>,
    /// Value-equality lookup over the data's schema-declared fields
    /// (refetching a just-inserted row, verifying a credential).
    pub data: Option<Record>,
    /// Extra equality filter; only valid together with `id`.
    #[serde(rename = "where")]
    pub where_: Option<Record>,
    /// Projection control, as in [`SelectManyOptions`].
    pub fields_only: Option<OneOrMany>,
}

impl SelectOneOptions {
    /// Lookup by primary key.
    #[must_use]
    pub fn by_id(id: Value) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Lookup by value equality over `data`'s declared fields.
    #[must_use]
    pub fn by_data(data: Record) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_one_or_many_deserializes_both_shapes() {
        let one: OneOrMany = serde_json::from_value(json!("id")).unwrap();
        assert_eq!(one.items(), vec!["id"]);
        let many: OneOrMany = serde_json::from_value(json!(["name", "group"])).unwrap();
        assert_eq!(many.items(), vec!["name", "group"]);
    }

    #[test]
    fn test_select_many_options_from_wire() {
        let opts: SelectManyOptions = serde_json::from_value(json!({
            "fieldsOnly": "idAndRelations",
            "where": {"hidden": "0"},
            "orderBy": ["name DESC", "id"],
        }))
        .unwrap();
        assert_eq!(opts.fields_only, Some(OneOrMany::One("idAndRelations".into())));
        assert_eq!(opts.where_.unwrap()["hidden"], json!("0"));
        assert_eq!(opts.order_by.unwrap().items(), vec!["name DESC", "id"]);
    }

    #[test]
    fn test_where_in_from_wire() {
        let win: WhereIn = serde_json::from_value(json!({
            "parentTable": "GroupTable",
            "parentIdColumn": "id",
            "ownForeignKey": "userGroupId",
            "parentWhere": {"hidden": "0"},
        }))
        .unwrap();
        assert_eq!(win.parent_table, "GroupTable");
        assert_eq!(win.parent_id_column.as_deref(), Some("id"));
        assert!(win.parent_foreign_key.is_none());
    }
}
