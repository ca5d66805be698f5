//! Inverse-link resolution and the startup schema-validation pass.
//!
//! Every has-many link must have a discoverable inverse belongs-to link on
//! its target type. The inverse is either explicit (named on the has-many
//! declaration and checked here) or inferred. Inference succeeds when exactly
//! one belongs-to field on the target points back at the source type;
//! additional candidates only survive disambiguation through their own
//! `inverse` declarations. All of this is checked once at registry build
//! time — a request never trips over a bad link.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::{BelongsTo, FieldDescriptor, HasMany, SchemaDescriptor};

/// Find the inverse belongs-to descriptor on `target` for `link`, declared on
/// an entity of type `source_type`.
pub fn find_inverse<'a>(
    source_type: &str,
    link: &HasMany,
    target: &'a SchemaDescriptor,
) -> Result<&'a BelongsTo> {
    if let Some(name) = &link.inverse {
        return match target.field(name) {
            Some(FieldDescriptor::BelongsTo(inverse)) => {
                if inverse.target_type == source_type {
                    Ok(inverse)
                } else {
                    Err(Error::config(format!(
                        "inverse `{}` of has-many `{}.{}` points at `{}`, not `{}`",
                        name, source_type, link.field_name, inverse.target_type, source_type
                    )))
                }
            }
            Some(FieldDescriptor::HasMany(_)) => Err(Error::config(format!(
                "inverse `{}` of has-many `{}.{}` is itself a has-many link on `{}`",
                name,
                source_type,
                link.field_name,
                target.entity_type()
            ))),
            Some(FieldDescriptor::Column(_)) | None => Err(Error::config(format!(
                "inverse `{}` of has-many `{}.{}` is not a belongs-to field on `{}`",
                name,
                source_type,
                link.field_name,
                target.entity_type()
            ))),
        };
    }

    let candidates: Vec<&BelongsTo> = target
        .belongs_to_links()
        .filter(|b| b.target_type == source_type)
        .collect();

    match candidates.as_slice() {
        [] => Err(Error::config(format!(
            "has-many `{}.{}` has no belongs-to inverse on `{}`",
            source_type,
            link.field_name,
            target.entity_type()
        ))),
        [only] => Ok(only),
        _ => {
            // More than one candidate: a candidate explicitly claiming this
            // relation wins; failing that, a single untagged candidate does.
            let claimed: Vec<&BelongsTo> = candidates
                .iter()
                .copied()
                .filter(|b| b.inverse.as_deref() == Some(link.field_name.as_str()))
                .collect();
            if let [winner] = claimed.as_slice() {
                return Ok(winner);
            }
            let untagged: Vec<&BelongsTo> = candidates
                .iter()
                .copied()
                .filter(|b| b.inverse.is_none())
                .collect();
            if let [winner] = untagged.as_slice() {
                return Ok(winner);
            }
            Err(Error::config(format!(
                "has-many `{}.{}` has {} candidate inverses on `{}`; disambiguate with `inverse`",
                source_type,
                link.field_name,
                candidates.len(),
                target.entity_type()
            )))
        }
    }
}

/// Validate every has-many link across a full schema set.
///
/// Run once at registry build; failures here are startup errors, never
/// request-time ones.
pub fn validate_schemas(schemas: &HashMap<String, SchemaDescriptor>) -> Result<()> {
    for schema in schemas.values() {
        for link in schema.has_many_links() {
            let target = schemas.get(&link.target_type).ok_or_else(|| {
                Error::config(format!(
                    "has-many `{}.{}` targets unregistered type `{}`",
                    schema.entity_type(),
                    link.field_name,
                    link.target_type
                ))
            })?;
            find_inverse(schema.entity_type(), link, target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BelongsToLink, ColumnType, HasManyLink};

    fn schemas(pairs: Vec<SchemaDescriptor>) -> HashMap<String, SchemaDescriptor> {
        pairs
            .into_iter()
            .map(|s| (s.entity_type().to_string(), s))
            .collect()
    }

    fn group_with_users() -> SchemaDescriptor {
        SchemaDescriptor::new("userGroup", "GroupTable")
            .column("label", ColumnType::String)
            .has_many("users", HasManyLink::to("user", "userGroupId"))
            .finish()
            .unwrap()
    }

    #[test]
    fn test_single_candidate_inferred() {
        let user = SchemaDescriptor::new("user", "UserTable")
            .belongs_to("group", BelongsToLink::to("userGroup"))
            .finish()
            .unwrap();
        let map = schemas(vec![group_with_users(), user]);
        assert!(validate_schemas(&map).is_ok());
    }

    #[test]
    fn test_zero_candidates_is_config_error() {
        let user = SchemaDescriptor::new("user", "UserTable")
            .column("name", ColumnType::String)
            .finish()
            .unwrap();
        let map = schemas(vec![group_with_users(), user]);
        let err = validate_schemas(&map).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("no belongs-to inverse"));
    }

    #[test]
    fn test_unregistered_target_is_config_error() {
        let map = schemas(vec![group_with_users()]);
        let err = validate_schemas(&map).unwrap_err();
        assert!(err.to_string().contains("unregistered type `user`"));
    }

    #[test]
    fn test_two_untagged_candidates_are_ambiguous() {
        // Self-referential "friends"/"enemies" shape: two belongs-to fields
        // on the same type pointing back, neither tagged.
        let person = SchemaDescriptor::new("person", "PersonTable")
            .belongs_to("friend", BelongsToLink::to("person").fk_column("FriendID"))
            .belongs_to("enemy", BelongsToLink::to("person").fk_column("EnemyID"))
            .has_many("friends", HasManyLink::to("person", "FriendID"))
            .finish()
            .unwrap();
        let map = schemas(vec![person]);
        let err = validate_schemas(&map).unwrap_err();
        assert!(err.to_string().contains("candidate inverses"));
    }

    #[test]
    fn test_claiming_candidate_wins() {
        let person = SchemaDescriptor::new("person", "PersonTable")
            .belongs_to(
                "friend",
                BelongsToLink::to("person")
                    .fk_column("FriendID")
                    .inverse("friends"),
            )
            .belongs_to("enemy", BelongsToLink::to("person").fk_column("EnemyID"))
            .has_many("friends", HasManyLink::to("person", "FriendID"))
            .finish()
            .unwrap();
        let link = person.has_many("friends").unwrap().clone();
        let inverse = find_inverse("person", &link, &person).unwrap();
        assert_eq!(inverse.field_name, "friend");
    }

    #[test]
    fn test_single_untagged_candidate_survives() {
        // One candidate is claimed by a different relation; the remaining
        // untagged one is the inferred inverse.
        let person = SchemaDescriptor::new("person", "PersonTable")
            .belongs_to(
                "friend",
                BelongsToLink::to("person")
                    .fk_column("FriendID")
                    .inverse("friends"),
            )
            .belongs_to("enemy", BelongsToLink::to("person").fk_column("EnemyID"))
            .has_many("enemies", HasManyLink::to("person", "EnemyID"))
            .finish()
            .unwrap();
        let link = person.has_many("enemies").unwrap().clone();
        let inverse = find_inverse("person", &link, &person).unwrap();
        assert_eq!(inverse.field_name, "enemy");
    }

    #[test]
    fn test_explicit_inverse_checked() {
        let user = SchemaDescriptor::new("user", "UserTable")
            .belongs_to("group", BelongsToLink::to("userGroup"))
            .finish()
            .unwrap();
        let group = SchemaDescriptor::new("userGroup", "GroupTable")
            .has_many(
                "users",
                HasManyLink::to("user", "userGroupId").inverse("group"),
            )
            .finish()
            .unwrap();
        let link = group.has_many("users").unwrap().clone();
        let inverse = find_inverse("userGroup", &link, &user).unwrap();
        assert_eq!(inverse.field_name, "group");

        // Inverse naming a plain column is rejected.
        let bad = SchemaDescriptor::new("userGroup", "GroupTable")
            .has_many(
                "users",
                HasManyLink::to("user", "userGroupId").inverse("name"),
            )
            .finish()
            .unwrap();
        let bad_link = bad.has_many("users").unwrap().clone();
        assert!(find_inverse("userGroup", &bad_link, &user).is_err());
    }

    #[test]
    fn test_explicit_inverse_must_point_back() {
        let user = SchemaDescriptor::new("user", "UserTable")
            .belongs_to("team", BelongsToLink::to("team"))
            .finish()
            .unwrap();
        let group = SchemaDescriptor::new("userGroup", "GroupTable")
            .has_many(
                "users",
                HasManyLink::to("user", "userGroupId").inverse("team"),
            )
            .finish()
            .unwrap();
        let link = group.has_many("users").unwrap().clone();
        let err = find_inverse("userGroup", &link, &user).unwrap_err();
        assert!(err.to_string().contains("not `userGroup`"));
    }
}
