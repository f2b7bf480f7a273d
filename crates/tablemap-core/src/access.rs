//! Access-type resolution.
//!
//! Walks the declared hierarchy of a mapped type once and decides, for
//! every attribute name, whether the attribute is read and written through
//! its field or through its getter/setter pair. The outcome is one
//! [`FieldAccess`] or [`PropertyAccess`] per persistent attribute.
//!
//! Rules, in order of precedence:
//!
//! 1. An access override on the member itself always wins.
//! 2. Otherwise the default of the level that introduced the attribute
//!    applies: the most derived level declaring a field of that name, or the
//!    root-most level declaring the accessor.
//! 3. A level's default is its explicit access type; failing that, the kind
//!    of member carrying persistence markers among the attributes first
//!    introduced on that level (fields win a tie); failing that, the
//!    default inherited from the level above it.

use std::any::TypeId;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::attribute::{AttributeAccess, AttributeInfo, FieldAccess, PropertyAccess};
use crate::error::{Error, Result};
use crate::identifiers::Identifier;
use crate::mapping::{
    AccessType, Accessors, ClassDecl, ClassKind, Entity, EnumType, Mapping, Marker, Member,
};

/// Resolve the declared hierarchy of `T` into attribute descriptors, in
/// order of first declaration.
pub(crate) fn resolve_attributes<T: Entity>(
    entity: &'static str,
    mapping: &Mapping<T>,
) -> Result<Vec<Arc<dyn AttributeAccess<T>>>> {
    let levels: Vec<&ClassDecl<T>> = mapping
        .levels
        .iter()
        .filter(|level| level.kind != ClassKind::NotMapped)
        .collect();

    check_overrides(entity, &levels)?;
    let defaults = level_defaults(&levels);

    let mut names: Vec<&'static str> = Vec::new();
    for level in &levels {
        for member in &level.members {
            if !names.contains(&member.name) {
                names.push(member.name);
            }
        }
    }

    let mut attributes: Vec<Arc<dyn AttributeAccess<T>>> = Vec::with_capacity(names.len());
    for name in names {
        let access = attribute_access(&levels, &defaults, name);
        debug!(entity, attribute = name, ?access, "Resolved access type");
        let resolved = match access {
            AccessType::Field => field_attribute(entity, &levels, name)?,
            AccessType::Property => property_attribute(entity, &levels, name)?,
        };
        if let Some(attr) = resolved {
            attributes.push(attr);
        }
    }

    let generated = attributes
        .iter()
        .filter(|a| a.info().id && a.info().generated)
        .count();
    if generated > 1 {
        return Err(Error::metadata(
            entity,
            format!("{generated} generated identity attributes declared, at most one is supported"),
        ));
    }
    let self_joins = attributes.iter().filter(|a| a.info().self_join).count();
    if self_joins > 1 {
        return Err(Error::metadata(
            entity,
            format!("{self_joins} self-join attributes declared, at most one is supported"),
        ));
    }

    Ok(attributes)
}

fn check_overrides<T: 'static>(entity: &'static str, levels: &[&ClassDecl<T>]) -> Result<()> {
    for member in levels.iter().flat_map(|level| level.members.iter()) {
        match (member.kind, member.access_override()) {
            (AccessType::Property, Some(AccessType::Field)) => {
                return Err(Error::metadata_at(
                    entity,
                    member.name,
                    "A method can not be of access type field",
                ));
            }
            (AccessType::Field, Some(AccessType::Property)) => {
                return Err(Error::metadata_at(
                    entity,
                    member.name,
                    "A field can not be of access type property",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn level_defaults<T: 'static>(levels: &[&ClassDecl<T>]) -> Vec<AccessType> {
    let mut defaults = Vec::with_capacity(levels.len());
    let mut inherited = AccessType::Field;
    for (i, level) in levels.iter().enumerate() {
        let earlier = &levels[..i];
        // Only attributes first introduced here decide the level's default.
        let introduced = |m: &Member<T>| {
            !earlier
                .iter()
                .any(|above| above.members.iter().any(|a| a.name == m.name))
        };
        let marked = |kind: AccessType| {
            level
                .members
                .iter()
                .any(|m| m.kind == kind && m.has_persistence_markers() && introduced(m))
        };
        let default = match level.access {
            Some(explicit) => explicit,
            None if marked(AccessType::Field) => AccessType::Field,
            None if marked(AccessType::Property) => AccessType::Property,
            None => inherited,
        };
        inherited = default;
        defaults.push(default);
    }
    defaults
}

fn attribute_access<T: 'static>(
    levels: &[&ClassDecl<T>],
    defaults: &[AccessType],
    name: &str,
) -> AccessType {
    if let Some(explicit) = declared(levels, name, AccessType::Field)
        .chain(declared(levels, name, AccessType::Property))
        .find_map(Member::access_override)
    {
        return explicit;
    }

    let has = |level: &ClassDecl<T>, kind: AccessType| {
        level.members.iter().any(|m| m.name == name && m.kind == kind)
    };
    let introducing = levels
        .iter()
        .rposition(|level| has(level, AccessType::Field))
        .or_else(|| levels.iter().position(|level| has(level, AccessType::Property)));
    introducing.map_or(AccessType::Field, |i| defaults[i])
}

/// Members named `name` of one kind, most derived level first.
fn declared<'a, T>(
    levels: &'a [&'a ClassDecl<T>],
    name: &'a str,
    kind: AccessType,
) -> impl Iterator<Item = &'a Member<T>> + 'a {
    levels
        .iter()
        .rev()
        .flat_map(|level| level.members.iter())
        .filter(move |m| m.name == name && m.kind == kind)
}

fn field_attribute<T: Entity>(
    entity: &'static str,
    levels: &[&ClassDecl<T>],
    name: &'static str,
) -> Result<Option<Arc<dyn AttributeAccess<T>>>> {
    let Some(member) = declared(levels, name, AccessType::Field).next() else {
        debug!(entity, attribute = name, "No field declared under field access, skipping");
        return Ok(None);
    };
    if !member.accessors.can_read() || !member.accessors.can_write() {
        return Err(Error::metadata_at(
            entity,
            name,
            "a field needs both read and write access",
        ));
    }

    let mut info = AttributeInfo::new(entity, name, AccessType::Field);
    apply_markers::<T>(&mut info, &member.markers, &member.accessors)?;
    Ok(Some(Arc::new(FieldAccess::new(info, member.accessors.clone()))))
}

fn property_attribute<T: Entity>(
    entity: &'static str,
    levels: &[&ClassDecl<T>],
    name: &'static str,
) -> Result<Option<Arc<dyn AttributeAccess<T>>>> {
    let members: Vec<&Member<T>> = declared(levels, name, AccessType::Property).collect();
    if members.is_empty() {
        debug!(entity, attribute = name, "No accessor declared under property access, skipping");
        return Ok(None);
    }

    let getter = members
        .iter()
        .find(|m| m.accessors.get.is_some() || m.accessors.relation.is_some());
    let setter = members
        .iter()
        .find(|m| m.accessors.set.is_some() || m.accessors.relation.is_some());
    let marked = members
        .iter()
        .find(|m| m.has_persistence_markers())
        .unwrap_or(&members[0]);

    let source = getter.or(setter).unwrap_or(&members[0]);
    let accessors = Accessors {
        sql_type: source.accessors.sql_type.clone(),
        type_name: source.accessors.type_name,
        get: getter.and_then(|m| m.accessors.get.clone()),
        set: setter.and_then(|m| m.accessors.set.clone()),
        enum_codec: source.accessors.enum_codec.or(marked.accessors.enum_codec),
        relation: getter
            .or(setter)
            .and_then(|m| m.accessors.relation.clone()),
    };

    let mut info = AttributeInfo::new(entity, name, AccessType::Property);
    if getter.is_none() || setter.is_none() {
        warn!(
            entity,
            attribute = name,
            has_getter = getter.is_some(),
            has_setter = setter.is_some(),
            "Accessor pair is incomplete, attribute is not persisted"
        );
        info.to_be_considered = false;
    }
    match apply_markers::<T>(&mut info, &marked.markers, &accessors) {
        Ok(()) => {}
        Err(Error::Metadata(e)) if is_unresolved_join(&e.message) => {
            warn!(entity, attribute = name, error = %e, "Join column cannot be resolved, attribute is not persisted");
            info.to_be_considered = false;
        }
        Err(e) => return Err(e),
    }
    Ok(Some(Arc::new(PropertyAccess::new(info, accessors))))
}

const UNRESOLVED_JOIN: &str = "join attribute has no reference accessors";

fn is_unresolved_join(message: &str) -> bool {
    message == UNRESOLVED_JOIN
}

/// Fold a member's markers and accessor kind into `info`.
fn apply_markers<T: Entity>(
    info: &mut AttributeInfo,
    markers: &[Marker],
    accessors: &Accessors<T>,
) -> Result<()> {
    info.sql_type = accessors.sql_type.clone();
    info.type_name = accessors.type_name;

    let mut column_name = None;
    let mut join_column_name = None;
    let mut declared_to_one = false;
    for marker in markers {
        match marker {
            Marker::Id => info.id = true,
            Marker::GeneratedValue => info.generated = true,
            Marker::Column(spec) => {
                column_name = spec.name;
                info.insertable = spec.insertable;
                info.updatable = spec.updatable;
            }
            Marker::JoinColumn(spec) => {
                join_column_name = Some(spec.name);
                info.referenced_column = spec.referenced_column;
            }
            Marker::ManyToOne | Marker::OneToOne => declared_to_one = true,
            Marker::OneToMany | Marker::ManyToMany => info.to_many = true,
            Marker::Transient => info.transient = true,
            Marker::Enumerated(enum_type) => {
                if accessors.enum_codec.is_none() {
                    return Err(Error::metadata_at(
                        info.owner,
                        info.name,
                        "only enum attributes can be enumerated",
                    ));
                }
                info.enum_type = Some(*enum_type);
            }
            Marker::Temporal(temporal) => info.temporal = Some(*temporal),
            Marker::Convert(converter) => info.converter = Some(Arc::clone(converter)),
            Marker::Basic | Marker::Access(_) => {}
        }
    }

    match &accessors.relation {
        Some(relation) if relation.is_many() => info.to_many = true,
        Some(relation) => {
            info.join = true;
            info.self_join = relation.target_type() == TypeId::of::<T>();
        }
        None if declared_to_one => {
            return Err(Error::metadata_at(info.owner, info.name, UNRESOLVED_JOIN));
        }
        None => {}
    }
    if info.enum_type.is_none() && accessors.enum_codec.is_some() {
        info.enum_type = Some(EnumType::Ordinal);
    }
    info.enum_codec = accessors.enum_codec;

    let column = column_name.or(join_column_name).unwrap_or(info.name);
    info.column = Identifier::new(column);
    Ok(())
}
