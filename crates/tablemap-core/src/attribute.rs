//! Resolved attribute descriptors.
//!
//! Every persistent attribute of a mapped type resolves to one
//! [`AttributeAccess`] implementation: [`FieldAccess`] reads and writes the
//! declared field, [`PropertyAccess`] goes through the getter/setter pair.
//! Column and marker metadata shared by both lives in [`AttributeInfo`].

use std::fmt;
use std::sync::Arc;

use crate::convert::AttributeConverter;
use crate::error::{Error, Result};
use crate::identifiers::Identifier;
use crate::mapping::{AccessType, Accessors, AttributeValue, EnumCodec, EnumType, TemporalType};
use crate::relation::Relation;
use crate::types::SqlType;
use crate::value::Value;

/// Column and marker metadata of one attribute.
#[derive(Clone)]
pub struct AttributeInfo {
    /// Logical attribute name.
    pub name: &'static str,
    /// Name of the mapped type declaring the attribute.
    pub owner: &'static str,
    pub column: Identifier,
    /// Declared value type. For join references this is the referenced
    /// identity's type once known, `Custom("REFERENCE")` before that.
    pub sql_type: SqlType,
    pub type_name: &'static str,
    pub access: AccessType,
    pub id: bool,
    pub generated: bool,
    pub transient: bool,
    pub join: bool,
    pub to_many: bool,
    pub self_join: bool,
    pub insertable: bool,
    pub updatable: bool,
    /// False for attributes disabled during resolution.
    pub to_be_considered: bool,
    pub enum_type: Option<EnumType>,
    pub enum_codec: Option<EnumCodec>,
    pub temporal: Option<TemporalType>,
    pub converter: Option<Arc<dyn AttributeConverter>>,
    /// Column of the referenced table a join column points at.
    pub referenced_column: Option<&'static str>,
}

impl AttributeInfo {
    pub fn new(owner: &'static str, name: &'static str, access: AccessType) -> Self {
        Self {
            name,
            owner,
            column: Identifier::new(name),
            sql_type: SqlType::Custom("UNKNOWN"),
            type_name: "",
            access,
            id: false,
            generated: false,
            transient: false,
            join: false,
            to_many: false,
            self_join: false,
            insertable: true,
            updatable: true,
            to_be_considered: true,
            enum_type: None,
            enum_codec: None,
            temporal: None,
            converter: None,
            referenced_column: None,
        }
    }

    /// Written by INSERT. A generated identity is left to the database.
    pub fn is_insertable(&self) -> bool {
        self.is_persistent() && self.insertable && !(self.id && self.generated)
    }

    /// Written by the SET clause of UPDATE. Identities never are.
    pub fn is_updatable(&self) -> bool {
        self.is_persistent() && self.updatable && !self.id
    }

    pub fn is_selectable(&self) -> bool {
        self.is_persistent()
    }

    /// "Owner.attribute", as used in diagnostics.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }

    fn is_persistent(&self) -> bool {
        self.to_be_considered && !self.transient && !self.to_many
    }
}

impl PartialEq for AttributeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.owner == other.owner
            && self.column == other.column
            && self.sql_type == other.sql_type
            && self.type_name == other.type_name
            && self.access == other.access
            && self.id == other.id
            && self.generated == other.generated
            && self.transient == other.transient
            && self.join == other.join
            && self.to_many == other.to_many
            && self.self_join == other.self_join
            && self.insertable == other.insertable
            && self.updatable == other.updatable
            && self.to_be_considered == other.to_be_considered
            && self.enum_type == other.enum_type
            && self.temporal == other.temporal
            && self.converter.is_some() == other.converter.is_some()
            && self.referenced_column == other.referenced_column
    }
}

impl fmt::Debug for AttributeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeInfo")
            .field("name", &self.name)
            .field("column", &self.column.delimited())
            .field("sql_type", &self.sql_type)
            .field("access", &self.access)
            .field("id", &self.id)
            .field("generated", &self.generated)
            .field("join", &self.join)
            .field("self_join", &self.self_join)
            .field("to_be_considered", &self.to_be_considered)
            .finish_non_exhaustive()
    }
}

/// Read/write capability for one attribute of `T`.
pub trait AttributeAccess<T>: Send + Sync {
    fn info(&self) -> &AttributeInfo;

    /// Current value. Join references yield the referenced identity.
    fn read(&self, instance: &T) -> Result<Value>;

    /// Store a value. Join references accept a raw identity or an object.
    fn write(&self, instance: &mut T, value: AttributeValue) -> Result<()>;

    /// Relationship behavior, for join and to-many attributes.
    fn relation(&self) -> Option<&dyn Relation<T>>;
}

/// Shared read path once the accessor is known.
fn read_with<T>(info: &AttributeInfo, accessors: &Accessors<T>, instance: &T) -> Result<Value> {
    if let Some(relation) = &accessors.relation {
        return relation.read_id(instance, info.referenced_column);
    }
    match &accessors.get {
        Some(get) => Ok(get(instance)),
        None => Err(Error::access(info.owner, info.name, "attribute has no getter")),
    }
}

fn write_with<T>(
    info: &AttributeInfo,
    accessors: &Accessors<T>,
    instance: &mut T,
    value: AttributeValue,
) -> Result<()> {
    if let Some(relation) = &accessors.relation {
        return match value {
            AttributeValue::Scalar(id) => relation.write_id(instance, id, info.referenced_column),
            AttributeValue::Object(object) => relation.write_object(instance, object),
        };
    }
    let set = accessors
        .set
        .as_ref()
        .ok_or_else(|| Error::access(info.owner, info.name, "attribute has no setter"))?;
    match value {
        AttributeValue::Scalar(v) => set(instance, v).map_err(|e| {
            Error::access(info.owner, info.name, format!("setter rejected value: {e}"))
        }),
        AttributeValue::Object(_) => Err(Error::access(
            info.owner,
            info.name,
            "a plain attribute only accepts a value",
        )),
    }
}

/// Attribute accessed through its declared field.
pub struct FieldAccess<T> {
    info: AttributeInfo,
    accessors: Accessors<T>,
}

impl<T> FieldAccess<T> {
    pub fn new(info: AttributeInfo, accessors: Accessors<T>) -> Self {
        Self { info, accessors }
    }
}

impl<T> AttributeAccess<T> for FieldAccess<T> {
    fn info(&self) -> &AttributeInfo {
        &self.info
    }

    fn read(&self, instance: &T) -> Result<Value> {
        read_with(&self.info, &self.accessors, instance)
    }

    fn write(&self, instance: &mut T, value: AttributeValue) -> Result<()> {
        write_with(&self.info, &self.accessors, instance, value)
    }

    fn relation(&self) -> Option<&dyn Relation<T>> {
        self.accessors.relation.as_deref()
    }
}

/// Attribute accessed through a getter/setter pair.
///
/// The getter and setter may come from different levels of the hierarchy;
/// both are merged into one [`Accessors`] at construction.
pub struct PropertyAccess<T> {
    info: AttributeInfo,
    accessors: Accessors<T>,
}

impl<T> PropertyAccess<T> {
    pub fn new(info: AttributeInfo, accessors: Accessors<T>) -> Self {
        Self { info, accessors }
    }
}

impl<T> AttributeAccess<T> for PropertyAccess<T> {
    fn info(&self) -> &AttributeInfo {
        &self.info
    }

    fn read(&self, instance: &T) -> Result<Value> {
        if !self.info.to_be_considered {
            return Err(Error::access(self.info.owner, self.info.name, "accessor pair is incomplete"));
        }
        read_with(&self.info, &self.accessors, instance)
    }

    fn write(&self, instance: &mut T, value: AttributeValue) -> Result<()> {
        if !self.info.to_be_considered {
            return Err(Error::access(self.info.owner, self.info.name, "accessor pair is incomplete"));
        }
        write_with(&self.info, &self.accessors, instance, value)
    }

    fn relation(&self) -> Option<&dyn Relation<T>> {
        self.accessors.relation.as_deref()
    }
}
