//! Declarative mapping metadata.
//!
//! A mapped type describes itself once through [`Entity::mapping`]: an
//! ordered list of class levels (root first, the mapped type itself last),
//! each declaring fields and accessor properties with their markers.
//!
//! ```rust,ignore
//! impl Entity for Invoice {
//!     fn mapping() -> Mapping<Self> {
//!         Mapping::new().level(
//!             ClassDecl::entity("Invoice")
//!                 .table("invoices")
//!                 .member(
//!                     Member::field("id", Accessors::scalar(|i: &Invoice| i.id, |i, v| i.id = v))
//!                         .id()
//!                         .generated(),
//!                 )
//!                 .member(Member::field(
//!                     "total",
//!                     Accessors::scalar(|i: &Invoice| i.total, |i, v| i.total = v),
//!                 )),
//!         )
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::convert::AttributeConverter;
use crate::error::{Error, Result};
use crate::relation::{CollectionLink, ReferenceLink, Relation};
use crate::types::{SqlType, TypeInfo};
use crate::value::Value;

/// A type whose instances map to rows of one table.
pub trait Entity: Sized + Send + 'static {
    /// Declared class hierarchy of this type.
    fn mapping() -> Mapping<Self>;
}

/// Attribute value types that convert to and from [`Value`].
pub trait Persistable: Into<Value> + TryFrom<Value, Error = Error> + TypeInfo + Send + 'static {}

impl<V> Persistable for V where V: Into<Value> + TryFrom<Value, Error = Error> + TypeInfo + Send + 'static
{}

/// Enumerations stored either by position or by name.
pub trait SqlEnum: Copy + PartialEq + Send + Sync + 'static {
    /// All variants in declaration order.
    fn variants() -> &'static [Self];

    /// Stored name of this variant.
    fn name(&self) -> &'static str;

    /// Zero-based declaration position.
    #[allow(clippy::cast_possible_truncation)]
    fn ordinal(&self) -> i32 {
        Self::variants()
            .iter()
            .position(|v| v == self)
            .map_or(-1, |p| p as i32)
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::variants().iter().copied().find(|v| v.name() == name)
    }

    fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::variants().get(i).copied())
    }
}

/// How an attribute is read and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    /// Directly through the declared field.
    Field,
    /// Through the getter/setter pair.
    Property,
}

/// Role of one level in the declared hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Entity,
    MappedSuperclass,
    /// Ancestor whose members are not persistent.
    NotMapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumType {
    Ordinal,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalType {
    Date,
    Time,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: Option<&'static str>,
    pub insertable: bool,
    pub updatable: bool,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            name: None,
            insertable: true,
            updatable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinColumnSpec {
    pub name: &'static str,
    /// Column of the referenced table; its first identity column when unset.
    pub referenced_column: Option<&'static str>,
}

/// A persistence marker attached to a field or accessor.
#[derive(Clone)]
pub enum Marker {
    Id,
    GeneratedValue,
    Column(ColumnSpec),
    JoinColumn(JoinColumnSpec),
    ManyToOne,
    OneToOne,
    OneToMany,
    ManyToMany,
    Transient,
    Enumerated(EnumType),
    Temporal(TemporalType),
    Convert(Arc<dyn AttributeConverter>),
    Basic,
    /// Per-member access override.
    Access(AccessType),
}

impl Marker {
    /// Whether this marker makes its member count toward the level's
    /// default access type. Access overrides do not.
    pub fn is_persistence_marker(&self) -> bool {
        !matches!(self, Marker::Access(_))
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Id => write!(f, "Id"),
            Marker::GeneratedValue => write!(f, "GeneratedValue"),
            Marker::Column(c) => write!(f, "Column({c:?})"),
            Marker::JoinColumn(j) => write!(f, "JoinColumn({j:?})"),
            Marker::ManyToOne => write!(f, "ManyToOne"),
            Marker::OneToOne => write!(f, "OneToOne"),
            Marker::OneToMany => write!(f, "OneToMany"),
            Marker::ManyToMany => write!(f, "ManyToMany"),
            Marker::Transient => write!(f, "Transient"),
            Marker::Enumerated(e) => write!(f, "Enumerated({e:?})"),
            Marker::Temporal(t) => write!(f, "Temporal({t:?})"),
            Marker::Convert(c) => write!(f, "Convert({c:?})"),
            Marker::Basic => write!(f, "Basic"),
            Marker::Access(a) => write!(f, "Access({a:?})"),
        }
    }
}

pub(crate) type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
pub(crate) type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// Name/ordinal translation for one enum type.
#[derive(Clone, Copy)]
pub struct EnumCodec {
    pub(crate) ordinal_of: fn(&str) -> Option<i32>,
}

impl EnumCodec {
    fn of<E: SqlEnum>() -> Self {
        Self {
            ordinal_of: |name| E::from_name(name).map(|e| e.ordinal()),
        }
    }

    pub fn ordinal_of(&self, name: &str) -> Option<i32> {
        (self.ordinal_of)(name)
    }
}

impl fmt::Debug for EnumCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnumCodec")
    }
}

/// Type-erased read/write access to one member of `T`.
pub struct Accessors<T> {
    pub(crate) sql_type: SqlType,
    pub(crate) type_name: &'static str,
    pub(crate) get: Option<Getter<T>>,
    pub(crate) set: Option<Setter<T>>,
    pub(crate) enum_codec: Option<EnumCodec>,
    pub(crate) relation: Option<Arc<dyn Relation<T>>>,
}

impl<T> Clone for Accessors<T> {
    fn clone(&self) -> Self {
        Self {
            sql_type: self.sql_type.clone(),
            type_name: self.type_name,
            get: self.get.clone(),
            set: self.set.clone(),
            enum_codec: self.enum_codec,
            relation: self.relation.clone(),
        }
    }
}

impl<T: 'static> Accessors<T> {
    /// Getter and setter of a plain value.
    pub fn scalar<V, G, S>(get: G, set: S) -> Self
    where
        V: Persistable,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let mut accessors = Self::getter::<V, G>(get);
        accessors.set = Self::setter::<V, S>(set).set;
        accessors
    }

    /// Read-only access; pairs with a setter declared elsewhere.
    pub fn getter<V, G>(get: G) -> Self
    where
        V: Persistable,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self {
            sql_type: V::SQL_TYPE,
            type_name: V::TYPE_NAME,
            get: Some(Arc::new(move |obj: &T| -> Value { get(obj).into() })),
            set: None,
            enum_codec: None,
            relation: None,
        }
    }

    /// Write-only access; pairs with a getter declared elsewhere.
    pub fn setter<V, S>(set: S) -> Self
    where
        V: Persistable,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self {
            sql_type: V::SQL_TYPE,
            type_name: V::TYPE_NAME,
            get: None,
            set: Some(Arc::new(move |obj: &mut T, value: Value| -> Result<()> {
                set(obj, V::try_from(value)?);
                Ok(())
            })),
            enum_codec: None,
            relation: None,
        }
    }

    /// An enum value, exchanged as its variant name and stored by name or
    /// ordinal depending on the `Enumerated` marker.
    pub fn enumerated<E, G, S>(get: G, set: S) -> Self
    where
        E: SqlEnum,
        G: Fn(&T) -> E + Send + Sync + 'static,
        S: Fn(&mut T, E) + Send + Sync + 'static,
    {
        Self {
            sql_type: SqlType::Text,
            type_name: std::any::type_name::<E>(),
            get: Some(Arc::new(move |obj: &T| -> Value {
                Value::Text(get(obj).name().to_string())
            })),
            set: Some(Arc::new(move |obj: &mut T, value: Value| -> Result<()> {
                set(obj, enum_from_value::<E>(&value)?);
                Ok(())
            })),
            enum_codec: Some(EnumCodec::of::<E>()),
            relation: None,
        }
    }

    /// A to-one reference to another mapped type, stored as that row's
    /// identity in a join column.
    pub fn reference<R, G, S>(get: G, set: S) -> Self
    where
        R: Entity + Default,
        G: Fn(&T) -> Option<&R> + Send + Sync + 'static,
        S: Fn(&mut T, Option<R>) + Send + Sync + 'static,
    {
        Self {
            sql_type: SqlType::Custom("REFERENCE"),
            type_name: std::any::type_name::<R>(),
            get: None,
            set: None,
            enum_codec: None,
            relation: Some(Arc::new(ReferenceLink::new(get, set))),
        }
    }

    /// The inverse, to-many side of a relationship. Never written to a
    /// column; it only accepts whole collections.
    pub fn collection<R, S>(set: S) -> Self
    where
        R: Entity,
        S: Fn(&mut T, Vec<R>) + Send + Sync + 'static,
    {
        Self {
            sql_type: SqlType::Custom("COLLECTION"),
            type_name: std::any::type_name::<Vec<R>>(),
            get: None,
            set: None,
            enum_codec: None,
            relation: Some(Arc::new(CollectionLink::new(set))),
        }
    }

    pub(crate) fn can_read(&self) -> bool {
        self.get.is_some() || self.relation.is_some()
    }

    pub(crate) fn can_write(&self) -> bool {
        self.set.is_some() || self.relation.is_some()
    }
}

fn enum_from_value<E: SqlEnum>(value: &Value) -> Result<E> {
    let found = match value {
        Value::Text(name) => E::from_name(name),
        other => other.as_i64().and_then(E::from_ordinal),
    };
    found.ok_or_else(|| {
        Error::Type(crate::error::TypeError {
            expected: "enum variant name or ordinal",
            actual: format!("{value:?}"),
            column: None,
            rust_type: Some(std::any::type_name::<E>()),
        })
    })
}

/// A value written to an attribute.
pub enum AttributeValue {
    /// Plain value, or the raw identity for a reference attribute.
    Scalar(Value),
    /// An instantiated object for reference or collection attributes.
    Object(Box<dyn Any + Send>),
}

impl From<Value> for AttributeValue {
    fn from(v: Value) -> Self {
        AttributeValue::Scalar(v)
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Scalar(v) => write!(f, "Scalar({v:?})"),
            AttributeValue::Object(_) => write!(f, "Object(..)"),
        }
    }
}

/// One declared field or accessor pair.
pub struct Member<T> {
    pub(crate) name: &'static str,
    pub(crate) kind: AccessType,
    pub(crate) markers: Vec<Marker>,
    pub(crate) accessors: Accessors<T>,
}

impl<T: 'static> Member<T> {
    /// A field. Read and written directly under field access.
    pub fn field(name: &'static str, accessors: Accessors<T>) -> Self {
        Self {
            name,
            kind: AccessType::Field,
            markers: Vec::new(),
            accessors,
        }
    }

    /// A getter and/or setter pair, named after the attribute it exposes.
    pub fn property(name: &'static str, accessors: Accessors<T>) -> Self {
        Self {
            name,
            kind: AccessType::Property,
            markers: Vec::new(),
            accessors,
        }
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn id(self) -> Self {
        self.marker(Marker::Id)
    }

    pub fn generated(self) -> Self {
        self.marker(Marker::GeneratedValue)
    }

    pub fn column(self, name: &'static str) -> Self {
        self.with_column(|spec| spec.name = Some(name))
    }

    pub fn not_insertable(self) -> Self {
        self.with_column(|spec| spec.insertable = false)
    }

    pub fn not_updatable(self) -> Self {
        self.with_column(|spec| spec.updatable = false)
    }

    pub fn join_column(self, name: &'static str) -> Self {
        self.marker(Marker::JoinColumn(JoinColumnSpec {
            name,
            referenced_column: None,
        }))
    }

    pub fn join_column_referencing(self, name: &'static str, referenced: &'static str) -> Self {
        self.marker(Marker::JoinColumn(JoinColumnSpec {
            name,
            referenced_column: Some(referenced),
        }))
    }

    pub fn many_to_one(self) -> Self {
        self.marker(Marker::ManyToOne)
    }

    pub fn one_to_one(self) -> Self {
        self.marker(Marker::OneToOne)
    }

    pub fn one_to_many(self) -> Self {
        self.marker(Marker::OneToMany)
    }

    pub fn transient(self) -> Self {
        self.marker(Marker::Transient)
    }

    pub fn enumerated(self, enum_type: EnumType) -> Self {
        self.marker(Marker::Enumerated(enum_type))
    }

    pub fn temporal(self, temporal: TemporalType) -> Self {
        self.marker(Marker::Temporal(temporal))
    }

    pub fn convert(self, converter: impl AttributeConverter + 'static) -> Self {
        self.marker(Marker::Convert(Arc::new(converter)))
    }

    pub fn basic(self) -> Self {
        self.marker(Marker::Basic)
    }

    pub fn access(self, access: AccessType) -> Self {
        self.marker(Marker::Access(access))
    }

    /// Edit the member's column marker, adding a default one first if absent.
    fn with_column(mut self, edit: impl FnOnce(&mut ColumnSpec)) -> Self {
        let existing = self.markers.iter_mut().find_map(|m| match m {
            Marker::Column(spec) => Some(spec),
            _ => None,
        });
        if let Some(spec) = existing {
            edit(spec);
        } else {
            let mut spec = ColumnSpec::default();
            edit(&mut spec);
            self.markers.push(Marker::Column(spec));
        }
        self
    }

    pub(crate) fn has_persistence_markers(&self) -> bool {
        self.markers.iter().any(Marker::is_persistence_marker)
    }

    pub(crate) fn access_override(&self) -> Option<AccessType> {
        self.markers.iter().find_map(|m| match m {
            Marker::Access(a) => Some(*a),
            _ => None,
        })
    }
}

/// One level of the declared hierarchy.
pub struct ClassDecl<T> {
    pub(crate) name: &'static str,
    pub(crate) kind: ClassKind,
    pub(crate) access: Option<AccessType>,
    pub(crate) table: Option<&'static str>,
    pub(crate) members: Vec<Member<T>>,
}

impl<T: 'static> ClassDecl<T> {
    fn with_kind(name: &'static str, kind: ClassKind) -> Self {
        Self {
            name,
            kind,
            access: None,
            table: None,
            members: Vec::new(),
        }
    }

    pub fn entity(name: &'static str) -> Self {
        Self::with_kind(name, ClassKind::Entity)
    }

    pub fn mapped_superclass(name: &'static str) -> Self {
        Self::with_kind(name, ClassKind::MappedSuperclass)
    }

    pub fn not_mapped(name: &'static str) -> Self {
        Self::with_kind(name, ClassKind::NotMapped)
    }

    /// Table name; a name wrapped in double quotes is kept delimited.
    pub fn table(mut self, name: &'static str) -> Self {
        self.table = Some(name);
        self
    }

    /// Explicit default access type for this level.
    pub fn access(mut self, access: AccessType) -> Self {
        self.access = Some(access);
        self
    }

    pub fn member(mut self, member: Member<T>) -> Self {
        self.members.push(member);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }
}

/// The declared hierarchy of a mapped type, root level first.
pub struct Mapping<T> {
    pub(crate) levels: Vec<ClassDecl<T>>,
}

impl<T: 'static> Mapping<T> {
    pub fn new() -> Self {
        Self { levels: Vec::new() }
    }

    /// Append the next, more derived level.
    pub fn level(mut self, class: ClassDecl<T>) -> Self {
        self.levels.push(class);
        self
    }

    pub fn levels(&self) -> &[ClassDecl<T>] {
        &self.levels
    }
}

impl<T: 'static> Default for Mapping<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Color {
        Red,
        Green,
    }

    impl SqlEnum for Color {
        fn variants() -> &'static [Self] {
            &[Color::Red, Color::Green]
        }

        fn name(&self) -> &'static str {
            match self {
                Color::Red => "RED",
                Color::Green => "GREEN",
            }
        }
    }

    #[derive(Default)]
    struct Paint {
        code: i64,
        color: Option<Color>,
    }

    #[test]
    fn sql_enum_defaults() {
        assert_eq!(Color::Green.ordinal(), 1);
        assert_eq!(Color::from_name("RED"), Some(Color::Red));
        assert_eq!(Color::from_ordinal(1), Some(Color::Green));
        assert_eq!(Color::from_ordinal(-1), None);
        assert_eq!(Color::from_ordinal(5), None);
    }

    #[test]
    fn scalar_accessors_convert_values() {
        let acc = Accessors::scalar(|p: &Paint| p.code, |p, v| p.code = v);
        let mut paint = Paint::default();
        (acc.set.as_ref().unwrap())(&mut paint, Value::Int(7)).unwrap();
        assert_eq!(paint.code, 7);
        assert_eq!((acc.get.as_ref().unwrap())(&paint), Value::BigInt(7));
        assert_eq!(acc.sql_type, SqlType::BigInt);
        assert!((acc.set.as_ref().unwrap())(&mut paint, Value::Text("x".into())).is_err());
    }

    #[test]
    fn enum_accessors_accept_name_or_ordinal() {
        let acc = Accessors::enumerated(
            |p: &Paint| p.color.unwrap_or(Color::Red),
            |p, v| p.color = Some(v),
        );
        let mut paint = Paint::default();
        let set = acc.set.as_ref().unwrap();
        set(&mut paint, Value::Text("GREEN".into())).unwrap();
        assert_eq!(paint.color, Some(Color::Green));
        set(&mut paint, Value::BigInt(0)).unwrap();
        assert_eq!(paint.color, Some(Color::Red));
        assert!(set(&mut paint, Value::Text("BLUE".into())).is_err());
        assert_eq!(acc.enum_codec.unwrap().ordinal_of("GREEN"), Some(1));
    }

    #[test]
    fn column_modifiers_share_one_marker() {
        let member = Member::field("code", Accessors::scalar(|p: &Paint| p.code, |p, v| p.code = v))
            .column("paint_code")
            .not_updatable();
        let columns: Vec<_> = member
            .markers
            .iter()
            .filter_map(|m| match m {
                Marker::Column(c) => Some(c.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            columns,
            vec![ColumnSpec {
                name: Some("paint_code"),
                insertable: true,
                updatable: false,
            }]
        );
        assert!(member.has_persistence_markers());
    }

    #[test]
    fn column_modifiers_apply_in_any_order() {
        let member = Member::field("code", Accessors::scalar(|p: &Paint| p.code, |p, v| p.code = v))
            .not_insertable()
            .id()
            .column("paint_code")
            .not_updatable();
        let columns: Vec<_> = member
            .markers
            .iter()
            .filter_map(|m| match m {
                Marker::Column(c) => Some(c.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            columns,
            vec![ColumnSpec {
                name: Some("paint_code"),
                insertable: false,
                updatable: false,
            }]
        );
        assert!(matches!(member.markers[0], Marker::Column(_)));
    }

    #[test]
    fn access_marker_is_not_a_persistence_marker() {
        let member = Member::property("code", Accessors::getter(|p: &Paint| p.code))
            .access(AccessType::Property);
        assert!(!member.has_persistence_markers());
        assert_eq!(member.access_override(), Some(AccessType::Property));
    }
}
