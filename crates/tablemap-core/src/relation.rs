//! Relationship attributes.
//!
//! A to-one reference is stored as the referenced row's identity in a join
//! column. The descriptor of the referenced type is resolved on first use
//! and memoized, which keeps self-referencing types from recursing during
//! their own resolution.

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use crate::attribute::AttributeAccess;
use crate::coerce;
use crate::error::{Error, Result};
use crate::introspected::Introspected;
use crate::mapping::{AttributeValue, Entity};
use crate::types::SqlType;
use crate::value::Value;

/// Type-erased behavior of a relationship attribute on owner type `T`.
pub trait Relation<T>: Send + Sync {
    /// Name of the referenced type, for diagnostics.
    fn target_name(&self) -> &'static str;

    /// Identity of the referenced type, used for self-join detection.
    fn target_type(&self) -> TypeId;

    /// Whether this is the to-many side.
    fn is_many(&self) -> bool;

    /// Declared type of the referenced identity column.
    fn target_id_type(&self, referenced: Option<&str>) -> Result<SqlType>;

    /// Identity of the referenced object, NULL when there is none.
    fn read_id(&self, owner: &T, referenced: Option<&str>) -> Result<Value>;

    /// Replace the reference with a fresh object carrying only `id`.
    fn write_id(&self, owner: &mut T, id: Value, referenced: Option<&str>) -> Result<()>;

    /// Replace the reference with an instantiated object.
    fn write_object(&self, owner: &mut T, object: Box<dyn Any + Send>) -> Result<()>;
}

type RefGetter<T, R> = Box<dyn for<'a> Fn(&'a T) -> Option<&'a R> + Send + Sync>;
type RefSetter<T, R> = Box<dyn Fn(&mut T, Option<R>) + Send + Sync>;

/// Many-to-one or one-to-one reference to `R`.
pub struct ReferenceLink<T, R: Entity> {
    get: RefGetter<T, R>,
    set: RefSetter<T, R>,
    target: OnceLock<Arc<Introspected<R>>>,
}

impl<T, R> ReferenceLink<T, R>
where
    T: 'static,
    R: Entity + Default,
{
    pub fn new<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&T) -> Option<&R> + Send + Sync + 'static,
        S: Fn(&mut T, Option<R>) + Send + Sync + 'static,
    {
        Self {
            get: Box::new(get),
            set: Box::new(set),
            target: OnceLock::new(),
        }
    }

    fn target(&self) -> Result<&Arc<Introspected<R>>> {
        if let Some(target) = self.target.get() {
            return Ok(target);
        }
        let resolved = Arc::new(Introspected::<R>::resolve()?);
        Ok(self.target.get_or_init(|| resolved))
    }

    fn target_attribute(&self, referenced: Option<&str>) -> Result<Arc<dyn AttributeAccess<R>>> {
        let target = self.target()?;
        let found = match referenced {
            Some(column) => target.attribute_by_column(column),
            None => target.id_attributes().next(),
        };
        found.cloned().ok_or_else(|| {
            Error::metadata(
                target.entity_name(),
                match referenced {
                    Some(column) => format!("referenced column {column} is not mapped"),
                    None => "referenced type declares no identity attribute".to_string(),
                },
            )
        })
    }
}

impl<T, R> Relation<T> for ReferenceLink<T, R>
where
    T: 'static,
    R: Entity + Default,
{
    fn target_name(&self) -> &'static str {
        std::any::type_name::<R>()
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<R>()
    }

    fn is_many(&self) -> bool {
        false
    }

    fn target_id_type(&self, referenced: Option<&str>) -> Result<SqlType> {
        let attr = self.target_attribute(referenced)?;
        Ok(attr.info().sql_type.clone())
    }

    fn read_id(&self, owner: &T, referenced: Option<&str>) -> Result<Value> {
        match (self.get)(owner) {
            None => Ok(Value::Null),
            Some(target) => self.target_attribute(referenced)?.read(target),
        }
    }

    fn write_id(&self, owner: &mut T, id: Value, referenced: Option<&str>) -> Result<()> {
        if id.is_null() {
            (self.set)(owner, None);
            return Ok(());
        }
        let attr = self.target_attribute(referenced)?;
        let value = coerce::to_attribute_value(attr.info(), id, None)?;
        let mut target = R::default();
        attr.write(&mut target, AttributeValue::Scalar(value))?;
        (self.set)(owner, Some(target));
        Ok(())
    }

    fn write_object(&self, owner: &mut T, object: Box<dyn Any + Send>) -> Result<()> {
        let object = match object.downcast::<R>() {
            Ok(target) => {
                (self.set)(owner, Some(*target));
                return Ok(());
            }
            Err(other) => other,
        };
        match object.downcast::<Option<R>>() {
            Ok(target) => {
                (self.set)(owner, *target);
                Ok(())
            }
            Err(_) => Err(Error::access(
                std::any::type_name::<T>(),
                std::any::type_name::<R>(),
                "object is not of the referenced type",
            )),
        }
    }
}

/// The inverse, one-to-many side. Holds no column.
pub struct CollectionLink<T, R> {
    set: Box<dyn Fn(&mut T, Vec<R>) + Send + Sync>,
}

impl<T: 'static, R: Entity> CollectionLink<T, R> {
    pub fn new<S>(set: S) -> Self
    where
        S: Fn(&mut T, Vec<R>) + Send + Sync + 'static,
    {
        Self { set: Box::new(set) }
    }
}

impl<T: 'static, R: Entity> Relation<T> for CollectionLink<T, R> {
    fn target_name(&self) -> &'static str {
        std::any::type_name::<R>()
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<R>()
    }

    fn is_many(&self) -> bool {
        true
    }

    fn target_id_type(&self, _referenced: Option<&str>) -> Result<SqlType> {
        Ok(SqlType::Custom("COLLECTION"))
    }

    fn read_id(&self, _owner: &T, _referenced: Option<&str>) -> Result<Value> {
        Ok(Value::Null)
    }

    fn write_id(&self, _owner: &mut T, _id: Value, _referenced: Option<&str>) -> Result<()> {
        Err(Error::access(
            std::any::type_name::<T>(),
            std::any::type_name::<Vec<R>>(),
            "a to-many attribute only accepts a collection",
        ))
    }

    fn write_object(&self, owner: &mut T, object: Box<dyn Any + Send>) -> Result<()> {
        match object.downcast::<Vec<R>>() {
            Ok(items) => {
                (self.set)(owner, *items);
                Ok(())
            }
            Err(_) => Err(Error::access(
                std::any::type_name::<T>(),
                std::any::type_name::<Vec<R>>(),
                "object is not a collection of the referenced type",
            )),
        }
    }
}
