//! Resolved, immutable metadata of one mapped type.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::access::resolve_attributes;
use crate::attribute::AttributeAccess;
use crate::error::{Error, Result};
use crate::identifiers::Identifier;
use crate::mapping::{ClassKind, Entity, Mapping};
use crate::value::Value;

/// Everything the write path needs to know about `T`: its table, its
/// attributes in declaration order and which of them play special roles.
///
/// Built once by [`Introspected::resolve`] and shared read-only afterwards;
/// callers normally go through [`Registry`](crate::Registry) instead.
pub struct Introspected<T> {
    entity: &'static str,
    table: Identifier,
    attributes: Vec<Arc<dyn AttributeAccess<T>>>,
    ids: Vec<usize>,
    generated_id: Option<usize>,
    self_join: Option<usize>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Introspected<T> {
    /// Resolve the declared mapping of `T`.
    pub fn resolve() -> Result<Self> {
        Self::from_mapping(&T::mapping())
    }

    /// Resolve an explicit mapping of `T`, in place of [`Entity::mapping`].
    pub fn from_mapping(mapping: &Mapping<T>) -> Result<Self> {
        let Some(leaf) = mapping.levels().last() else {
            return Err(Error::metadata(
                std::any::type_name::<T>(),
                "mapping declares no class level",
            ));
        };
        let entity = leaf.name();
        if leaf.kind() == ClassKind::NotMapped {
            return Err(Error::metadata(entity, "the mapped type itself is declared not mapped"));
        }
        let table = Identifier::new(leaf.table.unwrap_or(entity));
        let attributes = resolve_attributes(entity, mapping)?;

        let ids: Vec<usize> = attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.info().id && a.info().is_selectable())
            .map(|(i, _)| i)
            .collect();
        let generated_id = ids.iter().copied().find(|&i| attributes[i].info().generated);
        let self_join = attributes.iter().position(|a| a.info().self_join);

        debug!(
            entity,
            table = table.delimited(),
            attributes = attributes.len(),
            ids = ids.len(),
            generated = generated_id.is_some(),
            self_join = self_join.is_some(),
            "Resolved entity metadata"
        );

        Ok(Self {
            entity,
            table,
            attributes,
            ids,
            generated_id,
            self_join,
            _marker: PhantomData,
        })
    }
}

impl<T> Introspected<T> {
    pub fn entity_name(&self) -> &'static str {
        self.entity
    }

    pub fn table(&self) -> &Identifier {
        &self.table
    }

    /// Table name as it appears in SQL.
    pub fn delimited_table_name(&self) -> &str {
        self.table.delimited()
    }

    /// All resolved attributes, disabled ones included.
    pub fn attributes(&self) -> &[Arc<dyn AttributeAccess<T>>] {
        &self.attributes
    }

    /// Attributes written by INSERT, in declaration order.
    pub fn insertable(&self) -> impl Iterator<Item = &Arc<dyn AttributeAccess<T>>> {
        self.attributes.iter().filter(|a| a.info().is_insertable())
    }

    /// Attributes written by the SET clause of UPDATE, minus the ones whose
    /// raw column name appears in `excluded`. Matching is case-sensitive.
    pub fn updatable_excluding(&self, excluded: &[&str]) -> Vec<&Arc<dyn AttributeAccess<T>>> {
        self.attributes
            .iter()
            .filter(|a| a.info().is_updatable() && !excluded.contains(&a.info().column.raw()))
            .collect()
    }

    pub fn selectable(&self) -> impl Iterator<Item = &Arc<dyn AttributeAccess<T>>> {
        self.attributes.iter().filter(|a| a.info().is_selectable())
    }

    /// Identity attributes in declaration order.
    pub fn id_attributes(&self) -> impl Iterator<Item = &Arc<dyn AttributeAccess<T>>> {
        self.ids.iter().map(|&i| &self.attributes[i])
    }

    /// Delimited identity column names in declaration order.
    pub fn id_column_names(&self) -> Vec<&str> {
        self.id_attributes()
            .map(|a| a.info().column.delimited())
            .collect()
    }

    pub fn generated_id(&self) -> Option<&Arc<dyn AttributeAccess<T>>> {
        self.generated_id.map(|i| &self.attributes[i])
    }

    pub fn self_join(&self) -> Option<&Arc<dyn AttributeAccess<T>>> {
        self.self_join.map(|i| &self.attributes[i])
    }

    pub fn has_generated_id(&self) -> bool {
        self.generated_id.is_some()
    }

    pub fn has_self_join_column(&self) -> bool {
        self.self_join.is_some()
    }

    /// Current identity values of `instance`, in identity column order.
    pub fn actual_ids(&self, instance: &T) -> Result<Vec<Value>> {
        self.id_attributes().map(|a| a.read(instance)).collect()
    }

    /// Whether `instance` has not been assigned an identity yet.
    ///
    /// NULL and non-positive numbers count as unassigned.
    pub fn is_new(&self, instance: &T) -> Result<bool> {
        if let Some(generated) = self.generated_id() {
            return Ok(generated.read(instance)?.is_unassigned_id());
        }
        Ok(self.actual_ids(instance)?.iter().any(Value::is_unassigned_id))
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<dyn AttributeAccess<T>>> {
        self.attributes.iter().find(|a| a.info().name == name)
    }

    /// Attribute mapped to the column with this raw name.
    pub fn attribute_by_column(&self, column: &str) -> Option<&Arc<dyn AttributeAccess<T>>> {
        self.attributes
            .iter()
            .find(|a| a.info().column.raw() == column)
    }

    /// Comma-separated delimited names of all selectable columns.
    pub fn select_column_list(&self) -> String {
        self.selectable()
            .map(|a| a.info().column.delimited())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<T> PartialEq for Introspected<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
            && self.table == other.table
            && self.ids == other.ids
            && self.generated_id == other.generated_id
            && self.self_join == other.self_join
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .zip(&other.attributes)
                .all(|(a, b)| a.info() == b.info())
    }
}

impl<T> fmt::Debug for Introspected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Introspected")
            .field("entity", &self.entity)
            .field("table", &self.table.delimited())
            .field(
                "attributes",
                &self.attributes.iter().map(|a| a.info()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
