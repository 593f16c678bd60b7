use crate::{
    error::EngineError,
    model::entity::EntitySchema,
    value::Value,
};
use std::sync::Arc;

///
/// QueryTemplate
///
/// Sparse set of `property = value` assertions with an explicit positional
/// assigned mask, so an assigned default (zero, empty, even null) stays
/// distinguishable from "not specified". This is the patch-style replacement
/// for dirty-field tracking: callers record exactly the fields they set.
///

#[derive(Clone, Debug)]
pub struct QueryTemplate {
    schema: Arc<EntitySchema>,
    slots: Vec<Option<Value>>,
    assigned: u64,
}

impl QueryTemplate {
    #[must_use]
    pub fn of(schema: &Arc<EntitySchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            slots: vec![None; schema.properties().len()],
            assigned: 0,
        }
    }

    /// Assert `property = value`. Kind mismatches fail fast; `Value::Null`
    /// is an allowed assertion (it means "the property is unset").
    pub fn set(mut self, name: &str, value: Value) -> Result<Self, EngineError> {
        let property = self.schema.property(name).ok_or_else(|| {
            EngineError::query_unsupported(format!(
                "unknown property '{name}' on entity '{}'",
                self.schema.name()
            ))
        })?;

        if let Some(kind) = value.kind()
            && kind != property.kind
        {
            return Err(EngineError::query_unsupported(format!(
                "property '{name}' expects kind '{}', got '{}'",
                property.kind.label(),
                kind.label()
            )));
        }

        let position = property.position;
        self.slots[position] = Some(value);
        self.assigned |= 1u64 << position;

        Ok(self)
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Positional bitmask of assigned properties.
    #[must_use]
    pub const fn assigned(&self) -> u64 {
        self.assigned
    }

    #[must_use]
    pub const fn is_assigned(&self, position: usize) -> bool {
        position < 64 && self.assigned & (1u64 << position) != 0
    }

    #[must_use]
    pub const fn is_unassigned(&self) -> bool {
        self.assigned == 0
    }

    /// Value at a position; meaningful only when the position is assigned.
    #[must_use]
    pub fn value_at(&self, position: usize) -> Option<&Value> {
        self.slots.get(position).and_then(Option::as_ref)
    }

    pub fn assigned_positions(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.slots.len()).filter(|pos| self.is_assigned(*pos))
    }
}

///
/// TESTS
///
