//! Filter-on-read staleness classification.
//!
//! A pure PASS/FAIL step over loaded entities. The indexed properties of a
//! point lookup were already enforced by the index scan, so the equality
//! filter only re-checks the remaining assigned properties; range lookups
//! additionally re-compare the indexed tuple against both bounds. Entities
//! that fail are removed from the result and their index entries become
//! repair candidates.

use crate::{
    model::{entity::Entity, index::IndexMetadata, template::QueryTemplate},
    value::Value,
};
use std::cmp::Ordering;

///
/// ReadFilter
///

pub(crate) enum ReadFilter {
    Equality(EqualityFilter),
    Range(RangeFilter),
}

impl ReadFilter {
    pub(crate) fn evaluate(&self, entity: &Entity) -> bool {
        match self {
            Self::Equality(filter) => filter.evaluate(entity),
            Self::Range(filter) => filter.evaluate(entity),
        }
    }
}

///
/// EqualityFilter
///
/// Every assigned property outside the scan's enforced leading run must
/// equal the entity's current value. A `Null` assertion matches an absent
/// property.
///

pub(crate) struct EqualityFilter {
    checks: Vec<(usize, Value)>,
}

impl EqualityFilter {
    pub(crate) fn new(template: &QueryTemplate, index: &IndexMetadata) -> Self {
        Self {
            checks: residual_checks(template, enforced_mask(template, index)),
        }
    }

    pub(crate) fn evaluate(&self, entity: &Entity) -> bool {
        self.checks
            .iter()
            .all(|(position, expected)| check_equal(entity, *position, expected))
    }
}

///
/// RangeFilter
///
/// Assigned properties outside each bound's enforced run are checked for
/// equality; the indexed tuple is compared lexicographically against the
/// start tuple (entity >= start) and the end tuple (entity <= end), with the
/// usual short-circuit: a strictly-greater earlier component settles the
/// whole comparison. An absent indexed value fails the filter.
///

pub(crate) struct RangeFilter {
    checks: Vec<(usize, Value)>,
    start: Vec<(usize, Value)>,
    end: Vec<(usize, Value)>,
}

impl RangeFilter {
    pub(crate) fn new(start: &QueryTemplate, end: &QueryTemplate, index: &IndexMetadata) -> Self {
        let mut checks = residual_checks(start, enforced_mask(start, index));
        checks.extend(residual_checks(end, enforced_mask(end, index)));

        Self {
            checks,
            start: bound_tuple(start, index),
            end: bound_tuple(end, index),
        }
    }

    pub(crate) fn evaluate(&self, entity: &Entity) -> bool {
        if !self
            .checks
            .iter()
            .all(|(position, expected)| check_equal(entity, *position, expected))
        {
            return false;
        }

        !matches!(tuple_cmp(entity, &self.start), None | Some(Ordering::Less))
            && !matches!(tuple_cmp(entity, &self.end), None | Some(Ordering::Greater))
    }
}

/// Positions the index scan actually enforced: the leading run of indexed
/// properties assigned in the template. An indexed property past the first
/// gap never made it into the scan bounds and must be re-checked like any
/// other assertion.
fn enforced_mask(template: &QueryTemplate, index: &IndexMetadata) -> u64 {
    index
        .properties()
        .iter()
        .take_while(|p| template.is_assigned(p.position))
        .fold(0u64, |mask, p| mask | (1u64 << p.position))
}

/// Assigned properties of `template` not covered by the enforced mask.
fn residual_checks(template: &QueryTemplate, enforced: u64) -> Vec<(usize, Value)> {
    template
        .assigned_positions()
        .filter(|position| enforced & (1u64 << position) == 0)
        .map(|position| {
            let value = template.value_at(position).cloned().unwrap_or(Value::Null);
            (position, value)
        })
        .collect()
}

/// Leading run of indexed properties assigned in the bound template.
fn bound_tuple(template: &QueryTemplate, index: &IndexMetadata) -> Vec<(usize, Value)> {
    index
        .properties()
        .iter()
        .take_while(|p| template.is_assigned(p.position))
        .map(|p| {
            let value = template.value_at(p.position).cloned().unwrap_or(Value::Null);
            (p.position, value)
        })
        .collect()
}

fn check_equal(entity: &Entity, position: usize, expected: &Value) -> bool {
    match (entity.value_at(position), expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (Some(actual), expected) => actual == expected,
        (None, _) => false,
    }
}

/// Lexicographic comparison of the entity's values at the bound positions.
/// `None` when a compared property is absent on the entity.
fn tuple_cmp(entity: &Entity, bound: &[(usize, Value)]) -> Option<Ordering> {
    for (position, expected) in bound {
        let actual = entity.value_at(*position)?;
        match actual.cmp(expected) {
            Ordering::Equal => {}
            other => return Some(other),
        }
    }

    Some(Ordering::Equal)
}

///
/// TESTS
///
