//! Condition set definition types.
//!
//! Definitions describe what to evaluate and what to output. They are the
//! editable, persisted shape of a condition set; runtime state lives in
//! the engine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vigil_types::{Combination, Operator, TelemetryValue};

use crate::telemetry::TelemetryKey;

// ═══════════════════════════════════════════════════════════════════════════
// Criterion
// ═══════════════════════════════════════════════════════════════════════════

/// One comparison against one telemetry field.
///
/// The source is referenced by identifier only (weak reference): deleting
/// the source does not delete the criterion, it just makes every future
/// evaluation indeterminate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    /// Unique identifier within the owning condition set
    pub id: String,

    /// Telemetry source object identifier
    pub source: String,

    /// Field of the source to compare (e.g. "sine", "value")
    pub field: String,

    /// Comparison to apply
    pub operator: Operator,

    /// Comparison operand; absent for presence checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand: Option<TelemetryValue>,

    /// Upper bound for range comparisons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand_high: Option<TelemetryValue>,
}

impl Criterion {
    pub fn key(&self) -> TelemetryKey {
        TelemetryKey::new(self.source.clone(), self.field.clone())
    }
}

/// Partial update applied to a criterion in place.
///
/// `None` fields are left untouched; `clear_operands` wipes both operands
/// before any replacement is applied (for switching to a presence check).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand: Option<TelemetryValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operand_high: Option<TelemetryValue>,
    #[serde(default)]
    pub clear_operands: bool,
}

impl CriterionPatch {
    pub fn apply_to(&self, criterion: &mut Criterion) {
        if self.clear_operands {
            criterion.operand = None;
            criterion.operand_high = None;
        }
        if let Some(source) = &self.source {
            criterion.source = source.clone();
        }
        if let Some(field) = &self.field {
            criterion.field = field.clone();
        }
        if let Some(operator) = self.operator {
            criterion.operator = operator;
        }
        if let Some(operand) = &self.operand {
            criterion.operand = Some(operand.clone());
        }
        if let Some(high) = &self.operand_high {
            criterion.operand_high = Some(high.clone());
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Condition
// ═══════════════════════════════════════════════════════════════════════════

/// Named combination of criteria with an associated output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Unique identifier within the condition set
    pub id: String,

    /// Display name shown in the conditions view
    pub name: String,

    /// Ordered criteria; empty only for the default condition
    #[serde(default)]
    pub criteria: Vec<Criterion>,

    /// How the criteria fold into one result
    #[serde(default)]
    pub combination: Combination,

    /// Value reported while this condition is active
    pub output: String,

    /// The fallback match when no other condition resolves true.
    /// Exactly one per set, always last in priority order.
    #[serde(default)]
    pub is_default: bool,
}

impl Condition {
    /// The always-true fallback every new condition set starts with.
    pub fn fallback(id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Default".to_string(),
            criteria: Vec::new(),
            combination: Combination::All,
            output: output.into(),
            is_default: true,
        }
    }

    pub fn criterion(&self, criterion_id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == criterion_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Condition Set
// ═══════════════════════════════════════════════════════════════════════════

/// Ordered collection of conditions. Priority is list position: index 0
/// is evaluated first, the default sits last and matches if reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSetDefinition {
    /// Unique identifier of this set
    pub id: String,

    /// Display name
    pub name: String,

    /// Conditions in priority order, default last
    pub conditions: Vec<Condition>,
}

impl ConditionSetDefinition {
    /// A fresh set holds a single default condition, nothing else.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let default_id = format!("{id}.default");
        Self {
            id,
            name: name.into(),
            conditions: vec![Condition::fallback(default_id, "Default")],
        }
    }

    pub fn condition(&self, condition_id: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.id == condition_id)
    }

    pub fn condition_mut(&mut self, condition_id: &str) -> Option<&mut Condition> {
        self.conditions.iter_mut().find(|c| c.id == condition_id)
    }

    pub fn default_index(&self) -> Option<usize> {
        self.conditions.iter().position(|c| c.is_default)
    }

    /// Every `(source, field)` pair any criterion references.
    pub fn referenced_keys(&self) -> HashSet<TelemetryKey> {
        self.conditions
            .iter()
            .flat_map(|c| c.criteria.iter())
            .map(Criterion::key)
            .collect()
    }

    /// Structural invariants every stored or live definition must hold.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut default_id: Option<&str> = None;
        for condition in &self.conditions {
            if condition.is_default {
                if let Some(first) = default_id {
                    return Err(DefinitionError::DuplicateDefault(
                        first.to_string(),
                        condition.id.clone(),
                    ));
                }
                default_id = Some(&condition.id);
                if !condition.criteria.is_empty() {
                    return Err(DefinitionError::DefaultHasCriteria(condition.id.clone()));
                }
            }
        }
        let Some(default_id) = default_id else {
            return Err(DefinitionError::MissingDefault(self.id.clone()));
        };
        if self.conditions.last().is_none_or(|c| !c.is_default) {
            return Err(DefinitionError::DefaultNotLast(default_id.to_string()));
        }

        let mut condition_ids = HashSet::new();
        let mut criterion_ids = HashSet::new();
        for condition in &self.conditions {
            if !condition_ids.insert(condition.id.as_str()) {
                return Err(DefinitionError::DuplicateConditionId(condition.id.clone()));
            }
            for criterion in &condition.criteria {
                if !criterion_ids.insert(criterion.id.as_str()) {
                    return Err(DefinitionError::DuplicateCriterionId(criterion.id.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Structural problems in a condition set definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("condition set '{0}' has no default condition")]
    MissingDefault(String),
    #[error("conditions '{0}' and '{1}' are both marked default")]
    DuplicateDefault(String, String),
    #[error("default condition '{0}' must be last in priority order")]
    DefaultNotLast(String),
    #[error("default condition '{0}' must not carry criteria")]
    DefaultHasCriteria(String),
    #[error("duplicate condition id '{0}'")]
    DuplicateConditionId(String),
    #[error("duplicate criterion id '{0}'")]
    DuplicateCriterionId(String),
}

// ═══════════════════════════════════════════════════════════════════════════
// Config File Structure
// ═══════════════════════════════════════════════════════════════════════════

/// Root structure for condition set definition files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionConfig {
    /// Condition sets in this file
    #[serde(default, rename = "condition_set")]
    pub condition_sets: Vec<ConditionSetDefinition>,
}
