//! Condition and condition-set resolution.
//!
//! Per condition: fold the ordered criterion results with the configured
//! combination. Per set: strict first-match walk in priority order. An
//! indeterminate condition stops the walk — a pending unknown at higher
//! priority must not be masked by a coincidentally-true lower rule.

use vigil_types::Combination;

use super::criterion;
use super::definition::{Condition, ConditionSetDefinition};
use super::expression::Expression;
use super::truth::Truth;

/// Configuration problem surfaced during evaluation, tied to the
/// criterion or condition that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionWarning {
    pub subject_id: String,
    pub message: String,
}

/// Outcome of a full set walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Index of the first condition that evaluated true.
    Active(usize),
    /// A condition could not be evaluated; no condition was selected.
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveReport {
    pub resolution: Resolution,
    pub warnings: Vec<CriterionWarning>,
}

/// Evaluate one condition's criteria and fold them.
pub fn evaluate_condition(
    condition: &Condition,
    cache: &crate::telemetry::TelemetryCache,
    warnings: &mut Vec<CriterionWarning>,
) -> Truth {
    // The default condition has no criteria and always matches.
    if condition.criteria.is_empty() {
        return Truth::True;
    }

    let mut results = Vec::with_capacity(condition.criteria.len());
    for criterion_def in &condition.criteria {
        let outcome = criterion::evaluate(criterion_def, cache);
        if let Some(message) = outcome.warning {
            warnings.push(CriterionWarning {
                subject_id: criterion_def.id.clone(),
                message,
            });
        }
        results.push(outcome.result);
    }

    match &condition.combination {
        Combination::All => Truth::all(results),
        Combination::Any => Truth::any(results),
        Combination::Custom { expression } => match Expression::parse(expression)
            .and_then(|expr| expr.evaluate(&results))
        {
            Ok(result) => result,
            Err(e) => {
                warnings.push(CriterionWarning {
                    subject_id: condition.id.clone(),
                    message: e.to_string(),
                });
                Truth::Indeterminate
            }
        },
    }
}

/// Walk the ordered conditions: first true wins, indeterminate stops the
/// walk, false continues. The always-true default terminates the walk on
/// validated definitions.
pub fn resolve(
    definition: &ConditionSetDefinition,
    cache: &crate::telemetry::TelemetryCache,
) -> ResolveReport {
    let mut warnings = Vec::new();

    for (index, condition) in definition.conditions.iter().enumerate() {
        match evaluate_condition(condition, cache, &mut warnings) {
            Truth::True => {
                return ResolveReport {
                    resolution: Resolution::Active(index),
                    warnings,
                };
            }
            Truth::Indeterminate => {
                return ResolveReport {
                    resolution: Resolution::Indeterminate,
                    warnings,
                };
            }
            Truth::False => {}
        }
    }

    // Reachable only for definitions missing their default.
    ResolveReport {
        resolution: Resolution::Indeterminate,
        warnings,
    }
}
