//! Criterion evaluation against the telemetry cache.
//!
//! A criterion resolves to true, false, or indeterminate. Missing,
//! invalid, and stale points are indeterminate; malformed
//! operator/operand pairs degrade to indeterminate and surface a
//! configuration warning instead of an error. Nothing here panics or
//! propagates past the resolver.

use vigil_types::{Operator, TelemetryValue};

use super::definition::Criterion;
use super::truth::Truth;
use crate::telemetry::TelemetryCache;

/// Result of one criterion evaluation. A warning marks a configuration
/// problem the engine reports once per criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionOutcome {
    pub result: Truth,
    pub warning: Option<String>,
}

impl CriterionOutcome {
    fn of(result: Truth) -> Self {
        Self {
            result,
            warning: None,
        }
    }

    fn misconfigured(message: impl Into<String>) -> Self {
        Self {
            result: Truth::Indeterminate,
            warning: Some(message.into()),
        }
    }
}

/// Evaluate one criterion. Operator dispatch follows the operand's
/// declared type; numeric paths coerce both sides and fail closed to
/// indeterminate rather than guessing.
pub fn evaluate(criterion: &Criterion, cache: &TelemetryCache) -> CriterionOutcome {
    let Some(point) = cache.read(&criterion.key()) else {
        // No sample yet, or the source does not exist. Normal input.
        return CriterionOutcome::of(Truth::Indeterminate);
    };
    if !point.valid {
        return CriterionOutcome::of(Truth::Indeterminate);
    }

    match criterion.operator {
        Operator::IsDefined => CriterionOutcome::of(Truth::True),
        Operator::IsUndefined => CriterionOutcome::of(Truth::False),

        Operator::EqualTo | Operator::NotEqualTo => {
            let Some(operand) = &criterion.operand else {
                return missing_operand(criterion);
            };
            let equal = match operand {
                TelemetryValue::Number(n) => match point.value.as_number() {
                    Some(v) => v == *n,
                    None => return CriterionOutcome::of(Truth::Indeterminate),
                },
                TelemetryValue::Text(t) => point.value.as_text() == *t,
                TelemetryValue::Bool(b) => match point.value.as_bool() {
                    Some(v) => v == *b,
                    None => return CriterionOutcome::of(Truth::Indeterminate),
                },
            };
            let wanted = criterion.operator == Operator::EqualTo;
            CriterionOutcome::of(Truth::from_bool(equal == wanted))
        }

        Operator::LessThan
        | Operator::LessThanOrEqualTo
        | Operator::GreaterThan
        | Operator::GreaterThanOrEqualTo => {
            let Some(operand) = criterion.operand.as_ref().and_then(TelemetryValue::as_number)
            else {
                return CriterionOutcome::misconfigured(format!(
                    "criterion '{}': '{}' requires a numeric operand",
                    criterion.id,
                    criterion.operator.label()
                ));
            };
            let Some(value) = point.value.as_number() else {
                return CriterionOutcome::of(Truth::Indeterminate);
            };
            let holds = match criterion.operator {
                Operator::LessThan => value < operand,
                Operator::LessThanOrEqualTo => value <= operand,
                Operator::GreaterThan => value > operand,
                _ => value >= operand,
            };
            CriterionOutcome::of(Truth::from_bool(holds))
        }

        Operator::Between | Operator::NotBetween => {
            let low = criterion.operand.as_ref().and_then(TelemetryValue::as_number);
            let high = criterion
                .operand_high
                .as_ref()
                .and_then(TelemetryValue::as_number);
            let (Some(low), Some(high)) = (low, high) else {
                return CriterionOutcome::misconfigured(format!(
                    "criterion '{}': '{}' requires numeric lower and upper bounds",
                    criterion.id,
                    criterion.operator.label()
                ));
            };
            let Some(value) = point.value.as_number() else {
                return CriterionOutcome::of(Truth::Indeterminate);
            };
            let inside = value >= low && value <= high;
            let wanted = criterion.operator == Operator::Between;
            CriterionOutcome::of(Truth::from_bool(inside == wanted))
        }

        Operator::TextContains
        | Operator::TextDoesNotContain
        | Operator::TextStartsWith
        | Operator::TextEndsWith => {
            let Some(TelemetryValue::Text(operand)) = &criterion.operand else {
                return CriterionOutcome::misconfigured(format!(
                    "criterion '{}': '{}' requires a text operand",
                    criterion.id,
                    criterion.operator.label()
                ));
            };
            let text = point.value.as_text();
            let holds = match criterion.operator {
                Operator::TextContains => text.contains(operand.as_str()),
                Operator::TextDoesNotContain => !text.contains(operand.as_str()),
                Operator::TextStartsWith => text.starts_with(operand.as_str()),
                _ => text.ends_with(operand.as_str()),
            };
            CriterionOutcome::of(Truth::from_bool(holds))
        }
    }
}

fn missing_operand(criterion: &Criterion) -> CriterionOutcome {
    CriterionOutcome::misconfigured(format!(
        "criterion '{}': '{}' requires an operand",
        criterion.id,
        criterion.operator.label()
    ))
}
