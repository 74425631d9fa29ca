//! Formula audit trail and numeric guards shared by every stage.

use serde::Serialize;

use crate::error::{EngineError, EngineResult};

/// One applied formula: named operands, the formula, and its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditStep {
    /// Formula identifier (e.g. `"base_power_density"`).
    pub formula: String,
    /// Named operands in application order.
    pub operands: Vec<(String, f64)>,
    /// Value produced.
    pub result: f64,
}

/// Ordered list of formula steps behind a stage result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AuditTrail(Vec<AuditStep>);

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a step and returns its result.
    ///
    /// The result is checked for finiteness before it is recorded, so a trail
    /// never contains NaN or infinity.
    pub fn record(
        &mut self,
        formula: &str,
        operands: &[(&str, f64)],
        result: f64,
    ) -> EngineResult<f64> {
        let result = ensure_finite(formula, result)?;
        self.0.push(AuditStep {
            formula: formula.to_string(),
            operands: operands
                .iter()
                .map(|(name, value)| ((*name).to_string(), *value))
                .collect(),
            result,
        });
        Ok(result)
    }

    pub fn steps(&self) -> &[AuditStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Finds the last step recorded under `formula`.
    pub fn find(&self, formula: &str) -> Option<&AuditStep> {
        self.0.iter().rev().find(|s| s.formula == formula)
    }
}

/// Rejects NaN and infinity.
pub fn ensure_finite(quantity: &str, value: f64) -> EngineResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::invariant(quantity, format!("non-finite value {value}")))
    }
}

/// Rejects non-finite and non-positive values.
pub fn ensure_positive(quantity: &str, value: f64) -> EngineResult<f64> {
    let value = ensure_finite(quantity, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::invariant(quantity, format!("expected > 0, got {value}")))
    }
}

/// Currency stocks must be finite and non-negative.
pub fn ensure_currency(quantity: &str, value: f64) -> EngineResult<f64> {
    let value = ensure_finite(quantity, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(EngineError::invariant(
            quantity,
            format!("negative currency {value:.2}"),
        ))
    }
}

/// Checks `a <= b <= c` for an ordered triple of tier values.
pub fn ensure_ascending(quantity: &str, values: [f64; 3]) -> EngineResult<()> {
    let [a, b, c] = values;
    if a <= b && b <= c {
        Ok(())
    } else {
        Err(EngineError::invariant(
            quantity,
            format!("tier ordering violated: {a} / {b} / {c}"),
        ))
    }
}
