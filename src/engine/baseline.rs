//! Baseline peak demand and annual consumption.

use serde::Serialize;
use tracing::debug;

use super::audit::{AuditTrail, ensure_positive};
use super::inputs::{FacilityInputs, SizingField};
use crate::catalog::IndustryTemplate;
use crate::catalog::template::AnnualEnergy;
use crate::config::CalculatorConfig;
use crate::error::{EngineError, EngineResult};

/// Largest accepted known-peak override.
pub const MAX_PEAK_OVERRIDE_KW: f64 = 1_000_000.0;

/// Where the peak figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakSource {
    /// Derived from the template and facility quantities.
    Calculated,
    /// Supplied by the caller (e.g. from a utility bill).
    Override,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineResult {
    pub peak_demand_kw: f64,
    pub annual_consumption_kwh: f64,
    pub peak_source: PeakSource,
    /// Names of the load modifiers that fired, in application order.
    pub applied_modifiers: Vec<String>,
    pub audit: AuditTrail,
}

fn required_quantity(field: SizingField, inputs: &FacilityInputs) -> EngineResult<f64> {
    match field.read(&inputs.quantities) {
        None => Err(EngineError::invalid(
            field.path(),
            format!("{} is required for {}", field.label(), inputs.industry),
        )),
        Some(v) if !v.is_finite() || v <= 0.0 => Err(EngineError::invalid(
            field.path(),
            format!("{} must be greater than 0", field.label()),
        )),
        Some(v) if v > field.max_value() => Err(EngineError::invalid(
            field.path(),
            format!("{} must be at most {}", field.label(), field.max_value()),
        )),
        Some(v) => Ok(v),
    }
}

fn operating_hours(inputs: &FacilityInputs) -> EngineResult<Option<f64>> {
    match inputs.operating_hours_per_day {
        Some(h) if !(h.is_finite() && h > 0.0 && h <= 24.0) => Err(EngineError::invalid(
            "operating_hours_per_day",
            "daily operating hours must be between 0 and 24",
        )),
        other => Ok(other),
    }
}

/// Computes peak demand and annual consumption for a facility.
///
/// Base power is the template's primary quantity times its watts constant;
/// load modifiers then apply in template order when their predicate holds.
/// A positive `peak_load_override_kw` replaces the whole calculation.
///
/// # Errors
///
/// `InvalidInput` when the sizing quantity (or operating hours, if the
/// template needs them) is missing or out of range; `InvariantViolation` if
/// any step yields a non-finite or non-positive value.
pub fn compute_baseline(
    template: &IndustryTemplate,
    inputs: &FacilityInputs,
    calc: &CalculatorConfig,
) -> EngineResult<BaselineResult> {
    let mut audit = AuditTrail::new();
    let mut applied_modifiers = Vec::new();
    let hours = operating_hours(inputs)?;

    let (peak, peak_source) = match inputs.peak_load_override_kw {
        Some(kw) if !kw.is_finite() || kw < 0.0 || kw > MAX_PEAK_OVERRIDE_KW => {
            return Err(EngineError::invalid(
                "peak_load_override_kw",
                format!("known peak load must be 0 (auto) or a positive number up to {MAX_PEAK_OVERRIDE_KW} kW"),
            ));
        }
        Some(kw) if kw > 0.0 => {
            let peak = audit.record("peak_override", &[("peak_load_override_kw", kw)], kw)?;
            (peak, PeakSource::Override)
        }
        _ => {
            let field = template.power_basis.field();
            let quantity = required_quantity(field, inputs)?;
            let watts = template.power_basis.watts();
            let mut peak = audit.record(
                "base_power_kw",
                &[(field.path(), quantity), ("watts_per_unit", watts)],
                quantity * watts / 1000.0,
            )?;
            for modifier in &template.load_modifiers {
                if !modifier.when.matches(inputs) {
                    continue;
                }
                peak = audit.record(
                    &format!("modifier:{}", modifier.name),
                    &[("peak_kw", peak), ("multiplier", modifier.multiplier)],
                    peak * modifier.multiplier,
                )?;
                applied_modifiers.push(modifier.name.clone());
            }
            (peak, PeakSource::Calculated)
        }
    };
    let peak = ensure_positive("peak_demand_kw", peak)?;

    let annual = match &template.annual_energy {
        AnnualEnergy::LoadFactor => audit.record(
            "annual_consumption_kwh",
            &[
                ("peak_kw", peak),
                ("load_factor", template.load_factor),
                ("hours_per_year", calc.hours_per_year),
            ],
            peak * template.load_factor * calc.hours_per_year,
        )?,
        AnnualEnergy::OperatingHours => {
            let hours = hours.ok_or_else(|| {
                EngineError::invalid(
                    "operating_hours_per_day",
                    format!("daily operating hours are required for {}", inputs.industry),
                )
            })?;
            audit.record(
                "annual_consumption_kwh",
                &[
                    ("peak_kw", peak),
                    ("load_factor", template.load_factor),
                    ("operating_hours_per_day", hours),
                    ("days_per_year", calc.days_per_year),
                ],
                peak * template.load_factor * hours * calc.days_per_year,
            )?
        }
        AnnualEnergy::PerUnitKwh {
            field,
            kwh_per_unit,
        } => {
            let quantity = required_quantity(*field, inputs)?;
            audit.record(
                "annual_consumption_kwh",
                &[(field.path(), quantity), ("kwh_per_unit", *kwh_per_unit)],
                quantity * kwh_per_unit,
            )?
        }
    };
    let annual = ensure_positive("annual_consumption_kwh", annual)?;

    debug!(
        template = %template.template_id,
        peak_kw = peak,
        annual_kwh = annual,
        modifiers = applied_modifiers.len(),
        "baseline computed"
    );

    Ok(BaselineResult {
        peak_demand_kw: peak,
        annual_consumption_kwh: annual,
        peak_source,
        applied_modifiers,
        audit,
    })
}
