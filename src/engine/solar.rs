//! Rooftop and carport solar capacity.

use std::fmt;

use serde::Serialize;

use super::audit::{AuditTrail, ensure_finite};
use super::inputs::{AreaInput, CarportInterest, FacilityInputs};
use crate::catalog::IndustryTemplate;
use crate::error::{EngineError, EngineResult};

/// Areas above this are accepted but flagged for confirmation.
pub const LARGE_AREA_WARNING_SQFT: f64 = 1_000_000.0;

/// Areas above this are rejected outright.
pub const MAX_AREA_SQFT: f64 = 100_000_000.0;

/// Size band of a solar array by nameplate kW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SystemSizeCategory {
    Small,
    Medium,
    Large,
    #[serde(rename = "Extra Large")]
    ExtraLarge,
}

impl SystemSizeCategory {
    /// `< 25` Small, `25..100` Medium, `100..=250` Large, `> 250` Extra Large.
    pub fn from_kw(kw: f64) -> Self {
        if kw < 25.0 {
            Self::Small
        } else if kw < 100.0 {
            Self::Medium
        } else if kw <= 250.0 {
            Self::Large
        } else {
            Self::ExtraLarge
        }
    }
}

impl fmt::Display for SystemSizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
            Self::ExtraLarge => "Extra Large",
        })
    }
}

/// Area inputs for the solar stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarInput {
    pub roof: AreaInput,
    pub carport_interest: CarportInterest,
    pub carport: Option<AreaInput>,
}

impl SolarInput {
    /// Extracts the solar inputs; `None` when no roof area was supplied.
    pub fn from_facility(facility: &FacilityInputs) -> Option<Self> {
        facility.roof.map(|roof| Self {
            roof,
            carport_interest: facility.carport_interest,
            carport: facility.carport,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolarResult {
    pub roof_area_sqft: f64,
    /// Zero when carport interest is `no`.
    pub carport_area_sqft: f64,
    pub roof_solar_kw: f64,
    pub carport_solar_kw: f64,
    pub total_solar_kw: f64,
    pub annual_generation_kwh: f64,
    pub system_size_category: SystemSizeCategory,
    pub audit: AuditTrail,
}

fn area_sqft(field: &str, label: &str, area: AreaInput) -> EngineResult<f64> {
    if !area.value.is_finite() || area.value < 0.0 {
        return Err(EngineError::invalid(
            format!("{field}.value"),
            format!("{label} must be a non-negative number"),
        ));
    }
    ensure_finite(field, area.to_sqft())
}

/// Sizes roof and carport arrays.
///
/// Both areas are converted to square feet before any other arithmetic.
/// A carport contributes only when the interest is `yes` or `unsure`.
///
/// # Errors
///
/// `InvalidInput` for negative or non-finite areas.
pub fn compute_solar(
    template: &IndustryTemplate,
    input: &SolarInput,
    full_load_hours: f64,
) -> EngineResult<SolarResult> {
    let mut audit = AuditTrail::new();

    let roof_sqft = area_sqft("roof", "roof area", input.roof)?;
    let carport_sqft = match input.carport {
        Some(area) if input.carport_interest.includes_carport() => {
            area_sqft("carport", "carport area", area)?
        }
        _ => 0.0,
    };

    let roof_kw = audit.record(
        "roof_solar_kw",
        &[
            ("roof_area_sqft", roof_sqft),
            ("roof_usable_factor", template.roof_usable_factor),
            ("solar_density_kw_per_sqft", template.solar_density_kw_per_sqft),
        ],
        roof_sqft * template.roof_usable_factor * template.solar_density_kw_per_sqft,
    )?;
    let carport_kw = audit.record(
        "carport_solar_kw",
        &[
            ("carport_area_sqft", carport_sqft),
            ("carport_usable_factor", template.carport_usable_factor),
            ("solar_density_kw_per_sqft", template.solar_density_kw_per_sqft),
        ],
        carport_sqft * template.carport_usable_factor * template.solar_density_kw_per_sqft,
    )?;
    let total_kw = audit.record(
        "total_solar_kw",
        &[("roof_solar_kw", roof_kw), ("carport_solar_kw", carport_kw)],
        roof_kw + carport_kw,
    )?;
    let annual_kwh = audit.record(
        "annual_generation_kwh",
        &[
            ("total_solar_kw", total_kw),
            ("full_load_hours", full_load_hours),
        ],
        total_kw * full_load_hours,
    )?;

    Ok(SolarResult {
        roof_area_sqft: roof_sqft,
        carport_area_sqft: carport_sqft,
        roof_solar_kw: roof_kw,
        carport_solar_kw: carport_kw,
        total_solar_kw: total_kw,
        annual_generation_kwh: annual_kwh,
        system_size_category: SystemSizeCategory::from_kw(total_kw),
        audit,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A solar input finding. Never raised, only reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolarIssue {
    pub severity: Severity,
    pub field: String,
    pub message: String,
}

impl SolarIssue {
    fn warning(field: &str, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.to_string(),
            message,
        }
    }

    fn error(field: &str, message: String) -> Self {
        Self {
            severity: Severity::Error,
            field: field.to_string(),
            message,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for SolarIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{tag}: {}: {}", self.field, self.message)
    }
}

/// Reviews solar inputs and returns every finding.
pub fn validate_solar_inputs(
    roof: Option<AreaInput>,
    carport_interest: CarportInterest,
    carport: Option<AreaInput>,
) -> Vec<SolarIssue> {
    let mut issues = Vec::new();

    match roof {
        None => issues.push(SolarIssue::error(
            "roof.value",
            "roof area is required for solar sizing".into(),
        )),
        Some(area) if !area.value.is_finite() => issues.push(SolarIssue::error(
            "roof.value",
            "roof area must be a number".into(),
        )),
        Some(area) if area.value <= 0.0 => issues.push(SolarIssue::error(
            "roof.value",
            "roof area must be greater than 0".into(),
        )),
        Some(area) if area.to_sqft() > MAX_AREA_SQFT => issues.push(SolarIssue::error(
            "roof.value",
            format!("roof area must be at most {MAX_AREA_SQFT} sqft"),
        )),
        Some(area) if area.to_sqft() > LARGE_AREA_WARNING_SQFT => {
            issues.push(SolarIssue::warning(
                "roof.value",
                format!(
                    "roof area of {:.0} sqft is unusually large; please confirm",
                    area.to_sqft()
                ),
            ));
        }
        Some(_) => {}
    }

    match (carport_interest.includes_carport(), carport) {
        (true, None) => issues.push(SolarIssue::warning(
            "carport.value",
            "no carport area given; carport solar will be zero".into(),
        )),
        (true, Some(area)) if !area.value.is_finite() || area.value < 0.0 => {
            issues.push(SolarIssue::error(
                "carport.value",
                "carport area must be a non-negative number".into(),
            ));
        }
        (true, Some(area)) if area.to_sqft() > MAX_AREA_SQFT => issues.push(SolarIssue::error(
            "carport.value",
            format!("carport area must be at most {MAX_AREA_SQFT} sqft"),
        )),
        (true, Some(area)) if area.to_sqft() > LARGE_AREA_WARNING_SQFT => {
            issues.push(SolarIssue::warning(
                "carport.value",
                format!(
                    "carport area of {:.0} sqft is unusually large; please confirm",
                    area.to_sqft()
                ),
            ));
        }
        (false, Some(area)) if area.value > 0.0 => issues.push(SolarIssue::warning(
            "carport.value",
            "carport area is ignored because carport interest is \"no\"".into(),
        )),
        _ => {}
    }

    issues
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;
    use crate::catalog::Catalog;

    fn car_wash() -> std::sync::Arc<IndustryTemplate> {
        Catalog::builtin()
            .lookup("car_wash", None)
            .expect("car wash template")
    }

    fn input(roof: f64, interest: CarportInterest, carport: Option<AreaInput>) -> SolarInput {
        SolarInput {
            roof: AreaInput::sqft(roof),
            carport_interest: interest,
            carport,
        }
    }

    #[test]
    fn car_wash_roof_only() {
        let r = compute_solar(&car_wash(), &input(5000.0, CarportInterest::No, None), 1200.0)
            .expect("valid solar");
        assert_relative_eq!(r.roof_solar_kw, 487.5, epsilon = 1e-9);
        assert_eq!(r.carport_solar_kw, 0.0);
        assert_eq!(r.system_size_category, SystemSizeCategory::ExtraLarge);
    }

    #[test]
    fn car_wash_with_carport() {
        let r = compute_solar(
            &car_wash(),
            &input(5000.0, CarportInterest::Yes, Some(AreaInput::sqft(1500.0))),
            1200.0,
        )
        .expect("valid solar");
        assert_relative_eq!(r.total_solar_kw, 712.5, epsilon = 1e-9);
        assert_relative_eq!(r.annual_generation_kwh, 855_000.0, epsilon = 1e-6);
        assert_eq!(r.audit.len(), 4);
    }

    #[test]
    fn unsure_matches_yes_and_no_ignores_area() {
        let carport = Some(AreaInput::sqft(1500.0));
        let yes = compute_solar(&car_wash(), &input(5000.0, CarportInterest::Yes, carport), 1200.0)
            .expect("valid");
        let unsure =
            compute_solar(&car_wash(), &input(5000.0, CarportInterest::Unsure, carport), 1200.0)
                .expect("valid");
        let no = compute_solar(&car_wash(), &input(5000.0, CarportInterest::No, carport), 1200.0)
            .expect("valid");
        assert_eq!(yes, unsure);
        assert_eq!(no.carport_area_sqft, 0.0);
        assert_relative_eq!(no.total_solar_kw, 487.5, epsilon = 1e-9);
    }

    #[test]
    fn mixed_units_agree_with_sqft() {
        let t = car_wash();
        let sqm = compute_solar(
            &t,
            &SolarInput {
                roof: AreaInput::sqm(5000.0 / 10.764),
                carport_interest: CarportInterest::Yes,
                carport: Some(AreaInput::sqm(1500.0 / 10.764)),
            },
            1200.0,
        )
        .expect("valid");
        let sqft = compute_solar(
            &t,
            &input(5000.0, CarportInterest::Yes, Some(AreaInput::sqft(1500.0))),
            1200.0,
        )
        .expect("valid");
        assert!((sqm.total_solar_kw - sqft.total_solar_kw).abs() < 1.0);
    }

    #[test]
    fn zero_carport_area_contributes_nothing() {
        let r = compute_solar(
            &car_wash(),
            &input(5000.0, CarportInterest::Yes, Some(AreaInput::sqft(0.0))),
            1200.0,
        )
        .expect("zero carport is fine");
        assert_eq!(r.carport_solar_kw, 0.0);
    }

    #[test]
    fn negative_roof_is_invalid_input() {
        let err = compute_solar(&car_wash(), &input(-1.0, CarportInterest::No, None), 1200.0);
        assert!(matches!(err, Err(EngineError::InvalidInput { .. })));
    }

    #[rstest]
    #[case(10.0, SystemSizeCategory::Small)]
    #[case(25.0, SystemSizeCategory::Medium)]
    #[case(99.9, SystemSizeCategory::Medium)]
    #[case(100.0, SystemSizeCategory::Large)]
    #[case(250.0, SystemSizeCategory::Large)]
    #[case(250.1, SystemSizeCategory::ExtraLarge)]
    fn size_category_bands(#[case] kw: f64, #[case] expected: SystemSizeCategory) {
        assert_eq!(SystemSizeCategory::from_kw(kw), expected);
    }

    #[test]
    fn validation_reports_without_failing() {
        let issues = validate_solar_inputs(None, CarportInterest::No, None);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());

        let issues = validate_solar_inputs(
            Some(AreaInput::sqft(2_000_000.0)),
            CarportInterest::No,
            Some(AreaInput::sqft(100.0)),
        );
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| !i.is_error()));

        let issues = validate_solar_inputs(
            Some(AreaInput::sqft(0.0)),
            CarportInterest::Unsure,
            Some(AreaInput::sqft(500.0)),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "roof area must be greater than 0");
    }

    #[test]
    fn absurd_areas_are_errors() {
        let issues = validate_solar_inputs(
            Some(AreaInput::sqft(1e306)),
            CarportInterest::Yes,
            Some(AreaInput::sqm(1e300)),
        );
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(SolarIssue::is_error));
        assert_eq!(issues[0].field, "roof.value");
        assert_eq!(issues[1].field, "carport.value");
    }
}
