//! Industry templates: per-industry sizing constants expressed as data.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::engine::inputs::{FacilityInputs, GridConnection, SizingField};
use crate::engine::tier::TierValues;

/// How base power is derived from the facility's primary quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PowerBasis {
    /// Watts per square foot of facility floor area.
    Density { watts_per_sqft: f64 },
    /// Watts per counted unit (rooms, racks, beds, bays).
    PerUnit {
        field: SizingField,
        watts_per_unit: f64,
    },
}

impl PowerBasis {
    /// The input field this basis reads.
    pub fn field(&self) -> SizingField {
        match self {
            Self::Density { .. } => SizingField::SquareFeet,
            Self::PerUnit { field, .. } => *field,
        }
    }

    /// Watts per unit of the primary quantity.
    pub fn watts(&self) -> f64 {
        match self {
            Self::Density { watts_per_sqft } => *watts_per_sqft,
            Self::PerUnit { watts_per_unit, .. } => *watts_per_unit,
        }
    }
}

/// Condition over facility inputs that gates a load modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModifierPredicate {
    Always,
    /// The facility lists the named feature.
    Feature { feature: String },
    QuantityAtLeast { field: SizingField, threshold: f64 },
    OperatingHoursAtLeast { hours: f64 },
    Grid { connection: GridConnection },
}

impl ModifierPredicate {
    pub fn matches(&self, inputs: &FacilityInputs) -> bool {
        match self {
            Self::Always => true,
            Self::Feature { feature } => inputs.has_feature(feature),
            Self::QuantityAtLeast { field, threshold } => field
                .read(&inputs.quantities)
                .is_some_and(|v| v >= *threshold),
            Self::OperatingHoursAtLeast { hours } => {
                inputs.operating_hours_per_day.is_some_and(|h| h >= *hours)
            }
            Self::Grid { connection } => inputs.grid_connection == *connection,
        }
    }
}

/// Multiplicative load adjustment applied when its predicate holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadModifier {
    pub name: String,
    pub when: ModifierPredicate,
    pub multiplier: f64,
}

/// How annual consumption is derived from peak demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnualEnergy {
    /// `peak × load_factor × hours_per_year`.
    #[default]
    LoadFactor,
    /// `peak × load_factor × operating_hours_per_day × days_per_year`.
    OperatingHours,
    /// `quantity × kwh_per_unit`.
    PerUnitKwh { field: SizingField, kwh_per_unit: f64 },
}

/// Battery duration: one value for all tiers or one per tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BessDuration {
    Global(f64),
    PerTier(TierValues<f64>),
}

impl BessDuration {
    pub fn resolve(&self) -> TierValues<f64> {
        match self {
            Self::Global(h) => TierValues {
                starter: *h,
                perfect_fit: *h,
                beast_mode: *h,
            },
            Self::PerTier(values) => *values,
        }
    }
}

fn default_generator_sizing_factor() -> f64 {
    1.25
}

fn default_ups_energy_multiplier() -> f64 {
    1.5
}

/// Immutable per-industry sizing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndustryTemplate {
    pub template_id: String,
    pub template_version: String,
    pub industry: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub use_case: String,
    pub power_basis: PowerBasis,
    /// Average load over peak load (0.0-1.0).
    pub load_factor: f64,
    #[serde(default)]
    pub annual_energy: AnnualEnergy,
    #[serde(default)]
    pub load_modifiers: Vec<LoadModifier>,
    pub roof_usable_factor: f64,
    pub carport_usable_factor: f64,
    pub solar_density_kw_per_sqft: f64,
    pub tier_multipliers: TierValues<f64>,
    pub bess_duration_hours: BessDuration,
    #[serde(default = "default_ups_energy_multiplier")]
    pub ups_energy_multiplier: f64,
    #[serde(default)]
    pub generator_required: bool,
    #[serde(default = "default_generator_sizing_factor")]
    pub generator_sizing_factor: f64,
}

/// Upper bound on any tier multiplier.
pub const MAX_TIER_MULTIPLIER: f64 = 1.3;
/// Allowed UPS energy upsize range.
pub const UPS_MULTIPLIER_RANGE: (f64, f64) = (1.5, 2.0);

impl IndustryTemplate {
    /// Catalog key: `industry` or `industry/subtype`.
    pub fn key(&self) -> String {
        match &self.subtype {
            Some(s) => format!("{}/{s}", self.industry),
            None => self.industry.clone(),
        }
    }

    /// Validates every constant and returns all violations.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let prefix = format!("templates[{}]", self.template_id);
        let mut push = |field: &str, message: String| {
            errors.push(ConfigError {
                field: format!("{prefix}.{field}"),
                message,
            });
        };

        if self.template_id.trim().is_empty() {
            push("template_id", "must not be empty".into());
        }
        if self.template_version.trim().is_empty() {
            push("template_version", "must not be empty".into());
        }
        if !(self.power_basis.watts().is_finite() && self.power_basis.watts() > 0.0) {
            push("power_basis", "watts must be > 0".into());
        }
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            push("load_factor", "must be in (0.0, 1.0]".into());
        }
        if let AnnualEnergy::PerUnitKwh { kwh_per_unit, .. } = self.annual_energy {
            if !(kwh_per_unit.is_finite() && kwh_per_unit > 0.0) {
                push("annual_energy.kwh_per_unit", "must be > 0".into());
            }
        }
        for (i, m) in self.load_modifiers.iter().enumerate() {
            if !(m.multiplier.is_finite() && m.multiplier > 0.0) {
                push(
                    &format!("load_modifiers[{i}].multiplier"),
                    format!("must be a finite value > 0, got {}", m.multiplier),
                );
            }
        }
        for (name, v) in [
            ("roof_usable_factor", self.roof_usable_factor),
            ("carport_usable_factor", self.carport_usable_factor),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                push(name, "must be in (0.0, 1.0]".into());
            }
        }
        if !(self.solar_density_kw_per_sqft.is_finite() && self.solar_density_kw_per_sqft > 0.0) {
            push("solar_density_kw_per_sqft", "must be > 0".into());
        }

        let t = &self.tier_multipliers;
        if !(t.starter > 0.0
            && t.starter < t.perfect_fit
            && t.perfect_fit <= 1.0
            && 1.0 < t.beast_mode
            && t.beast_mode <= MAX_TIER_MULTIPLIER)
        {
            push(
                "tier_multipliers",
                format!(
                    "must satisfy 0 < starter < perfect_fit <= 1.0 < beast_mode <= {MAX_TIER_MULTIPLIER}, got {} / {} / {}",
                    t.starter, t.perfect_fit, t.beast_mode
                ),
            );
        }

        let d = self.bess_duration_hours.resolve();
        if !(d.starter > 0.0 && d.starter <= d.perfect_fit && d.perfect_fit <= d.beast_mode)
            || !d.beast_mode.is_finite()
        {
            push(
                "bess_duration_hours",
                "must be > 0 and non-decreasing from starter to beast_mode".into(),
            );
        }

        let (lo, hi) = UPS_MULTIPLIER_RANGE;
        if !(lo..=hi).contains(&self.ups_energy_multiplier) {
            push(
                "ups_energy_multiplier",
                format!("must be in [{lo}, {hi}], got {}", self.ups_energy_multiplier),
            );
        }
        if !(self.generator_sizing_factor.is_finite() && self.generator_sizing_factor > 0.0) {
            push("generator_sizing_factor", "must be > 0".into());
        }

        errors
    }
}
