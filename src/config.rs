//! TOML-based engine configuration and preset definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::financial::{CostTables, FinancialPolicy, RegionRates};
use crate::engine::margin::{BandTerms, MarginPolicy};

/// Top-level engine configuration parsed from TOML.
///
/// All fields have defaults matching the baseline preset. Load from TOML
/// with [`EngineConfig::from_toml_file`] or use [`EngineConfig::baseline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Physical constants shared by every industry.
    #[serde(default)]
    pub calculator: CalculatorConfig,
    /// Incentive, savings and discounting policy.
    #[serde(default)]
    pub financial: FinancialPolicy,
    /// Margin bands, ceiling and optional unit bound.
    #[serde(default)]
    pub margin: MarginPolicy,
    /// Tariffs and cost tables by region code.
    #[serde(default = "default_regions")]
    pub regions: BTreeMap<String, RegionConfig>,
}

/// Calculator constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculatorConfig {
    /// Annual full-load hours for solar generation.
    pub solar_full_load_hours: f64,
    pub hours_per_year: f64,
    pub days_per_year: f64,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            solar_full_load_hours: 1200.0,
            hours_per_year: 8760.0,
            days_per_year: 365.0,
        }
    }
}

/// Utility rates and equipment costs for one region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionConfig {
    pub rates: RegionRates,
    pub costs: CostTables,
}

fn default_regions() -> BTreeMap<String, RegionConfig> {
    let mut regions = BTreeMap::new();
    regions.insert("US".to_string(), RegionConfig::default());
    regions.insert(
        "CA".to_string(),
        RegionConfig {
            rates: RegionRates {
                energy_rate_per_kwh: 0.24,
                demand_charge_per_kw_month: 24.0,
                tou_spread_per_kwh: 0.14,
                state_incentive_pct: 0.10,
                state_incentive_cap: Some(250_000.0),
            },
            costs: CostTables {
                battery_per_kwh: 380.0,
                solar_per_kw: 1_750.0,
                installation_pct: 0.18,
                ..CostTables::default()
            },
        },
    );
    regions.insert(
        "TX".to_string(),
        RegionConfig {
            rates: RegionRates {
                energy_rate_per_kwh: 0.12,
                demand_charge_per_kw_month: 12.0,
                tou_spread_per_kwh: 0.06,
                ..RegionRates::default()
            },
            costs: CostTables {
                battery_per_kwh: 330.0,
                solar_per_kw: 1_450.0,
                installation_pct: 0.12,
                ..CostTables::default()
            },
        },
    );
    regions.insert(
        "NY".to_string(),
        RegionConfig {
            rates: RegionRates {
                energy_rate_per_kwh: 0.21,
                demand_charge_per_kw_month: 22.0,
                tou_spread_per_kwh: 0.10,
                state_incentive_pct: 0.05,
                state_incentive_cap: Some(100_000.0),
            },
            costs: CostTables {
                battery_per_kwh: 400.0,
                installation_pct: 0.20,
                ..CostTables::default()
            },
        },
    );
    regions
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"financial.itc_rate"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

impl EngineConfig {
    /// Returns the baseline configuration.
    pub fn baseline() -> Self {
        Self {
            calculator: CalculatorConfig::default(),
            financial: FinancialPolicy::default(),
            margin: MarginPolicy::default(),
            regions: default_regions(),
        }
    }

    /// Returns the high-rate preset: expensive energy and steep demand charges.
    pub fn high_rate() -> Self {
        let mut config = Self::baseline();
        for region in config.regions.values_mut() {
            region.rates.energy_rate_per_kwh *= 1.5;
            region.rates.demand_charge_per_kw_month *= 1.75;
            region.rates.tou_spread_per_kwh *= 1.5;
        }
        config.financial.escalation_rate = 0.04;
        config
    }

    /// Returns the bounded preset: tighter bands and a $/kWh sell ceiling.
    pub fn bounded() -> Self {
        let mut config = Self::baseline();
        config.margin.max_margin_pct = 0.18;
        config.margin.bands.high = BandTerms {
            margin_pct: 0.16,
            min_margin_amount: 5_000.0,
        };
        config.margin.max_sell_per_kwh = Some(900.0);
        config
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "high_rate", "bounded"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "high_rate" => Ok(Self::high_rate()),
            "bounded" => Ok(Self::bounded()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Rates and costs for a region code.
    pub fn region(&self, code: &str) -> Option<&RegionConfig> {
        self.regions.get(code)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: String, message: &str| {
            if !ok {
                errors.push(ConfigError {
                    field,
                    message: message.to_string(),
                });
            }
        };

        let c = &self.calculator;
        check(
            c.solar_full_load_hours > 0.0 && c.solar_full_load_hours <= c.hours_per_year,
            "calculator.solar_full_load_hours".into(),
            "must be > 0 and <= calculator.hours_per_year",
        );
        check(
            c.hours_per_year > 0.0 && c.hours_per_year.is_finite(),
            "calculator.hours_per_year".into(),
            "must be > 0",
        );
        check(
            c.days_per_year > 0.0 && c.days_per_year.is_finite(),
            "calculator.days_per_year".into(),
            "must be > 0",
        );

        let f = &self.financial;
        check(
            (0.0..=1.0).contains(&f.itc_rate),
            "financial.itc_rate".into(),
            "must be in [0.0, 1.0]",
        );
        check(
            f.analysis_years > 0,
            "financial.analysis_years".into(),
            "must be > 0",
        );
        check(
            f.discount_rate > -1.0 && f.discount_rate.is_finite(),
            "financial.discount_rate".into(),
            "must be > -1.0",
        );
        check(
            f.escalation_rate > -1.0 && f.escalation_rate.is_finite(),
            "financial.escalation_rate".into(),
            "must be > -1.0",
        );
        check(
            f.cycles_per_year >= 0.0 && f.cycles_per_year <= 730.0,
            "financial.cycles_per_year".into(),
            "must be in [0, 730]",
        );
        check(
            f.round_trip_efficiency > 0.0 && f.round_trip_efficiency <= 1.0,
            "financial.round_trip_efficiency".into(),
            "must be in (0.0, 1.0]",
        );
        check(
            (0.0..=1.0).contains(&f.peak_shaving_fraction),
            "financial.peak_shaving_fraction".into(),
            "must be in [0.0, 1.0]",
        );
        check(
            (0.0..1.0).contains(&f.om_pct_per_year),
            "financial.om_pct_per_year".into(),
            "must be in [0.0, 1.0)",
        );

        let m = &self.margin;
        for (name, band) in [
            ("low", m.bands.low),
            ("medium", m.bands.medium),
            ("high", m.bands.high),
        ] {
            check(
                band.margin_pct >= 0.0 && band.margin_pct.is_finite(),
                format!("margin.bands.{name}.margin_pct"),
                "must be >= 0",
            );
            check(
                band.min_margin_amount >= 0.0 && band.min_margin_amount.is_finite(),
                format!("margin.bands.{name}.min_margin_amount"),
                "must be >= 0",
            );
        }
        check(
            m.max_margin_pct >= 0.0 && m.max_margin_pct.is_finite(),
            "margin.max_margin_pct".into(),
            "must be >= 0",
        );
        check(
            m.medium_threshold >= 0.0 && m.medium_threshold < m.high_threshold,
            "margin.medium_threshold".into(),
            "must be >= 0 and < margin.high_threshold",
        );
        if let Some(rate) = m.max_sell_per_kwh {
            check(
                rate > 0.0 && rate.is_finite(),
                "margin.max_sell_per_kwh".into(),
                "must be > 0",
            );
        }

        if self.regions.is_empty() {
            check(false, "regions".into(), "at least one region is required");
        }
        for (code, region) in &self.regions {
            let r = &region.rates;
            for (name, v) in [
                ("energy_rate_per_kwh", r.energy_rate_per_kwh),
                ("demand_charge_per_kw_month", r.demand_charge_per_kw_month),
                ("tou_spread_per_kwh", r.tou_spread_per_kwh),
            ] {
                check(
                    v >= 0.0 && v.is_finite(),
                    format!("regions.{code}.rates.{name}"),
                    "must be >= 0",
                );
            }
            check(
                r.state_incentive_pct >= 0.0 && f.itc_rate + r.state_incentive_pct <= 1.0,
                format!("regions.{code}.rates.state_incentive_pct"),
                "must be >= 0 and leave financial.itc_rate + state_incentive_pct <= 1.0",
            );
            if let Some(cap) = r.state_incentive_cap {
                check(
                    cap >= 0.0,
                    format!("regions.{code}.rates.state_incentive_cap"),
                    "must be >= 0",
                );
            }

            let k = &region.costs;
            for (name, v) in [
                ("battery_per_kwh", k.battery_per_kwh),
                ("battery_power_per_kw", k.battery_power_per_kw),
                ("solar_per_kw", k.solar_per_kw),
                ("generator_per_kw", k.generator_per_kw),
                ("ev_l2_per_unit", k.ev_l2_per_unit),
                ("ev_dcfc_per_unit", k.ev_dcfc_per_unit),
                ("ev_ultra_fast_per_unit", k.ev_ultra_fast_per_unit),
            ] {
                check(
                    v > 0.0 && v.is_finite(),
                    format!("regions.{code}.costs.{name}"),
                    "must be > 0",
                );
            }
            check(
                k.installation_pct >= 0.0 && k.installation_pct.is_finite(),
                format!("regions.{code}.costs.installation_pct"),
                "must be >= 0",
            );
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::margin::MarginBandId;

    #[test]
    fn baseline_preset_valid() {
        let errors = EngineConfig::baseline().validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn all_presets_are_valid() {
        for name in EngineConfig::PRESETS {
            let config = EngineConfig::from_preset(name).expect("preset exists");
            let errors = config.validate();
            assert!(errors.is_empty(), "{name} should be valid: {errors:?}");
        }
    }

    #[test]
    fn from_preset_unknown() {
        let err = EngineConfig::from_preset("nonexistent").expect_err("unknown preset");
        assert_eq!(err.field, "preset");
        assert!(err.message.contains("nonexistent"));
    }

    #[test]
    fn high_rate_raises_demand_charges() {
        let base = EngineConfig::baseline();
        let high = EngineConfig::high_rate();
        let b = base.region("CA").expect("CA");
        let h = high.region("CA").expect("CA");
        assert!(h.rates.demand_charge_per_kw_month > b.rates.demand_charge_per_kw_month);
    }

    #[test]
    fn bounded_sets_unit_bound() {
        assert_eq!(EngineConfig::bounded().margin.max_sell_per_kwh, Some(900.0));
        assert_eq!(EngineConfig::baseline().margin.max_sell_per_kwh, None);
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[calculator]
solar_full_load_hours = 1400.0

[financial]
itc_rate = 0.40
analysis_years = 20

[margin]
max_margin_pct = 0.30
max_sell_per_kwh = 1000.0

[margin.bands.high]
margin_pct = 0.22
min_margin_amount = 7500.0

[margin.component_bands]
ev_chargers = "low"

[regions.AZ.rates]
energy_rate_per_kwh = 0.14
demand_charge_per_kw_month = 19.0

[regions.AZ.costs]
battery_per_kwh = 340.0
"#;
        let config = EngineConfig::from_toml_str(toml).expect("valid toml");
        assert_eq!(config.calculator.solar_full_load_hours, 1400.0);
        assert_eq!(config.calculator.hours_per_year, 8760.0);
        assert_eq!(config.financial.itc_rate, 0.40);
        assert_eq!(config.margin.bands.high.margin_pct, 0.22);
        assert_eq!(config.margin.bands.low.margin_pct, 0.10);
        assert_eq!(
            config.margin.component_bands.ev_chargers,
            Some(MarginBandId::Low)
        );
        let az = config.region("AZ").expect("AZ");
        assert_eq!(az.costs.battery_per_kwh, 340.0);
        assert_eq!(az.costs.solar_per_kw, CostTables::default().solar_per_kw);
        assert!(config.region("CA").is_none(), "explicit regions replace defaults");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("[financial]\ndiscount_rate = 0.06\n")
            .expect("valid toml");
        assert_eq!(config.financial.discount_rate, 0.06);
        assert_eq!(config.regions, EngineConfig::baseline().regions);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let err = EngineConfig::from_toml_str("[financial]\nbogus = 1\n").expect_err("unknown");
        assert_eq!(err.field, "toml");
    }

    #[test]
    fn validation_collects_every_error() {
        let mut config = EngineConfig::baseline();
        config.financial.itc_rate = 1.5;
        config.margin.bands.low.margin_pct = -0.1;
        config.margin.medium_threshold = 2_000_000.0;
        let fields: Vec<_> = config.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"financial.itc_rate".to_string()));
        assert!(fields.contains(&"margin.bands.low.margin_pct".to_string()));
        assert!(fields.contains(&"margin.medium_threshold".to_string()));
    }

    #[test]
    fn validation_rejects_incentives_above_cost() {
        let mut config = EngineConfig::baseline();
        if let Some(ca) = config.regions.get_mut("CA") {
            ca.rates.state_incentive_pct = 0.8;
        }
        let errors = config.validate();
        assert!(
            errors
                .iter()
                .any(|e| e.field == "regions.CA.rates.state_incentive_pct")
        );
    }

    #[test]
    fn display_has_field_and_message() {
        let e = ConfigError {
            field: "financial.itc_rate".into(),
            message: "must be in [0.0, 1.0]".into(),
        };
        assert_eq!(
            e.to_string(),
            "config error: financial.itc_rate: must be in [0.0, 1.0]"
        );
    }
}
