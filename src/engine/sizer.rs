//! MagicFit: three battery-led system tiers from one baseline.
//!
//! Only the battery varies by tier. Solar, generator and EV configuration is
//! resolved once and shared, so every downstream quantity inherits the
//! ordering of the template's ascending tier multipliers.

use serde::Serialize;
use tracing::debug;

use super::audit::{ensure_ascending, ensure_finite, ensure_positive};
use super::baseline::BaselineResult;
use super::inputs::{BackupMode, EvSelection, FacilityInputs, GridConnection, OptionsInput};
use super::solar::SolarResult;
use super::tier::{TierKey, TierValues};
use crate::catalog::IndustryTemplate;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BessSpec {
    pub power_kw: f64,
    pub energy_kwh: f64,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolarSpec {
    pub capacity_kw: f64,
    pub annual_generation_kwh: f64,
    pub included: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvSpec {
    pub l2_count: u32,
    pub dcfc_count: u32,
    pub ultra_fast_count: u32,
    pub included: bool,
}

impl EvSpec {
    fn from_selection(ev: EvSelection) -> Self {
        Self {
            l2_count: ev.l2_count,
            dcfc_count: ev.dcfc_count,
            ultra_fast_count: ev.ultra_fast_count,
            included: ev.total() > 0,
        }
    }

    pub fn count(&self) -> u64 {
        u64::from(self.l2_count) + u64::from(self.dcfc_count) + u64::from(self.ultra_fast_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeneratorSpec {
    pub capacity_kw: f64,
    pub included: bool,
}

/// One sized system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemTier {
    pub tier: TierKey,
    pub bess: BessSpec,
    pub solar: SolarSpec,
    pub ev: EvSpec,
    pub generator: GeneratorSpec,
    /// Battery is the only backup source and carries the UPS upsize.
    pub ups_mode: bool,
}

pub type TierSet = TierValues<SystemTier>;

/// Effective add-on configuration after backup-mode and grid rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizingOptions {
    pub ups_mode: bool,
    pub solar: bool,
    pub generator: bool,
    pub ev: EvSelection,
}

impl SizingOptions {
    /// Resolves the toggles against the template and facility.
    ///
    /// UPS mode drops solar and generator. Off-grid sites and templates that
    /// require a generator always get one.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when UPS mode is requested for a facility that cannot
    /// run on battery alone, or when a charger count is out of range.
    pub fn resolve(
        template: &IndustryTemplate,
        facility: &FacilityInputs,
        options: &OptionsInput,
    ) -> EngineResult<Self> {
        options.ev.validate()?;
        let ups_mode = facility.backup_mode == BackupMode::Ups;
        let off_grid = facility.grid_connection == GridConnection::OffGrid;
        if ups_mode && template.generator_required {
            return Err(EngineError::invalid(
                "backup_mode",
                format!(
                    "UPS mode is not available for {}: a backup generator is required",
                    template.industry
                ),
            ));
        }
        if ups_mode && off_grid {
            return Err(EngineError::invalid(
                "backup_mode",
                "UPS mode needs a grid connection to recharge the battery",
            ));
        }
        Ok(Self {
            ups_mode,
            solar: !ups_mode && options.solar,
            generator: !ups_mode && (options.generator || template.generator_required || off_grid),
            ev: options.ev,
        })
    }
}

/// Sizes the three tiers.
///
/// `power = peak × tier multiplier`; `energy = power × duration`, times the
/// template's UPS multiplier when the battery is the sole backup source.
///
/// # Errors
///
/// `InvalidInput` if solar is selected but no usable solar result exists;
/// `InvariantViolation` on non-finite sizes or broken tier ordering.
pub fn size_tiers(
    template: &IndustryTemplate,
    baseline: &BaselineResult,
    solar: Option<&SolarResult>,
    options: &SizingOptions,
) -> EngineResult<TierSet> {
    let peak = ensure_positive("peak_demand_kw", baseline.peak_demand_kw)?;
    let durations = template.bess_duration_hours.resolve();
    let ups_factor = if options.ups_mode {
        template.ups_energy_multiplier
    } else {
        1.0
    };

    let solar_spec = if options.solar {
        let result = solar.ok_or_else(|| {
            EngineError::invalid("roof.value", "roof area is required when solar is selected")
        })?;
        if result.total_solar_kw <= 0.0 {
            return Err(EngineError::invalid(
                "roof.value",
                "no usable solar area: roof area must be greater than 0",
            ));
        }
        SolarSpec {
            capacity_kw: result.total_solar_kw,
            annual_generation_kwh: result.annual_generation_kwh,
            included: true,
        }
    } else {
        SolarSpec {
            capacity_kw: 0.0,
            annual_generation_kwh: 0.0,
            included: false,
        }
    };

    let generator = GeneratorSpec {
        capacity_kw: if options.generator {
            ensure_finite("generator.capacity_kw", peak * template.generator_sizing_factor)?
        } else {
            0.0
        },
        included: options.generator,
    };
    let ev = EvSpec::from_selection(options.ev);

    let tiers = TierValues::try_from_fn(|tier| {
        let multiplier = *template.tier_multipliers.get(tier);
        let duration = *durations.get(tier);
        let power = ensure_positive("bess.power_kw", peak * multiplier)?;
        let energy = ensure_positive("bess.energy_kwh", power * duration * ups_factor)?;
        Ok::<_, EngineError>(SystemTier {
            tier,
            bess: BessSpec {
                power_kw: power,
                energy_kwh: energy,
                duration_hours: duration,
            },
            solar: solar_spec,
            ev,
            generator,
            ups_mode: options.ups_mode,
        })
    })?;

    ensure_ascending("bess.power_kw", tiers.map(|t| t.bess.power_kw).as_array())?;
    ensure_ascending("bess.energy_kwh", tiers.map(|t| t.bess.energy_kwh).as_array())?;

    debug!(
        template = %template.template_id,
        ups_mode = options.ups_mode,
        solar = solar_spec.included,
        generator = generator.included,
        perfect_fit_kw = tiers.perfect_fit.bess.power_kw,
        perfect_fit_kwh = tiers.perfect_fit.bess.energy_kwh,
        "tiers sized"
    );
    Ok(tiers)
}
