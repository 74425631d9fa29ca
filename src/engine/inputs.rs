//! Facility attributes and option selections collected by the wizard.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::margin::MarginBandId;
use crate::error::{EngineError, EngineResult};

/// Square metres to square feet.
pub const SQM_TO_SQFT: f64 = 10.764;

/// Primary sizing quantities. Which one a template reads is decided by its
/// [`PowerBasis`](crate::catalog::template::PowerBasis).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FacilityQuantities {
    pub square_feet: Option<f64>,
    pub rooms: Option<f64>,
    pub racks: Option<f64>,
    pub beds: Option<f64>,
    pub wash_bays: Option<f64>,
}

/// Field selector into [`FacilityQuantities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingField {
    SquareFeet,
    Rooms,
    Racks,
    Beds,
    WashBays,
}

impl SizingField {
    pub fn read(self, quantities: &FacilityQuantities) -> Option<f64> {
        match self {
            Self::SquareFeet => quantities.square_feet,
            Self::Rooms => quantities.rooms,
            Self::Racks => quantities.racks,
            Self::Beds => quantities.beds,
            Self::WashBays => quantities.wash_bays,
        }
    }

    /// Dotted input path used in validation messages.
    pub fn path(self) -> &'static str {
        match self {
            Self::SquareFeet => "quantities.square_feet",
            Self::Rooms => "quantities.rooms",
            Self::Racks => "quantities.racks",
            Self::Beds => "quantities.beds",
            Self::WashBays => "quantities.wash_bays",
        }
    }

    /// Largest plausible value for a single facility.
    pub fn max_value(self) -> f64 {
        match self {
            Self::SquareFeet => 50_000_000.0,
            Self::Rooms => 20_000.0,
            Self::Racks => 100_000.0,
            Self::Beds => 10_000.0,
            Self::WashBays => 500.0,
        }
    }

    /// Human label used in validation messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::SquareFeet => "facility square footage",
            Self::Rooms => "room count",
            Self::Racks => "rack count",
            Self::Beds => "bed count",
            Self::WashBays => "wash bay count",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    #[default]
    Sqft,
    Sqm,
}

/// An area with its unit as entered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AreaInput {
    pub value: f64,
    #[serde(default)]
    pub unit: AreaUnit,
}

impl AreaInput {
    pub fn sqft(value: f64) -> Self {
        Self {
            value,
            unit: AreaUnit::Sqft,
        }
    }

    pub fn sqm(value: f64) -> Self {
        Self {
            value,
            unit: AreaUnit::Sqm,
        }
    }

    /// Area in square feet.
    pub fn to_sqft(self) -> f64 {
        match self.unit {
            AreaUnit::Sqft => self.value,
            AreaUnit::Sqm => self.value * SQM_TO_SQFT,
        }
    }
}

/// Whether carport solar should be counted.
///
/// `Unsure` counts the carport exactly like `Yes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarportInterest {
    Yes,
    #[default]
    No,
    Unsure,
}

impl CarportInterest {
    pub fn includes_carport(self) -> bool {
        matches!(self, Self::Yes | Self::Unsure)
    }
}

/// Backup configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMode {
    /// Solar and generator follow the option toggles.
    #[default]
    Standard,
    /// Battery is the only outage source: no solar, no generator.
    Ups,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridConnection {
    #[default]
    Reliable,
    Unreliable,
    Limited,
    OffGrid,
    Microgrid,
}

/// Raw facility attributes for one quote request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacilityInputs {
    pub industry: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub quantities: FacilityQuantities,
    #[serde(default)]
    pub roof: Option<AreaInput>,
    #[serde(default)]
    pub carport: Option<AreaInput>,
    #[serde(default)]
    pub carport_interest: CarportInterest,
    #[serde(default)]
    pub backup_mode: BackupMode,
    /// Free-form facility traits read by load modifiers (e.g. `"large_motors"`).
    #[serde(default)]
    pub features: BTreeSet<String>,
    #[serde(default)]
    pub operating_hours_per_day: Option<f64>,
    /// Known peak demand from a utility bill; 0 or absent means auto-calculate.
    #[serde(default)]
    pub peak_load_override_kw: Option<f64>,
    #[serde(default)]
    pub grid_connection: GridConnection,
}

impl FacilityInputs {
    pub fn new(industry: impl Into<String>) -> Self {
        Self {
            industry: industry.into(),
            subtype: None,
            quantities: FacilityQuantities::default(),
            roof: None,
            carport: None,
            carport_interest: CarportInterest::No,
            backup_mode: BackupMode::Standard,
            features: BTreeSet::new(),
            operating_hours_per_day: None,
            peak_load_override_kw: None,
            grid_connection: GridConnection::Reliable,
        }
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}

/// Charger counts by class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvSelection {
    pub l2_count: u32,
    pub dcfc_count: u32,
    pub ultra_fast_count: u32,
}

impl EvSelection {
    /// Largest count accepted for any one charger class.
    pub const MAX_PER_CLASS: u32 = 1_000;

    pub fn total(&self) -> u64 {
        u64::from(self.l2_count) + u64::from(self.dcfc_count) + u64::from(self.ultra_fast_count)
    }

    /// # Errors
    ///
    /// `InvalidInput` naming the first class above [`Self::MAX_PER_CLASS`].
    pub fn validate(&self) -> EngineResult<()> {
        let classes = [
            ("options.ev.l2_count", self.l2_count),
            ("options.ev.dcfc_count", self.dcfc_count),
            ("options.ev.ultra_fast_count", self.ultra_fast_count),
        ];
        match classes.iter().find(|(_, n)| *n > Self::MAX_PER_CLASS) {
            Some((field, n)) => Err(EngineError::invalid(
                *field,
                format!("too many chargers: {n} (at most {})", Self::MAX_PER_CLASS),
            )),
            None => Ok(()),
        }
    }
}

/// Option toggles from the add-ons step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsInput {
    pub solar: bool,
    pub generator: bool,
    pub ev: EvSelection,
    /// Manual band override; automatic selection when absent.
    pub margin_band: Option<MarginBandId>,
}

/// Everything `compute_quote` needs from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuoteRequest {
    pub region: String,
    pub facility: FacilityInputs,
    #[serde(default)]
    pub options: OptionsInput,
}

impl QuoteRequest {
    /// Parses a request from TOML.
    ///
    /// # Errors
    ///
    /// Returns the TOML parser's message if the document is invalid.
    pub fn from_toml_str(s: &str) -> Result<Self, String> {
        toml::from_str(s).map_err(|e| e.to_string())
    }
}

impl fmt::Display for QuoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.facility.industry)?;
        if let Some(subtype) = &self.facility.subtype {
            write!(f, "/{subtype}")?;
        }
        write!(f, " in {}", self.region)
    }
}
