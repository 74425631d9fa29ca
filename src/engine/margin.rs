//! Margin policy: turns a base cost into a sell price under bounded bands.
//!
//! Every result satisfies `sell_price >= base_cost`. The hard ceiling
//! (`max_margin_pct`) always wins over a band's floor, and the optional
//! `$ / kWh` bound applies to the blended total across all line items.
//!
//! [`BaseCost`] and [`SellPrice`] are distinct types: a sell price cannot be
//! fed back into [`apply_margin`] without an explicit re-wrap.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::audit::ensure_finite;
use super::financial::{Component, LineItem};
use crate::error::{EngineError, EngineResult};

/// Relative float tolerance for blended comparisons.
const BLEND_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginBandId {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for MarginBandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Markup terms of one band as configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandTerms {
    /// Markup as a fraction of base cost (0.20 = 20%).
    pub margin_pct: f64,
    /// Minimum margin in currency; still subject to the ceiling.
    #[serde(default)]
    pub min_margin_amount: f64,
}

/// A band resolved for application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarginBand {
    pub id: MarginBandId,
    pub margin_pct: f64,
    pub min_margin_amount: f64,
}

impl MarginBand {
    pub fn new(id: MarginBandId, margin_pct: f64, min_margin_amount: f64) -> Self {
        Self {
            id,
            margin_pct,
            min_margin_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarginBands {
    pub low: BandTerms,
    pub medium: BandTerms,
    pub high: BandTerms,
}

impl Default for MarginBands {
    fn default() -> Self {
        Self {
            low: BandTerms {
                margin_pct: 0.10,
                min_margin_amount: 2_500.0,
            },
            medium: BandTerms {
                margin_pct: 0.15,
                min_margin_amount: 5_000.0,
            },
            high: BandTerms {
                margin_pct: 0.20,
                min_margin_amount: 5_000.0,
            },
        }
    }
}

/// Optional per-component band overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentBands {
    pub battery_energy: Option<MarginBandId>,
    pub battery_power: Option<MarginBandId>,
    pub solar: Option<MarginBandId>,
    pub generator: Option<MarginBandId>,
    pub ev_chargers: Option<MarginBandId>,
    pub installation: Option<MarginBandId>,
}

impl ComponentBands {
    pub fn get(&self, component: Component) -> Option<MarginBandId> {
        match component {
            Component::BatteryEnergy => self.battery_energy,
            Component::BatteryPower => self.battery_power,
            Component::Solar => self.solar,
            Component::Generator => self.generator,
            Component::EvChargers => self.ev_chargers,
            Component::Installation => self.installation,
        }
    }
}

/// Margin policy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarginPolicy {
    pub bands: MarginBands,
    /// Base cost at or above which the medium band is selected.
    pub medium_threshold: f64,
    /// Base cost at or above which the low band is selected.
    pub high_threshold: f64,
    /// Absolute markup ceiling as a fraction of base cost.
    pub max_margin_pct: f64,
    /// Upper bound on the blended sell price per kWh of quoted storage.
    pub max_sell_per_kwh: Option<f64>,
    pub component_bands: ComponentBands,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self {
            bands: MarginBands::default(),
            medium_threshold: 250_000.0,
            high_threshold: 1_000_000.0,
            max_margin_pct: 0.25,
            max_sell_per_kwh: None,
            component_bands: ComponentBands::default(),
        }
    }
}

impl MarginPolicy {
    pub fn band(&self, id: MarginBandId) -> MarginBand {
        let terms = match id {
            MarginBandId::Low => self.bands.low,
            MarginBandId::Medium => self.bands.medium,
            MarginBandId::High => self.bands.high,
        };
        MarginBand::new(id, terms.margin_pct, terms.min_margin_amount)
    }

    /// Larger deals get the smaller markup.
    pub fn select_band(&self, base_cost: f64) -> MarginBandId {
        if base_cost >= self.high_threshold {
            MarginBandId::Low
        } else if base_cost >= self.medium_threshold {
            MarginBandId::Medium
        } else {
            MarginBandId::High
        }
    }
}

/// Unmargined cost.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct BaseCost(f64);

impl BaseCost {
    /// # Errors
    ///
    /// Rejects non-finite or negative costs.
    pub fn new(value: f64) -> EngineResult<Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(EngineError::invariant(
                "base_cost",
                format!("must be finite and >= 0, got {value}"),
            ))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Margined price. Deliberately has no conversion into [`BaseCost`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct SellPrice(f64);

impl SellPrice {
    pub fn value(self) -> f64 {
        self.0
    }
}

/// Inputs to a margin application besides the cost and band.
#[derive(Debug, Clone, Copy)]
pub struct MarginContext<'a> {
    pub policy: &'a MarginPolicy,
    /// Quote size in kWh for the `$ / kWh` bound.
    pub quote_units_kwh: Option<f64>,
}

impl<'a> MarginContext<'a> {
    pub fn new(policy: &'a MarginPolicy) -> Self {
        Self {
            policy,
            quote_units_kwh: None,
        }
    }

    pub fn with_units(policy: &'a MarginPolicy, quote_units_kwh: f64) -> Self {
        Self {
            policy,
            quote_units_kwh: Some(quote_units_kwh),
        }
    }

    /// Sell-price bound for this context, if both a rate and units are known.
    fn unit_bound(&self) -> Option<f64> {
        match (self.policy.max_sell_per_kwh, self.quote_units_kwh) {
            (Some(rate), Some(units)) => Some(rate * units),
            _ => None,
        }
    }
}

/// Outcome of one margin application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginPolicyResult {
    pub base_cost: BaseCost,
    pub sell_price: SellPrice,
    pub margin_amount: f64,
    pub margin_band: MarginBandId,
    /// The hard ceiling overrode the band.
    pub capped: bool,
    /// The `$ / kWh` bound reduced the price.
    pub unit_bound_applied: bool,
}

impl MarginPolicyResult {
    /// Effective markup as a fraction of base cost.
    pub fn margin_pct(&self) -> f64 {
        if self.base_cost.0 > 0.0 {
            self.margin_amount / self.base_cost.0
        } else {
            0.0
        }
    }
}

fn check_band(band: &MarginBand) -> EngineResult<()> {
    if !(band.margin_pct.is_finite() && band.margin_pct >= 0.0) {
        return Err(EngineError::MarginPolicyViolation(format!(
            "{} band margin {} would price below cost",
            band.id, band.margin_pct
        )));
    }
    if !(band.min_margin_amount.is_finite() && band.min_margin_amount >= 0.0) {
        return Err(EngineError::MarginPolicyViolation(format!(
            "{} band minimum margin {} would price below cost",
            band.id, band.min_margin_amount
        )));
    }
    Ok(())
}

fn check_policy(policy: &MarginPolicy) -> EngineResult<()> {
    if !(policy.max_margin_pct.is_finite() && policy.max_margin_pct >= 0.0) {
        return Err(EngineError::MarginPolicyViolation(format!(
            "max_margin_pct {} would price below cost",
            policy.max_margin_pct
        )));
    }
    if let Some(rate) = policy.max_sell_per_kwh {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EngineError::MarginPolicyViolation(format!(
                "max_sell_per_kwh must be > 0, got {rate}"
            )));
        }
    }
    Ok(())
}

/// Prices one base cost under `band`.
///
/// # Errors
///
/// `MarginPolicyViolation` if the band or policy would yield a price below
/// cost, `InvariantViolation` if arithmetic turns non-finite.
pub fn apply_margin(
    base: BaseCost,
    band: &MarginBand,
    ctx: &MarginContext<'_>,
) -> EngineResult<MarginPolicyResult> {
    check_band(band)?;
    check_policy(ctx.policy)?;

    let cost = base.0;
    let raw = if cost > 0.0 {
        (band.margin_pct * cost).max(band.min_margin_amount)
    } else {
        0.0
    };
    let ceiling = ctx.policy.max_margin_pct * cost;
    let (mut margin, capped) = if raw > ceiling {
        (ceiling, true)
    } else {
        (raw, false)
    };

    let mut unit_bound_applied = false;
    if let Some(bound) = ctx.unit_bound() {
        let bound = ensure_finite("margin.unit_bound", bound)?;
        if cost + margin > bound {
            margin = (bound - cost).max(0.0);
            unit_bound_applied = true;
        }
    }

    let sell = ensure_finite("sell_price", cost + margin)?;
    if sell < cost {
        return Err(EngineError::MarginPolicyViolation(format!(
            "sell price {sell:.2} below base cost {cost:.2}"
        )));
    }

    Ok(MarginPolicyResult {
        base_cost: base,
        sell_price: SellPrice(sell),
        margin_amount: margin,
        margin_band: band.id,
        capped,
        unit_bound_applied,
    })
}

/// One margined line item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedLine {
    pub component: Component,
    pub result: MarginPolicyResult,
}

/// Margin applied once across a tier's heterogeneous line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlendedMargin {
    pub lines: Vec<PricedLine>,
    pub base_cost: f64,
    pub sell_price: f64,
    /// Weighted-average markup: `sell_price = base_cost × (1 + blended_margin_pct)`.
    pub blended_margin_pct: f64,
    pub margin_band: MarginBandId,
    pub capped: bool,
    pub unit_bound_applied: bool,
}

/// Prices every line item and blends the result.
///
/// Each line is marked up by its own band's percentage (the component
/// override, or `band`). The currency floor of `band` is then applied once to
/// the quote: any shortfall is spread over the lines in proportion to their
/// remaining headroom under `max_margin_pct`, so no line and not the total
/// exceeds the ceiling. The `$ / kWh` bound is applied last by scaling every
/// line's margin by the same factor. The total always equals the sum of the
/// lines.
///
/// # Errors
///
/// Propagates [`apply_margin`] failures; `InvariantViolation` if the blended
/// markup disagrees with the per-line markups.
pub fn apply_blended_margin(
    items: &[LineItem],
    band: MarginBandId,
    ctx: &MarginContext<'_>,
) -> EngineResult<BlendedMargin> {
    let policy = ctx.policy;
    check_policy(policy)?;
    let quote_band = policy.band(band);
    check_band(&quote_band)?;

    let line_ctx = MarginContext::new(policy);
    let mut lines = Vec::with_capacity(items.len());
    let mut requested = 0.0_f64;
    for item in items {
        let terms = policy.band(policy.component_bands.get(item.component).unwrap_or(band));
        let pct_only = MarginBand::new(terms.id, terms.margin_pct, 0.0);
        let result = apply_margin(BaseCost::new(item.base_cost)?, &pct_only, &line_ctx)?;
        requested += terms.margin_pct * item.base_cost;
        lines.push(PricedLine {
            component: item.component,
            result,
        });
    }

    let base_total: f64 = lines.iter().map(|l| l.result.base_cost.0).sum();
    let ceiling_total = policy.max_margin_pct * base_total;
    let margin_total: f64 = lines.iter().map(|l| l.result.margin_amount).sum();

    let floor = if base_total > 0.0 {
        quote_band.min_margin_amount.min(ceiling_total)
    } else {
        0.0
    };
    if floor > margin_total {
        let headroom = ceiling_total - margin_total;
        let share = (floor - margin_total) / headroom;
        for line in &mut lines {
            let r = &mut line.result;
            let room = policy.max_margin_pct * r.base_cost.0 - r.margin_amount;
            r.margin_amount += room.max(0.0) * share;
            r.sell_price = SellPrice(r.base_cost.0 + r.margin_amount);
        }
    }
    let capped = base_total > 0.0
        && requested.max(quote_band.min_margin_amount)
            > ceiling_total + BLEND_TOLERANCE * ceiling_total.max(1.0);

    let mut sell_total: f64 = lines.iter().map(|l| l.result.sell_price.0).sum();
    let mut unit_bound_applied = false;
    if let Some(bound) = ctx.unit_bound() {
        let bound = ensure_finite("margin.unit_bound", bound)?;
        if sell_total > bound && sell_total > base_total {
            let target = bound.max(base_total);
            let scale = (target - base_total) / (sell_total - base_total);
            for line in &mut lines {
                let r = &mut line.result;
                r.margin_amount *= scale;
                r.sell_price = SellPrice(r.base_cost.0 + r.margin_amount);
                r.unit_bound_applied = true;
            }
            sell_total = lines.iter().map(|l| l.result.sell_price.0).sum();
            unit_bound_applied = true;
        }
    }

    let sell_total = ensure_finite("blended.sell_price", sell_total)?;
    if sell_total < base_total {
        return Err(EngineError::MarginPolicyViolation(format!(
            "blended sell price {sell_total:.2} below base cost {base_total:.2}"
        )));
    }
    let blended_margin_pct = if base_total > 0.0 {
        (sell_total - base_total) / base_total
    } else {
        0.0
    };

    // Cost-weighted average of the per-line markups.
    let weighted_pct = if base_total > 0.0 {
        lines
            .iter()
            .map(|l| l.result.margin_pct() * l.result.base_cost.0)
            .sum::<f64>()
            / base_total
    } else {
        0.0
    };
    if (weighted_pct - blended_margin_pct).abs() > BLEND_TOLERANCE * blended_margin_pct.max(1.0) {
        return Err(EngineError::invariant(
            "blended.margin_pct",
            format!("blended {blended_margin_pct:.9} != weighted line average {weighted_pct:.9}"),
        ));
    }

    debug!(
        base_total,
        sell_total,
        blended_margin_pct,
        band = %band,
        capped,
        unit_bound_applied,
        "blended margin applied"
    );

    Ok(BlendedMargin {
        lines,
        base_cost: base_total,
        sell_price: sell_total,
        blended_margin_pct,
        margin_band: band,
        capped,
        unit_bound_applied,
    })
}
