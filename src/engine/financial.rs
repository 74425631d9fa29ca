//! Investment, incentives, savings and returns for one sized tier.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::audit::{ensure_currency, ensure_finite};
use super::sizer::SystemTier;
use crate::error::{EngineError, EngineResult};

/// Equipment and soft-cost categories priced per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    BatteryEnergy,
    BatteryPower,
    Solar,
    Generator,
    EvChargers,
    Installation,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BatteryEnergy => "battery energy",
            Self::BatteryPower => "battery power conversion",
            Self::Solar => "solar",
            Self::Generator => "generator",
            Self::EvChargers => "EV chargers",
            Self::Installation => "installation",
        })
    }
}

/// Unit costs for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostTables {
    /// Battery modules ($/kWh).
    pub battery_per_kwh: f64,
    /// Power conversion system ($/kW).
    pub battery_power_per_kw: f64,
    pub solar_per_kw: f64,
    pub generator_per_kw: f64,
    pub ev_l2_per_unit: f64,
    pub ev_dcfc_per_unit: f64,
    pub ev_ultra_fast_per_unit: f64,
    /// Soft costs as a fraction of hardware.
    pub installation_pct: f64,
}

impl Default for CostTables {
    fn default() -> Self {
        Self {
            battery_per_kwh: 350.0,
            battery_power_per_kw: 120.0,
            solar_per_kw: 1_600.0,
            generator_per_kw: 700.0,
            ev_l2_per_unit: 6_000.0,
            ev_dcfc_per_unit: 60_000.0,
            ev_ultra_fast_per_unit: 150_000.0,
            installation_pct: 0.15,
        }
    }
}

/// Utility tariff and state incentive terms for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegionRates {
    pub energy_rate_per_kwh: f64,
    pub demand_charge_per_kw_month: f64,
    /// Peak minus off-peak energy price.
    pub tou_spread_per_kwh: f64,
    /// State incentive as a fraction of total investment.
    pub state_incentive_pct: f64,
    pub state_incentive_cap: Option<f64>,
}

impl Default for RegionRates {
    fn default() -> Self {
        Self {
            energy_rate_per_kwh: 0.16,
            demand_charge_per_kw_month: 15.0,
            tou_spread_per_kwh: 0.08,
            state_incentive_pct: 0.0,
            state_incentive_cap: None,
        }
    }
}

/// Financial policy constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinancialPolicy {
    /// Federal investment tax credit (0.30 = 30%).
    pub itc_rate: f64,
    pub analysis_years: u32,
    pub discount_rate: f64,
    /// Yearly growth of utility savings.
    pub escalation_rate: f64,
    pub cycles_per_year: f64,
    pub round_trip_efficiency: f64,
    /// Share of the theoretical demand reduction actually realized.
    pub peak_shaving_fraction: f64,
    /// Operations and maintenance per year as a fraction of investment.
    pub om_pct_per_year: f64,
}

impl Default for FinancialPolicy {
    fn default() -> Self {
        Self {
            itc_rate: 0.30,
            analysis_years: 25,
            discount_rate: 0.08,
            escalation_rate: 0.02,
            cycles_per_year: 250.0,
            round_trip_efficiency: 0.88,
            peak_shaving_fraction: 0.6,
            om_pct_per_year: 0.01,
        }
    }
}

/// One priced equipment or soft-cost line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub component: Component,
    pub quantity: f64,
    pub unit_cost: f64,
    pub base_cost: f64,
}

impl LineItem {
    /// A lump-sum line.
    pub fn new(component: Component, base_cost: f64) -> Self {
        Self {
            component,
            quantity: 1.0,
            unit_cost: base_cost,
            base_cost,
        }
    }

    fn priced(component: Component, quantity: f64, unit_cost: f64) -> EngineResult<Self> {
        let base_cost = ensure_currency(&format!("line_items.{component:?}"), quantity * unit_cost)?;
        Ok(Self {
            component,
            quantity,
            unit_cost,
            base_cost,
        })
    }
}

/// Prices a tier's equipment at base cost.
///
/// # Errors
///
/// `InvariantViolation` on a non-finite or negative line.
pub fn line_items(tier: &SystemTier, costs: &CostTables) -> EngineResult<Vec<LineItem>> {
    let mut items = vec![
        LineItem::priced(Component::BatteryEnergy, tier.bess.energy_kwh, costs.battery_per_kwh)?,
        LineItem::priced(
            Component::BatteryPower,
            tier.bess.power_kw,
            costs.battery_power_per_kw,
        )?,
    ];
    if tier.solar.included {
        items.push(LineItem::priced(
            Component::Solar,
            tier.solar.capacity_kw,
            costs.solar_per_kw,
        )?);
    }
    if tier.generator.included {
        items.push(LineItem::priced(
            Component::Generator,
            tier.generator.capacity_kw,
            costs.generator_per_kw,
        )?);
    }
    if tier.ev.included {
        let count = tier.ev.count() as f64;
        let total = f64::from(tier.ev.l2_count) * costs.ev_l2_per_unit
            + f64::from(tier.ev.dcfc_count) * costs.ev_dcfc_per_unit
            + f64::from(tier.ev.ultra_fast_count) * costs.ev_ultra_fast_per_unit;
        items.push(LineItem::priced(Component::EvChargers, count, total / count)?);
    }
    let hardware: f64 = items.iter().map(|i| i.base_cost).sum();
    items.push(LineItem::priced(
        Component::Installation,
        hardware,
        costs.installation_pct,
    )?);
    Ok(items)
}

/// Site-level figures the savings model reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SiteProfile {
    pub peak_demand_kw: f64,
    pub annual_consumption_kwh: f64,
}

/// Annual savings by source. O&M is a cost and enters negatively.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SavingsBreakdown {
    pub demand_charge: f64,
    pub arbitrage: f64,
    pub solar: f64,
    pub operations_and_maintenance: f64,
}

impl SavingsBreakdown {
    pub fn net(&self) -> f64 {
        self.demand_charge + self.arbitrage + self.solar - self.operations_and_maintenance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierFinancials {
    pub total_investment: f64,
    pub federal_itc: f64,
    pub state_incentives: f64,
    pub net_investment: f64,
    /// May be negative when O&M outweighs avoided spend.
    pub annual_savings: f64,
    pub savings: SavingsBreakdown,
    /// `None` when savings never repay the investment.
    pub payback_years: Option<f64>,
    /// Percent; `None` when there is no net investment to return on.
    pub ten_year_roi: Option<f64>,
    pub npv: f64,
    pub irr: Option<f64>,
}

/// Evaluates a tier at a given total investment.
///
/// The orchestrator passes the margined sell price; [`calculate_financials`]
/// passes the base cost.
///
/// # Errors
///
/// `InvariantViolation` when any currency stock goes negative or non-finite.
pub fn evaluate_investment(
    tier: &SystemTier,
    site: &SiteProfile,
    total_investment: f64,
    rates: &RegionRates,
    policy: &FinancialPolicy,
) -> EngineResult<TierFinancials> {
    let total = ensure_currency("total_investment", total_investment)?;
    let federal_itc = ensure_currency("federal_itc", (policy.itc_rate * total).min(total))?;
    let mut state = rates.state_incentive_pct * total;
    if let Some(cap) = rates.state_incentive_cap {
        state = state.min(cap);
    }
    let state_incentives = ensure_currency("state_incentives", state)?;
    let net_investment = ensure_currency("net_investment", total - federal_itc - state_incentives)?;

    let savings = SavingsBreakdown {
        demand_charge: tier.bess.power_kw.min(site.peak_demand_kw)
            * rates.demand_charge_per_kw_month
            * 12.0
            * policy.peak_shaving_fraction,
        arbitrage: tier.bess.energy_kwh
            * policy.cycles_per_year
            * policy.round_trip_efficiency
            * rates.tou_spread_per_kwh,
        solar: if tier.solar.included {
            tier.solar
                .annual_generation_kwh
                .min(site.annual_consumption_kwh)
                * rates.energy_rate_per_kwh
        } else {
            0.0
        },
        operations_and_maintenance: policy.om_pct_per_year * total,
    };
    let annual_savings = ensure_finite("annual_savings", savings.net())?;

    let payback_years = if annual_savings > 0.0 {
        Some(ensure_finite("payback_years", net_investment / annual_savings)?)
    } else {
        None
    };
    let ten_year_roi = if net_investment > 0.0 {
        Some(ensure_finite(
            "ten_year_roi",
            (annual_savings * 10.0 - net_investment) / net_investment * 100.0,
        )?)
    } else {
        None
    };

    let flows = cash_flows(
        net_investment,
        annual_savings,
        policy.escalation_rate,
        policy.analysis_years,
    );
    let npv = ensure_finite("npv", npv(policy.discount_rate, &flows))?;

    Ok(TierFinancials {
        total_investment: total,
        federal_itc,
        state_incentives,
        net_investment,
        annual_savings,
        savings,
        payback_years,
        ten_year_roi,
        npv,
        irr: irr(&flows),
    })
}

/// Prices a tier at base cost and evaluates it.
///
/// # Errors
///
/// See [`line_items`] and [`evaluate_investment`].
pub fn calculate_financials(
    tier: &SystemTier,
    site: &SiteProfile,
    costs: &CostTables,
    rates: &RegionRates,
    policy: &FinancialPolicy,
) -> EngineResult<TierFinancials> {
    let total: f64 = line_items(tier, costs)?.iter().map(|i| i.base_cost).sum();
    evaluate_investment(tier, site, total, rates, policy)
}

/// Year 0 outflow followed by escalating yearly savings.
pub fn cash_flows(net_investment: f64, annual_savings: f64, escalation: f64, years: u32) -> Vec<f64> {
    let mut flows = Vec::with_capacity(years as usize + 1);
    flows.push(-net_investment);
    let mut savings = annual_savings;
    for _ in 0..years {
        flows.push(savings);
        savings *= 1.0 + escalation;
    }
    flows
}

/// Net present value with iterative discount factors.
pub fn npv(rate: f64, cash_flows: &[f64]) -> f64 {
    let one_plus_r = 1.0 + rate;
    let mut discount = 1.0;
    let mut total = 0.0;
    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        if discount == 0.0 {
            break;
        }
        total += cf / discount;
    }
    total
}

const IRR_MIN: f64 = -0.99;
const IRR_MAX: f64 = 10.0;
const IRR_EPSILON: f64 = 1e-7;

/// Internal rate of return: Newton-Raphson from 10%, bisection if that fails.
///
/// Returns `None` when the cash flows never change sign in the search range.
pub fn irr(cash_flows: &[f64]) -> Option<f64> {
    if cash_flows.len() < 2 {
        return None;
    }
    let scale = cash_flows.iter().map(|c| c.abs()).fold(1.0, f64::max);
    let tolerance = IRR_EPSILON * scale;

    let mut rate = 0.10;
    for _ in 0..100 {
        let one_plus_r = 1.0 + rate;
        let mut value = 0.0;
        let mut derivative = 0.0;
        let mut discount = 1.0;
        for (t, cf) in cash_flows.iter().enumerate() {
            if t > 0 {
                discount *= one_plus_r;
                derivative -= t as f64 * cf / (discount * one_plus_r);
            }
            value += cf / discount;
        }
        if !value.is_finite() || !derivative.is_finite() || derivative == 0.0 {
            break;
        }
        if value.abs() < tolerance {
            return Some(rate);
        }
        rate = (rate - value / derivative).clamp(IRR_MIN, IRR_MAX);
    }

    let (mut lo, mut hi) = (IRR_MIN, IRR_MAX);
    let (mut f_lo, f_hi) = (npv(lo, cash_flows), npv(hi, cash_flows));
    if !(f_lo.is_finite() && f_hi.is_finite()) || f_lo.signum() == f_hi.signum() {
        return None;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let f_mid = npv(mid, cash_flows);
        if f_mid.abs() < tolerance || (hi - lo) < 1e-12 {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Fails when a tier's incentive identity does not hold.
pub fn check_identity(f: &TierFinancials) -> EngineResult<()> {
    let expected = f.total_investment - f.federal_itc - f.state_incentives;
    if (expected - f.net_investment).abs() > 1e-6 * f.total_investment.max(1.0) {
        return Err(EngineError::invariant(
            "net_investment",
            format!("{} != {expected}", f.net_investment),
        ));
    }
    if f.federal_itc > f.total_investment {
        return Err(EngineError::invariant(
            "federal_itc",
            "credit exceeds total investment",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::engine::sizer::{BessSpec, EvSpec, GeneratorSpec, SolarSpec};
    use crate::engine::tier::TierKey;

    fn tier(power_kw: f64, energy_kwh: f64) -> SystemTier {
        SystemTier {
            tier: TierKey::PerfectFit,
            bess: BessSpec {
                power_kw,
                energy_kwh,
                duration_hours: energy_kwh / power_kw,
            },
            solar: SolarSpec {
                capacity_kw: 0.0,
                annual_generation_kwh: 0.0,
                included: false,
            },
            ev: EvSpec {
                l2_count: 0,
                dcfc_count: 0,
                ultra_fast_count: 0,
                included: false,
            },
            generator: GeneratorSpec {
                capacity_kw: 0.0,
                included: false,
            },
            ups_mode: false,
        }
    }

    const SITE: SiteProfile = SiteProfile {
        peak_demand_kw: 500.0,
        annual_consumption_kwh: 2_000_000.0,
    };

    #[test]
    fn battery_only_line_items() {
        let items = line_items(&tier(500.0, 1000.0), &CostTables::default()).expect("items");
        let kinds: Vec<_> = items.iter().map(|i| i.component).collect();
        assert_eq!(
            kinds,
            vec![Component::BatteryEnergy, Component::BatteryPower, Component::Installation]
        );
        // 350k + 60k hardware, 15% soft costs
        assert_relative_eq!(items[2].base_cost, 61_500.0, epsilon = 1e-6);
    }

    #[test]
    fn ev_line_sums_every_class() {
        let mut t = tier(100.0, 200.0);
        t.ev = EvSpec {
            l2_count: 2,
            dcfc_count: 1,
            ultra_fast_count: 0,
            included: true,
        };
        let items = line_items(&t, &CostTables::default()).expect("items");
        let ev = items
            .iter()
            .find(|i| i.component == Component::EvChargers)
            .expect("ev line");
        assert_relative_eq!(ev.base_cost, 72_000.0, epsilon = 1e-6);
        assert_eq!(ev.quantity, 3.0);
    }

    #[test]
    fn itc_and_net_identity() {
        let rates = RegionRates {
            state_incentive_pct: 0.10,
            state_incentive_cap: Some(20_000.0),
            ..RegionRates::default()
        };
        let f = evaluate_investment(
            &tier(500.0, 1000.0),
            &SITE,
            400_000.0,
            &rates,
            &FinancialPolicy::default(),
        )
        .expect("financials");
        assert_relative_eq!(f.federal_itc, 120_000.0, epsilon = 1e-6);
        assert_relative_eq!(f.state_incentives, 20_000.0, epsilon = 1e-6);
        assert_relative_eq!(f.net_investment, 260_000.0, epsilon = 1e-6);
        assert!(check_identity(&f).is_ok());
    }

    #[test]
    fn itc_above_one_is_capped_at_total() {
        let policy = FinancialPolicy {
            itc_rate: 1.2,
            ..FinancialPolicy::default()
        };
        let f = evaluate_investment(&tier(500.0, 1000.0), &SITE, 100_000.0, &RegionRates::default(), &policy)
            .expect("financials");
        assert_eq!(f.federal_itc, f.total_investment);
        assert_eq!(f.net_investment, 0.0);
        assert_eq!(f.ten_year_roi, None);
    }

    #[test]
    fn incentives_above_total_are_an_invariant_violation() {
        let rates = RegionRates {
            state_incentive_pct: 0.9,
            ..RegionRates::default()
        };
        let err = evaluate_investment(
            &tier(500.0, 1000.0),
            &SITE,
            100_000.0,
            &rates,
            &FinancialPolicy::default(),
        )
        .expect_err("negative net");
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    #[test]
    fn no_savings_means_no_payback() {
        let rates = RegionRates {
            demand_charge_per_kw_month: 0.0,
            tou_spread_per_kwh: 0.0,
            ..RegionRates::default()
        };
        let f = evaluate_investment(
            &tier(500.0, 1000.0),
            &SITE,
            400_000.0,
            &rates,
            &FinancialPolicy::default(),
        )
        .expect("financials");
        assert!(f.annual_savings < 0.0);
        assert_eq!(f.payback_years, None);
        assert!(f.ten_year_roi.is_some_and(|r| r < -100.0));
        assert_eq!(f.irr, None);
    }

    #[test]
    fn savings_breakdown_and_payback() {
        let f = calculate_financials(
            &tier(500.0, 1000.0),
            &SITE,
            &CostTables::default(),
            &RegionRates::default(),
            &FinancialPolicy::default(),
        )
        .expect("financials");
        // 500 kW × $15 × 12 × 0.6
        assert_relative_eq!(f.savings.demand_charge, 54_000.0, epsilon = 1e-6);
        // 1000 kWh × 250 × 0.88 × $0.08
        assert_relative_eq!(f.savings.arbitrage, 17_600.0, epsilon = 1e-6);
        let payback = f.payback_years.expect("positive savings");
        assert_relative_eq!(payback, f.net_investment / f.annual_savings, epsilon = 1e-9);
    }

    #[test]
    fn demand_savings_cannot_exceed_site_peak() {
        let small = SiteProfile {
            peak_demand_kw: 100.0,
            ..SITE
        };
        let f = evaluate_investment(
            &tier(500.0, 1000.0),
            &small,
            400_000.0,
            &RegionRates::default(),
            &FinancialPolicy::default(),
        )
        .expect("financials");
        assert_relative_eq!(f.savings.demand_charge, 100.0 * 15.0 * 12.0 * 0.6, epsilon = 1e-6);
    }

    #[test]
    fn npv_and_irr_agree() {
        let flows = cash_flows(100_000.0, 15_000.0, 0.0, 20);
        let r = irr(&flows).expect("sign change");
        assert!(npv(r, &flows).abs() < 1e-2);
        assert!(r > 0.13 && r < 0.14, "irr {r}");
        assert!(npv(0.05, &flows) > 0.0);
    }

    #[test]
    fn irr_needs_a_sign_change() {
        assert_eq!(irr(&[100.0, 10.0, 10.0]), None);
        assert_eq!(irr(&[-100.0]), None);
    }
}
