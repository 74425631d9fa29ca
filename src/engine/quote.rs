//! Quote orchestration: template → baseline → solar → tiers → margin → financials.
//!
//! [`run_pipeline`] is pure: everything it reads arrives through a
//! request-scoped [`QuoteContext`], and it returns either a complete [`Quote`]
//! or a [`QuoteError`] naming the failing stage. [`QuoteEngine`] adds catalog
//! lookup, fingerprint caching and logging around it.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::audit::ensure_ascending;
use super::baseline::{BaselineResult, compute_baseline};
use super::financial::{
    LineItem, SiteProfile, TierFinancials, check_identity, evaluate_investment, line_items,
};
use super::fingerprint::stable_json_hash_hex;
use super::inputs::{FacilityInputs, OptionsInput, QuoteRequest};
use super::margin::{BlendedMargin, MarginBandId, MarginContext, apply_blended_margin};
use super::sizer::{SizingOptions, SystemTier, size_tiers};
use super::solar::{SolarInput, SolarIssue, SolarResult, compute_solar, validate_solar_inputs};
use super::tier::{TierKey, TierValues};
use crate::catalog::{Catalog, IndustryTemplate};
use crate::config::{ConfigError, EngineConfig, RegionConfig};
use crate::error::{AtStage, EngineError, EngineResult, QuoteError, Stage};

/// Version stamped on every quote and folded into its fingerprint.
pub const CALCULATOR_VERSION: &str = concat!("truequote/", env!("CARGO_PKG_VERSION"));

/// Quotes kept by a [`QuoteEngine`] before the oldest is evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Everything one pipeline run reads. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct QuoteContext<'a> {
    pub template: &'a IndustryTemplate,
    pub region_code: &'a str,
    pub region: &'a RegionConfig,
    pub config: &'a EngineConfig,
    pub request: &'a QuoteRequest,
}

/// Reproducibility key for snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateIdentity {
    pub template_id: String,
    pub template_version: String,
    pub industry: String,
    pub use_case: String,
    pub calculator_version: String,
}

impl TemplateIdentity {
    pub fn of(template: &IndustryTemplate) -> Self {
        Self {
            template_id: template.template_id.clone(),
            template_version: template.template_version.clone(),
            industry: template.industry.clone(),
            use_case: template.use_case.clone(),
            calculator_version: CALCULATOR_VERSION.to_string(),
        }
    }
}

/// One tier with its pricing and returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierQuote {
    pub system: SystemTier,
    pub line_items: Vec<LineItem>,
    pub pricing: BlendedMargin,
    pub financials: TierFinancials,
}

/// An immutable three-tier quote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub quote_id: String,
    pub fingerprint: String,
    pub identity: TemplateIdentity,
    pub region: String,
    pub request: QuoteRequest,
    pub baseline: BaselineResult,
    pub solar: Option<SolarResult>,
    pub warnings: Vec<SolarIssue>,
    pub margin_band: MarginBandId,
    pub tiers: TierValues<TierQuote>,
    pub calculated_at: DateTime<Utc>,
}

impl Quote {
    pub fn tier(&self, key: TierKey) -> &TierQuote {
        self.tiers.get(key)
    }
}

/// Read-only view of one tier of an existing quote.
#[derive(Debug, Clone, Serialize)]
pub struct TierView<'a> {
    pub quote_id: &'a str,
    pub fingerprint: &'a str,
    pub identity: &'a TemplateIdentity,
    pub tier: TierKey,
    pub system: &'a SystemTier,
    pub pricing: &'a BlendedMargin,
    pub financials: &'a TierFinancials,
}

/// Selects a tier without recomputing anything.
pub fn select_tier(quote: &Quote, tier: TierKey) -> TierView<'_> {
    let t = quote.tier(tier);
    TierView {
        quote_id: &quote.quote_id,
        fingerprint: &quote.fingerprint,
        identity: &quote.identity,
        tier,
        system: &t.system,
        pricing: &t.pricing,
        financials: &t.financials,
    }
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    industry: &'a str,
    subtype: Option<&'a str>,
    facility: &'a FacilityInputs,
    options: &'a OptionsInput,
    region: &'a str,
    template_id: &'a str,
    template_version: &'a str,
    calculator_version: &'a str,
}

/// SHA-256 over the canonical JSON of the request and template identity.
///
/// # Errors
///
/// `InvariantViolation` if the request cannot be serialized.
pub fn fingerprint(template: &IndustryTemplate, request: &QuoteRequest) -> EngineResult<String> {
    let input = FingerprintInput {
        industry: &request.facility.industry,
        subtype: request.facility.subtype.as_deref(),
        facility: &request.facility,
        options: &request.options,
        region: &request.region,
        template_id: &template.template_id,
        template_version: &template.template_version,
        calculator_version: CALCULATOR_VERSION,
    };
    stable_json_hash_hex(&input).map_err(|e| EngineError::invariant("fingerprint", e.to_string()))
}

fn quote_id(fingerprint: &str) -> String {
    format!("q-{}", fingerprint.chars().take(16).collect::<String>())
}

/// Runs every stage and assembles a quote.
///
/// Aborts on the first failure; partial quotes are never returned.
///
/// # Errors
///
/// A [`QuoteError`] tagged with the failing [`Stage`].
pub fn run_pipeline(ctx: &QuoteContext<'_>, calculated_at: DateTime<Utc>) -> Result<Quote, QuoteError> {
    let QuoteContext {
        template,
        region_code,
        region,
        config,
        request,
    } = *ctx;
    let facility = &request.facility;

    let baseline = compute_baseline(template, facility, &config.calculator).at(Stage::Baseline)?;
    let sizing = SizingOptions::resolve(template, facility, &request.options).at(Stage::Sizing)?;

    let warnings = if sizing.solar || facility.roof.is_some() {
        validate_solar_inputs(facility.roof, facility.carport_interest, facility.carport)
    } else {
        Vec::new()
    };
    for issue in &warnings {
        warn!(field = %issue.field, severity = ?issue.severity, "{}", issue.message);
    }
    let blocking = warnings.iter().find(|i| i.is_error());
    if let (true, Some(issue)) = (sizing.solar, blocking) {
        return Err(QuoteError::new(
            Stage::Solar,
            EngineError::invalid(issue.field.clone(), issue.message.clone()),
        ));
    }
    let solar = match SolarInput::from_facility(facility) {
        Some(input) if blocking.is_none() => Some(
            compute_solar(template, &input, config.calculator.solar_full_load_hours)
                .at(Stage::Solar)?,
        ),
        _ => None,
    };

    let systems = size_tiers(template, &baseline, solar.as_ref(), &sizing).at(Stage::Sizing)?;

    let items = TierValues::try_from_fn(|k| line_items(systems.get(k), &region.costs))
        .at(Stage::Financial)?;
    let base_totals = items.map(|lines| lines.iter().map(|i| i.base_cost).sum::<f64>());
    let band = request
        .options
        .margin_band
        .unwrap_or_else(|| config.margin.select_band(base_totals.perfect_fit));

    let pricing = TierValues::try_from_fn(|k| {
        let ctx = MarginContext::with_units(&config.margin, systems.get(k).bess.energy_kwh);
        apply_blended_margin(items.get(k), band, &ctx)
    })
    .at(Stage::Margin)?;

    let site = SiteProfile {
        peak_demand_kw: baseline.peak_demand_kw,
        annual_consumption_kwh: baseline.annual_consumption_kwh,
    };
    let financials = TierValues::try_from_fn(|k| {
        let f = evaluate_investment(
            systems.get(k),
            &site,
            pricing.get(k).sell_price,
            &region.rates,
            &config.financial,
        )?;
        check_identity(&f)?;
        Ok::<_, EngineError>(f)
    })
    .at(Stage::Financial)?;

    check_tier_ordering(&base_totals, &pricing, &financials).at(Stage::Assembly)?;

    let fingerprint = fingerprint(template, request).at(Stage::Assembly)?;
    let tiers = TierValues::from_fn(|k| TierQuote {
        system: systems.get(k).clone(),
        line_items: items.get(k).clone(),
        pricing: pricing.get(k).clone(),
        financials: financials.get(k).clone(),
    });

    debug!(
        band = %band,
        perfect_fit_sell = tiers.perfect_fit.pricing.sell_price,
        "tiers priced"
    );

    Ok(Quote {
        quote_id: quote_id(&fingerprint),
        fingerprint,
        identity: TemplateIdentity::of(template),
        region: region_code.to_string(),
        request: request.clone(),
        baseline,
        solar,
        warnings,
        margin_band: band,
        tiers,
        calculated_at,
    })
}

/// Every currency output must rise (or hold) from starter to beast mode.
fn check_tier_ordering(
    base_totals: &TierValues<f64>,
    pricing: &TierValues<BlendedMargin>,
    financials: &TierValues<TierFinancials>,
) -> EngineResult<()> {
    ensure_ascending("base_cost", base_totals.as_array())?;
    ensure_ascending("sell_price", pricing.map(|p| p.sell_price).as_array())?;
    ensure_ascending(
        "total_investment",
        financials.map(|f| f.total_investment).as_array(),
    )?;
    ensure_ascending(
        "net_investment",
        financials.map(|f| f.net_investment).as_array(),
    )
}

struct CacheInner {
    quotes: HashMap<String, Arc<Quote>>,
    /// `quote_id` → fingerprint.
    ids: HashMap<String, String>,
    order: VecDeque<String>,
}

/// Fingerprint-keyed store of computed quotes, oldest evicted first.
pub struct QuoteCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl QuoteCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                quotes: HashMap::new(),
                ids: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, fingerprint: &str) -> Option<Arc<Quote>> {
        self.inner.lock().quotes.get(fingerprint).cloned()
    }

    pub fn get_by_id(&self, quote_id: &str) -> Option<Arc<Quote>> {
        let inner = self.inner.lock();
        let fingerprint = inner.ids.get(quote_id)?;
        inner.quotes.get(fingerprint).cloned()
    }

    /// Stores a quote; if one with the same fingerprint exists, keeps and
    /// returns the existing one.
    pub fn insert(&self, quote: Quote) -> Arc<Quote> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.quotes.get(&quote.fingerprint) {
            return Arc::clone(existing);
        }
        while inner.order.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    if let Some(evicted) = inner.quotes.remove(&oldest) {
                        inner.ids.remove(&evicted.quote_id);
                    }
                }
                None => break,
            }
        }
        let quote = Arc::new(quote);
        inner.order.push_back(quote.fingerprint.clone());
        inner
            .ids
            .insert(quote.quote_id.clone(), quote.fingerprint.clone());
        inner
            .quotes
            .insert(quote.fingerprint.clone(), Arc::clone(&quote));
        quote
    }

    pub fn len(&self) -> usize {
        self.inner.lock().quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Catalog, configuration and quote cache behind `compute_quote`.
pub struct QuoteEngine {
    catalog: Catalog,
    config: EngineConfig,
    cache: QuoteCache,
}

impl QuoteEngine {
    /// Validates the catalog and configuration and builds an engine.
    ///
    /// # Errors
    ///
    /// Every validation error found in either input.
    pub fn new(catalog: Catalog, config: EngineConfig) -> Result<Self, Vec<ConfigError>> {
        let mut errors = catalog.validate();
        errors.extend(config.validate());
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            catalog,
            config,
            cache: QuoteCache::new(DEFAULT_CACHE_CAPACITY),
        })
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = QuoteCache::new(capacity);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Looks up the template and region, then computes (or recalls) a quote.
    ///
    /// # Errors
    ///
    /// A [`QuoteError`] naming the failing stage.
    pub fn compute_quote(&self, request: &QuoteRequest) -> Result<Arc<Quote>, QuoteError> {
        let template = self
            .catalog
            .lookup(&request.facility.industry, request.facility.subtype.as_deref())
            .at(Stage::Template)
            .inspect_err(|e| log_failure(e, request))?;
        let region = self
            .config
            .region(&request.region)
            .ok_or_else(|| {
                QuoteError::new(
                    Stage::Region,
                    EngineError::invalid(
                        "region",
                        format!("unknown region \"{}\"", request.region),
                    ),
                )
            })
            .inspect_err(|e| log_failure(e, request))?;
        self.compute_quote_with(&template, region, request)
    }

    /// Computes a quote from an already-loaded template and region.
    ///
    /// # Errors
    ///
    /// A [`QuoteError`] naming the failing stage.
    pub fn compute_quote_with(
        &self,
        template: &IndustryTemplate,
        region: &RegionConfig,
        request: &QuoteRequest,
    ) -> Result<Arc<Quote>, QuoteError> {
        let fp = fingerprint(template, request).at(Stage::Assembly)?;
        if let Some(cached) = self.cache.get(&fp) {
            debug!(quote_id = %cached.quote_id, "quote cache hit");
            return Ok(cached);
        }

        let ctx = QuoteContext {
            template,
            region_code: &request.region,
            region,
            config: &self.config,
            request,
        };
        let quote = run_pipeline(&ctx, Utc::now()).inspect_err(|e| log_failure(e, request))?;
        info!(
            industry = %quote.identity.industry,
            template_id = %quote.identity.template_id,
            template_version = %quote.identity.template_version,
            quote_id = %quote.quote_id,
            band = %quote.margin_band,
            "quote assembled"
        );
        Ok(self.cache.insert(quote))
    }

    /// A previously computed quote.
    pub fn quote(&self, quote_id: &str) -> Option<Arc<Quote>> {
        self.cache.get_by_id(quote_id)
    }

    pub fn cached_quotes(&self) -> usize {
        self.cache.len()
    }
}

fn log_failure(e: &QuoteError, request: &QuoteRequest) {
    if e.source.is_user_facing() {
        debug!(stage = %e.stage, error = %e.source, "quote rejected");
    } else {
        let context = serde_json::to_string(request).unwrap_or_default();
        error!(stage = %e.stage, error = %e.source, request = %context, "quote aborted");
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = &self.identity;
        writeln!(f, "--- Quote {} ---", self.quote_id)?;
        writeln!(
            f,
            "Template:        {} v{} ({}, {})",
            id.template_id, id.template_version, id.industry, id.use_case
        )?;
        writeln!(f, "Region:          {}", self.region)?;
        writeln!(f, "Peak demand:     {:.1} kW", self.baseline.peak_demand_kw)?;
        writeln!(
            f,
            "Annual usage:    {:.0} kWh",
            self.baseline.annual_consumption_kwh
        )?;
        if let Some(s) = &self.solar {
            writeln!(
                f,
                "Solar potential: {:.1} kW ({}), {:.0} kWh/yr",
                s.total_solar_kw, s.system_size_category, s.annual_generation_kwh
            )?;
        }
        writeln!(f, "Margin band:     {}", self.margin_band)?;
        for (key, t) in self.tiers.iter() {
            let fin = &t.financials;
            writeln!(f)?;
            writeln!(f, "[{key}]")?;
            writeln!(
                f,
                "  Battery:       {:.1} kW / {:.1} kWh ({:.1} h)",
                t.system.bess.power_kw, t.system.bess.energy_kwh, t.system.bess.duration_hours
            )?;
            if t.system.solar.included {
                writeln!(f, "  Solar:         {:.1} kW", t.system.solar.capacity_kw)?;
            }
            if t.system.generator.included {
                writeln!(f, "  Generator:     {:.1} kW", t.system.generator.capacity_kw)?;
            }
            if t.system.ev.included {
                writeln!(
                    f,
                    "  EV chargers:   {} L2 / {} DCFC / {} ultra-fast",
                    t.system.ev.l2_count, t.system.ev.dcfc_count, t.system.ev.ultra_fast_count
                )?;
            }
            writeln!(
                f,
                "  Price:         ${:.0} (cost ${:.0}, margin {:.1}%{})",
                t.pricing.sell_price,
                t.pricing.base_cost,
                t.pricing.blended_margin_pct * 100.0,
                if t.pricing.capped { ", capped" } else { "" }
            )?;
            writeln!(
                f,
                "  Net after ITC: ${:.0} (ITC ${:.0}, state ${:.0})",
                fin.net_investment, fin.federal_itc, fin.state_incentives
            )?;
            writeln!(f, "  Savings:       ${:.0}/yr", fin.annual_savings)?;
            match fin.payback_years {
                Some(y) => writeln!(f, "  Payback:       {y:.1} years")?,
                None => writeln!(f, "  Payback:       never")?,
            }
            if let Some(roi) = fin.ten_year_roi {
                writeln!(f, "  10-year ROI:   {roi:.1}%")?;
            }
            write!(f, "  NPV:           ${:.0}", fin.npv)?;
            if let Some(irr) = fin.irr {
                write!(f, ", IRR {:.1}%", irr * 100.0)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
