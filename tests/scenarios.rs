//! Reference scenarios with known answers.

mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use truequote::catalog::Catalog;
use truequote::config::EngineConfig;
use truequote::engine::baseline::compute_baseline;
use truequote::engine::inputs::{AreaInput, BackupMode, EvSelection, SQM_TO_SQFT};
use truequote::engine::margin::{
    BaseCost, MarginBand, MarginBandId, MarginContext, MarginPolicy, apply_margin,
};
use truequote::engine::solar::SystemSizeCategory;
use truequote::engine::{TierKey, select_tier};
use truequote::error::{EngineError, Stage};

#[test]
fn car_wash_roof_only() {
    let engine = common::default_engine();
    let quote = engine
        .compute_quote(&common::car_wash(AreaInput::sqft(5000.0), None))
        .expect("quote");
    let solar = quote.solar.as_ref().expect("solar");

    assert_relative_eq!(solar.roof_solar_kw, 487.5, epsilon = 1e-9);
    assert_relative_eq!(solar.carport_solar_kw, 0.0);
    assert_eq!(solar.system_size_category, SystemSizeCategory::ExtraLarge);
    assert_eq!(solar.system_size_category.to_string(), "Extra Large");
}

#[test]
fn car_wash_roof_and_carport() {
    let engine = common::default_engine();
    let quote = engine
        .compute_quote(&common::car_wash(
            AreaInput::sqft(5000.0),
            Some(AreaInput::sqft(1500.0)),
        ))
        .expect("quote");
    let solar = quote.solar.as_ref().expect("solar");

    assert_relative_eq!(solar.total_solar_kw, 712.5, epsilon = 1e-9);
    assert_relative_eq!(solar.annual_generation_kwh, 855_000.0, epsilon = 1e-6);
}

#[test]
fn ups_mode_upsizes_battery_energy() {
    let engine = common::default_engine();
    let mut standard = common::car_wash(AreaInput::sqft(5000.0), None);
    standard.options.generator = true;
    let mut ups = standard.clone();
    ups.facility.backup_mode = BackupMode::Ups;

    let standard = engine.compute_quote(&standard).expect("standard");
    let ups = engine.compute_quote(&ups).expect("ups");

    for key in TierKey::ALL {
        let s = &standard.tier(key).system;
        let u = &ups.tier(key).system;
        assert!(!s.ups_mode && u.ups_mode);
        assert!(s.solar.included && s.generator.included);
        assert!(!u.solar.included && !u.generator.included);

        let standard_factor = s.bess.energy_kwh / (s.bess.power_kw * s.bess.duration_hours);
        assert_relative_eq!(standard_factor, 1.0, epsilon = 1e-9);

        let ratio = u.bess.energy_kwh / s.bess.energy_kwh;
        assert!(ratio > 1.5 - 1e-9 && ratio < 2.0 + 1e-9, "{key}: UPS ratio {ratio}");
        assert_relative_eq!(u.bess.power_kw, s.bess.power_kw);
    }

    for quote in [&standard, &ups] {
        let t = &quote.tiers;
        assert!(t.starter.system.bess.energy_kwh <= t.perfect_fit.system.bess.energy_kwh);
        assert!(t.perfect_fit.system.bess.energy_kwh <= t.beast_mode.system.bess.energy_kwh);
    }
}

#[test]
fn manufacturing_density_peak() {
    let catalog = Catalog::builtin();
    let template = catalog.lookup("manufacturing", None).expect("template");
    let request = common::manufacturing(100_000.0);
    let baseline = compute_baseline(
        &template,
        &request.facility,
        &EngineConfig::baseline().calculator,
    )
    .expect("baseline");

    assert_relative_eq!(baseline.peak_demand_kw, 1500.0, epsilon = 1e-9);
    assert!(baseline.applied_modifiers.is_empty());

    let quote = common::default_engine()
        .compute_quote(&request)
        .expect("quote");
    assert_relative_eq!(quote.tiers.perfect_fit.system.bess.power_kw, 1500.0, epsilon = 1e-9);
}

#[test]
fn margin_cap_beats_band() {
    let policy = MarginPolicy {
        max_margin_pct: 0.15,
        ..MarginPolicy::default()
    };
    let band = MarginBand::new(MarginBandId::High, 0.20, 0.0);
    let base = BaseCost::new(100_000.0).expect("cost");

    let result = apply_margin(base, &band, &MarginContext::new(&policy)).expect("margin");

    assert_relative_eq!(result.sell_price.value(), 115_000.0, epsilon = 1e-6);
    assert!(result.capped);
}

#[test]
fn double_margin_is_detectable() {
    let policy = MarginPolicy::default();
    let ctx = MarginContext::new(&policy);
    let band = policy.band(MarginBandId::Medium);

    let once = apply_margin(BaseCost::new(200_000.0).expect("cost"), &band, &ctx)
        .expect("once");
    let twice = apply_margin(
        BaseCost::new(once.sell_price.value()).expect("cost"),
        &band,
        &ctx,
    )
    .expect("twice");

    assert!(twice.sell_price.value() > once.sell_price.value());
}

#[test]
fn sqm_and_sqft_roofs_agree() {
    let engine = common::default_engine();
    let sqft = engine
        .compute_quote(&common::car_wash(AreaInput::sqft(5000.0), None))
        .expect("sqft");
    let sqm = engine
        .compute_quote(&common::car_wash(AreaInput::sqm(5000.0 / SQM_TO_SQFT), None))
        .expect("sqm");

    let a = sqft.solar.as_ref().expect("solar").total_solar_kw;
    let b = sqm.solar.as_ref().expect("solar").total_solar_kw;
    assert!((a - b).abs() <= 1.0, "sqft {a} vs sqm {b}");
    assert_ne!(sqft.fingerprint, sqm.fingerprint);
}

#[test]
fn switching_tiers_reads_the_stored_quote() {
    let engine = common::default_engine();
    let request = common::car_wash(AreaInput::sqft(5000.0), Some(AreaInput::sqft(1500.0)));
    let quote = engine.compute_quote(&request).expect("quote");

    let views: Vec<_> = TierKey::ALL.iter().map(|&k| select_tier(&quote, k)).collect();
    for view in &views {
        assert_eq!(view.identity.template_id, "car_wash.express");
        assert_eq!(view.identity.template_version, quote.identity.template_version);
        assert_eq!(view.fingerprint, quote.fingerprint);
    }
    assert!(views[0].system.bess.power_kw < views[2].system.bess.power_kw);

    let again = engine.compute_quote(&request).expect("cached");
    assert!(Arc::ptr_eq(&quote, &again));
    assert_eq!(engine.cached_quotes(), 1);
}

#[test]
fn bounded_preset_caps_margin_and_unit_price() {
    let engine = truequote::QuoteEngine::new(Catalog::builtin(), EngineConfig::bounded())
        .expect("engine");
    let quote = engine
        .compute_quote(&common::manufacturing(100_000.0))
        .expect("quote");
    for key in TierKey::ALL {
        let t = quote.tier(key);
        assert!(t.pricing.blended_margin_pct <= 0.18 + 1e-12);
        assert!(t.pricing.sell_price <= 900.0 * t.system.bess.energy_kwh + 1e-6);
        assert!(t.pricing.sell_price >= t.pricing.base_cost);
    }
}

#[test]
fn oversized_charger_counts_are_rejected_not_overflowed() {
    let engine = common::default_engine();
    let mut request = common::manufacturing(100_000.0);
    request.options.ev = EvSelection {
        l2_count: u32::MAX,
        dcfc_count: 1,
        ultra_fast_count: 0,
    };

    let err = engine.compute_quote(&request).expect_err("too many chargers");
    assert_eq!(err.stage, Stage::Sizing);
    match &err.source {
        EngineError::InvalidInput { field, message } => {
            assert_eq!(field, "options.ev.l2_count");
            assert!(message.contains("too many chargers"));
        }
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn absurd_facility_size_is_invalid_input() {
    let engine = common::default_engine();
    let err = engine
        .compute_quote(&common::manufacturing(1e306))
        .expect_err("absurd area");
    assert_eq!(err.stage, Stage::Baseline);
    assert!(err.source.is_user_facing(), "{err}");
}
