//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use rand::Rng;
use rand::rngs::StdRng;
use truequote::catalog::Catalog;
use truequote::config::EngineConfig;
use truequote::engine::inputs::{
    AreaInput, BackupMode, CarportInterest, EvSelection, FacilityInputs, OptionsInput,
};
use truequote::engine::{QuoteEngine, QuoteRequest};

/// Engine over the built-in catalog and baseline configuration.
pub fn default_engine() -> QuoteEngine {
    QuoteEngine::new(Catalog::builtin(), EngineConfig::baseline()).expect("valid engine")
}

/// Car wash (4 bays, CA) with the given roof and optional carport, solar on.
pub fn car_wash(roof: AreaInput, carport: Option<AreaInput>) -> QuoteRequest {
    let mut facility = FacilityInputs::new("car_wash");
    facility.quantities.wash_bays = Some(4.0);
    facility.roof = Some(roof);
    if let Some(area) = carport {
        facility.carport = Some(area);
        facility.carport_interest = CarportInterest::Yes;
    }
    QuoteRequest {
        region: "CA".into(),
        facility,
        options: OptionsInput {
            solar: true,
            ..OptionsInput::default()
        },
    }
}

/// Manufacturing plant of `sqft` square feet running 16 hours a day.
pub fn manufacturing(sqft: f64) -> QuoteRequest {
    let mut facility = FacilityInputs::new("manufacturing");
    facility.quantities.square_feet = Some(sqft);
    facility.operating_hours_per_day = Some(16.0);
    QuoteRequest {
        region: "TX".into(),
        facility,
        options: OptionsInput::default(),
    }
}

const REGIONS: [&str; 4] = ["US", "CA", "TX", "NY"];

/// A valid request for a random built-in industry.
pub fn random_request(rng: &mut StdRng) -> QuoteRequest {
    let industry = match rng.random_range(0..6) {
        0 => "car_wash",
        1 => "manufacturing",
        2 => "hotel",
        3 => "data_center",
        4 => "hospital",
        _ => "office",
    };
    let mut facility = FacilityInputs::new(industry);
    let q = &mut facility.quantities;
    match industry {
        "car_wash" => q.wash_bays = Some(f64::from(rng.random_range(1..12u32))),
        "manufacturing" | "office" => q.square_feet = Some(rng.random_range(5_000.0..400_000.0)),
        "hotel" => q.rooms = Some(f64::from(rng.random_range(20..600u32))),
        "data_center" => q.racks = Some(f64::from(rng.random_range(5..400u32))),
        _ => q.beds = Some(f64::from(rng.random_range(10..500u32))),
    }
    facility.operating_hours_per_day = Some(rng.random_range(6.0..24.0));

    let mut options = OptionsInput::default();
    if rng.random_bool(0.6) {
        facility.roof = Some(AreaInput::sqft(rng.random_range(1_000.0..40_000.0)));
        options.solar = rng.random_bool(0.7);
        if rng.random_bool(0.5) {
            facility.carport = Some(AreaInput::sqm(rng.random_range(50.0..2_000.0)));
            facility.carport_interest = CarportInterest::Unsure;
        }
    }
    let generator_required = matches!(industry, "data_center" | "hospital");
    if !generator_required && rng.random_bool(0.25) {
        facility.backup_mode = BackupMode::Ups;
    } else {
        options.generator = rng.random_bool(0.5);
    }
    if rng.random_bool(0.3) {
        options.ev = EvSelection {
            l2_count: rng.random_range(0..10),
            dcfc_count: rng.random_range(0..4),
            ultra_fast_count: rng.random_range(0..2),
        };
    }

    QuoteRequest {
        region: REGIONS[rng.random_range(0..REGIONS.len())].to_string(),
        facility,
        options,
    }
}
