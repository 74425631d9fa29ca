//! Built-in industry templates shipped with the engine.

use crate::engine::inputs::{GridConnection, SizingField};
use crate::engine::tier::TierValues;

use super::template::{
    AnnualEnergy, BessDuration, IndustryTemplate, LoadModifier, ModifierPredicate, PowerBasis,
};

const STANDARD_TIERS: TierValues<f64> = TierValues {
    starter: 0.7,
    perfect_fit: 1.0,
    beast_mode: 1.25,
};

fn feature(name: &str, feature: &str, multiplier: f64) -> LoadModifier {
    LoadModifier {
        name: name.to_string(),
        when: ModifierPredicate::Feature {
            feature: feature.to_string(),
        },
        multiplier,
    }
}

/// Returns every built-in template.
pub fn templates() -> Vec<IndustryTemplate> {
    vec![
        car_wash(),
        manufacturing(),
        hotel(),
        hotel_limited_service(),
        data_center(),
        hospital(),
        office(),
    ]
}

fn car_wash() -> IndustryTemplate {
    IndustryTemplate {
        template_id: "car_wash.express".into(),
        template_version: "2025.3".into(),
        industry: "car_wash".into(),
        subtype: None,
        use_case: "express_tunnel".into(),
        power_basis: PowerBasis::PerUnit {
            field: SizingField::WashBays,
            watts_per_unit: 60_000.0,
        },
        load_factor: 0.35,
        annual_energy: AnnualEnergy::LoadFactor,
        load_modifiers: vec![
            feature("large motors", "large_motors", 1.2),
            feature("water reclaim", "water_reclaim", 1.05),
        ],
        roof_usable_factor: 0.65,
        carport_usable_factor: 1.0,
        solar_density_kw_per_sqft: 0.15,
        tier_multipliers: STANDARD_TIERS,
        bess_duration_hours: BessDuration::Global(2.0),
        ups_energy_multiplier: 1.5,
        generator_required: false,
        generator_sizing_factor: 1.25,
    }
}

fn manufacturing() -> IndustryTemplate {
    IndustryTemplate {
        template_id: "manufacturing.general".into(),
        template_version: "2025.2".into(),
        industry: "manufacturing".into(),
        subtype: None,
        use_case: "light_industrial".into(),
        power_basis: PowerBasis::Density {
            watts_per_sqft: 15.0,
        },
        load_factor: 0.55,
        annual_energy: AnnualEnergy::OperatingHours,
        load_modifiers: vec![
            feature("large motors", "large_motors", 1.2),
            LoadModifier {
                name: "continuous operation".into(),
                when: ModifierPredicate::OperatingHoursAtLeast { hours: 20.0 },
                multiplier: 1.1,
            },
            LoadModifier {
                name: "constrained feed".into(),
                when: ModifierPredicate::Grid {
                    connection: GridConnection::Limited,
                },
                multiplier: 0.95,
            },
        ],
        roof_usable_factor: 0.7,
        carport_usable_factor: 0.9,
        solar_density_kw_per_sqft: 0.012,
        tier_multipliers: STANDARD_TIERS,
        bess_duration_hours: BessDuration::PerTier(TierValues {
            starter: 2.0,
            perfect_fit: 4.0,
            beast_mode: 4.0,
        }),
        ups_energy_multiplier: 1.75,
        generator_required: false,
        generator_sizing_factor: 1.25,
    }
}

fn hotel() -> IndustryTemplate {
    IndustryTemplate {
        template_id: "hotel.full_service".into(),
        template_version: "2025.1".into(),
        industry: "hotel".into(),
        subtype: None,
        use_case: "full_service_hotel".into(),
        power_basis: PowerBasis::PerUnit {
            field: SizingField::Rooms,
            watts_per_unit: 3_500.0,
        },
        load_factor: 0.45,
        annual_energy: AnnualEnergy::LoadFactor,
        load_modifiers: vec![
            feature("pool", "pool", 1.08),
            feature("restaurant", "restaurant", 1.1),
        ],
        roof_usable_factor: 0.5,
        carport_usable_factor: 0.9,
        solar_density_kw_per_sqft: 0.015,
        tier_multipliers: STANDARD_TIERS,
        bess_duration_hours: BessDuration::Global(4.0),
        ups_energy_multiplier: 2.0,
        generator_required: false,
        generator_sizing_factor: 1.25,
    }
}

fn hotel_limited_service() -> IndustryTemplate {
    IndustryTemplate {
        template_id: "hotel.limited_service".into(),
        subtype: Some("limited_service".into()),
        use_case: "limited_service_hotel".into(),
        power_basis: PowerBasis::PerUnit {
            field: SizingField::Rooms,
            watts_per_unit: 2_500.0,
        },
        load_modifiers: vec![feature("pool", "pool", 1.08)],
        ..hotel()
    }
}

fn data_center() -> IndustryTemplate {
    IndustryTemplate {
        template_id: "data_center.enterprise".into(),
        template_version: "2025.2".into(),
        industry: "data_center".into(),
        subtype: None,
        use_case: "enterprise_colo".into(),
        power_basis: PowerBasis::PerUnit {
            field: SizingField::Racks,
            watts_per_unit: 8_000.0,
        },
        load_factor: 0.85,
        annual_energy: AnnualEnergy::LoadFactor,
        load_modifiers: vec![
            feature("liquid cooling", "liquid_cooling", 0.9),
            LoadModifier {
                name: "high rack count".into(),
                when: ModifierPredicate::QuantityAtLeast {
                    field: SizingField::Racks,
                    threshold: 200.0,
                },
                multiplier: 1.1,
            },
        ],
        roof_usable_factor: 0.6,
        carport_usable_factor: 0.9,
        solar_density_kw_per_sqft: 0.015,
        tier_multipliers: TierValues {
            starter: 0.75,
            perfect_fit: 1.0,
            beast_mode: 1.3,
        },
        bess_duration_hours: BessDuration::PerTier(TierValues {
            starter: 1.0,
            perfect_fit: 2.0,
            beast_mode: 4.0,
        }),
        ups_energy_multiplier: 2.0,
        generator_required: true,
        generator_sizing_factor: 1.5,
    }
}

fn hospital() -> IndustryTemplate {
    IndustryTemplate {
        template_id: "hospital.acute".into(),
        template_version: "2025.1".into(),
        industry: "hospital".into(),
        subtype: None,
        use_case: "acute_care".into(),
        power_basis: PowerBasis::PerUnit {
            field: SizingField::Beds,
            watts_per_unit: 10_000.0,
        },
        load_factor: 0.7,
        annual_energy: AnnualEnergy::LoadFactor,
        load_modifiers: vec![feature("imaging suite", "imaging", 1.15)],
        roof_usable_factor: 0.55,
        carport_usable_factor: 0.9,
        solar_density_kw_per_sqft: 0.015,
        tier_multipliers: STANDARD_TIERS,
        bess_duration_hours: BessDuration::Global(4.0),
        ups_energy_multiplier: 1.5,
        generator_required: true,
        generator_sizing_factor: 1.25,
    }
}

fn office() -> IndustryTemplate {
    IndustryTemplate {
        template_id: "office.general".into(),
        template_version: "2025.1".into(),
        industry: "office".into(),
        subtype: None,
        use_case: "commercial_office".into(),
        power_basis: PowerBasis::Density {
            watts_per_sqft: 6.0,
        },
        load_factor: 0.3,
        annual_energy: AnnualEnergy::OperatingHours,
        load_modifiers: Vec::new(),
        roof_usable_factor: 0.7,
        carport_usable_factor: 1.0,
        solar_density_kw_per_sqft: 0.015,
        tier_multipliers: STANDARD_TIERS,
        bess_duration_hours: BessDuration::Global(2.0),
        ups_energy_multiplier: 1.5,
        generator_required: false,
        generator_sizing_factor: 1.25,
    }
}
