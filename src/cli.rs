//! Command-line argument parsing and built-in demo requests.

use std::env;
use std::path::PathBuf;

use crate::engine::inputs::{AreaInput, CarportInterest, FacilityInputs, OptionsInput, QuoteRequest};
use crate::engine::TierKey;

/// Built-in request names accepted by `--demo`.
pub const DEMOS: [&str; 4] = ["car_wash", "manufacturing", "hotel", "data_center"];

/// Parsed CLI arguments.
#[derive(Debug, Default)]
pub struct CliOptions {
    /// Request TOML file.
    pub request: Option<PathBuf>,
    /// Built-in request name.
    pub demo: Option<String>,
    /// Engine configuration TOML file.
    pub config: Option<PathBuf>,
    /// Built-in engine configuration name.
    pub preset: Option<String>,
    /// Template catalog TOML file; the built-in catalog when absent.
    pub catalog: Option<PathBuf>,
    /// Print only this tier.
    pub tier: Option<TierKey>,
    pub snapshot_out: Option<PathBuf>,
    /// Emit the quote as JSON instead of the text report.
    pub json: bool,
    pub verbose: bool,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub port: u16,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// A message naming the offending argument.
pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    if args.len() == 1 && (args[0] == "--help" || args[0] == "-h") {
        print_usage();
        std::process::exit(0);
    }
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut opts = CliOptions {
        #[cfg(feature = "api")]
        port: 3000,
        ..CliOptions::default()
    };

    while i < args.len() {
        match args[i].as_str() {
            "--request" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --request (expected a TOML file path)")?;
                if opts.request.replace(PathBuf::from(path)).is_some() {
                    return Err("--request provided more than once".to_string());
                }
            }
            "--demo" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --demo (expected a demo name)")?;
                if opts.demo.replace(name.to_string()).is_some() {
                    return Err("--demo provided more than once".to_string());
                }
            }
            "--config" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                if opts.config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--catalog" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --catalog (expected a TOML file path)")?;
                if opts.catalog.replace(PathBuf::from(path)).is_some() {
                    return Err("--catalog provided more than once".to_string());
                }
            }
            "--tier" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --tier (expected a tier name)")?;
                let tier = name.parse::<TierKey>()?;
                if opts.tier.replace(tier).is_some() {
                    return Err("--tier provided more than once".to_string());
                }
            }
            "--snapshot-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --snapshot-out (expected a file path)")?;
                if opts.snapshot_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--snapshot-out provided more than once".to_string());
                }
            }
            "--json" => opts.json = true,
            "--verbose" | "-v" => opts.verbose = true,
            #[cfg(feature = "api")]
            "--serve" => opts.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let value = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                opts.port = value
                    .parse()
                    .map_err(|_| format!("--port value \"{value}\" is not a valid u16"))?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.request.is_some() && opts.demo.is_some() {
        return Err(
            "arguments `--request` and `--demo` are mutually exclusive; choose one source".to_string(),
        );
    }
    if opts.config.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source".to_string(),
        );
    }
    if opts.request.is_none() && opts.demo.is_none() {
        opts.demo = Some("car_wash".to_string());
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

/// Builds one of the [`DEMOS`] requests.
///
/// # Errors
///
/// Lists the valid names if `name` is unknown.
pub fn demo_request(name: &str) -> Result<QuoteRequest, String> {
    let request = match name {
        "car_wash" => {
            let mut facility = FacilityInputs::new("car_wash");
            facility.quantities.wash_bays = Some(4.0);
            facility.roof = Some(AreaInput::sqft(5000.0));
            facility.carport = Some(AreaInput::sqft(1500.0));
            facility.carport_interest = CarportInterest::Yes;
            QuoteRequest {
                region: "CA".into(),
                facility,
                options: OptionsInput {
                    solar: true,
                    ..OptionsInput::default()
                },
            }
        }
        "manufacturing" => {
            let mut facility = FacilityInputs::new("manufacturing");
            facility.quantities.square_feet = Some(100_000.0);
            facility.features.insert("large_motors".into());
            facility.operating_hours_per_day = Some(16.0);
            QuoteRequest {
                region: "TX".into(),
                facility,
                options: OptionsInput {
                    generator: true,
                    ..OptionsInput::default()
                },
            }
        }
        "hotel" => {
            let mut facility = FacilityInputs::new("hotel");
            facility.quantities.rooms = Some(150.0);
            let mut options = OptionsInput::default();
            options.ev.l2_count = 6;
            QuoteRequest {
                region: "NY".into(),
                facility,
                options,
            }
        }
        "data_center" => {
            let mut facility = FacilityInputs::new("data_center");
            facility.quantities.racks = Some(40.0);
            QuoteRequest {
                region: "US".into(),
                facility,
                options: OptionsInput::default(),
            }
        }
        other => {
            return Err(format!(
                "unknown demo \"{other}\", expected one of: {}",
                DEMOS.join(", ")
            ));
        }
    };
    Ok(request)
}

pub fn print_usage() {
    eprintln!("truequote: tiered energy-system sizing and pricing");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  truequote [--request <path> | --demo <name>] [--config <path> | --preset <name>]");
    eprintln!("            [--catalog <path>] [--tier <name>] [--snapshot-out <path>] [--json] [-v]");
    #[cfg(feature = "api")]
    eprintln!("            [--serve [--port <u16>]]");
    eprintln!();
    eprintln!("Demos:   {}", DEMOS.join(", "));
    eprintln!("Presets: {}", crate::config::EngineConfig::PRESETS.join(", "));
    eprintln!("Tiers:   starter, perfect_fit, beast_mode");
    eprintln!();
    eprintln!("With no --request or --demo, the car_wash demo is quoted.");
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_car_wash_demo() {
        let opts = parse_args_from(Vec::new()).expect("parse should succeed");
        assert_eq!(opts.demo.as_deref(), Some("car_wash"));
        assert!(opts.request.is_none());
        assert!(opts.tier.is_none());
    }

    #[test]
    fn supports_request_and_config_files() {
        let opts = parse_args_from(args(&[
            "--request",
            "req.toml",
            "--config",
            "engine.toml",
            "--tier",
            "beast_mode",
        ]))
        .expect("parse should succeed");
        assert_eq!(opts.request.as_deref(), Some(Path::new("req.toml")));
        assert_eq!(opts.config.as_deref(), Some(Path::new("engine.toml")));
        assert_eq!(opts.tier, Some(TierKey::BeastMode));
        assert!(opts.demo.is_none());
    }

    #[test]
    fn request_and_demo_are_exclusive() {
        let err = parse_args_from(args(&["--request", "a.toml", "--demo", "hotel"]))
            .expect_err("must conflict");
        assert!(err.contains("mutually exclusive"));
    }

    #[test]
    fn rejects_unknown_tier_and_argument() {
        assert!(parse_args_from(args(&["--tier", "gold"])).is_err());
        let err = parse_args_from(args(&["--frobnicate"])).expect_err("unknown");
        assert_eq!(err, "unknown argument: --frobnicate");
    }

    #[test]
    fn missing_value_is_reported() {
        let err = parse_args_from(args(&["--snapshot-out"])).expect_err("missing");
        assert!(err.starts_with("missing value for --snapshot-out"));
    }

    #[test]
    fn every_demo_builds() {
        for name in DEMOS {
            let req = demo_request(name).expect("demo");
            assert_eq!(req.facility.industry, name);
        }
        assert!(demo_request("bakery").is_err());
    }
}
