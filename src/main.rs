//! truequote entry point: CLI wiring, logging setup and engine construction.

use std::fs;
use std::path::Path;
use std::process;

use tracing::Level;
use truequote::catalog::Catalog;
use truequote::cli::{self, CliOptions};
use truequote::config::EngineConfig;
use truequote::engine::{QuoteEngine, QuoteRequest, select_tier};
use truequote::io::export::export_snapshot;

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging disabled: {e}");
    }
}

fn load_config(cli: &CliOptions) -> EngineConfig {
    let loaded = match (&cli.config, &cli.preset) {
        (Some(path), _) => EngineConfig::from_toml_file(path),
        (None, Some(name)) => EngineConfig::from_preset(name),
        (None, None) => Ok(EngineConfig::baseline()),
    };
    loaded.unwrap_or_else(|e| fail(e))
}

fn load_request(cli: &CliOptions) -> QuoteRequest {
    if let Some(path) = &cli.request {
        let text = fs::read_to_string(path)
            .unwrap_or_else(|e| fail(format!("cannot read \"{}\": {e}", path.display())));
        return QuoteRequest::from_toml_str(&text)
            .unwrap_or_else(|e| fail(format!("invalid request \"{}\": {e}", path.display())));
    }
    let name = cli.demo.as_deref().unwrap_or("car_wash");
    cli::demo_request(name).unwrap_or_else(|e| fail(e))
}

fn main() {
    let cli = cli::parse_args().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        cli::print_usage();
        process::exit(2);
    });
    init_logging(cli.verbose);

    let config = load_config(&cli);
    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_toml_file(path).unwrap_or_else(|e| fail(e)),
        None => Catalog::builtin(),
    };

    let engine = QuoteEngine::new(catalog, config).unwrap_or_else(|errors| {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    });

    #[cfg(feature = "api")]
    if cli.serve {
        serve(engine, cli.port);
        return;
    }

    let request = load_request(&cli);
    let quote = engine
        .compute_quote(&request)
        .unwrap_or_else(|e| fail(e.user_message()));

    match (cli.tier, cli.json) {
        (Some(tier), true) => match serde_json::to_string_pretty(&select_tier(&quote, tier)) {
            Ok(json) => println!("{json}"),
            Err(e) => fail(e),
        },
        (None, true) => match serde_json::to_string_pretty(quote.as_ref()) {
            Ok(json) => println!("{json}"),
            Err(e) => fail(e),
        },
        (Some(tier), false) => {
            let view = select_tier(&quote, tier);
            println!("--- {tier} ({}) ---", view.quote_id);
            println!("Battery:       {:.1} kW / {:.1} kWh", view.system.bess.power_kw, view.system.bess.energy_kwh);
            println!("Price:         ${:.0}", view.pricing.sell_price);
            println!("Net after ITC: ${:.0}", view.financials.net_investment);
            println!("Savings:       ${:.0}/yr", view.financials.annual_savings);
        }
        (None, false) => println!("{quote}"),
    }

    if let Some(path) = &cli.snapshot_out {
        if let Err(e) = export_snapshot(&[quote.as_ref()], Path::new(path)) {
            fail(format!("failed to write snapshot: {e}"));
        }
        eprintln!("Snapshot written to {}", path.display());
    }
}

#[cfg(feature = "api")]
fn serve(engine: QuoteEngine, port: u16) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    let state = Arc::new(truequote::api::AppState::new(engine));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });
    rt.block_on(truequote::api::serve(state, addr));
}
