//! CSV export of quote snapshots.
//!
//! One row per tier, keyed by template identity and input fingerprint so any
//! drift between two snapshots can be traced to a template, input or code
//! change. The calculation timestamp is deliberately not a column.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::engine::Quote;

/// Snapshot v1 column header.
const HEADER: &str = "template_id,template_version,industry,use_case,calculator_version,\
                      fingerprint,quote_id,region,tier,bess_power_kw,bess_energy_kwh,\
                      duration_hours,solar_kw,generator_kw,ev_chargers,base_cost,sell_price,\
                      margin_band,capped,total_investment,federal_itc,state_incentives,\
                      net_investment,annual_savings,payback_years,ten_year_roi,npv,irr";

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(String::new, |v| format!("{v:.precision$}"))
}

/// Exports quote snapshots to a CSV file at the given path.
///
/// # Arguments
///
/// * `quotes` - Quotes to snapshot, three rows each
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_snapshot(quotes: &[&Quote], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_snapshot_csv(quotes, buf)
}

/// Writes quote snapshots as CSV to any writer.
///
/// Output is deterministic for identical quotes.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_snapshot_csv(quotes: &[&Quote], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for quote in quotes {
        let id = &quote.identity;
        for (key, t) in quote.tiers.iter() {
            let s = &t.system;
            let f = &t.financials;
            wtr.write_record(&[
                id.template_id.clone(),
                id.template_version.clone(),
                id.industry.clone(),
                id.use_case.clone(),
                id.calculator_version.clone(),
                quote.fingerprint.clone(),
                quote.quote_id.clone(),
                quote.region.clone(),
                key.as_str().to_string(),
                format!("{:.3}", s.bess.power_kw),
                format!("{:.3}", s.bess.energy_kwh),
                format!("{:.2}", s.bess.duration_hours),
                format!("{:.3}", s.solar.capacity_kw),
                format!("{:.3}", s.generator.capacity_kw),
                s.ev.count().to_string(),
                format!("{:.2}", t.pricing.base_cost),
                format!("{:.2}", t.pricing.sell_price),
                t.pricing.margin_band.to_string(),
                t.pricing.capped.to_string(),
                format!("{:.2}", f.total_investment),
                format!("{:.2}", f.federal_itc),
                format!("{:.2}", f.state_incentives),
                format!("{:.2}", f.net_investment),
                format!("{:.2}", f.annual_savings),
                opt(f.payback_years, 3),
                opt(f.ten_year_roi, 3),
                format!("{:.2}", f.npv),
                opt(f.irr, 5),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
