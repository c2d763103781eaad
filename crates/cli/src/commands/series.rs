//! Per-round history for one server

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    format_bandwidth, format_flag, format_ms, format_percent, format_ratio, print_heading,
    print_info, print_json, print_table, OutputFormat,
};

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Round")]
    round: u64,
    #[tabled(rename = "RTT")]
    rtt: String,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Health")]
    health: String,
    #[tabled(rename = "Errors")]
    error_rate: String,
    #[tabled(rename = "Bandwidth")]
    bandwidth: String,
    #[tabled(rename = "Chosen")]
    chosen: String,
}

/// Show the recorded series for a server, optionally only the last `last` points
pub async fn show_series(
    client: &ApiClient,
    server: &str,
    last: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let mut series = client.series(server).await?;
    if let Some(n) = last {
        let skip = series.points.len().saturating_sub(n);
        series.points.drain(..skip);
    }

    match format {
        OutputFormat::Json => print_json(&series)?,
        OutputFormat::Table => {
            print_heading(&format!("Series for {}", series.server));

            if series.points.is_empty() {
                print_info("No rounds recorded yet");
                return Ok(());
            }

            let rows: Vec<PointRow> = series
                .points
                .iter()
                .map(|p| PointRow {
                    round: p.round,
                    rtt: format_ms(p.rtt),
                    load: format_percent(p.load),
                    health: format_percent(p.health),
                    error_rate: format_ratio(p.error_rate),
                    bandwidth: format_bandwidth(p.bandwidth),
                    chosen: format_flag(p.chosen),
                })
                .collect();

            let total = rows.len();
            print_table(rows);
            println!("\nTotal: {} rounds", total);
        }
    }

    Ok(())
}
