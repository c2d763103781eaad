//! Per-server summary of the current session

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_bandwidth, format_ms, format_percent, format_ratio, format_score,
    print_heading, print_json, print_table, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Status")]
    status: String,
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
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Picked")]
    selections: u64,
}

/// Show forecasts, scores and selection counts for every server
pub async fn show_servers(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response = client.servers().await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            print_heading("Servers");
            println!(
                "Session started: {}",
                response.session.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().cyan()
            );
            println!("Rounds:          {}", response.session.rounds);
            println!();

            if response.servers.is_empty() {
                print_warning("No servers configured");
                return Ok(());
            }

            let rows: Vec<ServerRow> = response
                .servers
                .iter()
                .map(|s| {
                    let status = if s.reachable { "up" } else { "down" };
                    let mut rtt = format_ms(s.forecast.rtt);
                    if s.forecast.anomaly {
                        rtt = format!("{} {}", rtt, "!".red().bold());
                    }
                    ServerRow {
                        server: s.server.clone(),
                        status: color_status(status),
                        rtt,
                        load: format_percent(s.forecast.load),
                        health: format_percent(s.forecast.health),
                        error_rate: format_ratio(s.forecast.error_rate),
                        bandwidth: format_bandwidth(s.forecast.bandwidth),
                        score: format_score(s.score),
                        selections: s.selections,
                    }
                })
                .collect();

            print_table(rows);
        }
    }

    Ok(())
}
