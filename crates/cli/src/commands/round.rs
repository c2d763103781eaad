//! The most recent selection round

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_flag, format_ms, format_percent, format_score, print_heading,
    print_json, print_table, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct RoundRow {
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Probe")]
    probe: String,
    #[tabled(rename = "RTT")]
    rtt: String,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Pred RTT")]
    predicted_rtt: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Chosen")]
    chosen: String,
}

/// Show the outcome of the latest completed round
pub async fn show_latest_round(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let record = client.latest_round().await?;

    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Table => {
            print_heading(&format!("Round {}", record.round));
            println!("Chosen:   {}", record.chosen.cyan().bold());
            println!("Branch:   {}", color_status(&record.branch));
            println!("Duration: {}ms", record.duration_ms);
            println!();

            if !record.viable {
                print_warning("No server was viable; the first configured server was chosen");
            }

            let rows: Vec<RoundRow> = record
                .servers
                .iter()
                .map(|s| {
                    let probe = match &s.failure {
                        Some(reason) => format!("{} ({})", color_status("down"), reason),
                        None => color_status("up"),
                    };
                    RoundRow {
                        server: s.server.clone(),
                        probe,
                        rtt: format_ms(s.sample.as_ref().map(|m| m.rtt_secs)),
                        load: format_percent(s.sample.as_ref().map(|m| m.load)),
                        predicted_rtt: format_ms(s.forecast.rtt),
                        score: format_score(s.score),
                        chosen: format_flag(s.server == record.chosen),
                    }
                })
                .collect();

            print_table(rows);
        }
    }

    Ok(())
}
