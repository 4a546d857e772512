//! Market history commands: chat, export and dashboard

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;

use crate::client::{ApiClient, ExportQuery};
use crate::output::{format_rupees, print_info, print_json, print_success, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct SeriesRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Modal")]
    modal: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
}

#[derive(Tabled, Serialize)]
struct DistrictRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "District")]
    district: String,
    #[tabled(rename = "Average modal price")]
    average: String,
}

/// Ask the market assistant a question
pub async fn chat(client: &ApiClient, message: &str, format: OutputFormat) -> Result<()> {
    let reply = client.chat(message).await?;
    match format {
        OutputFormat::Json => print_json(&reply)?,
        OutputFormat::Table => println!("{} {}", "assistant:".cyan().bold(), reply.reply),
    }
    Ok(())
}

/// Download filtered history to a file
pub async fn export(client: &ApiClient, query: ExportQuery, output: Option<PathBuf>) -> Result<()> {
    let file = client.export(&query).await?;
    let path = output.unwrap_or_else(|| local_file_name(&file.file_name, &query.format));
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    print_success(&format!(
        "Saved {} bytes of {} data to {}",
        file.bytes.len(),
        query.format,
        path.display()
    ));
    Ok(())
}

/// Server-suggested name reduced to its last component so it lands in the working directory
fn local_file_name(suggested: &str, format: &str) -> PathBuf {
    Path::new(suggested)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let extension = if format == "excel" { "xlsx" } else { format };
            PathBuf::from(format!("market_data.{}", extension))
        })
}

/// Show chart data for one commodity and district
pub async fn show_dashboard(
    client: &ApiClient,
    commodity: Option<String>,
    district: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let data = client
        .dashboard(commodity.as_deref(), district.as_deref())
        .await?;

    match format {
        OutputFormat::Json => print_json(&data)?,
        OutputFormat::Table => {
            let Some(commodity) = &data.commodity else {
                print_info("No market history loaded on the server");
                return Ok(());
            };
            println!("{}", "Market Dashboard".bold());
            println!("{}", "=".repeat(50));
            println!("Commodity: {}", commodity.cyan());
            if let Some(district) = &data.district {
                println!("District:  {}", district.cyan());
            }
            println!();

            let rows: Vec<SeriesRow> = data
                .price_series
                .iter()
                .zip(&data.min_max)
                .map(|(p, m)| SeriesRow {
                    date: p.date.format("%Y-%m-%d").to_string(),
                    modal: format_rupees(p.modal_price),
                    min: format_rupees(m.min_price),
                    max: format_rupees(m.max_price),
                })
                .collect();
            print_table(&rows, format);

            if !data.top_districts.is_empty() {
                println!();
                println!("{}", "Top districts by average price".bold());
                let rows: Vec<DistrictRow> = data
                    .top_districts
                    .iter()
                    .enumerate()
                    .map(|(i, d)| DistrictRow {
                        rank: i + 1,
                        district: d.district.clone(),
                        average: format_rupees(d.average_modal_price),
                    })
                    .collect();
                print_table(&rows, format);
            }
        }
    }

    Ok(())
}

/// List commodities and districts present in the history
pub async fn show_options(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let options = client.dashboard_options().await?;
    match format {
        OutputFormat::Json => print_json(&options)?,
        OutputFormat::Table => {
            println!("{}", "Commodities".bold());
            for c in &options.commodities {
                println!("  {}", c);
            }
            println!("{}", "Districts".bold());
            for d in &options.districts {
                println!("  {}", d);
            }
        }
    }
    Ok(())
}
