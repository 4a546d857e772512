//! Price forecast commands

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{format_band, format_rupees, print_json, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct PredictionRow {
    #[tabled(rename = "Week of")]
    date: String,
    #[tabled(rename = "Min")]
    min_price: String,
    #[tabled(rename = "Max")]
    max_price: String,
    #[tabled(rename = "Modal")]
    modal_price: String,
}

#[derive(Tabled, Serialize)]
struct CommodityRow {
    #[tabled(rename = "Commodity")]
    name: String,
    #[tabled(rename = "Min price band")]
    min_band: String,
    #[tabled(rename = "Max price band")]
    max_band: String,
}

/// Show the weekly forecast for a commodity
pub async fn predict(
    client: &ApiClient,
    commodity: &str,
    weeks: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let result = client.predict(commodity, weeks).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            println!("{} {}", "Weekly forecast for".bold(), commodity.cyan().bold());
            let rows: Vec<PredictionRow> = result
                .weekly_predictions
                .iter()
                .map(|p| PredictionRow {
                    date: p.date.format("%Y-%m-%d").to_string(),
                    min_price: format!("₹{}", p.min_price),
                    max_price: format!("₹{}", p.max_price),
                    modal_price: format_rupees(p.predicted_modal_price).green().to_string(),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}

/// List forecastable commodities
pub async fn list_commodities(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result = client.commodities().await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let rows: Vec<CommodityRow> = result
                .commodities
                .iter()
                .map(|c| CommodityRow {
                    name: c.name.clone(),
                    min_band: format_band(c.min_price_range.0, c.min_price_range.1),
                    max_band: format_band(c.max_price_range.0, c.max_price_range.1),
                })
                .collect();
            print_table(&rows, format);
            println!("\nTotal: {} commodities", rows.len());
        }
    }

    Ok(())
}
