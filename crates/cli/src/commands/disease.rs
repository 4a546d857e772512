//! Leaf image diagnosis

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, OutputFormat};

pub async fn diagnose(client: &ApiClient, image: &Path, format: OutputFormat) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let diagnosis = client.diagnose(&file_name, bytes).await?;

    match format {
        OutputFormat::Json => print_json(&diagnosis)?,
        OutputFormat::Table => {
            println!("{}", "Diagnosis".bold());
            println!("{}", "=".repeat(50));
            println!("Disease:    {}", diagnosis.disease.cyan());
            println!("Confidence: {}", diagnosis.confidence);
            println!("Status:     {}", color_status(&diagnosis.status));
            println!();
            println!("{}", diagnosis.advice);
        }
    }
    Ok(())
}
