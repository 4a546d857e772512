//! Historical market arrivals dataset
//!
//! Loaded once from CSV at startup and shared read-only by the chat
//! responder, the dashboard and the export endpoint. A missing file yields
//! an empty dataset so those features degrade to empty answers.

use crate::models::MarketRecord;
use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// In-memory market history, in file order
#[derive(Debug, Clone, Default)]
pub struct MarketHistory {
    records: Vec<MarketRecord>,
}

/// Exact-match filters; `None` matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub state: Option<String>,
    pub district: Option<String>,
    pub commodity: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &MarketRecord) -> bool {
        let state_ok = match &self.state {
            Some(state) => record.state.as_deref() == Some(state.as_str()),
            None => true,
        };
        state_ok
            && self.district.as_deref().map_or(true, |d| record.district == d)
            && self.commodity.as_deref().map_or(true, |c| record.commodity == c)
    }
}

impl MarketHistory {
    pub fn new(records: Vec<MarketRecord>) -> Self {
        Self { records }
    }

    /// Parse CSV with a header row; malformed rows are skipped and counted
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (idx, result) in reader.deserialize::<MarketRecord>().enumerate() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    if skipped <= 5 {
                        warn!(line = idx + 2, error = %e, "Skipping malformed market record");
                    }
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, kept = records.len(), "Market history contained malformed rows");
        }
        Ok(Self { records })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open market history {:?}", path))?;
        let history = Self::from_reader(file)?;
        info!(path = ?path, records = history.len(), "Loaded market history");
        Ok(history)
    }

    /// Load, or fall back to an empty dataset when the file is unusable
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(error = %format!("{:#}", e), "Market history unavailable, dashboard and chat will be empty");
            Self::default()
        })
    }

    pub fn records(&self) -> &[MarketRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct commodity names in first-seen order
    pub fn commodities(&self) -> Vec<&str> {
        unique(self.records.iter().map(|r| r.commodity.as_str()))
    }

    /// Distinct district names in first-seen order
    pub fn districts(&self) -> Vec<&str> {
        unique(self.records.iter().map(|r| r.district.as_str()))
    }

    pub fn filter(&self, filter: &RecordFilter) -> Vec<&MarketRecord> {
        self.records.iter().filter(|r| filter.matches(r)).collect()
    }
}

fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = std::collections::HashSet::new();
    values.filter(|v| seen.insert(*v)).collect()
}

/// Record with the highest modal price (first one on ties)
pub fn highest<'a>(records: &[&'a MarketRecord]) -> Option<&'a MarketRecord> {
    records.iter().copied().fold(None, |best, r| match best {
        Some(b) if b.modal_price >= r.modal_price => Some(b),
        _ => Some(r),
    })
}

/// Record with the lowest modal price (first one on ties)
pub fn lowest<'a>(records: &[&'a MarketRecord]) -> Option<&'a MarketRecord> {
    records.iter().copied().fold(None, |best, r| match best {
        Some(b) if b.modal_price <= r.modal_price => Some(b),
        _ => Some(r),
    })
}

/// Mean modal price
pub fn average_modal(records: &[&MarketRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    Some(records.iter().map(|r| r.modal_price).sum::<f64>() / records.len() as f64)
}

/// Rejected export format
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported export format '{0}', expected csv, json or excel")]
pub struct UnsupportedFormat(pub String);

/// Download formats for filtered history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Excel,
}

/// Column headers shared by the CSV and spreadsheet exports
const EXPORT_HEADERS: [&str; 9] = [
    "State",
    "District",
    "Market",
    "Commodity",
    "Variety",
    "Arrival_Date",
    "Min_Price",
    "Max_Price",
    "Modal_Price",
];

impl FromStr for ExportFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Excel => "excel",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
            ExportFormat::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "market_data.csv",
            ExportFormat::Json => "market_data.json",
            ExportFormat::Excel => "market_data.xlsx",
        }
    }

    /// Serialize records into the export body
    pub fn render(&self, records: &[&MarketRecord]) -> Result<Vec<u8>> {
        match self {
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_writer(Vec::new());
                for record in records {
                    writer.serialize(record).context("Failed to write CSV row")?;
                }
                writer.into_inner().context("Failed to finish CSV export")
            }
            ExportFormat::Json => serde_json::to_vec(records).context("Failed to encode JSON export"),
            ExportFormat::Excel => render_xlsx(records),
        }
    }
}

/// One header row, then one row per record; prices stay numeric
fn render_xlsx(records: &[&MarketRecord]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = i as u32 + 1;
        let optional = |v: &Option<String>| v.clone().unwrap_or_default();
        sheet.write_string(row, 0, optional(&record.state))?;
        sheet.write_string(row, 1, record.district.as_str())?;
        sheet.write_string(row, 2, optional(&record.market))?;
        sheet.write_string(row, 3, record.commodity.as_str())?;
        sheet.write_string(row, 4, optional(&record.variety))?;
        sheet.write_string(row, 5, record.arrival_date.format("%Y-%m-%d").to_string())?;
        sheet.write_number(row, 6, record.min_price)?;
        sheet.write_number(row, 7, record.max_price)?;
        sheet.write_number(row, 8, record.modal_price)?;
    }

    workbook
        .save_to_buffer()
        .context("Failed to finish spreadsheet export")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
State,District,Market,Commodity,Variety,Arrival_Date,Min_Price,Max_Price,Modal_Price
Tamil Nadu,Chennai,Koyambedu,Tomato,Hybrid,2024-04-01,1000,1600,1300
Tamil Nadu,Madurai,Madurai,Tomato,Local,2024-04-02,1100,1900,1700
Tamil Nadu,Chennai,Koyambedu,Onion,Big,02/04/2024,1800,2600,2200
Tamil Nadu,Salem,Salem,Onion,Small,2024-04-03,900,1400,1100
Tamil Nadu,Chennai,Koyambedu,Tomato,Hybrid,2024-04-08,1200,1800,1500
";

    fn sample() -> MarketHistory {
        MarketHistory::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let history = sample();
        assert_eq!(history.len(), 5);
        assert_eq!(history.records()[2].arrival_date.to_string(), "2024-04-02");
        assert_eq!(history.records()[0].state.as_deref(), Some("Tamil Nadu"));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let csv = "District,Commodity,Arrival_Date,Min_Price,Max_Price,Modal_Price\n\
                   Chennai,Tomato,2024-04-01,1000,1600,1300\n\
                   Chennai,Tomato,yesterday,1000,1600,1300\n\
                   Chennai,Tomato,2024-04-03,abc,1600,1300\n";
        let history = MarketHistory::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.records()[0].state.is_none());
    }

    #[test]
    fn test_unique_values_keep_first_seen_order() {
        let history = sample();
        assert_eq!(history.commodities(), vec!["Tomato", "Onion"]);
        assert_eq!(history.districts(), vec!["Chennai", "Madurai", "Salem"]);
    }

    #[test]
    fn test_filters() {
        let history = sample();
        let filter = RecordFilter {
            district: Some("Chennai".to_string()),
            commodity: Some("Tomato".to_string()),
            ..Default::default()
        };
        assert_eq!(history.filter(&filter).len(), 2);

        let by_state = RecordFilter {
            state: Some("Kerala".to_string()),
            ..Default::default()
        };
        assert!(history.filter(&by_state).is_empty());
        assert_eq!(history.filter(&RecordFilter::default()).len(), 5);
    }

    #[test]
    fn test_aggregates() {
        let history = sample();
        let all = history.filter(&RecordFilter::default());
        assert_eq!(highest(&all).unwrap().modal_price, 2200.0);
        assert_eq!(lowest(&all).unwrap().district, "Salem");

        let tomato = history.filter(&RecordFilter {
            commodity: Some("Tomato".to_string()),
            ..Default::default()
        });
        assert_eq!(average_modal(&tomato), Some(1500.0));
        assert_eq!(average_modal(&[]), None);
        assert!(highest(&[]).is_none());
    }

    #[test]
    fn test_ties_keep_first_record() {
        let history = MarketHistory::from_reader(
            "District,Commodity,Arrival_Date,Min_Price,Max_Price,Modal_Price\n\
             A,Tomato,2024-04-01,1,3,2\n\
             B,Tomato,2024-04-02,1,3,2\n"
                .as_bytes(),
        )
        .unwrap();
        let all = history.filter(&RecordFilter::default());
        assert_eq!(highest(&all).unwrap().district, "A");
        assert_eq!(lowest(&all).unwrap().district, "A");
    }

    #[test]
    fn test_export_formats() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("json".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("excel".parse::<ExportFormat>(), Ok(ExportFormat::Excel));
        assert!("pdf".parse::<ExportFormat>().is_err());

        let history = sample();
        let onions = history.filter(&RecordFilter {
            commodity: Some("Onion".to_string()),
            ..Default::default()
        });

        let csv = String::from_utf8(ExportFormat::Csv.render(&onions).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("State,District,Market,Commodity"));
        assert!(lines.next().unwrap().contains("2024-04-02"));
        assert_eq!(csv.lines().count(), 3);

        let json: serde_json::Value =
            serde_json::from_slice(&ExportFormat::Json.render(&onions).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[1]["District"], "Salem");
    }

    #[test]
    fn test_excel_export_is_xlsx() {
        let history = sample();
        let all = history.filter(&RecordFilter::default());

        let body = ExportFormat::Excel.render(&all).unwrap();
        // xlsx is a zip container
        assert!(body.starts_with(b"PK"));
        assert_eq!(ExportFormat::Excel.file_name(), "market_data.xlsx");
        assert_eq!(
            ExportFormat::Excel.content_type(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );

        let empty = ExportFormat::Excel.render(&[]).unwrap();
        assert!(empty.starts_with(b"PK"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let history = MarketHistory::load_or_empty(&dir.path().join("absent.csv"));
        assert!(history.is_empty());
        assert!(history.commodities().is_empty());
    }
}
