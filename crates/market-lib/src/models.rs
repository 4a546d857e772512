//! Core data models for the market backend

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive `(low, high)` price bound pair, in rupees per quintal
pub type PriceBounds = (u32, u32);

/// Price-range configuration for a single commodity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommodityPriceRange {
    pub min_price_range: PriceBounds,
    pub max_price_range: PriceBounds,
}

impl CommodityPriceRange {
    pub const fn new(min_price_range: PriceBounds, max_price_range: PriceBounds) -> Self {
        Self {
            min_price_range,
            max_price_range,
        }
    }
}

/// One week of a price forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPredictionPoint {
    #[serde(rename = "Date", with = "iso_date")]
    pub date: NaiveDate,
    #[serde(rename = "Min_Price")]
    pub min_price: u32,
    #[serde(rename = "Max_Price")]
    pub max_price: u32,
    #[serde(rename = "Predicted_Modal_Price")]
    pub predicted_modal_price: f64,
}

/// Result of a plant disease classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub disease: String,
    pub confidence: String,
    pub status: String,
    pub advice: String,
}

/// A row of the historical market dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Market", default)]
    pub market: Option<String>,
    #[serde(rename = "Commodity")]
    pub commodity: String,
    #[serde(rename = "Variety", default)]
    pub variety: Option<String>,
    #[serde(rename = "Arrival_Date", with = "flexible_date")]
    pub arrival_date: NaiveDate,
    #[serde(rename = "Min_Price")]
    pub min_price: f64,
    #[serde(rename = "Max_Price")]
    pub max_price: f64,
    #[serde(rename = "Modal_Price")]
    pub modal_price: f64,
}

pub(crate) mod iso_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Arrival dates appear both as ISO dates and as `DD/MM/YYYY` in market exports
pub(crate) mod flexible_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const ACCEPTED: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        super::iso_date::serialize(date, s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse(raw.trim()).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognised arrival date '{}'", raw))
        })
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        ACCEPTED
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    }
}
