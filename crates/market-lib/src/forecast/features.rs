//! Feature assembly for the price regression model
//!
//! Builds a fixed-width numeric row from a commodity, a target date and
//! randomly drawn min/max prices, laid out in the exact column order the
//! trained model was fitted with. Columns the assembler does not know about
//! are left at zero, which is also how one-hot indicators for other
//! commodities end up.

use crate::models::CommodityPriceRange;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use std::path::Path;
use tracing::info;

pub const MIN_PRICE_COLUMN: &str = "Min_Price";
pub const MAX_PRICE_COLUMN: &str = "Max_Price";
pub const YEAR_COLUMN: &str = "Arrival_Year";
pub const MONTH_COLUMN: &str = "Arrival_Month";
pub const DAY_COLUMN: &str = "Arrival_Day";

/// Prefix of the one-hot commodity indicator columns
pub const COMMODITY_PREFIX: &str = "Commodity_";

/// Ordered column layout expected by the regression model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureColumnOrder {
    columns: Vec<String>,
}

impl FeatureColumnOrder {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Load the column order persisted next to the model (a JSON array of names)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read column order {:?}", path))?;
        let columns: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse column order {:?}", path))?;
        info!(path = ?path, columns = columns.len(), "Loaded feature column order");
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A single assembled model input
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub min_price: u32,
    pub max_price: u32,
    values: Vec<f32>,
}

impl FeatureRow {
    /// Column values in model order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Assembles feature rows against a fixed column order
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    columns: FeatureColumnOrder,
}

impl FeatureAssembler {
    pub fn new(columns: FeatureColumnOrder) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &FeatureColumnOrder {
        &self.columns
    }

    /// Draw min/max prices for `commodity` and lay out a row for `date`.
    ///
    /// The two draws are independent, so `min_price` may exceed `max_price`
    /// when the configured ranges overlap.
    pub fn assemble<R: Rng + ?Sized>(
        &self,
        commodity: &str,
        range: &CommodityPriceRange,
        date: NaiveDate,
        rng: &mut R,
    ) -> FeatureRow {
        let min_price = rng.gen_range(range.min_price_range.0..=range.min_price_range.1);
        let max_price = rng.gen_range(range.max_price_range.0..=range.max_price_range.1);
        let indicator = format!("{}{}", COMMODITY_PREFIX, commodity);

        let values = self
            .columns
            .columns()
            .iter()
            .map(|column| match column.as_str() {
                MIN_PRICE_COLUMN => min_price as f32,
                MAX_PRICE_COLUMN => max_price as f32,
                YEAR_COLUMN => date.year() as f32,
                MONTH_COLUMN => date.month() as f32,
                DAY_COLUMN => date.day() as f32,
                name if name == indicator => 1.0,
                _ => 0.0,
            })
            .collect();

        FeatureRow {
            date,
            min_price,
            max_price,
            values,
        }
    }
}
