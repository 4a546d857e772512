//! Commodity price-range catalog
//!
//! Maps each supported commodity to the bounds used when drawing synthetic
//! min/max prices for a forecast. The built-in table can be replaced at
//! startup by a JSON file with the same shape.

use crate::models::{CommodityPriceRange, PriceBounds};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while building a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("commodity '{commodity}' has inverted {field} bounds ({low} > {high})")]
    InvertedBounds {
        commodity: String,
        field: &'static str,
        low: u32,
        high: u32,
    },

    #[error("price range catalog is empty")]
    Empty,
}

const DEFAULT_RANGES: &[(&str, PriceBounds, PriceBounds)] = &[
    // Vegetables
    ("Ashgourd", (1000, 1500), (1800, 2500)),
    ("Broad Beans", (2000, 3000), (3000, 4000)),
    ("Bitter Gourd", (2000, 3000), (3700, 4000)),
    ("Bottle Gourd", (1000, 2500), (2500, 3500)),
    ("Brinjal", (2000, 3300), (3400, 4000)),
    ("Cabbage", (1000, 1500), (1500, 2000)),
    ("Capsicum", (3000, 3800), (3900, 4600)),
    ("Carrot", (3000, 3700), (3700, 4200)),
    ("Cluster Beans", (3000, 3700), (3800, 4300)),
    ("Coriander (Leaves)", (500, 800), (800, 1300)),
    ("Cauliflower", (1800, 2800), (2500, 3000)),
    ("Drumstick", (7000, 7500), (7800, 8400)),
    ("Green Chilli", (2000, 3200), (3000, 4500)),
    ("Onion", (1000, 1500), (2000, 2500)),
    ("Potato", (2000, 2500), (2500, 3500)),
    ("Pumpkin", (900, 1700), (1800, 2400)),
    ("Raddish", (2000, 2000), (2200, 3000)),
    ("Snakeguard", (1400, 2500), (2700, 3400)),
    ("Sweet Potato", (4500, 5700), (5500, 6500)),
    ("Tomato", (1000, 1500), (1500, 2000)),
    // Pulses
    ("Arhar (Tur/Red Gram)(Whole)", (2000, 4500), (4800, 6000)),
    ("Bengal Gram (Gram)(Whole)", (3000, 3800), (4000, 4500)),
    ("Bengal Gram Dal (Chana Dal)", (6000, 8000), (8000, 10000)),
    ("Black Gram (Urd Beans)(Whole)", (6000, 7600), (7700, 8500)),
    ("Black Gram Dal (Urd Dal)", (9000, 13500), (13000, 15000)),
    ("Green Gram (Moong)(Whole)", (6000, 7000), (7000, 8000)),
    ("Green Gram Dal (Moong Dal)", (8000, 9000), (9200, 10000)),
    ("Kabuli Chana (Chickpeas-White)", (6000, 8500), (8000, 9000)),
    ("Kulthi (Horse Gram)", (4000, 5300), (5500, 6500)),
    ("Moath Dal", (1700, 1900), (1900, 2400)),
];

/// Read-only commodity → price-range table
#[derive(Debug, Clone)]
pub struct PriceRangeCatalog {
    ranges: BTreeMap<String, CommodityPriceRange>,
}

impl Default for PriceRangeCatalog {
    fn default() -> Self {
        let ranges = DEFAULT_RANGES
            .iter()
            .map(|(name, min, max)| (name.to_string(), CommodityPriceRange::new(*min, *max)))
            .collect();
        Self { ranges }
    }
}

impl PriceRangeCatalog {
    /// Build a catalog from explicit entries, rejecting inverted bound pairs
    pub fn from_ranges(
        ranges: impl IntoIterator<Item = (String, CommodityPriceRange)>,
    ) -> Result<Self, CatalogError> {
        let ranges: BTreeMap<_, _> = ranges.into_iter().collect();
        if ranges.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (name, range) in &ranges {
            check_bounds(name, "min_price_range", range.min_price_range)?;
            check_bounds(name, "max_price_range", range.max_price_range)?;
        }
        Ok(Self { ranges })
    }

    /// Load a catalog from a JSON object keyed by commodity name
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read price range file {:?}", path))?;
        let ranges: BTreeMap<String, CommodityPriceRange> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse price range file {:?}", path))?;
        let catalog = Self::from_ranges(ranges)?;
        info!(path = ?path, commodities = catalog.len(), "Loaded commodity price ranges");
        Ok(catalog)
    }

    pub fn get(&self, commodity: &str) -> Option<&CommodityPriceRange> {
        self.ranges.get(commodity)
    }

    pub fn contains(&self, commodity: &str) -> bool {
        self.ranges.contains_key(commodity)
    }

    /// Iterate entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CommodityPriceRange)> {
        self.ranges.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn check_bounds(commodity: &str, field: &'static str, bounds: PriceBounds) -> Result<(), CatalogError> {
    if bounds.0 > bounds.1 {
        return Err(CatalogError::InvertedBounds {
            commodity: commodity.to_string(),
            field,
            low: bounds.0,
            high: bounds.1,
        });
    }
    Ok(())
}
