//! Data behind the analytics dashboard

use crate::history::{MarketHistory, RecordFilter};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of bars in the district comparison
pub const TOP_DISTRICTS: usize = 10;

/// Selectable values for the dashboard dropdowns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOptions {
    pub commodities: Vec<String>,
    pub districts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(with = "crate::models::iso_date")]
    pub date: NaiveDate,
    pub modal_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxPoint {
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictAverage {
    pub district: String,
    pub average_modal_price: f64,
}

/// Series for the three dashboard charts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commodity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    pub price_series: Vec<PricePoint>,
    pub min_max: Vec<MinMaxPoint>,
    pub top_districts: Vec<DistrictAverage>,
}

pub fn options(history: &MarketHistory) -> DashboardOptions {
    DashboardOptions {
        commodities: history.commodities().into_iter().map(String::from).collect(),
        districts: history.districts().into_iter().map(String::from).collect(),
    }
}

/// Build chart data for a commodity and district.
///
/// Unset selections default to the first commodity and district in the
/// dataset, the same values the dropdowns start on.
pub fn build(history: &MarketHistory, commodity: Option<&str>, district: Option<&str>) -> DashboardData {
    let commodity = commodity
        .filter(|c| !c.is_empty())
        .or_else(|| history.commodities().first().copied());
    let Some(commodity) = commodity else {
        return DashboardData::default();
    };
    let district = district
        .filter(|d| !d.is_empty())
        .or_else(|| history.districts().first().copied());

    let mut selected = history.filter(&RecordFilter {
        state: None,
        district: district.map(str::to_string),
        commodity: Some(commodity.to_string()),
    });
    // Both series index the same records; stable sort keeps file order for same-day arrivals
    selected.sort_by_key(|r| r.arrival_date);

    let price_series = selected
        .iter()
        .map(|r| PricePoint {
            date: r.arrival_date,
            modal_price: r.modal_price,
        })
        .collect();

    let min_max = selected
        .iter()
        .map(|r| MinMaxPoint {
            min_price: r.min_price,
            max_price: r.max_price,
        })
        .collect();

    DashboardData {
        commodity: Some(commodity.to_string()),
        district: district.map(str::to_string),
        price_series,
        min_max,
        top_districts: top_districts(history, commodity),
    }
}

/// Mean modal price per district for one commodity, highest first
pub fn top_districts(history: &MarketHistory, commodity: &str) -> Vec<DistrictAverage> {
    let mut order: Vec<&str> = Vec::new();
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for record in history.records().iter().filter(|r| r.commodity == commodity) {
        let entry = sums.entry(record.district.as_str()).or_insert_with(|| {
            order.push(record.district.as_str());
            (0.0, 0)
        });
        entry.0 += record.modal_price;
        entry.1 += 1;
    }

    let mut averages: Vec<DistrictAverage> = order
        .into_iter()
        .map(|district| {
            let (sum, count) = sums[district];
            DistrictAverage {
                district: district.to_string(),
                average_modal_price: sum / count as f64,
            }
        })
        .collect();
    averages.sort_by(|a, b| b.average_modal_price.total_cmp(&a.average_modal_price));
    averages.truncate(TOP_DISTRICTS);
    averages
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
District,Commodity,Arrival_Date,Min_Price,Max_Price,Modal_Price
Chennai,Tomato,2024-04-08,1200,1800,1500
Madurai,Tomato,2024-04-02,1100,1900,1700
Chennai,Tomato,2024-04-01,1000,1600,1300
Chennai,Onion,2024-04-02,1800,2600,2200
Salem,Tomato,2024-04-03,900,1400,1100
";

    fn sample() -> MarketHistory {
        MarketHistory::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_options_first_seen_order() {
        let opts = options(&sample());
        assert_eq!(opts.commodities, vec!["Tomato", "Onion"]);
        assert_eq!(opts.districts, vec!["Chennai", "Madurai", "Salem"]);
    }

    #[test]
    fn test_series_sorted_by_date() {
        let data = build(&sample(), Some("Tomato"), Some("Chennai"));
        let dates: Vec<String> = data.price_series.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-04-01", "2024-04-08"]);
        assert_eq!(data.min_max.len(), 2);
    }

    #[test]
    fn test_min_max_follows_series_order() {
        let data = build(&sample(), Some("Tomato"), Some("Chennai"));
        assert_eq!(data.price_series[0].modal_price, 1300.0);
        assert_eq!(data.min_max[0], MinMaxPoint { min_price: 1000.0, max_price: 1600.0 });
        assert_eq!(data.price_series[1].modal_price, 1500.0);
        assert_eq!(data.min_max[1], MinMaxPoint { min_price: 1200.0, max_price: 1800.0 });
    }

    #[test]
    fn test_top_districts_descending() {
        let data = build(&sample(), Some("Tomato"), Some("Chennai"));
        let names: Vec<&str> = data.top_districts.iter().map(|d| d.district.as_str()).collect();
        assert_eq!(names, vec!["Madurai", "Chennai", "Salem"]);
        assert_eq!(data.top_districts[1].average_modal_price, 1400.0);
    }

    #[test]
    fn test_top_districts_capped() {
        let mut csv = String::from("District,Commodity,Arrival_Date,Min_Price,Max_Price,Modal_Price\n");
        for i in 0..15 {
            csv.push_str(&format!("D{},Onion,2024-01-01,1,2,{}\n", i, 100 + i));
        }
        let history = MarketHistory::from_reader(csv.as_bytes()).unwrap();
        let top = top_districts(&history, "Onion");
        assert_eq!(top.len(), TOP_DISTRICTS);
        assert_eq!(top[0].district, "D14");
        assert_eq!(top[9].district, "D5");
    }

    #[test]
    fn test_defaults_to_first_selection() {
        let data = build(&sample(), None, None);
        assert_eq!(data.commodity.as_deref(), Some("Tomato"));
        assert_eq!(data.district.as_deref(), Some("Chennai"));
        assert_eq!(data.price_series.len(), 2);
    }

    #[test]
    fn test_empty_dataset() {
        let data = build(&MarketHistory::default(), None, None);
        assert!(data.price_series.is_empty());
        assert!(data.min_max.is_empty());
        assert!(data.top_districts.is_empty());
        assert!(options(&MarketHistory::default()).commodities.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let data = build(&sample(), Some("Onion"), Some("Chennai"));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["price_series"][0]["date"], "2024-04-02");
        assert_eq!(json["top_districts"][0]["district"], "Chennai");
    }
}
