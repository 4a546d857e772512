//! Weekly price forecaster
//!
//! Drives the feature assembler across a rolling weekly horizon and asks the
//! configured model for each week's modal price. A failed model call never
//! fails the forecast: that single week is simulated instead.

use super::features::FeatureAssembler;
use super::inference::SimulatedModel;
use super::{ForecastModel, LoadedForecastModel};
use crate::catalog::PriceRangeCatalog;
use crate::models::WeeklyPredictionPoint;
use crate::observability::MarketMetrics;
use chrono::{Duration, Local, NaiveDate};
use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Number of weeks forecast when the caller does not ask for a horizon
pub const DEFAULT_HORIZON_WEEKS: usize = 5;

/// Longest horizon a caller may request
pub const MAX_HORIZON_WEEKS: usize = 52;

/// Client-facing forecast failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForecastError {
    #[error("Unknown commodity: {0}")]
    UnknownCommodity(String),

    #[error("Forecast horizon must be between 1 and {max} weeks, got {requested}")]
    InvalidHorizon { requested: usize, max: usize },
}

/// Configuration for the forecaster
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub default_horizon_weeks: usize,
    pub max_horizon_weeks: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_horizon_weeks: DEFAULT_HORIZON_WEEKS,
            max_horizon_weeks: MAX_HORIZON_WEEKS,
        }
    }
}

/// Produces weekly price curves for catalogued commodities
pub struct PriceForecaster {
    catalog: Arc<PriceRangeCatalog>,
    assembler: FeatureAssembler,
    model: Box<dyn ForecastModel>,
    config: ForecastConfig,
    metrics: MarketMetrics,
    forecasts: AtomicU64,
    model_points: AtomicU64,
    fallback_points: AtomicU64,
}

impl PriceForecaster {
    pub fn new(catalog: Arc<PriceRangeCatalog>, loaded: LoadedForecastModel, config: ForecastConfig) -> Self {
        let metrics = MarketMetrics::new();
        metrics.set_forecast_backend(loaded.model.name(), loaded.model.version());
        Self {
            catalog,
            assembler: FeatureAssembler::new(loaded.columns),
            model: loaded.model,
            config,
            metrics,
            forecasts: AtomicU64::new(0),
            model_points: AtomicU64::new(0),
            fallback_points: AtomicU64::new(0),
        }
    }

    /// True when every prediction is simulated
    pub fn is_simulated(&self) -> bool {
        self.model.is_simulated()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn model_version(&self) -> &str {
        self.model.version()
    }

    pub fn catalog(&self) -> &PriceRangeCatalog {
        &self.catalog
    }

    pub fn assembler(&self) -> &FeatureAssembler {
        &self.assembler
    }

    pub fn default_horizon(&self) -> usize {
        self.config.default_horizon_weeks
    }

    /// Forecast `horizon_weeks` weekly points starting today
    pub fn generate_weekly_predictions(
        &self,
        commodity: &str,
        horizon_weeks: usize,
    ) -> Result<Vec<WeeklyPredictionPoint>, ForecastError> {
        let today = Local::now().date_naive();
        self.generate_from(commodity, horizon_weeks, today, &mut rand::thread_rng())
    }

    /// Forecast from an explicit start date with a caller-supplied random source
    pub fn generate_from(
        &self,
        commodity: &str,
        horizon_weeks: usize,
        start: NaiveDate,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<WeeklyPredictionPoint>, ForecastError> {
        if horizon_weeks == 0 || horizon_weeks > self.config.max_horizon_weeks {
            return Err(ForecastError::InvalidHorizon {
                requested: horizon_weeks,
                max: self.config.max_horizon_weeks,
            });
        }
        let range = self
            .catalog
            .get(commodity)
            .ok_or_else(|| ForecastError::UnknownCommodity(commodity.to_string()))?;

        let mut points = Vec::with_capacity(horizon_weeks);
        for week in 0..horizon_weeks {
            let date = start + Duration::weeks(week as i64);
            let row = self.assembler.assemble(commodity, range, date, &mut *rng);

            let price = match self.model.predict(&row, &mut *rng) {
                Ok(price) => {
                    self.model_points.fetch_add(1, Ordering::Relaxed);
                    price
                }
                Err(e) => {
                    self.fallback_points.fetch_add(1, Ordering::Relaxed);
                    self.metrics.inc_fallback_predictions();
                    warn!(
                        commodity = %commodity,
                        date = %date,
                        error = %e,
                        "Price model failed, simulating this week"
                    );
                    SimulatedModel::draw(&row, &mut *rng) as f64
                }
            };

            points.push(WeeklyPredictionPoint {
                date,
                min_price: row.min_price,
                max_price: row.max_price,
                predicted_modal_price: round_to_cents(price),
            });
        }

        self.forecasts.fetch_add(1, Ordering::Relaxed);
        debug!(commodity = %commodity, weeks = horizon_weeks, model = self.model.name(), "Forecast generated");
        Ok(points)
    }

    pub fn stats(&self) -> ForecastStats {
        ForecastStats {
            forecasts: self.forecasts.load(Ordering::Relaxed),
            model_points: self.model_points.load(Ordering::Relaxed),
            fallback_points: self.fallback_points.load(Ordering::Relaxed),
        }
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Counters for forecasts served since startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastStats {
    pub forecasts: u64,
    pub model_points: u64,
    pub fallback_points: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{FeatureColumnOrder, FeatureRow};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::AtomicUsize;

    /// Returns a fixed price, failing on every `fail_every`-th call
    struct FlakyModel {
        price: f64,
        fail_every: usize,
        calls: AtomicUsize,
    }

    impl ForecastModel for FlakyModel {
        fn predict(&self, row: &FeatureRow, _rng: &mut dyn RngCore) -> anyhow::Result<f64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if row.len() != 5 {
                anyhow::bail!("wrong width");
            }
            if self.fail_every > 0 && call % self.fail_every == 0 {
                anyhow::bail!("predict exploded");
            }
            Ok(self.price)
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn version(&self) -> &str {
            "test"
        }
    }

    fn columns() -> FeatureColumnOrder {
        FeatureColumnOrder::new(
            ["Min_Price", "Max_Price", "Arrival_Year", "Arrival_Month", "Commodity_Tomato"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    fn simulated_forecaster() -> PriceForecaster {
        PriceForecaster::new(
            Arc::new(PriceRangeCatalog::default()),
            LoadedForecastModel {
                model: Box::new(SimulatedModel),
                columns: FeatureColumnOrder::default(),
            },
            ForecastConfig::default(),
        )
    }

    fn model_forecaster(model: FlakyModel, columns: FeatureColumnOrder) -> PriceForecaster {
        PriceForecaster::new(
            Arc::new(PriceRangeCatalog::default()),
            LoadedForecastModel {
                model: Box::new(model),
                columns,
            },
            ForecastConfig::default(),
        )
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 18).unwrap()
    }

    #[test]
    fn test_tomato_five_week_curve() {
        let forecaster = simulated_forecaster();
        let mut rng = StdRng::seed_from_u64(2024);

        let points = forecaster.generate_from("Tomato", 5, start(), &mut rng).unwrap();

        assert_eq!(points.len(), 5);
        for (i, p) in points.iter().enumerate() {
            assert_eq!(p.date, start() + Duration::days(7 * i as i64));
            assert!((1000..=1500).contains(&p.min_price));
            assert!((1500..=2000).contains(&p.max_price));
            assert!(p.predicted_modal_price >= p.min_price as f64);
            assert!(p.predicted_modal_price <= p.max_price as f64);
        }
    }

    #[test]
    fn test_every_commodity_respects_bounds() {
        let forecaster = simulated_forecaster();
        let mut rng = StdRng::seed_from_u64(99);
        let catalog = PriceRangeCatalog::default();

        for (name, range) in catalog.iter() {
            let points = forecaster.generate_from(name, 8, start(), &mut rng).unwrap();
            assert_eq!(points.len(), 8);
            for pair in points.windows(2) {
                assert_eq!(pair[1].date - pair[0].date, Duration::days(7));
            }
            for p in &points {
                assert!(p.min_price >= range.min_price_range.0 && p.min_price <= range.min_price_range.1);
                assert!(p.max_price >= range.max_price_range.0 && p.max_price <= range.max_price_range.1);
            }
        }
    }

    #[test]
    fn test_unknown_commodity_is_rejected() {
        let forecaster = simulated_forecaster();
        let err = forecaster
            .generate_weekly_predictions("Unicorn Fruit", 5)
            .unwrap_err();
        assert_eq!(err, ForecastError::UnknownCommodity("Unicorn Fruit".to_string()));
        assert!(err.to_string().contains("Unknown commodity"));
        assert_eq!(forecaster.stats().forecasts, 0);
    }

    #[test]
    fn test_horizon_limits() {
        let forecaster = simulated_forecaster();
        assert!(matches!(
            forecaster.generate_weekly_predictions("Tomato", 0),
            Err(ForecastError::InvalidHorizon { requested: 0, .. })
        ));
        assert!(matches!(
            forecaster.generate_weekly_predictions("Tomato", MAX_HORIZON_WEEKS + 1),
            Err(ForecastError::InvalidHorizon { .. })
        ));
        assert_eq!(forecaster.generate_weekly_predictions("Tomato", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_starts_today() {
        let forecaster = simulated_forecaster();
        let points = forecaster.generate_weekly_predictions("Onion", 5).unwrap();
        let today = Local::now().date_naive();
        // Allow for the test straddling midnight
        assert!(points[0].date == today || points[0].date + Duration::days(1) == today);
        assert_eq!(points[4].date - points[0].date, Duration::days(28));
    }

    #[test]
    fn test_model_prices_are_rounded() {
        let model = FlakyModel {
            price: 1234.5678,
            fail_every: 0,
            calls: AtomicUsize::new(0),
        };
        let forecaster = model_forecaster(model, columns());
        let mut rng = StdRng::seed_from_u64(1);

        let points = forecaster.generate_from("Tomato", 3, start(), &mut rng).unwrap();
        assert!(points.iter().all(|p| p.predicted_modal_price == 1234.57));
        assert_eq!(forecaster.stats().model_points, 3);
        assert_eq!(forecaster.stats().fallback_points, 0);
    }

    #[test]
    fn test_failure_degrades_only_that_week() {
        let model = FlakyModel {
            price: 99_999.0,
            fail_every: 2,
            calls: AtomicUsize::new(0),
        };
        let forecaster = model_forecaster(model, columns());
        let mut rng = StdRng::seed_from_u64(8);

        let points = forecaster.generate_from("Tomato", 4, start(), &mut rng).unwrap();

        assert_eq!(points.len(), 4);
        assert_eq!(points[0].predicted_modal_price, 99_999.0);
        assert_eq!(points[2].predicted_modal_price, 99_999.0);
        for p in [&points[1], &points[3]] {
            assert!(p.predicted_modal_price >= p.min_price as f64);
            assert!(p.predicted_modal_price <= p.max_price as f64);
        }
        let stats = forecaster.stats();
        assert_eq!(stats.model_points, 2);
        assert_eq!(stats.fallback_points, 2);
    }

    #[test]
    fn test_layout_mismatch_falls_back() {
        let model = FlakyModel {
            price: 99_999.0,
            fail_every: 0,
            calls: AtomicUsize::new(0),
        };
        // Three columns where the model wants five
        let narrow = FeatureColumnOrder::new(vec![
            "Min_Price".to_string(),
            "Max_Price".to_string(),
            "Arrival_Year".to_string(),
        ]);
        let forecaster = model_forecaster(model, narrow);
        let mut rng = StdRng::seed_from_u64(3);

        let points = forecaster.generate_from("Tomato", 5, start(), &mut rng).unwrap();
        assert_eq!(points.len(), 5);
        assert!(points.iter().all(|p| p.predicted_modal_price < 99_999.0));
        assert_eq!(forecaster.stats().fallback_points, 5);
    }

    #[test]
    fn test_round_to_cents() {
        assert_eq!(round_to_cents(10.005_1), 10.01);
        assert_eq!(round_to_cents(1500.0), 1500.0);
    }
}
