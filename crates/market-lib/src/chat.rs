//! Rule-based market assistant
//!
//! Answers free-text questions from the historical dataset using keyword
//! matching. Stateless apart from the shared, read-only history.

use crate::history::{self, MarketHistory, RecordFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const GREETING: &str = "Hello! I am your Market AI Assistant. Ask me about commodity prices, trends, or high/low records!";
const HELP: &str = "I'm trained on your market charts. Try asking: 'Highest price of Tomato', 'Average price of Onion', or 'Lowest price in Chennai'.";
const ASK_FOR_COMMODITY: &str = "Which commodity's average price would you like to know? (e.g., 'Average price of Tomato')";
const PREDICT_HINT: &str = "I can predict prices for Tomato, Onion, etc. Mention a commodity name!";

/// Chat request body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Chat reply body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Question category, checked in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Highest,
    Lowest,
    Average,
    Predict,
    Greeting,
    Help,
}

impl Intent {
    const KEYWORDS: [(Intent, &'static [&'static str]); 5] = [
        (Intent::Highest, &["highest", "max"]),
        (Intent::Lowest, &["lowest", "min"]),
        (Intent::Average, &["average", "avg"]),
        (Intent::Predict, &["predict", "forecast"]),
        (Intent::Greeting, &["hello", "hi"]),
    ];

    /// Classify an already-lowercased message
    pub fn detect(message: &str) -> Self {
        Self::KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| message.contains(w)))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::Help)
    }
}

pub struct ChatResponder {
    history: Arc<MarketHistory>,
}

impl ChatResponder {
    pub fn new(history: Arc<MarketHistory>) -> Self {
        Self { history }
    }

    pub fn respond(&self, message: &str) -> ChatReply {
        let message = message.to_lowercase();
        let commodity = first_mentioned(&self.history.commodities(), &message);
        let district = first_mentioned(&self.history.districts(), &message);

        let filter = RecordFilter {
            state: None,
            district: district.map(str::to_string),
            commodity: commodity.map(str::to_string),
        };

        let reply = match Intent::detect(&message) {
            Intent::Highest => {
                let records = self.history.filter(&filter);
                match (history::highest(&records), commodity) {
                    (None, _) => no_records(commodity, district),
                    (Some(r), Some(c)) => format!(
                        "The highest recorded price for {} was ₹{} in {} on {}.",
                        c,
                        rupees(r.modal_price),
                        r.district,
                        r.arrival_date.format("%Y-%m-%d")
                    ),
                    (Some(r), None) => format!(
                        "The highest overall price{} is ₹{} for {}.",
                        scope(district),
                        rupees(r.modal_price),
                        r.commodity
                    ),
                }
            }
            Intent::Lowest => {
                let records = self.history.filter(&filter);
                match (history::lowest(&records), commodity) {
                    (None, _) => no_records(commodity, district),
                    (Some(r), Some(c)) => format!(
                        "The lowest recorded price for {} was ₹{} in {}.",
                        c,
                        rupees(r.modal_price),
                        r.district
                    ),
                    (Some(r), None) => format!(
                        "The lowest overall price{} is ₹{} for {}.",
                        scope(district),
                        rupees(r.modal_price),
                        r.commodity
                    ),
                }
            }
            Intent::Average => match commodity {
                Some(c) => {
                    let records = self.history.filter(&filter);
                    match history::average_modal(&records) {
                        Some(avg) => format!(
                            "The average market price for {} is approx ₹{}.",
                            c,
                            avg.trunc() as i64
                        ),
                        None => no_records(commodity, district),
                    }
                }
                None => ASK_FOR_COMMODITY.to_string(),
            },
            Intent::Predict => match commodity {
                Some(c) => format!(
                    "I can generate a 5-week prediction for {}. Please visit the 'Prediction' tab for the full chart!",
                    c
                ),
                None => PREDICT_HINT.to_string(),
            },
            Intent::Greeting => GREETING.to_string(),
            Intent::Help => HELP.to_string(),
        };

        ChatReply { reply }
    }
}

fn first_mentioned<'a>(names: &[&'a str], message: &str) -> Option<&'a str> {
    names
        .iter()
        .copied()
        .find(|name| message.contains(&name.to_lowercase()))
}

fn scope(district: Option<&str>) -> String {
    district.map(|d| format!(" in {}", d)).unwrap_or_default()
}

fn no_records(commodity: Option<&str>, district: Option<&str>) -> String {
    match (commodity, district) {
        (Some(c), Some(d)) => format!("I couldn't find any market records for {} in {}.", c, d),
        (Some(c), None) => format!("I couldn't find any market records for {}.", c),
        (None, Some(d)) => format!("I couldn't find any market records in {}.", d),
        (None, None) => "I couldn't find any market records to answer that.".to_string(),
    }
}

/// Whole rupees print without decimals
fn rupees(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{}", price as i64)
    } else {
        format!("{:.2}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
District,Commodity,Arrival_Date,Min_Price,Max_Price,Modal_Price
Chennai,Tomato,2024-04-01,1000,1600,1300
Madurai,Tomato,2024-04-02,1100,1900,1750
Chennai,Onion,2024-04-02,1800,2600,2200
Salem,Onion,2024-04-03,900,1400,1100
Chennai,Tomato,2024-04-08,1200,1800,1500
";

    fn responder() -> ChatResponder {
        let history = MarketHistory::from_reader(SAMPLE.as_bytes()).unwrap();
        ChatResponder::new(Arc::new(history))
    }

    #[test]
    fn test_intent_precedence() {
        assert_eq!(Intent::detect("highest and lowest"), Intent::Highest);
        assert_eq!(Intent::detect("lowest average"), Intent::Lowest);
        assert_eq!(Intent::detect("avg forecast"), Intent::Average);
        assert_eq!(Intent::detect("forecast please"), Intent::Predict);
        assert_eq!(Intent::detect("hello"), Intent::Greeting);
        assert_eq!(Intent::detect("what now"), Intent::Help);
        // "min" inside another word still counts
        assert_eq!(Intent::detect("terminal"), Intent::Lowest);
    }

    #[test]
    fn test_highest_for_commodity() {
        let reply = responder().respond("Highest price of Tomato?").reply;
        assert_eq!(
            reply,
            "The highest recorded price for Tomato was ₹1750 in Madurai on 2024-04-02."
        );
    }

    #[test]
    fn test_highest_overall() {
        let reply = responder().respond("what was the max ever").reply;
        assert_eq!(reply, "The highest overall price is ₹2200 for Onion.");
    }

    #[test]
    fn test_lowest_in_district() {
        let reply = responder().respond("lowest price in chennai").reply;
        assert_eq!(reply, "The lowest overall price in Chennai is ₹1300 for Tomato.");
    }

    #[test]
    fn test_district_narrows_commodity() {
        let reply = responder().respond("highest tomato price in chennai").reply;
        assert!(reply.contains("₹1500"));
        assert!(reply.contains("Chennai"));
    }

    #[test]
    fn test_average_truncates() {
        let reply = responder().respond("Average price of Tomato").reply;
        assert_eq!(reply, "The average market price for Tomato is approx ₹1516.");
    }

    #[test]
    fn test_average_needs_commodity() {
        assert_eq!(responder().respond("average please").reply, ASK_FOR_COMMODITY);
    }

    #[test]
    fn test_empty_filter_is_a_reply() {
        let reply = responder().respond("highest onion in madurai").reply;
        assert_eq!(reply, "I couldn't find any market records for Onion in Madurai.");
    }

    #[test]
    fn test_empty_dataset() {
        let responder = ChatResponder::new(Arc::new(MarketHistory::default()));
        assert!(responder.respond("highest tomato").reply.starts_with("I couldn't find"));
        assert_eq!(responder.respond("hello").reply, GREETING);
    }

    #[test]
    fn test_predict_and_help() {
        let r = responder();
        assert!(r.respond("forecast onion").reply.contains("5-week prediction for Onion"));
        assert_eq!(r.respond("predict something").reply, PREDICT_HINT);
        assert_eq!(r.respond("tell me a joke").reply, HELP);
    }

    #[test]
    fn test_rupee_formatting() {
        assert_eq!(rupees(1300.0), "1300");
        assert_eq!(rupees(1300.5), "1300.50");
    }
}
