//! API client for the market service

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{header, multipart, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Non-success response from the service
#[derive(Debug, Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Attach a session token as a bearer credential
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // The service reports failures as {"error": "..."}
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ApiError {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(response)
    }

    /// GET returning JSON
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.get(self.url(path)?)).await?;
        response.json().await.context("Failed to parse response")
    }

    /// POST a JSON body, returning JSON
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send(self.client.post(self.url(path)?).json(body)).await?;
        response.json().await.context("Failed to parse response")
    }

    pub async fn predict(&self, commodity: &str, weeks: Option<usize>) -> Result<PredictResponse> {
        self.post(
            "api/predict",
            &PredictRequest {
                variety: commodity.to_string(),
                weeks,
            },
        )
        .await
    }

    pub async fn commodities(&self) -> Result<CommodityList> {
        self.get("api/commodities").await
    }

    pub async fn chat(&self, message: &str) -> Result<ChatReply> {
        self.post("api/chat", &ChatRequest { message: message.to_string() })
            .await
    }

    pub async fn dashboard(&self, commodity: Option<&str>, district: Option<&str>) -> Result<DashboardData> {
        let mut url = self.url("api/dashboard")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(c) = commodity {
                query.append_pair("commodity", c);
            }
            if let Some(d) = district {
                query.append_pair("district", d);
            }
        }
        let response = self.send(self.client.get(url)).await?;
        response.json().await.context("Failed to parse response")
    }

    pub async fn dashboard_options(&self) -> Result<DashboardOptions> {
        self.get("api/dashboard/options").await
    }

    /// Download filtered market history
    pub async fn export(&self, query: &ExportQuery) -> Result<ExportFile> {
        let response = self
            .send(self.client.get(self.url("api/download")?).query(query))
            .await?;
        let file_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split("filename=").nth(1))
            .map(|name| name.trim_matches('"').to_string())
            .unwrap_or_else(|| format!("market_data.{}", query.format));
        let bytes = response.bytes().await.context("Failed to read export")?;
        Ok(ExportFile {
            file_name,
            bytes: bytes.to_vec(),
        })
    }

    /// Upload a leaf image for classification
    pub async fn diagnose(&self, file_name: &str, bytes: Vec<u8>) -> Result<Diagnosis> {
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        let response = self
            .send(self.client.post(self.url("api/detect_disease")?).multipart(form))
            .await?;
        response.json().await.context("Failed to parse response")
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<MessageResponse> {
        self.post("api/signup", request).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        self.post(
            "api/login",
            &LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            },
        )
        .await
    }

    pub async fn logout(&self) -> Result<MessageResponse> {
        self.post("api/logout", &serde_json::json!({})).await
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        // 503 still carries a health body
        let response = self
            .client
            .get(self.url("healthz")?)
            .send()
            .await
            .context("Failed to send request")?;
        response.json().await.context("Failed to parse health response")
    }
}

// API request and response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub variety: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weeks: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPrediction {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Min_Price")]
    pub min_price: u32,
    #[serde(rename = "Max_Price")]
    pub max_price: u32,
    #[serde(rename = "Predicted_Modal_Price")]
    pub predicted_modal_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub weekly_predictions: Vec<WeeklyPrediction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commodity {
    pub name: String,
    pub min_price_range: (u32, u32),
    pub max_price_range: (u32, u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommodityList {
    pub commodities: Vec<Commodity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commodity: Option<String>,
    pub format: String,
}

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub modal_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxPoint {
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictAverage {
    pub district: String,
    pub average_modal_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default)]
    pub commodity: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    pub price_series: Vec<PricePoint>,
    pub min_max: Vec<MinMaxPoint>,
    pub top_districts: Vec<DistrictAverage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardOptions {
    pub commodities: Vec<String>,
    pub districts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub disease: String,
    pub confidence: String,
    pub status: String,
    pub advice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_predict_parses_weekly_points() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/predict")
            .match_body(Matcher::Json(serde_json::json!({"variety": "Tomato"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"weekly_predictions":[{"Date":"2024-12-18","Min_Price":1200,"Max_Price":1800,"Predicted_Modal_Price":1543.5}]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client.predict("Tomato", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.weekly_predictions.len(), 1);
        let point = &response.weekly_predictions[0];
        assert_eq!(point.date, NaiveDate::from_ymd_opt(2024, 12, 18).unwrap());
        assert_eq!(point.max_price, 1800);
    }

    #[tokio::test]
    async fn test_error_body_becomes_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/predict")
            .with_status(400)
            .with_body(r#"{"error":"Unknown commodity: Unicorn Fruit"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.predict("Unicorn Fruit", None).await.unwrap_err();
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 400);
        assert_eq!(api.message, "Unknown commodity: Unicorn Fruit");
    }

    #[tokio::test]
    async fn test_token_sent_as_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/logout")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_body(r#"{"message":"Logged out successfully"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url())
            .unwrap()
            .with_token(Some("tok-1".to_string()));
        let response = client.logout().await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.message, "Logged out successfully");
    }

    #[tokio::test]
    async fn test_export_uses_disposition_name() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/download")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("district".into(), "Chennai".into()),
                Matcher::UrlEncoded("format".into(), "json".into()),
            ]))
            .with_status(200)
            .with_header("content-disposition", "attachment; filename=market_data.json")
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let file = client
            .export(&ExportQuery {
                district: Some("Chennai".to_string()),
                format: "json".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(file.file_name, "market_data.json");
        assert_eq!(file.bytes, b"[]");
    }

    #[tokio::test]
    async fn test_health_reads_degraded_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body(
                r#"{"status":"unhealthy","components":{"auth":{"status":"unhealthy","message":"down","last_check_timestamp":0}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "unhealthy");
        assert_eq!(health.components["auth"].message.as_deref(), Some("down"));
    }
}
