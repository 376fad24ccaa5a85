//! API client for communicating with the RideWise server

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

pub use ridewise_lib::health::{HealthResponse, ReadinessResponse};
pub use ridewise_lib::loader::ArtifactInfo;
pub use ridewise_lib::IntentHint;

/// API client for the RideWise server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        Self::send(self.client.get(url)).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        Self::send(self.client.post(url).json(body)).await
    }

    /// GET a probe endpoint whose 503 body is still meaningful
    pub async fn probe<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let url = self.base_url.join(path).context("Invalid path")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, error_message(&body));
        }

        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, error_message(&body));
        }

        response.json().await.context("Failed to parse response")
    }
}

/// The `error` field of a server error body, or the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

// API request and response types

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Body of both prediction endpoints; unset fields use server defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windspeed_kph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_condition: Option<String>,
    pub is_holiday: bool,
    pub is_working_day: bool,
    pub day_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyPrediction {
    pub prediction: f64,
    pub rounded: i64,
    pub imputed: Vec<String>,
    pub by_hour_24: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPrediction {
    pub total: f64,
    pub average: f64,
    pub by_hour: Vec<f64>,
    pub imputed: Vec<String>,
    pub rounded_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<IntentHint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_post_hourly_prediction() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/predict_hourly")
            .match_body(Matcher::PartialJson(json!({
                "target_hour": 8,
                "temperature_c": 12.5,
                "day_type": "Weekday"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "prediction": 212.4,
                    "rounded": 212,
                    "imputed": ["visibility"],
                    "by_hour_24": vec![10.0; 24]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let request = PredictRequest {
            target_hour: Some(8),
            temperature_c: Some(12.5),
            is_working_day: true,
            day_type: "Weekday".into(),
            ..Default::default()
        };
        let result: HourlyPrediction = client
            .post("api/predict_hourly", &request)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.rounded, 212);
        assert_eq!(result.imputed, vec!["visibility".to_string()]);
        assert_eq!(result.by_hour_24.len(), 24);
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let request = PredictRequest {
            is_working_day: true,
            day_type: "Weekend".into(),
            ..Default::default()
        };
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("target_date").is_none());
        assert!(body.get("model_path").is_none());
        assert_eq!(body["day_type"], "Weekend");
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/models/hourly")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"Model file not found at '/srv/models/hourly.json'"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .get::<ArtifactInfo>("api/models/hourly")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("Model file not found at '/srv/models/hourly.json'"));
    }

    #[tokio::test]
    async fn test_chat_hint_serialized() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::Json(json!({
                "message": "bikes then?",
                "hint": {"kind": "daily", "date": "2025-11-25", "hour": null}
            })))
            .with_status(200)
            .with_body(r#"{"reply":"Predicted total bikes on 2025-11-25: 500."}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let request = ChatRequest {
            message: "bikes then?".into(),
            hint: Some(IntentHint {
                kind: Some("daily".into()),
                date: Some("2025-11-25".into()),
                hour: None,
            }),
        };
        let response: ChatResponse = client.post("api/chat", &request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.reply, "Predicted total bikes on 2025-11-25: 500.");
    }

    #[tokio::test]
    async fn test_probe_reads_unavailable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/readyz")
            .with_status(503)
            .with_body(r#"{"ready":false,"reason":"Service not yet initialized"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let (status, body): (StatusCode, ReadinessResponse) = client.probe("readyz").await.unwrap();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.ready);
        assert_eq!(body.reason.as_deref(), Some("Service not yet initialized"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
