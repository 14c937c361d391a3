// src/http_client.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::api::AttendanceApi;
use crate::dates::format_api_date;
use crate::error::ApiError;
use crate::model::{
    AttendanceRecord, CombinedReport, CombinedReportResponse, DailyAttendanceResponse,
    DirectoryRecord, EmployeeDirectoryEntry, RemainingCreditResponse,
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct HttpApiConfig {
    pub base_url: String,
    /// Sent as `Authorization: Bearer <token>`; an empty token is still sent,
    /// the service answers 401 for it.
    pub auth_token: String,
    pub timeout: Duration,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token: String::new(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

// Error bodies look like `{ "message": "..." }`.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
}

#[derive(Clone)]
pub struct HttpAttendanceApi {
    config: HttpApiConfig,
    base_url: Url,
    http_client: Client,
}

impl HttpAttendanceApi {
    pub fn new(config: HttpApiConfig) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::NetworkUnavailable(format!("Failed to build HTTP client: {}", e)))?;

        // Url::join drops the last path segment unless it ends with '/'
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)?;

        Ok(Self {
            config,
            base_url,
            http_client,
        })
    }

    pub fn endpoint_url(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.join(endpoint.trim_start_matches('/'))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    pub fn build_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.auth_token))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
    }

    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, ApiError> {
        let request = request_builder.build().map_err(|e| {
            error!("Request build failed for '{}': {}", context_msg, e);
            ApiError::InvalidUrl(e.to_string())
        })?;
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let resp = match self.http_client.execute(request).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    "HTTP execution failed before receiving response for '{}' (URL: {}): {}",
                    context_msg, request_url, e
                );
                return Err(ApiError::NetworkUnavailable(e.to_string()));
            }
        };

        let status = resp.status();
        debug!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        if status.is_success() {
            let bytes = resp.bytes().await.map_err(|e| {
                warn!("Failed to read response body for '{}': {}", context_msg, e);
                ApiError::NetworkUnavailable(e.to_string())
            })?;
            return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                error!(
                    "JSON deserialization failed for '{}' (URL: {}): {}",
                    context_msg, request_url, e
                );
                ApiError::from(e)
            });
        }

        let error_body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
        Err(map_error_response(status, &error_body, context_msg))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        context_msg: &str,
    ) -> Result<T, ApiError> {
        let url = self.endpoint_url(endpoint, query)?;
        let request = self.build_request(Method::GET, url);
        self.send_and_deserialize(request, context_msg).await
    }
}

/// Maps a non-success response onto the engine's error kinds.
pub fn map_error_response(status: StatusCode, body: &str, context_msg: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => warn!("Unauthorized response for '{}'", context_msg),
        StatusCode::TOO_MANY_REQUESTS => warn!("Rate limit exceeded for '{}'", context_msg),
        _ => error!(
            "API Error Response for '{}': Status={}, Body='{}'",
            context_msg, status, body
        ),
    }
    let message = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|p| p.message)
        .unwrap_or_else(|| body.to_string());
    ApiError::from_status(status, message)
}

fn window_query(from: NaiveDate, to: NaiveDate) -> [(&'static str, String); 2] {
    [
        ("startDate", format_api_date(from)),
        ("endDate", format_api_date(to)),
    ]
}

#[async_trait]
impl AttendanceApi for HttpAttendanceApi {
    async fn directory(&self) -> Result<Vec<EmployeeDirectoryEntry>, ApiError> {
        let records: Vec<DirectoryRecord> = self.get("emp/details", &[], "employee details").await?;
        info!("Fetched {} employee directory records", records.len());
        Ok(records.into_iter().map(EmployeeDirectoryEntry::from).collect())
    }

    async fn combined_report(
        &self,
        emp_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CombinedReport, ApiError> {
        let endpoint = format!("month/monthwise-report/{}", emp_id);
        let response: CombinedReportResponse = self
            .get(&endpoint, &window_query(from, to), "month-wise report")
            .await?;
        Ok(CombinedReport::from(response))
    }

    async fn remaining_credit(
        &self,
        emp_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<f64, ApiError> {
        let endpoint = format!("leaves/remaining-cl/{}", emp_id);
        let response: RemainingCreditResponse = self
            .get(&endpoint, &window_query(from, to), "remaining leave credit")
            .await?;
        Ok(response.remaining_cl.unwrap_or(0.0))
    }

    async fn daily_attendance(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, ApiError> {
        let endpoint = format!("attendance/get/byDate/{}", format_api_date(date));
        let response: DailyAttendanceResponse =
            self.get(&endpoint, &[], "daily attendance").await?;
        Ok(response.into_records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client(base_url: &str) -> HttpAttendanceApi {
        HttpAttendanceApi::new(HttpApiConfig {
            base_url: base_url.to_string(),
            auth_token: "test_token".to_string(),
            timeout: Duration::from_secs(5),
        })
        .expect("Failed to create test client")
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let client = create_test_client("https://reports.example.com/api");
        let from = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();

        let url = client
            .endpoint_url("month/monthwise-report/42", &window_query(from, to))
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://reports.example.com/api/month/monthwise-report/42?startDate=2024-01-15&endDate=2024-02-10"
        );
    }

    #[test]
    fn test_build_request_sets_bearer_token() {
        let client = create_test_client("https://reports.example.com/");
        let url = client.endpoint_url("/emp/details", &[]).unwrap();
        let request = client.build_request(Method::GET, url).build().unwrap();

        assert_eq!(request.url().as_str(), "https://reports.example.com/emp/details");
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer test_token"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = HttpAttendanceApi::new(HttpApiConfig {
            base_url: "not a url".to_string(),
            ..HttpApiConfig::default()
        });
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_map_error_response() {
        assert_eq!(
            map_error_response(StatusCode::UNAUTHORIZED, "", "test"),
            ApiError::Unauthorized
        );
        assert_eq!(
            map_error_response(StatusCode::TOO_MANY_REQUESTS, "slow down", "test"),
            ApiError::RateLimited
        );
        assert_eq!(
            map_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"message": "database offline"}"#,
                "test"
            ),
            ApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "database offline".to_string(),
            }
        );
        assert_eq!(
            map_error_response(StatusCode::NOT_FOUND, "plain text", "test"),
            ApiError::Status {
                status: StatusCode::NOT_FOUND,
                message: "plain text".to_string(),
            }
        );
    }
}
