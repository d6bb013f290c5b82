// HTTP implementation of the remote fetcher
use crate::application::remote_fetcher::RemoteFetcher;
use crate::domain::analytics::{DailyPoint, KpiSummary, TrendPoint};
use crate::domain::filter::{DailyQuery, Filter};
use crate::infrastructure::error::ApiError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: String, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn build_url(&self, path: &str, params: &[(&str, Option<String>)]) -> String {
        let query: Vec<String> = params
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|v| format!("{}={}", key, urlencoding::encode(v)))
            })
            .collect();

        if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query.join("&"))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to analytics API")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body }.into());
        }

        response
            .json::<T>()
            .await
            .context("Failed to parse analytics API response")
    }
}

fn filter_params(filter: &Filter) -> Vec<(&'static str, Option<String>)> {
    vec![
        ("dateFrom", Some(filter.date_from.format("%Y-%m-%d").to_string())),
        ("dateTo", Some(filter.date_to.format("%Y-%m-%d").to_string())),
        ("customerId", filter.customer_id.clone()),
    ]
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch_kpi(&self, filter: &Filter) -> Result<KpiSummary> {
        let url = self.build_url("/analytics/kpi", &filter_params(filter));
        self.get_json(&url).await
    }

    async fn fetch_trend(&self, filter: &Filter) -> Result<Vec<TrendPoint>> {
        let url = self.build_url("/analytics/trend", &filter_params(filter));
        self.get_json(&url).await
    }

    async fn fetch_daily(&self, query: &DailyQuery) -> Result<Vec<DailyPoint>> {
        let params = [
            ("year", Some(query.year.to_string())),
            ("month", Some(query.month.to_string())),
            ("customerId", query.customer_id.clone()),
        ];
        let url = self.build_url("/analytics/daily", &params);
        self.get_json(&url).await
    }
}
