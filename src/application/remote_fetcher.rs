// Remote fetcher trait for analytics series access
use crate::domain::analytics::{DailyPoint, KpiSummary, TrendPoint};
use crate::domain::filter::{DailyQuery, Filter};
use async_trait::async_trait;

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Summary KPIs for the filter
    async fn fetch_kpi(&self, filter: &Filter) -> anyhow::Result<KpiSummary>;

    /// Monthly revenue trend across the filter's date range
    async fn fetch_trend(&self, filter: &Filter) -> anyhow::Result<Vec<TrendPoint>>;

    /// Per-day breakdown of a single month
    async fn fetch_daily(&self, query: &DailyQuery) -> anyhow::Result<Vec<DailyPoint>>;
}
