// Analytics series payloads as returned by the remote API
use serde::Deserialize;

/// Summary figures for the selected filter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub total_revenue: f64,
    pub order_count: u64,
    pub average_order_value: f64,
    pub customer_count: u64,
}

/// One month of the revenue trend.
///
/// `revenue` is `None` when no orders were placed in the period, which is
/// distinct from a period that sold for zero.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period: String,
    pub revenue: Option<f64>,
    #[serde(default)]
    pub order_count: Option<u64>,
}

impl TrendPoint {
    pub fn new(period: impl Into<String>, revenue: Option<f64>) -> Self {
        Self {
            period: period.into(),
            revenue,
            order_count: None,
        }
    }
}

/// One day of the per-month breakdown.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: String,
    pub revenue: f64,
    pub order_count: u64,
    #[serde(default)]
    pub average_order_value: Option<f64>,
}

impl DailyPoint {
    pub fn new(date: impl Into<String>, revenue: f64, order_count: u64) -> Self {
        Self {
            date: date.into(),
            revenue,
            order_count,
            average_order_value: None,
        }
    }
}
