// View models - Pure projections of series data for display
use crate::application::engine::DashboardSnapshot;
use crate::application::normalizer::{parse_iso_date, parse_period};
use crate::domain::analytics::{DailyPoint, KpiSummary, TrendPoint};
use crate::domain::filter::MonthSelection;
use crate::presentation::format::{NumberFormat, PLACEHOLDER};
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiCard {
    pub label: String,
    pub value: String,
}

impl KpiCard {
    fn new(label: &str, value: String) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendBar {
    pub period: String,
    /// 0 when the period could not be parsed
    pub year: i32,
    /// 0 when the period could not be parsed
    pub month: u32,
    pub label: String,
    pub revenue: Option<f64>,
    pub value: String,
    pub has_data: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRow {
    pub date: String,
    /// 0 when the date could not be parsed
    pub day: u32,
    pub revenue: String,
    pub orders: String,
    pub average_order_value: String,
}

const KPI_LABELS: [&str; 4] = ["Revenue", "Orders", "Average order", "Customers"];

pub fn project_kpi(kpi: Option<&KpiSummary>, fmt: &NumberFormat) -> Vec<KpiCard> {
    let Some(kpi) = kpi else {
        return KPI_LABELS
            .iter()
            .map(|label| KpiCard::new(label, PLACEHOLDER.to_string()))
            .collect();
    };

    vec![
        KpiCard::new(KPI_LABELS[0], fmt.format_currency(kpi.total_revenue)),
        KpiCard::new(KPI_LABELS[1], fmt.format_count(kpi.order_count)),
        KpiCard::new(KPI_LABELS[2], fmt.format_currency(kpi.average_order_value)),
        KpiCard::new(KPI_LABELS[3], fmt.format_count(kpi.customer_count)),
    ]
}

pub fn project_trend(
    points: &[TrendPoint],
    active: Option<&MonthSelection>,
    fmt: &NumberFormat,
) -> Vec<TrendBar> {
    points
        .iter()
        .map(|point| {
            let (year, month) = parse_period(&point.period).unwrap_or((0, 0));
            let label = NaiveDate::from_ymd_opt(year, month, 1)
                .filter(|_| year != 0)
                .map_or_else(|| point.period.clone(), |d| d.format("%b %Y").to_string());
            let is_active =
                year != 0 && active.is_some_and(|selection| selection.matches(year, month));

            TrendBar {
                period: point.period.clone(),
                year,
                month,
                label,
                revenue: point.revenue,
                value: fmt.format_optional_currency(point.revenue),
                has_data: point.revenue.is_some(),
                is_active,
            }
        })
        .collect()
}

pub fn project_daily(points: &[DailyPoint], fmt: &NumberFormat) -> Vec<DailyRow> {
    points
        .iter()
        .map(|point| {
            let day = point
                .date
                .get(..10)
                .and_then(parse_iso_date)
                .map_or(0, |d| d.day());
            let average = point.average_order_value.or_else(|| {
                (point.order_count > 0).then(|| point.revenue / point.order_count as f64)
            });

            DailyRow {
                date: point.date.clone(),
                day,
                revenue: fmt.format_currency(point.revenue),
                orders: fmt.format_count(point.order_count),
                average_order_value: fmt.format_optional_currency(average),
            }
        })
        .collect()
}

/// Everything a dashboard screen renders, derived from one snapshot.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub kpis: Vec<KpiCard>,
    pub trend: Vec<TrendBar>,
    pub daily: Vec<DailyRow>,
    pub active_month: Option<String>,
    pub is_refreshing: bool,
    pub last_refreshed_at: Option<i64>,
    pub errors: Vec<String>,
}

impl DashboardView {
    pub fn from_snapshot(snapshot: &DashboardSnapshot, fmt: &NumberFormat) -> Self {
        let trend = snapshot.trend.data.as_deref().unwrap_or_default();
        let daily = if snapshot.month.is_some() {
            project_daily(snapshot.daily.data.as_deref().unwrap_or_default(), fmt)
        } else {
            Vec::new()
        };

        let errors = [
            &snapshot.refresh.error,
            &snapshot.kpi.error,
            &snapshot.trend.error,
            &snapshot.daily.error,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect();

        Self {
            kpis: project_kpi(snapshot.kpi.data.as_ref(), fmt),
            trend: project_trend(trend, snapshot.month.as_ref(), fmt),
            daily,
            active_month: snapshot.month.as_ref().map(|m| m.label.clone()),
            is_refreshing: snapshot.refresh.is_refreshing,
            last_refreshed_at: snapshot.refresh.last_refreshed_at,
            errors,
        }
    }
}
