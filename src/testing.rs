// Test doubles shared by the unit tests
use crate::application::ports::{Clock, Notifier};
use crate::application::remote_fetcher::RemoteFetcher;
use crate::domain::analytics::{DailyPoint, KpiSummary, TrendPoint};
use crate::domain::filter::{DailyQuery, Filter};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted fetcher: counts calls, sleeps on tokio time, fails on demand.
pub struct FakeFetcher {
    pub kpi_calls: AtomicUsize,
    pub trend_calls: AtomicUsize,
    pub daily_calls: AtomicUsize,
    pub fail_kpi: AtomicBool,
    pub fail_trend: AtomicBool,
    pub fail_daily: AtomicBool,
    pub delay: Duration,
    /// Per-call KPI delays in milliseconds, consumed front to back
    pub kpi_delays: Mutex<VecDeque<u64>>,
    pub trend: Mutex<Vec<TrendPoint>>,
    pub kpi_filters: Mutex<Vec<Filter>>,
    pub daily_queries: Mutex<Vec<DailyQuery>>,
}

impl FakeFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            kpi_calls: AtomicUsize::new(0),
            trend_calls: AtomicUsize::new(0),
            daily_calls: AtomicUsize::new(0),
            fail_kpi: AtomicBool::new(false),
            fail_trend: AtomicBool::new(false),
            fail_daily: AtomicBool::new(false),
            delay,
            kpi_delays: Mutex::new(VecDeque::new()),
            trend: Mutex::new(vec![
                TrendPoint::new("2024-01", Some(1200.0)),
                TrendPoint::new("2024-02", None),
                TrendPoint::new("2024-03", Some(0.0)),
            ]),
            kpi_filters: Mutex::new(Vec::new()),
            daily_queries: Mutex::new(Vec::new()),
        }
    }

    pub fn kpi_calls(&self) -> usize {
        self.kpi_calls.load(Ordering::SeqCst)
    }

    pub fn trend_calls(&self) -> usize {
        self.trend_calls.load(Ordering::SeqCst)
    }

    pub fn daily_calls(&self) -> usize {
        self.daily_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFetcher for FakeFetcher {
    async fn fetch_kpi(&self, filter: &Filter) -> anyhow::Result<KpiSummary> {
        let call = self.kpi_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.kpi_filters.lock().unwrap().push(filter.clone());
        let delay = self
            .kpi_delays
            .lock()
            .unwrap()
            .pop_front()
            .map_or(self.delay, Duration::from_millis);
        tokio::time::sleep(delay).await;

        if self.fail_kpi.load(Ordering::SeqCst) {
            anyhow::bail!("kpi backend unavailable");
        }
        Ok(KpiSummary {
            total_revenue: call as f64,
            order_count: call as u64,
            average_order_value: 1.0,
            customer_count: 1,
        })
    }

    async fn fetch_trend(&self, _filter: &Filter) -> anyhow::Result<Vec<TrendPoint>> {
        self.trend_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.fail_trend.load(Ordering::SeqCst) {
            anyhow::bail!("trend backend unavailable");
        }
        Ok(self.trend.lock().unwrap().clone())
    }

    async fn fetch_daily(&self, query: &DailyQuery) -> anyhow::Result<Vec<DailyPoint>> {
        self.daily_calls.fetch_add(1, Ordering::SeqCst);
        self.daily_queries.lock().unwrap().push(query.clone());
        tokio::time::sleep(self.delay).await;

        if self.fail_daily.load(Ordering::SeqCst) {
            anyhow::bail!("daily backend unavailable");
        }
        let date = format!("{:04}-{:02}-01", query.year, query.month);
        Ok(vec![DailyPoint::new(date, 10.0, 1)])
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub warnings: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now_ms: AtomicI64,
    today: NaiveDate,
}

impl ManualClock {
    pub fn new(now_ms: i64, today: NaiveDate) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
            today,
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
