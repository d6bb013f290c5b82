use super::*;
use crate::application::route_sync::{CUSTOMER_ID, DATE_FROM, MONTH, YEAR};
use crate::infrastructure::memory_route::MemoryRoute;
use crate::infrastructure::query_string::parse_query;
use crate::testing::{FakeFetcher, ManualClock, RecordingNotifier};
use chrono::NaiveDate;
use std::sync::atomic::Ordering;

const START_MS: i64 = 1_700_000_000_000;

struct Harness {
    engine: Arc<DashboardEngine>,
    fetcher: Arc<FakeFetcher>,
    route: Arc<MemoryRoute>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
    entitlement: watch::Sender<bool>,
}

fn harness(query: &str, entitled: bool) -> Harness {
    let fetcher = Arc::new(FakeFetcher::new(Duration::from_millis(50)));
    let route = Arc::new(MemoryRoute::from_query(query));
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(ManualClock::new(
        START_MS,
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
    ));
    let (entitlement, rx) = watch::channel(entitled);

    let engine = DashboardEngine::new(
        EngineDeps {
            fetcher: fetcher.clone(),
            route: route.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
            entitlement: rx,
        },
        EngineSettings::default(),
    );

    Harness {
        engine,
        fetcher,
        route,
        notifier,
        clock,
        entitlement,
    }
}

/// Let debounce timers fire and fake fetches resolve.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(500)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn route_value(route: &MemoryRoute, key: &str) -> Option<String> {
    route.current().get(key).cloned()
}

#[tokio::test(start_paused = true)]
async fn test_initial_state_comes_from_route() {
    let h = harness("?dateFrom=2024-01-01&dateTo=2024-03-31&year=2024&month=1&tab=sales", false);

    let filter = h.engine.filters();
    assert_eq!(filter.date_from, date("2024-01-01"));
    assert_eq!(filter.date_to, date("2024-03-31"));
    assert_eq!(h.engine.active_month().map(|m| m.month), Some(1));

    settle().await;

    assert!(h.engine.kpi().data.is_some());
    assert!(h.engine.trend().data.is_some());
    assert!(h.engine.daily().data.is_some());
    assert_eq!(h.fetcher.daily_calls(), 1);
    assert_eq!(route_value(&h.route, "tab").as_deref(), Some("sales"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_route_defaults_to_current_year() {
    let h = harness("", false);

    assert_eq!(h.engine.filters(), Filter::default_for_year(2024));
    assert_eq!(h.route.query(), "?dateFrom=2024-01-01&dateTo=2024-12-31");
}

#[tokio::test(start_paused = true)]
async fn test_customer_dropped_without_entitlement() {
    let h = harness("", false);
    settle().await;

    h.engine
        .set_filters(RawFilter::new("2024-01-01", "2024-03-31", Some("c1")));
    assert_eq!(h.engine.filters().customer_id, None);
    assert_eq!(route_value(&h.route, CUSTOMER_ID), None);

    settle().await;
    let last = h.fetcher.kpi_filters.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.customer_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_customer_round_trips_with_entitlement() {
    let h = harness("?dateFrom=2024-01-01&dateTo=2024-03-31&customerId=c1", true);

    let filter = h.engine.filters();
    assert_eq!(filter.customer_id.as_deref(), Some("c1"));
    assert_eq!(
        h.route.query(),
        "?customerId=c1&dateFrom=2024-01-01&dateTo=2024-03-31"
    );
}

#[tokio::test(start_paused = true)]
async fn test_reversed_range_collapses_with_warning() {
    let h = harness("", false);

    h.engine.set_filters(RawFilter::new("2024-12-31", "2024-01-01", None));

    let filter = h.engine.filters();
    assert_eq!(filter.date_from, date("2024-12-31"));
    assert_eq!(filter.date_to, date("2024-12-31"));
    assert_eq!(h.notifier.warnings().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_filter_changes_are_debounced() {
    let h = harness("", false);
    settle().await;
    assert_eq!(h.fetcher.kpi_calls(), 1);

    for (from, to) in [
        ("2024-01-01", "2024-01-31"),
        ("2024-02-01", "2024-02-29"),
        ("2024-03-01", "2024-03-31"),
    ] {
        h.engine.set_filters(RawFilter::new(from, to, None));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    settle().await;

    assert_eq!(h.fetcher.kpi_calls(), 2);
    assert_eq!(h.fetcher.trend_calls(), 2);
    let last = h.fetcher.kpi_filters.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.date_from, date("2024-03-01"));
}

#[tokio::test(start_paused = true)]
async fn test_settling_on_same_filter_skips_fetch() {
    let h = harness("", false);
    settle().await;

    h.engine.set_filters(RawFilter::new("2024-01-01", "2024-01-31", None));
    h.engine.set_filters(RawFilter::new("2024-01-01", "2024-12-31", None));
    settle().await;

    assert_eq!(h.fetcher.kpi_calls(), 1);
    assert_eq!(h.fetcher.trend_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_until_ttl_expires() {
    let h = harness("", false);
    settle().await;

    h.engine.set_filters(RawFilter::new("2024-01-01", "2024-01-31", None));
    settle().await;
    assert_eq!(h.fetcher.kpi_calls(), 2);

    h.engine.set_filters(RawFilter::new("2024-01-01", "2024-12-31", None));
    settle().await;
    assert_eq!(h.fetcher.kpi_calls(), 2);
    assert_eq!(h.engine.kpi().data.map(|k| k.total_revenue), Some(1.0));

    h.clock.advance(90_001);
    h.engine.set_filters(RawFilter::new("2024-01-01", "2024-01-31", None));
    settle().await;
    assert_eq!(h.fetcher.kpi_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_forced_refresh_is_single_flight() {
    let h = harness("", false);
    settle().await;

    tokio::join!(h.engine.refresh_all(true), h.engine.refresh_all(true));

    assert_eq!(h.fetcher.kpi_calls(), 2);
    assert_eq!(h.fetcher.trend_calls(), 2);
    assert_eq!(h.fetcher.daily_calls(), 0);
    let refresh = h.engine.refresh_state();
    assert!(!refresh.is_refreshing);
    assert_eq!(refresh.last_refreshed_at, Some(START_MS));
}

#[tokio::test(start_paused = true)]
async fn test_unforced_refresh_respects_ttl() {
    let h = harness("", false);
    settle().await;

    h.engine.refresh_all(true).await;
    assert_eq!(h.fetcher.kpi_calls(), 2);

    h.engine.refresh_all(false).await;
    assert_eq!(h.fetcher.kpi_calls(), 2);

    h.clock.advance(90_001);
    h.engine.refresh_all(false).await;
    assert_eq!(h.fetcher.kpi_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_partial_failure_keeps_stale_data() {
    let h = harness("", false);
    settle().await;
    let previous_trend = h.engine.trend().data;
    assert!(previous_trend.is_some());

    h.fetcher.fail_trend.store(true, Ordering::SeqCst);
    h.engine.refresh_all(true).await;

    let kpi = h.engine.kpi();
    assert_eq!(kpi.error, None);
    assert!(kpi.data.is_some());

    let trend = h.engine.trend();
    assert!(trend.error.is_some());
    assert_eq!(trend.data, previous_trend);

    let refresh = h.engine.refresh_state();
    assert!(refresh.error.as_deref().unwrap().contains("monthly trend"));
    assert_eq!(refresh.last_refreshed_at, Some(START_MS));
    assert_eq!(h.notifier.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_total_failure_does_not_mark_refreshed() {
    let h = harness("", false);
    h.fetcher.fail_kpi.store(true, Ordering::SeqCst);
    h.fetcher.fail_trend.store(true, Ordering::SeqCst);
    settle().await;
    assert_eq!(h.notifier.errors().len(), 2);

    h.engine.refresh_all(true).await;

    let refresh = h.engine.refresh_state();
    assert_eq!(refresh.last_refreshed_at, None);
    assert!(refresh.error.is_some());
    assert_eq!(h.notifier.errors().len(), 3);
    assert!(h.engine.kpi().data.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_with_month_includes_daily() {
    let h = harness("?year=2024&month=1", false);
    settle().await;
    assert_eq!(h.fetcher.daily_calls(), 1);
    let previous_daily = h.engine.daily().data;
    assert!(previous_daily.is_some());

    h.fetcher.fail_daily.store(true, Ordering::SeqCst);
    let started = tokio::time::Instant::now();
    h.engine.refresh_all(true).await;

    // All three series are fetched side by side, not one after another.
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(h.fetcher.kpi_calls(), 2);
    assert_eq!(h.fetcher.trend_calls(), 2);
    assert_eq!(h.fetcher.daily_calls(), 2);

    assert_eq!(h.engine.kpi().error, None);
    assert_eq!(h.engine.trend().error, None);
    let daily = h.engine.daily();
    assert!(daily.error.is_some());
    assert_eq!(daily.data, previous_daily);

    let refresh = h.engine.refresh_state();
    assert_eq!(refresh.error.as_deref(), Some("Refresh failed for daily breakdown"));
    assert_eq!(refresh.last_refreshed_at, Some(START_MS));
    assert_eq!(h.notifier.errors(), vec!["Refresh failed for daily breakdown".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_refresh_can_run_again() {
    let h = harness("", false);
    settle().await;
    assert_eq!(h.fetcher.kpi_calls(), 1);

    let timed_out = tokio::time::timeout(Duration::from_millis(10), h.engine.refresh_all(true)).await;
    assert!(timed_out.is_err());
    assert_eq!(h.fetcher.kpi_calls(), 2);
    assert!(!h.engine.refresh_state().is_refreshing);

    settle().await;
    h.engine.refresh_all(true).await;

    assert_eq!(h.fetcher.kpi_calls(), 3);
    let refresh = h.engine.refresh_state();
    assert!(!refresh.is_refreshing);
    assert_eq!(refresh.last_refreshed_at, Some(START_MS));
    assert!(!h.engine.kpi().is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_debounced_failure_notifies_and_keeps_data() {
    let h = harness("", false);
    settle().await;

    h.fetcher.fail_kpi.store(true, Ordering::SeqCst);
    h.engine.set_filters(RawFilter::new("2024-02-01", "2024-02-29", None));
    settle().await;

    let kpi = h.engine.kpi();
    assert!(kpi.error.is_some());
    assert_eq!(kpi.data.map(|k| k.total_revenue), Some(1.0));
    assert!(h.engine.trend().error.is_none());
    assert_eq!(h.notifier.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_month_selection_requires_trend_value() {
    let h = harness("", false);
    settle().await;

    assert!(!h.engine.select_month(2024, 2));
    assert!(!h.engine.select_month(2024, 5));
    assert!(!h.engine.select_month(2024, 13));
    assert_eq!(h.engine.active_month(), None);
    assert_eq!(h.notifier.warnings().len(), 3);

    assert!(h.engine.select_month(2024, 3));
    assert_eq!(route_value(&h.route, YEAR).as_deref(), Some("2024"));
    assert_eq!(route_value(&h.route, MONTH).as_deref(), Some("3"));

    settle().await;
    assert_eq!(h.fetcher.daily_calls(), 1);
    assert_eq!(h.engine.daily().data.map(|d| d.len()), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_month_selection_rejected_before_trend_loads() {
    let h = harness("", false);
    assert!(!h.engine.select_month(2024, 1));
    assert_eq!(h.engine.active_month(), None);
}

#[tokio::test(start_paused = true)]
async fn test_range_change_clears_month() {
    let h = harness("", false);
    settle().await;
    assert!(h.engine.select_month(2024, 1));
    settle().await;

    h.engine.set_filters(RawFilter::new("2024-01-01", "2024-06-30", None));

    assert_eq!(h.engine.active_month(), None);
    assert!(h.engine.daily().is_idle());
    assert_eq!(route_value(&h.route, YEAR), None);
    assert_eq!(route_value(&h.route, MONTH), None);
}

#[tokio::test(start_paused = true)]
async fn test_customer_change_keeps_month_and_refetches_daily() {
    let h = harness("", true);
    settle().await;
    assert!(h.engine.select_month(2024, 1));
    settle().await;
    assert_eq!(h.fetcher.daily_calls(), 1);

    h.engine
        .set_filters(RawFilter::new("2024-01-01", "2024-12-31", Some("c7")));
    settle().await;

    assert!(h.engine.active_month().is_some());
    assert_eq!(h.fetcher.daily_calls(), 2);
    let last = h.fetcher.daily_queries.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.customer_id.as_deref(), Some("c7"));
}

#[tokio::test(start_paused = true)]
async fn test_clear_month() {
    let h = harness("?year=2024&month=1", false);
    settle().await;
    assert!(h.engine.daily().data.is_some());

    h.engine.clear_month();

    assert_eq!(h.engine.active_month(), None);
    assert!(h.engine.daily().is_idle());
    assert_eq!(route_value(&h.route, MONTH), None);
}

#[tokio::test(start_paused = true)]
async fn test_route_update_does_not_write_back() {
    let h = harness("", false);
    settle().await;
    let writes = h.route.write_count();

    let params = parse_query("?dateFrom=2024-02-01&dateTo=2024-02-29&year=2024&month=2&tab=x");
    h.route.navigate(params.clone());
    h.engine.on_route_changed(&params);

    let filter = h.engine.filters();
    assert_eq!(filter.date_from, date("2024-02-01"));
    assert_eq!(h.engine.active_month().map(|m| m.month), Some(2));
    assert_eq!(h.route.write_count(), writes);

    settle().await;
    assert_eq!(h.fetcher.kpi_calls(), 2);
    assert_eq!(h.fetcher.daily_calls(), 1);

    h.engine.on_route_changed(&params);
    settle().await;
    assert_eq!(h.fetcher.kpi_calls(), 2);
    assert_eq!(h.route.write_count(), writes);
}

#[tokio::test(start_paused = true)]
async fn test_route_update_without_month_clears_selection() {
    let h = harness("?year=2024&month=1", false);
    settle().await;

    let mut params = h.route.current();
    params.remove(YEAR);
    params.remove(MONTH);
    h.engine.on_route_changed(&params);

    assert_eq!(h.engine.active_month(), None);
    assert_eq!(route_value(&h.route, DATE_FROM).as_deref(), Some("2024-01-01"));
}

#[tokio::test(start_paused = true)]
async fn test_revoked_entitlement_strips_customer() {
    let h = harness("?customerId=c1", true);
    settle().await;
    assert_eq!(h.engine.filters().customer_id.as_deref(), Some("c1"));

    h.entitlement.send(false).unwrap();
    settle().await;

    assert_eq!(h.engine.filters().customer_id, None);
    assert_eq!(route_value(&h.route, CUSTOMER_ID), None);
    assert_eq!(h.fetcher.kpi_calls(), 2);
    let last = h.fetcher.kpi_filters.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.customer_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_response_is_discarded() {
    let h = harness("", false);
    settle().await;
    h.fetcher.kpi_delays.lock().unwrap().extend([500, 10]);

    let second = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.engine.load_kpi(true).await;
    };
    tokio::join!(h.engine.load_kpi(true), second);

    assert_eq!(h.fetcher.kpi_calls(), 3);
    let kpi = h.engine.kpi();
    assert_eq!(kpi.data.map(|k| k.total_revenue), Some(3.0));
    assert!(!kpi.is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_cancels_pending_work() {
    let h = harness("", false);
    h.engine.dispose();
    settle().await;

    assert_eq!(h.fetcher.kpi_calls(), 0);

    h.engine.set_filters(RawFilter::new("2024-02-01", "2024-02-29", None));
    settle().await;
    assert_eq!(h.fetcher.kpi_calls(), 0);
    assert_eq!(h.engine.filters(), Filter::default_for_year(2024));
}

#[tokio::test(start_paused = true)]
async fn test_disposed_engine_ignores_refresh_and_clear() {
    let h = harness("?year=2024&month=1", false);
    settle().await;
    let writes = h.route.write_count();
    let calls = (h.fetcher.kpi_calls(), h.fetcher.trend_calls(), h.fetcher.daily_calls());

    h.engine.dispose();
    h.engine.refresh_all(true).await;
    h.engine.load_kpi(true).await;
    h.engine.load_trend(true).await;
    h.engine.load_daily(true).await;
    h.engine.clear_month();
    settle().await;

    assert_eq!(
        (h.fetcher.kpi_calls(), h.fetcher.trend_calls(), h.fetcher.daily_calls()),
        calls
    );
    assert_eq!(h.route.write_count(), writes);
    assert_eq!(h.engine.active_month().map(|m| m.month), Some(1));
    assert_eq!(h.engine.refresh_state().last_refreshed_at, None);
}
