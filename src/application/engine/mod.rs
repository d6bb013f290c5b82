// Dashboard engine - Coordinates filters, route, caches and the three series
use crate::application::cache::{daily_cache_key, filter_cache_key, TtlCache};
use crate::application::debounce::Debouncer;
use crate::application::normalizer::{normalize_filters, normalize_month_selection, parse_period};
use crate::application::ports::{Clock, Notifier};
use crate::application::remote_fetcher::RemoteFetcher;
use crate::application::route_sync::{decode_route, RouteAdapter, RouteParams, RouteSynchronizer};
use crate::domain::analytics::{DailyPoint, KpiSummary, TrendPoint};
use crate::domain::filter::{DailyQuery, Filter, MonthSelection, RawFilter};
use crate::domain::state::{DataState, ManualRefreshState};
use futures::future::{join, join3};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Settle interval for filter and month changes
    pub debounce: Duration,
    /// Lifetime of cached series responses
    pub cache_ttl_ms: i64,
    /// Window in which a non-forced manual refresh is skipped
    pub refresh_ttl_ms: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            cache_ttl_ms: 90_000,
            refresh_ttl_ms: 90_000,
        }
    }
}

/// Collaborators the engine is wired to.
pub struct EngineDeps {
    pub fetcher: Arc<dyn RemoteFetcher>,
    pub route: Arc<dyn RouteAdapter>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    /// "May this user filter analytics by customer", re-evaluated on change
    pub entitlement: watch::Receiver<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Kpi,
    Trend,
    Daily,
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Series::Kpi => write!(f, "KPIs"),
            Series::Trend => write!(f, "monthly trend"),
            Series::Daily => write!(f, "daily breakdown"),
        }
    }
}

/// Point-in-time copy of everything a view needs.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub filter: Filter,
    pub month: Option<MonthSelection>,
    pub kpi: DataState<KpiSummary>,
    pub trend: DataState<Vec<TrendPoint>>,
    pub daily: DataState<Vec<DailyPoint>>,
    pub refresh: ManualRefreshState,
}

struct SeriesSlot<T> {
    state: DataState<T>,
    cache: TtlCache<T>,
    /// Bumped on every request; responses carrying an older token are dropped.
    token: u64,
}

impl<T: Clone> SeriesSlot<T> {
    fn new(name: &'static str) -> Self {
        Self {
            state: DataState::default(),
            cache: TtlCache::new(name),
            token: 0,
        }
    }

    fn next_token(&mut self) -> u64 {
        self.token += 1;
        self.token
    }
}

struct EngineState {
    filter: Filter,
    month: Option<MonthSelection>,
    can_filter_by_customer: bool,
    kpi: SeriesSlot<KpiSummary>,
    trend: SeriesSlot<Vec<TrendPoint>>,
    daily: SeriesSlot<Vec<DailyPoint>>,
    refresh: ManualRefreshState,
    last_debounced_filter: Option<Filter>,
}

type SlotSelector<T> = fn(&mut EngineState) -> &mut SeriesSlot<T>;

pub struct DashboardEngine {
    fetcher: Arc<dyn RemoteFetcher>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    route: RouteSynchronizer,
    state: Mutex<EngineState>,
    filter_debounce: Debouncer,
    daily_debounce: Debouncer,
    entitlement_watch: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl DashboardEngine {
    /// Build an engine from the current route and start the initial load.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> Arc<Self> {
        let EngineDeps {
            fetcher,
            route,
            notifier,
            clock,
            entitlement,
        } = deps;

        let can_filter_by_customer = *entitlement.borrow();
        let route = RouteSynchronizer::new(route);
        let initial = decode_route(&route.current(), None, can_filter_by_customer, clock.today());

        let state = EngineState {
            filter: initial.filter,
            month: initial.month,
            can_filter_by_customer,
            kpi: SeriesSlot::new("kpi"),
            trend: SeriesSlot::new("trend"),
            daily: SeriesSlot::new("daily"),
            refresh: ManualRefreshState::new(settings.refresh_ttl_ms),
            last_debounced_filter: None,
        };

        let engine = Arc::new(Self {
            fetcher,
            notifier,
            clock,
            filter_debounce: Debouncer::new(settings.debounce),
            daily_debounce: Debouncer::new(settings.debounce),
            settings,
            route,
            state: Mutex::new(state),
            entitlement_watch: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        info!(
            filter = ?engine.filters(),
            month = ?engine.active_month(),
            "Dashboard engine initialized from route"
        );

        engine.sync_route();
        engine.watch_entitlement(entitlement);
        engine.schedule_filter_fetch();
        if engine.active_month().is_some() {
            engine.schedule_daily_fetch();
        }

        engine
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn filters(&self) -> Filter {
        self.lock().filter.clone()
    }

    pub fn active_month(&self) -> Option<MonthSelection> {
        self.lock().month.clone()
    }

    pub fn kpi(&self) -> DataState<KpiSummary> {
        self.lock().kpi.state.clone()
    }

    pub fn trend(&self) -> DataState<Vec<TrendPoint>> {
        self.lock().trend.state.clone()
    }

    pub fn daily(&self) -> DataState<Vec<DailyPoint>> {
        self.lock().daily.state.clone()
    }

    pub fn refresh_state(&self) -> ManualRefreshState {
        self.lock().refresh.clone()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.lock();
        DashboardSnapshot {
            filter: state.filter.clone(),
            month: state.month.clone(),
            kpi: state.kpi.state.clone(),
            trend: state.trend.state.clone(),
            daily: state.daily.state.clone(),
            refresh: state.refresh.clone(),
        }
    }

    /// Apply user-edited filters.
    pub fn set_filters(self: &Arc<Self>, raw: RawFilter) {
        if self.is_disposed() {
            return;
        }

        let today = self.clock.today();
        let (collapsed, changed, refetch_daily) = {
            let mut state = self.lock();
            let normalized =
                normalize_filters(&raw, Some(&state.filter), state.can_filter_by_customer, today);

            if normalized.filter == state.filter {
                (normalized.range_collapsed, false, false)
            } else {
                if !normalized.filter.same_range(&state.filter) {
                    clear_month_locked(&mut state);
                }
                state.filter = normalized.filter;
                (normalized.range_collapsed, true, state.month.is_some())
            }
        };

        if collapsed {
            self.notifier
                .warn("Start date was after end date; the range was collapsed to a single day");
        }
        if !changed {
            return;
        }

        debug!(filter = ?self.filters(), "Filters changed");
        self.sync_route();
        self.schedule_filter_fetch();
        if refetch_daily {
            self.schedule_daily_fetch();
        }
    }

    /// Drill into one month of the loaded trend.
    ///
    /// Rejected with a warning unless the trend has a non-null value for
    /// exactly that period.
    pub fn select_month(self: &Arc<Self>, year: i32, month: u32) -> bool {
        if self.is_disposed() {
            return false;
        }

        let Some(selection) = normalize_month_selection(Some(year), Some(month)) else {
            self.notifier.warn("Select a valid month");
            return false;
        };

        let changed = {
            let mut state = self.lock();
            let has_data = state.trend.state.data.as_ref().is_some_and(|points| {
                points
                    .iter()
                    .any(|p| p.revenue.is_some() && parse_period(&p.period) == Some((year, month)))
            });

            if !has_data {
                drop(state);
                self.notifier
                    .warn(&format!("No data available for {}", selection.label));
                return false;
            }

            if state.month.as_ref() == Some(&selection) {
                false
            } else {
                state.month = Some(selection);
                true
            }
        };

        if changed {
            self.sync_route();
            self.schedule_daily_fetch();
        }
        true
    }

    pub fn clear_month(&self) {
        if self.is_disposed() {
            return;
        }

        let changed = {
            let mut state = self.lock();
            let had_month = state.month.is_some();
            clear_month_locked(&mut state);
            had_month
        };
        if changed {
            self.daily_debounce.cancel();
            self.sync_route();
        }
    }

    /// Route -> Model. Called when the address changes outside the engine
    /// (back/forward, deep link).
    pub fn on_route_changed(self: &Arc<Self>, params: &RouteParams) {
        if self.is_disposed() {
            return;
        }

        let _inbound = self.route.begin_inbound();
        let today = self.clock.today();

        let (filter_changed, refetch_daily) = {
            let mut state = self.lock();
            let decoded = decode_route(
                params,
                Some(&state.filter),
                state.can_filter_by_customer,
                today,
            );

            let filter_changed = decoded.filter != state.filter;
            let month_changed = decoded.month != state.month;
            if !filter_changed && !month_changed {
                return;
            }

            state.filter = decoded.filter;
            if decoded.month.is_none() {
                clear_month_locked(&mut state);
            } else {
                state.month = decoded.month;
            }
            let refetch_daily = state.month.is_some() && (month_changed || filter_changed);
            (filter_changed, refetch_daily)
        };

        debug!(filter = ?self.filters(), month = ?self.active_month(), "Applied route update");
        // Writes are suppressed by the inbound guard for the rest of this call.
        self.sync_route();

        if filter_changed {
            self.schedule_filter_fetch();
        }
        if refetch_daily {
            self.schedule_daily_fetch();
        } else if self.active_month().is_none() {
            self.daily_debounce.cancel();
        }
    }

    /// React to a change of the customer-filter entitlement.
    pub fn apply_entitlement(self: &Arc<Self>, allowed: bool) {
        if self.is_disposed() {
            return;
        }

        let (stripped, refetch_daily) = {
            let mut state = self.lock();
            state.can_filter_by_customer = allowed;
            if !allowed && state.filter.customer_id.is_some() {
                state.filter = state.filter.without_customer();
                (true, state.month.is_some())
            } else {
                (false, false)
            }
        };

        if !allowed {
            self.sync_route();
        }
        if stripped {
            info!("Customer filter removed after entitlement was revoked");
            self.schedule_filter_fetch();
            if refetch_daily {
                self.schedule_daily_fetch();
            }
        }
    }

    /// Single-flight manual refresh of every series.
    ///
    /// Skipped while another refresh is running, and (unless `force`) while
    /// the previous successful refresh is younger than the refresh TTL.
    pub async fn refresh_all(&self, force: bool) {
        if self.is_disposed() {
            return;
        }

        let now = self.clock.now_ms();
        let month_selected = {
            let mut state = self.lock();
            if state.refresh.is_refreshing {
                debug!("Refresh already in flight");
                return;
            }
            if !force && state.refresh.is_fresh(now) {
                debug!("Skipping refresh, data is still fresh");
                return;
            }
            state.refresh.is_refreshing = true;
            state.month.is_some()
        };
        let in_flight = RefreshInFlight { engine: self };

        let daily = async {
            if month_selected {
                Some(self.fetch_daily(force, false).await)
            } else {
                None
            }
        };
        let (kpi, trend, daily) =
            join3(self.fetch_kpi(force, false), self.fetch_trend(force, false), daily).await;

        let mut succeeded = 0;
        let mut failed = Vec::new();
        for result in [Some(kpi), Some(trend), daily].into_iter().flatten() {
            match result {
                Ok(()) => succeeded += 1,
                Err(series) => failed.push(series.to_string()),
            }
        }

        let aggregate = (!failed.is_empty())
            .then(|| format!("Refresh failed for {}", failed.join(", ")));

        {
            let mut state = self.lock();
            if succeeded > 0 {
                state.refresh.last_refreshed_at = Some(self.clock.now_ms());
            }
            state.refresh.error = aggregate.clone();
        }
        drop(in_flight);

        match aggregate {
            Some(message) => self.notifier.error(&message),
            None => info!(series = succeeded, "Dashboard refreshed"),
        }
    }

    pub async fn load_kpi(&self, force: bool) {
        if self.is_disposed() {
            return;
        }
        let _ = self.fetch_kpi(force, true).await;
    }

    pub async fn load_trend(&self, force: bool) {
        if self.is_disposed() {
            return;
        }
        let _ = self.fetch_trend(force, true).await;
    }

    pub async fn load_daily(&self, force: bool) {
        if self.is_disposed() {
            return;
        }
        let _ = self.fetch_daily(force, true).await;
    }

    /// Cancel pending debounced work and stop reacting to entitlement changes.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.filter_debounce.cancel();
        self.daily_debounce.cancel();
        if let Some(handle) = self
            .entitlement_watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        debug!("Dashboard engine disposed");
    }

    fn sync_route(&self) {
        let (filter, month) = {
            let state = self.lock();
            (state.filter.clone(), state.month.clone())
        };
        self.route.push(&filter, month.as_ref());
    }

    fn watch_entitlement(self: &Arc<Self>, mut entitlement: watch::Receiver<bool>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while entitlement.changed().await.is_ok() {
                let allowed = *entitlement.borrow_and_update();
                let Some(engine) = weak.upgrade() else { break };
                debug!(allowed, "Customer filter entitlement changed");
                engine.apply_entitlement(allowed);
            }
        });
        *self
            .entitlement_watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn schedule_filter_fetch(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }
        let weak = Arc::downgrade(self);
        self.filter_debounce.schedule(async move {
            if let Some(engine) = weak.upgrade() {
                engine.run_filter_fetch().await;
            }
        });
    }

    fn schedule_daily_fetch(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }
        let weak = Arc::downgrade(self);
        self.daily_debounce.schedule(async move {
            if let Some(engine) = weak.upgrade() {
                engine.load_daily(false).await;
            }
        });
    }

    async fn run_filter_fetch(&self) {
        {
            let mut state = self.lock();
            if state.last_debounced_filter.as_ref() == Some(&state.filter) {
                debug!("Filters unchanged since last fetch");
                return;
            }
            state.last_debounced_filter = Some(state.filter.clone());
        }
        join(self.fetch_kpi(false, true), self.fetch_trend(false, true)).await;
    }

    async fn fetch_kpi(&self, force: bool, notify: bool) -> Result<(), Series> {
        let filter = self.filters();
        let key = filter_cache_key(&filter);
        self.load_series(
            Series::Kpi,
            key,
            force,
            notify,
            |s| &mut s.kpi,
            self.fetcher.fetch_kpi(&filter),
        )
        .await
    }

    async fn fetch_trend(&self, force: bool, notify: bool) -> Result<(), Series> {
        let filter = self.filters();
        let key = filter_cache_key(&filter);
        self.load_series(
            Series::Trend,
            key,
            force,
            notify,
            |s| &mut s.trend,
            self.fetcher.fetch_trend(&filter),
        )
        .await
    }

    async fn fetch_daily(&self, force: bool, notify: bool) -> Result<(), Series> {
        let query = {
            let state = self.lock();
            match &state.month {
                Some(month) => DailyQuery::new(month, &state.filter),
                None => return Ok(()),
            }
        };
        let key = daily_cache_key(&query);
        self.load_series(
            Series::Daily,
            key,
            force,
            notify,
            |s| &mut s.daily,
            self.fetcher.fetch_daily(&query),
        )
        .await
    }

    /// Cache-first load of one series. Failures land in that series'
    /// `DataState.error`; previous data is kept.
    async fn load_series<T, F>(
        &self,
        series: Series,
        key: String,
        force: bool,
        notify: bool,
        select: SlotSelector<T>,
        fetch: F,
    ) -> Result<(), Series>
    where
        T: Clone,
        F: Future<Output = anyhow::Result<T>>,
    {
        let token = {
            let mut state = self.lock();
            let slot = select(&mut *state);
            if !force {
                if let Some(cached) = slot.cache.get(&key, self.clock.now_ms()) {
                    slot.next_token();
                    slot.state.succeed(cached);
                    return Ok(());
                }
            }
            slot.state.start_loading();
            slot.next_token()
        };

        let result = fetch.await;

        let failure = {
            let mut state = self.lock();
            let slot = select(&mut *state);
            let current = slot.token == token;
            match result {
                Ok(data) => {
                    slot.cache
                        .set(key, data.clone(), self.settings.cache_ttl_ms, self.clock.now_ms());
                    if current {
                        slot.state.succeed(data);
                    } else {
                        debug!(%series, token, "Discarding superseded response");
                    }
                    None
                }
                Err(err) => {
                    let message = format!("Could not load {series}: {err}");
                    if current {
                        slot.state.fail(message.clone());
                    } else {
                        debug!(%series, token, "Discarding superseded failure");
                    }
                    Some(message)
                }
            }
        };

        match failure {
            Some(message) => {
                tracing::warn!(%series, "{message}");
                if notify {
                    self.notifier.error(&message);
                }
                Err(series)
            }
            None => Ok(()),
        }
    }
}

/// Clears the single-flight flag however `refresh_all` ends, including when
/// its future is dropped mid-fetch.
struct RefreshInFlight<'a> {
    engine: &'a DashboardEngine,
}

impl Drop for RefreshInFlight<'_> {
    fn drop(&mut self) {
        self.engine.lock().refresh.is_refreshing = false;
    }
}

fn clear_month_locked(state: &mut EngineState) {
    state.month = None;
    state.daily.next_token();
    state.daily.state.reset();
}

impl Drop for DashboardEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
