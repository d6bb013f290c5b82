// Route synchronizer - Keeps the filter and the address query string convergent
use crate::application::normalizer::{normalize_filters, parse_month_selection};
use crate::domain::filter::{Filter, MonthSelection, RawFilter};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub const DATE_FROM: &str = "dateFrom";
pub const DATE_TO: &str = "dateTo";
pub const CUSTOMER_ID: &str = "customerId";
pub const YEAR: &str = "year";
pub const MONTH: &str = "month";

/// Decoded query parameters of the navigable address.
pub type RouteParams = BTreeMap<String, String>;

/// Keys to set (`Some`) or remove (`None`) from the current params.
pub type RoutePatch = Vec<(&'static str, Option<String>)>;

/// The browser's address bar, or whatever stands in for it.
pub trait RouteAdapter: Send + Sync {
    fn current(&self) -> RouteParams;

    fn replace(&self, params: RouteParams);
}

/// Filter and month selection as decoded from the route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteState {
    pub filter: Filter,
    pub month: Option<MonthSelection>,
    pub range_collapsed: bool,
}

pub fn encode_route(filter: &Filter, month: Option<&MonthSelection>) -> RoutePatch {
    vec![
        (DATE_FROM, Some(filter.date_from.format("%Y-%m-%d").to_string())),
        (DATE_TO, Some(filter.date_to.format("%Y-%m-%d").to_string())),
        (CUSTOMER_ID, filter.customer_id.clone()),
        (YEAR, month.map(|m| m.year.to_string())),
        (MONTH, month.map(|m| m.month.to_string())),
    ]
}

/// Apply a patch on top of existing params, leaving unrelated keys alone.
pub fn merge_route(current: &RouteParams, patch: &RoutePatch) -> RouteParams {
    let mut merged = current.clone();
    for (key, value) in patch {
        match value {
            Some(value) if !value.is_empty() => {
                merged.insert((*key).to_string(), value.clone());
            }
            _ => {
                merged.remove(*key);
            }
        }
    }
    merged
}

pub fn decode_route(
    params: &RouteParams,
    previous: Option<&Filter>,
    can_filter_by_customer: bool,
    today: NaiveDate,
) -> RouteState {
    let raw = RawFilter {
        date_from: params.get(DATE_FROM).cloned(),
        date_to: params.get(DATE_TO).cloned(),
        customer_id: params.get(CUSTOMER_ID).cloned(),
    };
    let normalized = normalize_filters(&raw, previous, can_filter_by_customer, today);
    let month = parse_month_selection(
        params.get(YEAR).map(String::as_str),
        params.get(MONTH).map(String::as_str),
    );

    RouteState {
        filter: normalized.filter,
        month,
        range_collapsed: normalized.range_collapsed,
    }
}

/// Writes model changes to the route unless an inbound route update is
/// currently being applied.
pub struct RouteSynchronizer {
    adapter: Arc<dyn RouteAdapter>,
    inbound: AtomicBool,
}

impl RouteSynchronizer {
    pub fn new(adapter: Arc<dyn RouteAdapter>) -> Self {
        Self {
            adapter,
            inbound: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> RouteParams {
        self.adapter.current()
    }

    /// Model -> Route. Returns whether the address was written.
    pub fn push(&self, filter: &Filter, month: Option<&MonthSelection>) -> bool {
        if self.is_inbound() {
            debug!("Skipping route write during inbound route update");
            return false;
        }

        let current = self.adapter.current();
        let merged = merge_route(&current, &encode_route(filter, month));
        if merged == current {
            return false;
        }

        debug!(?merged, "Writing filters to route");
        self.adapter.replace(merged);
        true
    }

    /// Raise the inbound flag until the returned guard is dropped.
    pub fn begin_inbound(&self) -> InboundGuard<'_> {
        self.inbound.store(true, Ordering::SeqCst);
        InboundGuard { sync: self }
    }

    pub fn is_inbound(&self) -> bool {
        self.inbound.load(Ordering::SeqCst)
    }
}

pub struct InboundGuard<'a> {
    sync: &'a RouteSynchronizer,
}

impl Drop for InboundGuard<'_> {
    fn drop(&mut self) {
        self.sync.inbound.store(false, Ordering::SeqCst);
    }
}
