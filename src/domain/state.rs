// Load state for each series and for the manual refresh

/// Lifecycle of one independently fetched series.
///
/// A failed load keeps whatever `data` was there before so the dashboard never
/// blanks on a transient error.
#[derive(Debug, Clone, PartialEq)]
pub struct DataState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for DataState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> DataState<T> {
    pub fn start_loading(&mut self) {
        self.is_loading = true;
    }

    pub fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.is_loading = false;
        self.error = None;
    }

    pub fn fail(&mut self, error: String) {
        self.is_loading = false;
        self.error = Some(error);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_idle(&self) -> bool {
        self.data.is_none() && !self.is_loading && self.error.is_none()
    }
}

/// Bookkeeping for the user-triggered refresh of all series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualRefreshState {
    pub last_refreshed_at: Option<i64>,
    pub is_refreshing: bool,
    pub ttl_ms: i64,
    pub error: Option<String>,
}

impl ManualRefreshState {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            last_refreshed_at: None,
            is_refreshing: false,
            ttl_ms,
            error: None,
        }
    }

    /// True while the last successful refresh is still inside the TTL window.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        self.last_refreshed_at
            .is_some_and(|at| now_ms.saturating_sub(at) < self.ttl_ms)
    }
}
