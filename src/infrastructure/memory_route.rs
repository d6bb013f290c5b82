// In-memory route adapter standing in for the browser address bar
use crate::application::route_sync::{RouteAdapter, RouteParams};
use crate::infrastructure::query_string::{parse_query, to_query};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct MemoryRoute {
    params: Mutex<RouteParams>,
    writes: AtomicUsize,
}

impl MemoryRoute {
    pub fn new(params: RouteParams) -> Self {
        Self {
            params: Mutex::new(params),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn from_query(query: &str) -> Self {
        Self::new(parse_query(query))
    }

    /// Replace the params as a browser navigation would, without counting a
    /// write. Hosts then hand the new params to the engine.
    pub fn navigate(&self, params: RouteParams) {
        *self.params.lock().unwrap_or_else(PoisonError::into_inner) = params;
    }

    /// Number of times the engine wrote to the route.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn query(&self) -> String {
        to_query(&self.current())
    }
}

impl RouteAdapter for MemoryRoute {
    fn current(&self) -> RouteParams {
        self.params
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, params: RouteParams) {
        *self.params.lock().unwrap_or_else(PoisonError::into_inner) = params;
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}
