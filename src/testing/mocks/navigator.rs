//! Mock navigator

use std::sync::Mutex;

use crate::service::{CaptureRoute, Navigator, ResultsRoute};

/// Navigator that records every requested route
#[derive(Default)]
pub struct MockNavigator {
    captures: Mutex<Vec<CaptureRoute>>,
    results: Mutex<Vec<ResultsRoute>>,
}

impl MockNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture_routes(&self) -> Vec<CaptureRoute> {
        self.captures.lock().unwrap().clone()
    }

    pub fn results_routes(&self) -> Vec<ResultsRoute> {
        self.results.lock().unwrap().clone()
    }
}

impl Navigator for MockNavigator {
    fn to_capture(&self, route: CaptureRoute) {
        self.captures.lock().unwrap().push(route);
    }

    fn to_results(&self, route: ResultsRoute) {
        self.results.lock().unwrap().push(route);
    }
}
