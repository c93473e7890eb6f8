//! Shared application state handed to every handler.

use spindle_core::TaskScheduler;

pub struct AppState {
    pub scheduler: TaskScheduler,
    pub version: &'static str,
}

impl AppState {
    pub fn new(scheduler: TaskScheduler) -> Self {
        Self {
            scheduler,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
