//! Shared application state handed to HTTP handlers.

use std::sync::Arc;

use crate::core::config::Config;
use crate::dispatch::EventDispatcher;
use crate::orders::OrderService;

/// Everything a request handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orders: OrderService,
    pub dispatcher: EventDispatcher,
}

impl AppState {
    pub fn new(config: Arc<Config>, orders: OrderService, dispatcher: EventDispatcher) -> Self {
        Self {
            config,
            orders,
            dispatcher,
        }
    }
}
