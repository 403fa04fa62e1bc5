//! HTTP handlers grouped by resource.

pub mod currencies;
pub mod health;
pub mod loyalty;
pub mod metrics;
pub mod orders;
pub mod transactions;

use datastore::Datastore;
use domain::{
    LoyaltyLedger, OrderLifecycle, OrderStore, PaymentRecorder, PricingSource, TransitionPolicy,
};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Datastore> {
    pub orders: OrderStore<S>,
    pub lifecycle: OrderLifecycle<S>,
    pub payments: PaymentRecorder<S>,
    pub loyalty: LoyaltyLedger<S>,
    pub store: S,
}

impl<S: Datastore + Clone> AppState<S> {
    /// Wires every service onto one datastore.
    pub fn new(store: S, transitions: TransitionPolicy, pricing: PricingSource) -> Self {
        Self {
            orders: OrderStore::new(store.clone()).with_pricing(pricing),
            lifecycle: OrderLifecycle::new(store.clone()).with_policy(transitions),
            payments: PaymentRecorder::new(store.clone()),
            loyalty: LoyaltyLedger::new(store.clone()),
            store,
        }
    }
}

/// Answers unknown paths.
pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Answers known paths hit with the wrong method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
