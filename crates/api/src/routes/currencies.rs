//! Currency listing endpoint.

use std::sync::Arc;

use axum::extract::State;
use common::CurrencyId;
use datastore::{Currency, Datastore};
use domain::CafeError;
use rust_decimal::Decimal;
use serde::Serialize;

use super::AppState;
use crate::envelope::Reply;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct CurrencyResponse {
    pub currency_id: CurrencyId,
    pub code: String,
    pub name: String,
    pub symbol: String,
    /// Units of this currency per peso.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

impl From<Currency> for CurrencyResponse {
    fn from(currency: Currency) -> Self {
        Self {
            currency_id: currency.id,
            code: currency.code,
            name: currency.name,
            symbol: currency.symbol,
            rate: currency.rate,
        }
    }
}

/// GET /currencies: every currency, ordered by code.
#[tracing::instrument(skip(state))]
pub async fn list<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Reply<Vec<CurrencyResponse>>, ApiError> {
    let currencies = state.store.currencies().await.map_err(CafeError::from)?;
    Ok(Reply::ok(
        currencies.into_iter().map(Into::into).collect(),
        "Currencies retrieved successfully",
    ))
}
