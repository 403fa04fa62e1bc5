//! Loyalty card endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CustomerId, LoyaltyId};
use datastore::{Datastore, LoyaltyCard};
use domain::{CardView, Redemption};
use serde::Serialize;

use super::AppState;
use crate::envelope::Reply;
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Debug, Serialize)]
pub struct LoyaltyCardResponse {
    pub loyalty_id: LoyaltyId,
    pub customer_id: CustomerId,
    pub card_number: String,
    pub points: i64,
    pub is_active: bool,
    pub last_redeemed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<LoyaltyCard> for LoyaltyCardResponse {
    fn from(card: LoyaltyCard) -> Self {
        Self {
            loyalty_id: card.id,
            customer_id: card.customer_id,
            card_number: card.card_number,
            points: card.points,
            is_active: card.is_active,
            last_redeemed: card.last_redeemed,
            created_at: card.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CardViewResponse {
    #[serde(flatten)]
    pub card: LoyaltyCardResponse,
    pub can_redeem: bool,
}

impl From<CardView> for CardViewResponse {
    fn from(view: CardView) -> Self {
        Self {
            card: view.card.into(),
            can_redeem: view.can_redeem,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RedemptionResponse {
    pub loyalty_id: LoyaltyId,
    pub points_redeemed: i64,
    pub points_remaining: i64,
    pub redeemed_at: DateTime<Utc>,
}

impl From<Redemption> for RedemptionResponse {
    fn from(redemption: Redemption) -> Self {
        Self {
            loyalty_id: redemption.loyalty_id,
            points_redeemed: redemption.points_redeemed,
            points_remaining: redemption.points_remaining,
            redeemed_at: redemption.redeemed_at,
        }
    }
}

/// GET /loyalty: the caller's active card.
#[tracing::instrument(skip(state))]
pub async fn card<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Reply<CardViewResponse>, ApiError> {
    let view = state.loyalty.card(&caller).await?;
    Ok(Reply::ok(view.into(), "Loyalty card retrieved successfully"))
}

/// POST /loyalty/enroll: issue the caller a card, or return the existing one.
#[tracing::instrument(skip(state))]
pub async fn enroll<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Reply<LoyaltyCardResponse>, ApiError> {
    let enrollment = state.loyalty.enroll(&caller).await?;
    let reply = if enrollment.created {
        Reply::with_status(
            StatusCode::CREATED,
            enrollment.card.into(),
            "Loyalty card created successfully",
        )
    } else {
        Reply::ok(enrollment.card.into(), "Loyalty card already exists")
    };
    Ok(reply)
}

/// POST /loyalty/redeem: spend 100 points from the caller's card.
#[tracing::instrument(skip(state))]
pub async fn redeem<S: Datastore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
) -> Result<Reply<RedemptionResponse>, ApiError> {
    let redemption = state.loyalty.redeem(&caller).await?;
    Ok(Reply::ok(redemption.into(), "Points redeemed successfully"))
}
