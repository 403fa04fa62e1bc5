//! Loyalty point balances.
//!
//! A card's balance changes in exactly two ways: an earn when one of its
//! orders is completed, and a redemption of [`REDEEM_COST`] points. Both lock
//! the card row for the read-modify-write so concurrent calls serialize.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{CustomerId, LoyaltyId};
use datastore::{Datastore, DatastoreError, LoyaltyCard, NewLoyaltyCard, UnitOfWork};
use rust_decimal::prelude::*;

use crate::caller::Caller;
use crate::error::{CafeError, Result};
use crate::unit::settle;

/// Points spent per redemption.
pub const REDEEM_COST: i64 = 100;

/// Pesos spent per point earned.
pub const PESOS_PER_POINT: i64 = 50;

const ONE_ACTIVE_CARD: &str = "loyalty_cards_one_active_per_customer";

/// `floor(total / 50)`, never negative.
pub fn points_for(order_total: Decimal) -> i64 {
    (order_total / Decimal::from(PESOS_PER_POINT))
        .floor()
        .to_i64()
        .unwrap_or(0)
        .max(0)
}

/// Card numbers are `LC-` followed by the customer id padded to six digits.
pub fn card_number_for(customer_id: CustomerId) -> String {
    format!("LC-{:06}", customer_id.get())
}

/// Credits a card for a completed order inside the caller's unit of work.
///
/// Returns the points credited. Stamps `last_redeemed` when the new balance
/// reaches [`REDEEM_COST`].
pub(crate) async fn earn_in<U: UnitOfWork>(
    unit: &mut U,
    loyalty_id: LoyaltyId,
    order_total: Decimal,
) -> Result<i64> {
    let points = points_for(order_total);
    if points == 0 {
        return Ok(0);
    }

    let card = unit
        .lock_loyalty_card(loyalty_id)
        .await?
        .ok_or(CafeError::NotFound("Loyalty card"))?;

    let balance = card
        .points
        .checked_add(points)
        .ok_or_else(|| CafeError::Validation("Loyalty balance out of range".to_string()))?;
    let last_redeemed = if balance >= REDEEM_COST {
        Some(Utc::now())
    } else {
        card.last_redeemed
    };

    unit.update_loyalty_balance(card.id, balance, last_redeemed)
        .await?;
    tracing::debug!(%loyalty_id, points, balance, "loyalty points earned");
    Ok(points)
}

/// Result of a successful redemption.
#[derive(Debug, Clone, PartialEq)]
pub struct Redemption {
    pub loyalty_id: LoyaltyId,
    pub points_redeemed: i64,
    pub points_remaining: i64,
    pub redeemed_at: DateTime<Utc>,
}

/// Result of an enrollment request.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub card: LoyaltyCard,
    /// False when the customer already had an active card.
    pub created: bool,
}

/// A customer's active card as shown to them.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub card: LoyaltyCard,
    pub can_redeem: bool,
}

/// Service owning loyalty card balances.
#[derive(Clone)]
pub struct LoyaltyLedger<S: Datastore> {
    store: S,
}

impl<S: Datastore> LoyaltyLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Credits `floor(order_total / 50)` points to a card in its own unit of work.
    #[tracing::instrument(skip(self))]
    pub async fn earn(&self, loyalty_id: LoyaltyId, order_total: Decimal) -> Result<i64> {
        let started = Instant::now();
        let mut unit = self.store.begin().await?;
        let outcome = earn_in(&mut unit, loyalty_id, order_total).await;
        let points = settle(unit, "earn_points", started, outcome).await?;

        if points > 0 {
            metrics::counter!("loyalty_points_earned_total").increment(points.unsigned_abs());
        }
        Ok(points)
    }

    /// Spends [`REDEEM_COST`] points from the caller's active card.
    #[tracing::instrument(skip(self))]
    pub async fn redeem(&self, caller: &Caller) -> Result<Redemption> {
        let customer_id = caller.require_customer()?;

        let started = Instant::now();
        let mut unit = self.store.begin().await?;
        let outcome = Self::redeem_in(&mut unit, customer_id).await;
        let redemption = settle(unit, "redeem_points", started, outcome).await?;

        metrics::counter!("loyalty_redemptions_total").increment(1);
        tracing::info!(
            loyalty_id = %redemption.loyalty_id,
            remaining = redemption.points_remaining,
            "points redeemed"
        );
        Ok(redemption)
    }

    async fn redeem_in(unit: &mut S::Unit, customer_id: CustomerId) -> Result<Redemption> {
        let card = unit
            .lock_active_loyalty_card(customer_id)
            .await?
            .ok_or(CafeError::NotFound("Loyalty card"))?;

        if card.points < REDEEM_COST {
            return Err(CafeError::InsufficientPoints {
                balance: card.points,
                required: REDEEM_COST,
            });
        }

        let remaining = card.points - REDEEM_COST;
        let redeemed_at = Utc::now();
        unit.update_loyalty_balance(card.id, remaining, Some(redeemed_at))
            .await?;

        Ok(Redemption {
            loyalty_id: card.id,
            points_redeemed: REDEEM_COST,
            points_remaining: remaining,
            redeemed_at,
        })
    }

    /// Issues the caller an active card, or returns the one they already hold.
    #[tracing::instrument(skip(self))]
    pub async fn enroll(&self, caller: &Caller) -> Result<Enrollment> {
        let customer_id = caller.require_customer()?;

        let started = Instant::now();
        let mut unit = self.store.begin().await?;
        let outcome = Self::enroll_in(&mut unit, customer_id).await;
        match settle(unit, "enroll_loyalty", started, outcome).await {
            Ok(enrollment) => {
                if enrollment.created {
                    tracing::info!(card_number = %enrollment.card.card_number, "loyalty card issued");
                }
                Ok(enrollment)
            }
            // A concurrent enrollment won the race; hand back its card.
            Err(CafeError::Persistence(DatastoreError::UniqueViolation { constraint }))
                if constraint == ONE_ACTIVE_CARD =>
            {
                let card = self
                    .store
                    .active_loyalty_card(customer_id)
                    .await?
                    .ok_or(CafeError::NotFound("Loyalty card"))?;
                Ok(Enrollment {
                    card,
                    created: false,
                })
            }
            Err(err) => Err(err),
        }
    }

    async fn enroll_in(unit: &mut S::Unit, customer_id: CustomerId) -> Result<Enrollment> {
        if let Some(card) = unit.find_active_loyalty_card(customer_id).await? {
            return Ok(Enrollment {
                card,
                created: false,
            });
        }

        let card = unit
            .insert_loyalty_card(NewLoyaltyCard {
                customer_id,
                card_number: card_number_for(customer_id),
                created_at: Utc::now(),
            })
            .await?;
        Ok(Enrollment {
            card,
            created: true,
        })
    }

    /// Returns the caller's active card.
    #[tracing::instrument(skip(self))]
    pub async fn card(&self, caller: &Caller) -> Result<CardView> {
        let customer_id = caller.require_customer()?;
        let card = self
            .store
            .active_loyalty_card(customer_id)
            .await?
            .ok_or(CafeError::NotFound("Loyalty card"))?;

        Ok(CardView {
            can_redeem: card.points >= REDEEM_COST,
            card,
        })
    }
}
