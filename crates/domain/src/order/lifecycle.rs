//! Order status transitions.

use std::time::Instant;

use chrono::Utc;
use common::{EmployeeId, OrderId, OrderStatus};
use datastore::{Datastore, NewHistoryEntry, UnitOfWork};

use super::state::{TransitionPolicy, default_remarks, earns_points, parse_status};
use crate::caller::Caller;
use crate::error::{CafeError, Result};
use crate::loyalty::earn_in;
use crate::unit::settle;

/// Result of a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub points_earned: i64,
}

/// Moves orders between statuses, writing history and crediting points.
#[derive(Clone)]
pub struct OrderLifecycle<S: Datastore> {
    store: S,
    policy: TransitionPolicy,
}

impl<S: Datastore> OrderLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: TransitionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Changes an order's status on behalf of an employee.
    ///
    /// The status update, history row, loyalty credit and `earned_points`
    /// update commit together or not at all. The order row stays locked for
    /// the whole unit of work, so a concurrent completion observes this one's
    /// result and never credits the card a second time.
    #[tracing::instrument(skip(self, remarks))]
    pub async fn transition(
        &self,
        caller: &Caller,
        order_id: OrderId,
        status: &str,
        remarks: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let employee_id = caller.require_employee()?;
        let target = parse_status(status)?;
        let remarks = remarks
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map_or_else(|| default_remarks(target), str::to_string);

        let started = Instant::now();
        let mut unit = self.store.begin().await?;
        let outcome = self
            .transition_in(&mut unit, order_id, employee_id, target, remarks)
            .await;
        let outcome = settle(unit, "transition_order", started, outcome).await?;

        metrics::counter!("order_transitions_total", "status" => target.as_str()).increment(1);
        if outcome.points_earned > 0 {
            metrics::counter!("loyalty_points_earned_total")
                .increment(outcome.points_earned.unsigned_abs());
        }
        tracing::info!(
            %order_id,
            from = %outcome.previous_status,
            to = %outcome.status,
            points_earned = outcome.points_earned,
            "order status changed"
        );
        Ok(outcome)
    }

    async fn transition_in(
        &self,
        unit: &mut S::Unit,
        order_id: OrderId,
        employee_id: EmployeeId,
        target: OrderStatus,
        remarks: String,
    ) -> Result<TransitionOutcome> {
        let order = unit
            .lock_order(order_id)
            .await?
            .ok_or(CafeError::NotFound("Order"))?;

        self.policy.check(order.status, target)?;

        unit.update_order_status(order_id, target).await?;
        unit.append_history(NewHistoryEntry {
            order_id,
            employee_id: Some(employee_id),
            status: target,
            timestamp: Utc::now(),
            remarks,
        })
        .await?;

        let mut points_earned = 0;
        if let (true, Some(loyalty_id)) = (earns_points(order.status, target), order.loyalty_id) {
            points_earned = earn_in(unit, loyalty_id, order.total_amount).await?;
            if points_earned > 0 {
                unit.update_earned_points(order_id, points_earned).await?;
            }
        }

        Ok(TransitionOutcome {
            order_id,
            previous_status: order.status,
            status: target,
            points_earned,
        })
    }
}
