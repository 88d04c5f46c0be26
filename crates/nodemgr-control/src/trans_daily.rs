//! Daily transaction aggregation.
//!
//! The aggregator turns the running transaction total reported by a front
//! into per-group, per-day rows. A refresh adds the growth since the last
//! refresh to today's row, so the sum of a group's rows tracks the chain's
//! transaction total.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use nodemgr_core::GroupId;
use nodemgr_store::{Group, GroupStatus, Store, StoreError, TransDaily};

use crate::error::{ControlError, Result};
use crate::front_client::{mapped_fronts, FrontClient, TransactionTotal};
use crate::types::{DayTrans, SevenDaysTrans};

/// Days covered by [`TransAggregator::last_seven_days`].
const SEVEN_DAYS: u64 = 7;

/// Source of daily transaction aggregates.
#[async_trait]
pub trait TransAggregator: Send + Sync {
    /// Refresh the aggregates of every normal group now.
    ///
    /// Per-group remote failures are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store fails.
    async fn refresh_now(&self) -> Result<()>;

    /// Refresh the aggregates of one group now.
    ///
    /// # Errors
    ///
    /// Returns an error if no mapped front answers or the store fails.
    async fn refresh_group(&self, group_id: GroupId) -> Result<()>;

    /// Seven `(day, count)` entries ending today, oldest first; missing days are zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    async fn last_seven_days(&self, group_id: GroupId) -> Result<SevenDaysTrans>;

    /// Accumulated transaction count of a group.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    async fn total_trans(&self, group_id: GroupId) -> Result<u64>;
}

/// Aggregator that polls fronts for their transaction totals.
pub struct FrontTransAggregator<S: Store> {
    store: Arc<S>,
    fronts: Arc<dyn FrontClient>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<S: Store> FrontTransAggregator<S> {
    /// Create a new aggregator.
    #[must_use]
    pub fn new(store: Arc<S>, fronts: Arc<dyn FrontClient>) -> Self {
        Self {
            store,
            fronts,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Ask the group's fronts in mapping order until one answers.
    async fn fetch_total(&self, group_id: GroupId) -> Result<Option<TransactionTotal>> {
        let fronts = mapped_fronts(self.store.as_ref(), group_id)?;

        let mut last_error = None;
        for front in &fronts {
            match self.fronts.transaction_total(front, group_id).await {
                Ok(total) => return Ok(Some(total)),
                Err(e) => {
                    tracing::debug!(group_id = %group_id, front = %front, error = %e, "Front did not answer");
                    last_error = Some(e);
                }
            }
        }
        last_error.map_or(Ok(None), Err)
    }

    async fn refresh_one(&self, group: &Group, today: NaiveDate) -> Result<()> {
        let group_id = group.group_id;
        let Some(total) = self.fetch_total(group_id).await? else {
            tracing::debug!(group_id = %group_id, "No fronts mapped, skipping aggregation");
            return Ok(());
        };

        let aggregated = self.store.total_trans(group_id)?;
        let mut row = self
            .store
            .get_trans_daily(group_id, today)?
            .unwrap_or_else(|| TransDaily {
                group_id,
                trans_day: today,
                trans_count: 0,
                block_number: 0,
                updated_at: Utc::now(),
            });

        if total.tx_sum >= aggregated {
            row.trans_count += total.tx_sum - aggregated;
        } else {
            tracing::warn!(
                group_id = %group_id,
                tx_sum = total.tx_sum,
                aggregated,
                "Chain reports fewer transactions than aggregated, ignoring"
            );
        }
        row.block_number = total.block_number;
        row.updated_at = Utc::now();
        self.store.put_trans_daily(&row)?;

        // The group may have been deleted since the listing.
        match self.store.update_group_counters(
            group_id,
            total.block_number,
            total.tx_sum.max(aggregated),
        ) {
            Ok(()) => {}
            Err(StoreError::NotFound) => {
                tracing::debug!(group_id = %group_id, "Group removed during refresh");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(
            group_id = %group_id,
            day = %today,
            trans_count = row.trans_count,
            block_number = total.block_number,
            "Refreshed daily transactions"
        );
        Ok(())
    }
}

#[async_trait]
impl<S: Store + 'static> TransAggregator for FrontTransAggregator<S> {
    async fn refresh_now(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let today = Utc::now().date_naive();

        let groups = self.store.list_groups_by_status(GroupStatus::Normal)?;
        let mut failed = 0usize;
        for group in &groups {
            match self.refresh_one(group, today).await {
                Ok(()) => {}
                Err(ControlError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(group_id = %group.group_id, error = %e, "Failed to refresh group transactions");
                }
            }
        }

        tracing::info!(groups = groups.len(), failed, "Daily transaction refresh complete");
        Ok(())
    }

    async fn refresh_group(&self, group_id: GroupId) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let Some(group) = self.store.get_group(group_id)? else {
            return Err(ControlError::GroupNotFound(group_id));
        };
        self.refresh_one(&group, Utc::now().date_naive()).await
    }

    async fn last_seven_days(&self, group_id: GroupId) -> Result<SevenDaysTrans> {
        let today = Utc::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(SEVEN_DAYS - 1))
            .ok_or_else(|| ControlError::Internal("date out of range".to_string()))?;

        let rows = self.store.list_trans_daily(group_id, from, today)?;
        let days = from
            .iter_days()
            .take_while(|day| *day <= today)
            .map(|day| DayTrans {
                day,
                trans_count: rows
                    .iter()
                    .find(|row| row.trans_day == day)
                    .map_or(0, |row| row.trans_count),
            })
            .collect();

        Ok(SevenDaysTrans { group_id, days })
    }

    async fn total_trans(&self, group_id: GroupId) -> Result<u64> {
        Ok(self.store.total_trans(group_id)?)
    }
}
