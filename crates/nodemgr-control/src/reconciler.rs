//! Group statistics reconciliation.
//!
//! Compares a group's aggregated transaction count against its latest block
//! and, when the aggregates lag, asks the aggregator to refresh that group a
//! bounded number of times before answering.

use std::sync::Arc;

use nodemgr_core::GroupId;
use nodemgr_store::{MapFilter, Store};

use crate::error::{ControlError, Result};
use crate::front_client::{mapped_fronts, FrontClient};
use crate::trans_daily::TransAggregator;
use crate::types::GroupGeneral;

/// Synchronous aggregator refreshes allowed per query.
pub const MAX_REFRESH_ATTEMPTS: u32 = 1;

/// Computes [`GroupGeneral`] views.
pub struct GroupReconciler<S: Store> {
    store: Arc<S>,
    fronts: Arc<dyn FrontClient>,
    aggregator: Arc<dyn TransAggregator>,
}

impl<S: Store> GroupReconciler<S> {
    /// Create a new reconciler.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        fronts: Arc<dyn FrontClient>,
        aggregator: Arc<dyn TransAggregator>,
    ) -> Self {
        Self {
            store,
            fronts,
            aggregator,
        }
    }

    /// Consistency view of one group.
    ///
    /// A lagging transaction count triggers at most [`MAX_REFRESH_ATTEMPTS`]
    /// refreshes. The final snapshot is returned either way, with `stale`
    /// set if the gap remains. The observed counters are recorded on the
    /// group row.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::GroupNotFound` if the group doesn't exist.
    pub async fn query_group_general(&self, group_id: GroupId) -> Result<GroupGeneral> {
        let mut general = self.snapshot(group_id).await?;

        for attempt in 0..MAX_REFRESH_ATTEMPTS {
            if general.transaction_count >= general.latest_block {
                break;
            }
            tracing::debug!(
                group_id = %group_id,
                attempt,
                transaction_count = general.transaction_count,
                latest_block = general.latest_block,
                "Aggregates lag chain, refreshing"
            );
            if let Err(e) = self.aggregator.refresh_group(group_id).await {
                tracing::warn!(group_id = %group_id, error = %e, "Aggregator refresh failed");
                break;
            }
            general = self.snapshot(group_id).await?;
        }

        general.stale = general.transaction_count < general.latest_block;
        if general.stale {
            tracing::info!(
                group_id = %group_id,
                transaction_count = general.transaction_count,
                latest_block = general.latest_block,
                "Aggregates still stale after refresh"
            );
        }

        match self.store.update_group_counters(
            group_id,
            general.latest_block,
            general.transaction_count,
        ) {
            Ok(()) | Err(nodemgr_store::StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        Ok(general)
    }

    async fn snapshot(&self, group_id: GroupId) -> Result<GroupGeneral> {
        let group = self
            .store
            .get_group(group_id)?
            .ok_or(ControlError::GroupNotFound(group_id))?;

        let node_count = self.store.count_maps(&MapFilter::by_group(group_id))?;
        let transaction_count = self.aggregator.total_trans(group_id).await?;

        let mut latest_block = group.latest_block;
        for front in mapped_fronts(self.store.as_ref(), group_id)? {
            match self.fronts.block_number(&front, group_id).await {
                Ok(n) => {
                    latest_block = n;
                    break;
                }
                Err(e) => {
                    tracing::debug!(group_id = %group_id, front = %front, error = %e, "Front did not report block number");
                }
            }
        }

        Ok(GroupGeneral {
            group_id,
            node_count,
            latest_block,
            transaction_count,
            stale: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front_client::MockFrontClient;
    use crate::trans_daily::FrontTransAggregator;
    use crate::types::SevenDaysTrans;
    use async_trait::async_trait;
    use chrono::Utc;
    use nodemgr_core::FrontAddr;
    use nodemgr_store::{Group, RocksStore, TransDaily};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Wraps an aggregator and counts refreshes.
    struct CountingAggregator {
        inner: Arc<dyn TransAggregator>,
        refreshes: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TransAggregator for CountingAggregator {
        async fn refresh_now(&self) -> Result<()> {
            self.inner.refresh_now().await
        }

        async fn refresh_group(&self, group_id: GroupId) -> Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ControlError::Internal("aggregation job crashed".into()));
            }
            self.inner.refresh_group(group_id).await
        }

        async fn last_seven_days(&self, group_id: GroupId) -> Result<SevenDaysTrans> {
            self.inner.last_seven_days(group_id).await
        }

        async fn total_trans(&self, group_id: GroupId) -> Result<u64> {
            self.inner.total_trans(group_id).await
        }
    }

    struct Fixture {
        store: Arc<RocksStore>,
        fronts: Arc<MockFrontClient>,
        aggregator: Arc<CountingAggregator>,
        reconciler: GroupReconciler<RocksStore>,
        _dir: TempDir,
    }

    fn setup_with(fail_refresh: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let fronts = Arc::new(MockFrontClient::new());
        let aggregator = Arc::new(CountingAggregator {
            inner: Arc::new(FrontTransAggregator::new(Arc::clone(&store), fronts.clone())),
            refreshes: AtomicUsize::new(0),
            fail: fail_refresh,
        });
        let reconciler = GroupReconciler::new(Arc::clone(&store), fronts.clone(), aggregator.clone());
        Fixture {
            store,
            fronts,
            aggregator,
            reconciler,
            _dir: dir,
        }
    }

    fn gid(n: u32) -> GroupId {
        GroupId::new(n).unwrap()
    }

    /// Group served by one front with `aggregated` transactions already counted.
    fn seed(fx: &Fixture, group_id: GroupId, latest_block: u64, aggregated: u64) {
        let front = fx
            .store
            .add_front(&FrontAddr::new("10.0.0.1", 8081).unwrap())
            .unwrap();
        fx.store.put_group(&Group::new(group_id, "")).unwrap();
        fx.store.add_map(front.front_id, group_id).unwrap();
        fx.store
            .put_trans_daily(&TransDaily {
                group_id,
                trans_day: Utc::now().date_naive(),
                trans_count: aggregated,
                block_number: latest_block,
                updated_at: Utc::now(),
            })
            .unwrap();
        fx.fronts.set_block_number(group_id, latest_block);
    }

    #[tokio::test]
    async fn consistent_group_skips_refresh() {
        let fx = setup_with(false);
        seed(&fx, gid(7), 100, 100);

        let general = fx.reconciler.query_group_general(gid(7)).await.unwrap();
        assert_eq!(general.transaction_count, 100);
        assert_eq!(general.node_count, 1);
        assert!(!general.stale);
        assert_eq!(fx.aggregator.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lagging_group_refreshes_once_and_catches_up() {
        let fx = setup_with(false);
        seed(&fx, gid(7), 100, 80);
        fx.fronts.set_tx_sum(gid(7), 100);

        let general = fx.reconciler.query_group_general(gid(7)).await.unwrap();
        assert_eq!(fx.aggregator.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(general.latest_block, 100);
        assert_eq!(general.transaction_count, 100);
        assert!(!general.stale);

        let group = fx.store.get_group(gid(7)).unwrap().unwrap();
        assert_eq!(group.trans_count, 100);
    }

    #[tokio::test]
    async fn persistent_gap_refreshes_only_once() {
        let fx = setup_with(false);
        seed(&fx, gid(7), 100, 80);
        // front still reports the old total
        fx.fronts.set_tx_sum(gid(7), 80);

        let general = fx.reconciler.query_group_general(gid(7)).await.unwrap();
        assert_eq!(fx.aggregator.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(general.transaction_count, 80);
        assert!(general.stale);
    }

    #[tokio::test]
    async fn refresh_failure_returns_snapshot() {
        let fx = setup_with(true);
        seed(&fx, gid(7), 100, 80);

        let general = fx.reconciler.query_group_general(gid(7)).await.unwrap();
        assert_eq!(fx.aggregator.refreshes.load(Ordering::SeqCst), 1);
        assert!(general.stale);
    }

    #[tokio::test]
    async fn zero_height_never_refreshes() {
        let fx = setup_with(false);
        fx.store.put_group(&Group::new(gid(2), "")).unwrap();

        let general = fx.reconciler.query_group_general(gid(2)).await.unwrap();
        assert_eq!(general.latest_block, 0);
        assert_eq!(general.node_count, 0);
        assert_eq!(fx.aggregator.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_fronts_fall_back_to_recorded_height() {
        let fx = setup_with(false);
        seed(&fx, gid(7), 100, 100);
        fx.store.update_group_counters(gid(7), 120, 100).unwrap();
        fx.fronts
            .fail_front(&FrontAddr::new("10.0.0.1", 8081).unwrap());

        let general = fx.reconciler.query_group_general(gid(7)).await.unwrap();
        assert_eq!(general.latest_block, 120);
        assert!(general.stale);
    }

    #[tokio::test]
    async fn unknown_group() {
        let fx = setup_with(false);
        let result = fx.reconciler.query_group_general(gid(9)).await;
        assert!(matches!(result, Err(ControlError::GroupNotFound(_))));
    }

    /// Answers every call for one front only after a long delay.
    struct SlowFront {
        inner: Arc<MockFrontClient>,
        slow: FrontAddr,
    }

    impl SlowFront {
        async fn delay(&self, front: &FrontAddr) {
            if *front == self.slow {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            }
        }
    }

    #[async_trait]
    impl FrontClient for SlowFront {
        async fn generate_group(
            &self,
            front: &FrontAddr,
            request: &crate::types::GenerateGroupRequest,
        ) -> Result<()> {
            self.delay(front).await;
            self.inner.generate_group(front, request).await
        }

        async fn start_group(&self, front: &FrontAddr, group_id: GroupId) -> Result<()> {
            self.delay(front).await;
            self.inner.start_group(front, group_id).await
        }

        async fn list_groups(&self, front: &FrontAddr) -> Result<Vec<GroupId>> {
            self.delay(front).await;
            self.inner.list_groups(front).await
        }

        async fn block_number(&self, front: &FrontAddr, group_id: GroupId) -> Result<u64> {
            self.delay(front).await;
            self.inner.block_number(front, group_id).await
        }

        async fn transaction_total(
            &self,
            front: &FrontAddr,
            group_id: GroupId,
        ) -> Result<crate::front_client::TransactionTotal> {
            self.delay(front).await;
            self.inner.transaction_total(front, group_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_ignores_slow_fronts_of_other_groups() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let mock = Arc::new(MockFrontClient::new());
        let slow = FrontAddr::new("10.0.0.9", 8081).unwrap();
        let fronts: Arc<dyn FrontClient> = Arc::new(SlowFront {
            inner: mock.clone(),
            slow: slow.clone(),
        });

        let fast = store
            .add_front(&FrontAddr::new("10.0.0.1", 8081).unwrap())
            .unwrap();
        let stalled = store.add_front(&slow).unwrap();
        for n in 1..=5 {
            store.put_group(&Group::new(gid(n), "")).unwrap();
            store.add_map(stalled.front_id, gid(n)).unwrap();
        }
        store.put_group(&Group::new(gid(7), "")).unwrap();
        store.add_map(fast.front_id, gid(7)).unwrap();
        mock.set_block_number(gid(7), 100);
        mock.set_tx_sum(gid(7), 100);

        let aggregator = Arc::new(FrontTransAggregator::new(
            Arc::clone(&store),
            Arc::clone(&fronts),
        ));
        let reconciler = GroupReconciler::new(store, fronts, aggregator);

        let general = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            reconciler.query_group_general(gid(7)),
        )
        .await
        .expect("query outlived the request timeout")
        .unwrap();
        assert_eq!(general.transaction_count, 100);
        assert!(!general.stale);
    }
}
