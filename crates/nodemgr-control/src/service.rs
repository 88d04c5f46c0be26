//! Group manager service implementation.
//!
//! This module provides the `GroupManager` trait and `GroupManagerService`
//! implementation that ties the orchestrator, the reconciler, the aggregator
//! and the reset worker together behind one API.

use std::sync::Arc;

use async_trait::async_trait;
use nodemgr_core::{CoreError, FrontAddr, FrontId, GroupId};
use nodemgr_store::{Front, Group, GroupStatus, Store, StoreError};
use tokio::sync::broadcast;

use crate::error::{ControlError, Result};
use crate::front_client::FrontClient;
use crate::orchestrator::GroupOrchestrator;
use crate::reconciler::GroupReconciler;
use crate::reset::{ResetEvent, ResetWorker};
use crate::trans_daily::{FrontTransAggregator, TransAggregator};
use crate::types::{ControlConfig, GenerateGroupRequest, GroupGeneral, SevenDaysTrans};

/// Trait defining the group management operations.
#[async_trait]
pub trait GroupManager: Send + Sync {
    // =========================================================================
    // Group Orchestration
    // =========================================================================

    /// Generate a group on the front at `host:port` and map it locally.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidRequest`, `ControlError::UnknownFront` or
    /// `ControlError::RemoteCallFailed`.
    async fn generate_group(
        &self,
        request: GenerateGroupRequest,
        front_host: &str,
        front_port: u16,
    ) -> Result<Group>;

    /// Start a group on the front at `host:port` and map it locally.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnknownFront` or `ControlError::RemoteCallFailed`.
    async fn start_group(&self, group_id: GroupId, front_host: &str, front_port: u16)
        -> Result<Group>;

    /// Queue a reset sweep without waiting for it. Returns false if dropped.
    fn async_reset_group_list(&self) -> bool;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Consistency view of one group.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::GroupNotFound` if the group doesn't exist.
    async fn query_group_general(&self, group_id: GroupId) -> Result<GroupGeneral>;

    /// Groups with the given status, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Store` if the store fails.
    async fn list_groups(&self, status: GroupStatus) -> Result<Vec<Group>>;

    /// Number of groups with the given status.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Store` if the store fails.
    async fn count_groups(&self, status: GroupStatus) -> Result<u32>;

    /// Trailing seven days of transactions for a group.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Store` if the store fails.
    async fn list_seven_day_trans(&self, group_id: GroupId) -> Result<SevenDaysTrans>;

    /// Refresh the daily transaction aggregates now.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Store` if the store fails. Front failures are
    /// logged per group.
    async fn refresh_trans_daily(&self) -> Result<()>;

    // =========================================================================
    // Front Registry
    // =========================================================================

    /// Register a front.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::DuplicateFront` if the address is taken.
    async fn add_front(&self, host: &str, port: u16) -> Result<Front>;

    /// All registered fronts.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Store` if the store fails.
    async fn list_fronts(&self) -> Result<Vec<Front>>;

    /// Unregister a front and drop its mappings.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::FrontNotFound` if the front doesn't exist.
    async fn remove_front(&self, front_id: FrontId) -> Result<()>;
}

/// The main group manager implementation.
pub struct GroupManagerService<S: Store> {
    store: Arc<S>,
    orchestrator: Arc<GroupOrchestrator<S>>,
    reconciler: GroupReconciler<S>,
    aggregator: Arc<dyn TransAggregator>,
    reset: ResetWorker,
    config: ControlConfig,
}

impl<S: Store + 'static> GroupManagerService<S> {
    /// Create a new service and spawn its reset worker.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(store: Arc<S>, fronts: Arc<dyn FrontClient>, config: ControlConfig) -> Self {
        let aggregator: Arc<dyn TransAggregator> = Arc::new(FrontTransAggregator::new(
            Arc::clone(&store),
            Arc::clone(&fronts),
        ));
        Self::with_aggregator(store, fronts, aggregator, config)
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>, fronts: Arc<dyn FrontClient>) -> Self {
        Self::new(store, fronts, ControlConfig::default())
    }

    /// Create with a custom aggregator.
    #[must_use]
    pub fn with_aggregator(
        store: Arc<S>,
        fronts: Arc<dyn FrontClient>,
        aggregator: Arc<dyn TransAggregator>,
        config: ControlConfig,
    ) -> Self {
        let orchestrator = Arc::new(GroupOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&fronts),
        ));
        let reconciler =
            GroupReconciler::new(Arc::clone(&store), fronts, Arc::clone(&aggregator));
        let (reset, _handle) =
            ResetWorker::spawn(Arc::clone(&orchestrator), config.reset_queue_capacity);

        Self {
            store,
            orchestrator,
            reconciler,
            aggregator,
            reset,
            config,
        }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Subscribe to reset sweep outcomes.
    #[must_use]
    pub fn subscribe_reset_events(&self) -> broadcast::Receiver<ResetEvent> {
        self.reset.subscribe()
    }
}

#[async_trait]
impl<S: Store + 'static> GroupManager for GroupManagerService<S> {
    // =========================================================================
    // Group Orchestration
    // =========================================================================

    async fn generate_group(
        &self,
        request: GenerateGroupRequest,
        front_host: &str,
        front_port: u16,
    ) -> Result<Group> {
        self.orchestrator
            .generate_group(&request, front_host, front_port)
            .await
    }

    async fn start_group(
        &self,
        group_id: GroupId,
        front_host: &str,
        front_port: u16,
    ) -> Result<Group> {
        self.orchestrator
            .start_group(group_id, front_host, front_port)
            .await
    }

    fn async_reset_group_list(&self) -> bool {
        self.reset.dispatch()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    async fn query_group_general(&self, group_id: GroupId) -> Result<GroupGeneral> {
        self.reconciler.query_group_general(group_id).await
    }

    async fn list_groups(&self, status: GroupStatus) -> Result<Vec<Group>> {
        Ok(self.store.list_groups_by_status(status)?)
    }

    async fn count_groups(&self, status: GroupStatus) -> Result<u32> {
        Ok(self.store.count_groups_by_status(status)?)
    }

    async fn list_seven_day_trans(&self, group_id: GroupId) -> Result<SevenDaysTrans> {
        self.aggregator.last_seven_days(group_id).await
    }

    async fn refresh_trans_daily(&self) -> Result<()> {
        self.aggregator.refresh_now().await
    }

    // =========================================================================
    // Front Registry
    // =========================================================================

    async fn add_front(&self, host: &str, port: u16) -> Result<Front> {
        let addr = FrontAddr::new(host, port).map_err(CoreError::from)?;
        match self.store.add_front(&addr) {
            Ok(front) => {
                tracing::info!(front_id = %front.front_id, front = %addr, "Added front");
                Ok(front)
            }
            Err(StoreError::DuplicateFront(addr)) => Err(ControlError::DuplicateFront(addr)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_fronts(&self) -> Result<Vec<Front>> {
        Ok(self.store.list_fronts()?)
    }

    async fn remove_front(&self, front_id: FrontId) -> Result<()> {
        match self.store.delete_front(front_id) {
            Ok(()) => {
                tracing::info!(front_id = %front_id, "Removed front");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(CoreError::FrontNotFound(front_id).into()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front_client::MockFrontClient;
    use nodemgr_store::{MapFilter, RocksStore};
    use tempfile::TempDir;

    fn setup() -> (GroupManagerService<RocksStore>, Arc<MockFrontClient>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let fronts = Arc::new(MockFrontClient::new());
        let service = GroupManagerService::with_defaults(store, fronts.clone());
        (service, fronts, dir)
    }

    fn gid(n: u32) -> GroupId {
        GroupId::new(n).unwrap()
    }

    #[tokio::test]
    async fn group_lifecycle() {
        let (service, fronts, _dir) = setup();

        let front = service.add_front("10.0.0.1", 8081).await.unwrap();
        assert_eq!(service.list_fronts().await.unwrap().len(), 1);

        let request = GenerateGroupRequest::new(gid(7), 1_700_000_000_000, vec!["ab12".into()]);
        service
            .generate_group(request, "10.0.0.1", 8081)
            .await
            .unwrap();
        assert_eq!(service.count_groups(GroupStatus::Normal).await.unwrap(), 1);

        fronts.set_block_number(gid(7), 10);
        fronts.set_tx_sum(gid(7), 10);
        let general = service.query_group_general(gid(7)).await.unwrap();
        assert_eq!(general.node_count, 1);
        assert_eq!(general.transaction_count, 10);
        assert!(!general.stale);

        let series = service.list_seven_day_trans(gid(7)).await.unwrap();
        assert_eq!(series.days.len(), 7);
        assert_eq!(series.days[6].trans_count, 10);

        service.remove_front(front.front_id).await.unwrap();
        assert_eq!(
            service
                .store()
                .count_maps(&MapFilter::by_group(gid(7)))
                .unwrap(),
            0
        );
        assert!(matches!(
            service.remove_front(front.front_id).await,
            Err(ControlError::FrontNotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_front_rejected() {
        let (service, _fronts, _dir) = setup();
        service.add_front("10.0.0.1", 8081).await.unwrap();
        assert!(matches!(
            service.add_front("10.0.0.1", 8081).await,
            Err(ControlError::DuplicateFront(_))
        ));
        assert!(matches!(
            service.add_front("10.0.0.1", 0).await,
            Err(ControlError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn async_reset_returns_immediately() {
        let (service, fronts, _dir) = setup();
        let front = service.add_front("10.0.0.1", 8081).await.unwrap();
        fronts.set_groups(&front.addr(), &[gid(2)]);

        let mut events = service.subscribe_reset_events();
        assert!(service.async_reset_group_list());
        // nothing ran yet on the current-thread runtime
        assert_eq!(fronts.list_calls(), 0);

        assert!(matches!(
            events.recv().await.unwrap(),
            ResetEvent::Completed(_)
        ));
        assert_eq!(service.list_groups(GroupStatus::Normal).await.unwrap().len(), 1);
    }
}
