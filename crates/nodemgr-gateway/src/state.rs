//! Gateway application state.

use std::sync::Arc;

use nodemgr_control::GroupManager;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState<M>
where
    M: GroupManager,
{
    /// The group manager all handlers forward to.
    pub manager: Arc<M>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<M> GatewayState<M>
where
    M: GroupManager,
{
    /// Create a new gateway state.
    #[must_use]
    pub fn new(manager: Arc<M>, config: GatewayConfig) -> Self {
        Self { manager, config }
    }
}

impl<M> Clone for GatewayState<M>
where
    M: GroupManager,
{
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            config: self.config.clone(),
        }
    }
}
