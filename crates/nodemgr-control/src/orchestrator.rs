//! Group orchestration across fronts.
//!
//! The orchestrator issues generate and start calls to a designated front
//! and keeps the local group and mapping rows in line with what fronts
//! report. Local rows change only after the remote call succeeded.
//!
//! A group row is always made live before its mapping is added, so a
//! concurrent invalid-map sweep never sees a fresh mapping as invalid.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use nodemgr_core::{CoreError, FrontAddr, FrontId, GroupId};
use nodemgr_store::{Front, Group, GroupStatus, MapFilter, Store, StoreError};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::front_client::FrontClient;
use crate::types::GenerateGroupRequest;

/// Outcome of one reset sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    /// Fronts asked for their group list.
    pub fronts_queried: usize,
    /// Fronts that did not answer.
    pub fronts_failed: usize,
    /// Group rows created for groups only known to fronts.
    pub groups_created: usize,
    /// Invalid groups brought back because a front serves them again.
    pub groups_revived: usize,
    /// Mappings added.
    pub mappings_added: usize,
    /// Mappings removed because their front stopped reporting the group.
    pub mappings_removed: usize,
    /// Groups marked invalid because no front reports them.
    pub groups_invalidated: usize,
    /// Rows removed by the invalid-map sweep.
    pub invalid_maps_removed: usize,
}

/// Coordinates remote group operations with the store.
pub struct GroupOrchestrator<S: Store> {
    store: Arc<S>,
    fronts: Arc<dyn FrontClient>,
}

impl<S: Store> GroupOrchestrator<S> {
    /// Create a new orchestrator.
    #[must_use]
    pub fn new(store: Arc<S>, fronts: Arc<dyn FrontClient>) -> Self {
        Self { store, fronts }
    }

    /// Look up the registered front at `host:port`.
    fn resolve_front(&self, host: &str, port: u16) -> Result<Front> {
        let addr = FrontAddr::new(host, port).map_err(CoreError::from)?;
        let front = self
            .store
            .get_front_by_addr(&addr)?
            .ok_or(CoreError::UnknownFrontAddr(addr))?;
        Ok(front)
    }

    /// Make sure the group row exists and is live.
    ///
    /// An existing group in one of `revive` statuses is set back to normal.
    fn ensure_group(
        &self,
        group_id: GroupId,
        description: &str,
        revive: &[GroupStatus],
    ) -> Result<Group> {
        if self
            .store
            .insert_group_if_absent(&Group::new(group_id, description))?
        {
            tracing::info!(group_id = %group_id, "Created group");
        } else if let Some(group) = self.store.get_group(group_id)? {
            if revive.contains(&group.status) {
                self.store
                    .update_group_status(group_id, GroupStatus::Normal)?;
                tracing::info!(group_id = %group_id, from = ?group.status, "Group back to normal");
            }
        }

        self.store
            .get_group(group_id)?
            .ok_or_else(|| StoreError::NotFound.into())
    }

    /// Add a mapping, absorbing duplicates. Returns true if a row was added.
    fn link(&self, front_id: FrontId, group_id: GroupId) -> Result<bool> {
        match self.store.add_map(front_id, group_id) {
            Ok(map) => {
                tracing::debug!(map_id = map.map_id, front_id = %front_id, group_id = %group_id, "Added mapping");
                Ok(true)
            }
            Err(StoreError::DuplicateMapping { .. }) => {
                tracing::debug!(front_id = %front_id, group_id = %group_id, "Mapping already present");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the group or one of its mappings was written at or after `since`.
    fn touched_since(&self, group: &Group, since: DateTime<Utc>) -> Result<bool> {
        if group.created_at >= since || group.updated_at >= since {
            return Ok(true);
        }
        Ok(self
            .store
            .list_maps(&MapFilter::by_group(group.group_id))?
            .iter()
            .any(|row| row.created_at >= since))
    }

    /// Generate a group on the front at `host:port`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidRequest` before any remote call if the
    /// request is malformed, `ControlError::UnknownFront` if no front is
    /// registered at the address, and `ControlError::RemoteCallFailed` if
    /// the front call fails. Nothing is written locally on failure.
    pub async fn generate_group(
        &self,
        request: &GenerateGroupRequest,
        host: &str,
        port: u16,
    ) -> Result<Group> {
        let group_id = request.validate()?;
        let front = self.resolve_front(host, port)?;

        self.fronts.generate_group(&front.addr(), request).await?;

        let description = request.description.as_deref().unwrap_or_default();
        let group = self.ensure_group(group_id, description, &[GroupStatus::Invalid])?;
        self.link(front.front_id, group_id)?;

        tracing::info!(group_id = %group_id, front = %front.addr(), "Generated group");
        Ok(group)
    }

    /// Start a group on the front at `host:port`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnknownFront` if no front is registered at the
    /// address and `ControlError::RemoteCallFailed` if the front call fails.
    /// Nothing is written locally on failure.
    pub async fn start_group(&self, group_id: GroupId, host: &str, port: u16) -> Result<Group> {
        let front = self.resolve_front(host, port)?;

        self.fronts.start_group(&front.addr(), group_id).await?;

        let group = self.ensure_group(
            group_id,
            "",
            &[GroupStatus::Invalid, GroupStatus::Maintaining],
        )?;
        self.link(front.front_id, group_id)?;

        tracing::info!(group_id = %group_id, front = %front.addr(), "Started group");
        Ok(group)
    }

    /// Reconcile local groups and mappings against every front's group list.
    ///
    /// Fronts that fail to answer are skipped and their mappings left alone.
    /// Groups are only invalidated when every front answered. Mappings and
    /// groups written after the sweep started are left for the next sweep.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn reset_group_list(&self) -> Result<ResetReport> {
        // Rows written after this point postdate the front answers.
        let sweep_started = Utc::now();
        let fronts = self.store.list_fronts()?;
        let mut report = ResetReport {
            fronts_queried: fronts.len(),
            ..ResetReport::default()
        };

        let answers = join_all(fronts.iter().map(|front| async move {
            let addr = front.addr();
            (front, self.fronts.list_groups(&addr).await)
        }))
        .await;

        let mut answered: Vec<(&Front, HashSet<GroupId>)> = Vec::with_capacity(answers.len());
        for (front, answer) in answers {
            match answer {
                Ok(groups) => answered.push((front, groups.into_iter().collect())),
                Err(e) => {
                    report.fronts_failed += 1;
                    tracing::warn!(front_id = %front.front_id, front = %front.addr(), error = %e, "Front did not report its groups");
                }
            }
        }

        let reported: HashSet<GroupId> = answered
            .iter()
            .flat_map(|(_, groups)| groups.iter().copied())
            .collect();

        // Groups served somewhere must exist locally and be live.
        for &group_id in &reported {
            if self.store.insert_group_if_absent(&Group::new(group_id, ""))? {
                report.groups_created += 1;
            } else if let Some(group) = self.store.get_group(group_id)? {
                if group.status == GroupStatus::Invalid {
                    self.store
                        .update_group_status(group_id, GroupStatus::Normal)?;
                    report.groups_revived += 1;
                }
            }
        }

        for (front, groups) in &answered {
            for &group_id in groups {
                if self.link(front.front_id, group_id)? {
                    report.mappings_added += 1;
                }
            }

            for row in self.store.list_maps(&MapFilter::by_front(front.front_id))? {
                if groups.contains(&row.group_id) {
                    continue;
                }
                if row.created_at >= sweep_started {
                    tracing::debug!(front_id = %front.front_id, group_id = %row.group_id, "Mapping added during sweep, keeping");
                    continue;
                }
                if self.store.remove_map(front.front_id, row.group_id)? {
                    report.mappings_removed += 1;
                }
            }
        }

        if report.fronts_failed == 0 && !answered.is_empty() {
            for group in self.store.list_groups_by_status(GroupStatus::Normal)? {
                if !reported.contains(&group.group_id)
                    && !self.touched_since(&group, sweep_started)?
                {
                    self.store
                        .update_group_status(group.group_id, GroupStatus::Invalid)?;
                    report.groups_invalidated += 1;
                    tracing::info!(group_id = %group.group_id, "No front serves group, marked invalid");
                }
            }
        } else if report.fronts_failed > 0 {
            tracing::debug!(
                fronts_failed = report.fronts_failed,
                "Partial view of fronts, not invalidating groups"
            );
        }

        report.invalid_maps_removed = self.store.remove_invalid_maps()?;

        tracing::info!(
            fronts_queried = report.fronts_queried,
            fronts_failed = report.fronts_failed,
            groups_created = report.groups_created,
            mappings_added = report.mappings_added,
            mappings_removed = report.mappings_removed,
            groups_invalidated = report.groups_invalidated,
            invalid_maps_removed = report.invalid_maps_removed,
            "Reset group list"
        );
        Ok(report)
    }
}
