//! Automation persistence.

use crate::automation::{Automation, TriggerType};
use crate::error::AutomationError;
use async_trait::async_trait;
use creator_flow_core::{AutomationId, CreatorId};

/// Key-addressed automation records with optimistic versioning.
#[async_trait]
pub trait AutomationStore: Send + Sync {
    /// Stores a new automation at version 1 and returns the stored copy.
    async fn insert(&self, automation: Automation) -> Result<Automation, AutomationError>;

    /// Loads an automation.
    async fn get(&self, automation_id: AutomationId) -> Result<Automation, AutomationError>;

    /// Writes an automation if its `version` still matches the stored one.
    ///
    /// Returns the stored copy with the bumped version, or `VersionConflict`.
    async fn update(&self, automation: &Automation) -> Result<Automation, AutomationError>;

    /// Removes an automation if the stored version still equals `expected_version`.
    ///
    /// Fails with `VersionConflict` if the automation changed since it was read.
    async fn delete(
        &self,
        automation_id: AutomationId,
        expected_version: u64,
    ) -> Result<(), AutomationError>;

    /// Lists a creator's automations, oldest first.
    async fn list_for_creator(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<Automation>, AutomationError>;

    /// Counts one delivered reply on the automation's listener.
    async fn record_response(
        &self,
        automation_id: AutomationId,
        channel: TriggerType,
    ) -> Result<(), AutomationError>;
}
