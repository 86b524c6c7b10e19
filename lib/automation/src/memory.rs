//! In-memory automation store and capability check.

use crate::automation::{Automation, TriggerType};
use crate::error::{AutomationError, ResolveError};
use crate::resolver::CapabilityCheck;
use crate::store::AutomationStore;
use async_trait::async_trait;
use creator_flow_core::{AutomationId, CreatorId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

fn poisoned() -> AutomationError {
    AutomationError::StorageFailed {
        reason: "lock poisoned".to_string(),
    }
}

/// In-memory automation store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAutomationStore {
    automations: Arc<RwLock<HashMap<AutomationId, Automation>>>,
}

impl InMemoryAutomationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AutomationStore for InMemoryAutomationStore {
    async fn insert(&self, mut automation: Automation) -> Result<Automation, AutomationError> {
        let mut automations = self.automations.write().map_err(|_| poisoned())?;
        automation.version = 1;
        automations.insert(automation.id, automation.clone());
        Ok(automation)
    }

    async fn get(&self, automation_id: AutomationId) -> Result<Automation, AutomationError> {
        let automations = self.automations.read().map_err(|_| poisoned())?;
        automations
            .get(&automation_id)
            .cloned()
            .ok_or(AutomationError::NotFound { automation_id })
    }

    async fn update(&self, automation: &Automation) -> Result<Automation, AutomationError> {
        let mut automations = self.automations.write().map_err(|_| poisoned())?;
        let stored = automations
            .get_mut(&automation.id)
            .ok_or(AutomationError::NotFound {
                automation_id: automation.id,
            })?;
        if stored.version != automation.version {
            return Err(AutomationError::VersionConflict {
                expected: automation.version,
                found: stored.version,
            });
        }
        let mut next = automation.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn delete(
        &self,
        automation_id: AutomationId,
        expected_version: u64,
    ) -> Result<(), AutomationError> {
        let mut automations = self.automations.write().map_err(|_| poisoned())?;
        let stored = automations
            .get(&automation_id)
            .ok_or(AutomationError::NotFound { automation_id })?;
        if stored.version != expected_version {
            return Err(AutomationError::VersionConflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        automations.remove(&automation_id);
        Ok(())
    }

    async fn list_for_creator(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<Automation>, AutomationError> {
        let automations = self.automations.read().map_err(|_| poisoned())?;
        let mut owned: Vec<Automation> = automations
            .values()
            .filter(|a| a.creator_id == creator_id)
            .cloned()
            .collect();
        owned.sort_by_key(|a| (a.created_at, a.id));
        Ok(owned)
    }

    async fn record_response(
        &self,
        automation_id: AutomationId,
        channel: TriggerType,
    ) -> Result<(), AutomationError> {
        let mut automations = self.automations.write().map_err(|_| poisoned())?;
        let stored = automations
            .get_mut(&automation_id)
            .ok_or(AutomationError::NotFound { automation_id })?;
        stored.counters.record(channel);
        stored.version += 1;
        Ok(())
    }
}

/// Capability check backed by a fixed set of entitled creators.
#[derive(Debug, Clone, Default)]
pub struct FixedCapabilities {
    conversational: Arc<RwLock<HashSet<CreatorId>>>,
}

impl FixedCapabilities {
    /// Creates a check that entitles nobody.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entitles a creator to conversational listeners.
    pub fn grant(&self, creator_id: CreatorId) {
        if let Ok(mut set) = self.conversational.write() {
            set.insert(creator_id);
        }
    }
}

#[async_trait]
impl CapabilityCheck for FixedCapabilities {
    async fn allows_conversational(&self, creator_id: CreatorId) -> Result<bool, ResolveError> {
        let set = self
            .conversational
            .read()
            .map_err(|_| ResolveError::CapabilityUnavailable {
                reason: "capability lock poisoned".to_string(),
            })?;
        Ok(set.contains(&creator_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn update_with_stale_version_conflicts() {
        let store = InMemoryAutomationStore::new();
        let stored = store
            .insert(Automation::new(CreatorId::new(), None, Utc::now()))
            .await
            .expect("insert");

        let mut first = stored.clone();
        first.name = "First".to_string();
        store.update(&first).await.expect("update");

        let mut second = stored;
        second.name = "Second".to_string();
        assert_eq!(
            store.update(&second).await,
            Err(AutomationError::VersionConflict {
                expected: 1,
                found: 2
            })
        );
    }

    #[tokio::test]
    async fn delete_with_stale_version_conflicts() {
        let store = InMemoryAutomationStore::new();
        let stored = store
            .insert(Automation::new(CreatorId::new(), None, Utc::now()))
            .await
            .expect("insert");

        let mut activated = stored.clone();
        activated.active = true;
        store.update(&activated).await.expect("update");

        assert_eq!(
            store.delete(stored.id, stored.version).await,
            Err(AutomationError::VersionConflict {
                expected: 1,
                found: 2
            })
        );
        assert!(store.get(stored.id).await.expect("still stored").active);

        store.delete(stored.id, 2).await.expect("delete");
        assert_eq!(
            store.get(stored.id).await,
            Err(AutomationError::NotFound {
                automation_id: stored.id
            })
        );
    }

    #[tokio::test]
    async fn record_response_bumps_counters() {
        let store = InMemoryAutomationStore::new();
        let stored = store
            .insert(Automation::new(CreatorId::new(), None, Utc::now()))
            .await
            .expect("insert");

        store
            .record_response(stored.id, TriggerType::Comment)
            .await
            .expect("record");
        let reloaded = store.get(stored.id).await.expect("get");
        assert_eq!(reloaded.counters.comment_count, 1);
        assert_eq!(reloaded.version, 2);
    }

    #[tokio::test]
    async fn capabilities_default_to_denied() {
        let caps = FixedCapabilities::new();
        let creator = CreatorId::new();
        assert!(!caps.allows_conversational(creator).await.expect("check"));
        caps.grant(creator);
        assert!(caps.allows_conversational(creator).await.expect("check"));
    }
}
