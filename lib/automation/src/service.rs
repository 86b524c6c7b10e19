//! Automation configuration operations.
//!
//! Each operation is a read-modify-write of one automation record. Writes are
//! guarded by the record version; a conflicting write is retried against the
//! fresh record a bounded number of times.

use crate::automation::{Automation, Keyword, Scope, TriggerType};
use crate::error::AutomationError;
use crate::listener::Listener;
use crate::store::AutomationStore;
use chrono::Utc;
use creator_flow_core::{AutomationId, CreatorId, KeywordId};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Creates and edits automations.
#[derive(Clone)]
pub struct AutomationService {
    store: Arc<dyn AutomationStore>,
}

impl AutomationService {
    /// Creates a new service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn AutomationStore>) -> Self {
        Self { store }
    }

    /// Creates an empty, inactive automation.
    #[instrument(skip(self), fields(creator_id = %creator_id))]
    pub async fn create(
        &self,
        creator_id: CreatorId,
        name: Option<String>,
    ) -> Result<Automation, Report<AutomationError>> {
        let automation = self
            .store
            .insert(Automation::new(creator_id, name, Utc::now()))
            .await?;
        info!(automation_id = %automation.id, "Created automation");
        Ok(automation)
    }

    /// Loads an automation.
    pub async fn get(
        &self,
        automation_id: AutomationId,
    ) -> Result<Automation, Report<AutomationError>> {
        Ok(self.store.get(automation_id).await?)
    }

    /// Lists a creator's automations, oldest first.
    pub async fn list(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<Automation>, Report<AutomationError>> {
        Ok(self.store.list_for_creator(creator_id).await?)
    }

    /// Renames an automation.
    pub async fn rename(
        &self,
        automation_id: AutomationId,
        name: &str,
    ) -> Result<Automation, Report<AutomationError>> {
        self.mutate(automation_id, |a| {
            a.name = name.trim().to_string();
            Ok(())
        })
        .await
    }

    /// Activates or deactivates an automation.
    ///
    /// Deactivating does not touch workflow runs the automation may have led to.
    #[instrument(skip(self), fields(automation_id = %automation_id))]
    pub async fn set_active(
        &self,
        automation_id: AutomationId,
        active: bool,
    ) -> Result<Automation, Report<AutomationError>> {
        self.mutate(automation_id, |a| a.set_active(active)).await
    }

    /// Adds a keyword. Adding an existing word returns the existing keyword.
    pub async fn add_keyword(
        &self,
        automation_id: AutomationId,
        word: &str,
    ) -> Result<Keyword, Report<AutomationError>> {
        // Validate before touching the store.
        Keyword::new(word)?;
        let mut added = None;
        self.mutate(automation_id, |a| {
            added = Some(a.add_keyword(word)?);
            Ok(())
        })
        .await?;
        added.ok_or_else(|| AutomationError::EmptyKeyword.into())
    }

    /// Removes a keyword.
    pub async fn remove_keyword(
        &self,
        automation_id: AutomationId,
        keyword_id: KeywordId,
    ) -> Result<Automation, Report<AutomationError>> {
        self.mutate(automation_id, |a| a.remove_keyword(keyword_id))
            .await
    }

    /// Replaces the trigger type set.
    pub async fn save_triggers(
        &self,
        automation_id: AutomationId,
        types: &[TriggerType],
    ) -> Result<Automation, Report<AutomationError>> {
        self.mutate(automation_id, |a| a.set_trigger_types(types.iter().copied()))
            .await
    }

    /// Replaces the listener.
    pub async fn save_listener(
        &self,
        automation_id: AutomationId,
        listener: Listener,
    ) -> Result<Automation, Report<AutomationError>> {
        self.mutate(automation_id, |a| a.set_listener(listener.clone()))
            .await
    }

    /// Replaces the post scope.
    pub async fn save_scope(
        &self,
        automation_id: AutomationId,
        scope: Scope,
    ) -> Result<Automation, Report<AutomationError>> {
        self.mutate(automation_id, |a| {
            a.set_scope(scope.clone());
            Ok(())
        })
        .await
    }

    /// Deletes an inactive automation.
    ///
    /// The delete is guarded by the version the inactive state was read at,
    /// so an automation activated in between is never removed.
    #[instrument(skip(self), fields(automation_id = %automation_id))]
    pub async fn delete(&self, automation_id: AutomationId) -> Result<(), Report<AutomationError>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let automation = self.store.get(automation_id).await?;
            if automation.active {
                return Err(AutomationError::StillActive { automation_id }.into());
            }
            match self.store.delete(automation_id, automation.version).await {
                Ok(()) => {
                    info!("Deleted automation");
                    return Ok(());
                }
                Err(AutomationError::VersionConflict { expected, found })
                    if attempt < MAX_WRITE_ATTEMPTS =>
                {
                    debug!(expected, found, attempt, "Automation changed before delete, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn mutate<F>(
        &self,
        automation_id: AutomationId,
        mut change: F,
    ) -> Result<Automation, Report<AutomationError>>
    where
        F: FnMut(&mut Automation) -> Result<(), AutomationError> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut automation = self.store.get(automation_id).await?;
            change(&mut automation)?;
            automation.updated_at = Utc::now();
            match self.store.update(&automation).await {
                Ok(stored) => return Ok(stored),
                Err(AutomationError::VersionConflict { expected, found })
                    if attempt < MAX_WRITE_ATTEMPTS =>
                {
                    debug!(
                        automation_id = %automation_id,
                        expected,
                        found,
                        attempt,
                        "Automation changed concurrently, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
