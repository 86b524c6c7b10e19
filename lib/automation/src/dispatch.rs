//! Reply dispatch.
//!
//! The dispatcher is the event-ingestion entry point. For each inbound event
//! it matches the creator's automations, narrows the matches with the
//! configured `MatchPolicy`, resolves each listener and delivers the result
//! through the messaging collaborator.
//!
//! A direct message that matches no keyword still continues a conversation
//! the actor already has with one of the creator's active conversational
//! automations. Continuations go through the resolver like any other match.

use crate::automation::{Automation, TriggerType};
use crate::error::{AgentError, DispatchError, ResolveError};
use crate::event::{InboundEvent, OutboundMessage};
use crate::matcher::{MatchPolicy, match_event};
use crate::resolver::{ConversationHandoff, ListenerResolver, ReplyPlan};
use crate::store::AutomationStore;
use async_trait::async_trait;
use creator_flow_conversation::Turn;
use creator_flow_core::{AutomationId, SendError};
use futures::future::join_all;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Delivers replies on the social platform.
#[async_trait]
pub trait MessageDispatch: Send + Sync {
    /// Sends one message.
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError>;
}

/// Produces replies for conversational listeners.
#[async_trait]
pub trait ConversationAgent: Send + Sync {
    /// Returns the agent's reply to the handoff's inbound message.
    async fn reply(&self, handoff: &ConversationHandoff) -> Result<String, AgentError>;
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Which matches fire when several automations match one event.
    pub match_policy: MatchPolicy,
    /// Delivery attempts per message before giving up.
    pub max_send_attempts: u32,
    /// Base delay between delivery attempts, multiplied by the attempt number.
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::default(),
            max_send_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

/// What happened for one selected automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Replies were delivered.
    Delivered { messages: usize },
    /// The listener is gated behind a capability the creator lacks.
    Denied(ResolveError),
    /// Resolution, the agent or delivery failed.
    Failed(DispatchError),
}

/// The outcome for one automation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub automation_id: AutomationId,
    /// The keyword that matched. `None` for conversation continuations.
    pub keyword: Option<String>,
    pub outcome: DispatchOutcome,
}

/// Outcomes for every automation an event fired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    /// Returns true if no automation fired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Total messages delivered.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.results
            .iter()
            .map(|r| match r.outcome {
                DispatchOutcome::Delivered { messages } => messages,
                _ => 0,
            })
            .sum()
    }
}

/// Matches inbound events and delivers replies.
#[derive(Clone)]
pub struct Dispatcher {
    automations: Arc<dyn AutomationStore>,
    resolver: ListenerResolver,
    messages: Arc<dyn MessageDispatch>,
    agent: Arc<dyn ConversationAgent>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Creates a new dispatcher.
    #[must_use]
    pub fn new(
        automations: Arc<dyn AutomationStore>,
        resolver: ListenerResolver,
        messages: Arc<dyn MessageDispatch>,
        agent: Arc<dyn ConversationAgent>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            automations,
            resolver,
            messages,
            agent,
            config,
        }
    }

    /// Handles one inbound event.
    ///
    /// Per-automation failures are reported in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the creator's automations cannot be loaded.
    #[instrument(
        skip(self, event),
        fields(creator_id = %event.creator_id, event_type = %event.event_type, actor_id = %event.actor_id)
    )]
    pub async fn handle(
        &self,
        event: &InboundEvent,
    ) -> Result<DispatchReport, Report<DispatchError>> {
        let automations = self
            .automations
            .list_for_creator(event.creator_id)
            .await
            .map_err(DispatchError::from)?;

        let matches = match_event(event, &automations);
        let selected: Vec<(&Automation, Option<String>)> = if matches.is_empty() {
            self.continuation(event, &automations)
                .await
                .into_iter()
                .map(|a| (a, None))
                .collect()
        } else {
            self.config
                .match_policy
                .select(matches)
                .into_iter()
                .map(|m| (m.automation, Some(m.keyword.word.clone())))
                .collect()
        };

        if selected.is_empty() {
            debug!("No automation matched");
            return Ok(DispatchReport::default());
        }

        let results = join_all(
            selected
                .into_iter()
                .map(|(automation, keyword)| self.fire(automation, keyword, event)),
        )
        .await;
        Ok(DispatchReport { results })
    }

    /// Finds the conversational automation an unmatched direct message continues.
    async fn continuation<'a>(
        &self,
        event: &InboundEvent,
        automations: &'a [Automation],
    ) -> Option<&'a Automation> {
        if event.event_type != TriggerType::DirectMessage {
            return None;
        }
        let conversations = match self
            .resolver
            .history()
            .conversations_for_actor(&event.actor_id)
            .await
        {
            Ok(conversations) => conversations,
            Err(e) => {
                warn!(error = %e, "Could not look up conversations for actor");
                return None;
            }
        };

        conversations.iter().find_map(|(automation_id, _)| {
            automations.iter().find(|a| {
                a.id == *automation_id
                    && a.active
                    && a.triggers_on(TriggerType::DirectMessage)
                    && a.listener.as_ref().is_some_and(|l| l.is_conversational())
            })
        })
    }

    async fn fire(
        &self,
        automation: &Automation,
        keyword: Option<String>,
        event: &InboundEvent,
    ) -> DispatchResult {
        let outcome = match self.resolver.resolve(automation, event).await {
            Ok(plan) => match self.deliver(automation.id, plan).await {
                Ok(messages) => {
                    info!(automation_id = %automation.id, messages, "Dispatched reply");
                    DispatchOutcome::Delivered { messages }
                }
                Err(e) => {
                    warn!(automation_id = %automation.id, error = %e, "Reply dispatch failed");
                    DispatchOutcome::Failed(e)
                }
            },
            Err(e @ ResolveError::CapabilityDenied { .. }) => {
                warn!(
                    automation_id = %automation.id,
                    error = %e,
                    "Automation matched but was not dispatched"
                );
                DispatchOutcome::Denied(e)
            }
            Err(e) => {
                warn!(automation_id = %automation.id, error = %e, "Listener resolution failed");
                DispatchOutcome::Failed(e.into())
            }
        };

        DispatchResult {
            automation_id: automation.id,
            keyword,
            outcome,
        }
    }

    async fn deliver(
        &self,
        automation_id: AutomationId,
        plan: ReplyPlan,
    ) -> Result<usize, DispatchError> {
        match plan {
            ReplyPlan::StaticMessage {
                direct,
                public_reply,
            } => {
                let mut delivered = 0;
                for message in std::iter::once(direct).chain(public_reply) {
                    self.send(&message).await.map_err(DispatchError::Send)?;
                    self.count(automation_id, message.channel).await;
                    delivered += 1;
                }
                Ok(delivered)
            }
            ReplyPlan::Conversational(handoff) => {
                let text = self
                    .agent
                    .reply(&handoff)
                    .await
                    .map_err(DispatchError::Agent)?;
                let message = OutboundMessage::direct(&handoff.actor_id, &text);
                self.send(&message).await.map_err(DispatchError::Send)?;
                self.resolver
                    .history()
                    .append(&handoff.key(), Turn::assistant(text))
                    .await?;
                self.count(automation_id, TriggerType::DirectMessage).await;
                Ok(1)
            }
        }
    }

    /// Sends with bounded retry on retryable failures.
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let max_attempts = self.config.max_send_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.messages.send(message).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay_ms = self.config.retry_backoff_ms * u64::from(attempt);
                    debug!(
                        channel = %message.channel,
                        attempt,
                        max_attempts,
                        delay_ms,
                        error = %e,
                        "Message send failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn count(&self, automation_id: AutomationId, channel: TriggerType) {
        if let Err(e) = self.automations.record_response(automation_id, channel).await {
            warn!(automation_id = %automation_id, error = %e, "Could not record response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::Scope;
    use crate::listener::Listener;
    use crate::memory::{FixedCapabilities, InMemoryAutomationStore};
    use chrono::{Duration as ChronoDuration, Utc};
    use creator_flow_conversation::{
        ConversationHistory, ConversationKey, InMemoryConversationHistory, TurnRole,
    };
    use creator_flow_core::{CreatorId, FixedStorefronts};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatch {
        sent: Mutex<Vec<OutboundMessage>>,
        failures: Mutex<VecDeque<SendError>>,
    }

    impl RecordingDispatch {
        fn failing_with(errors: Vec<SendError>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failures: Mutex::new(errors.into()),
            }
        }

        fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageDispatch for RecordingDispatch {
        async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct EchoAgent;

    #[async_trait]
    impl ConversationAgent for EchoAgent {
        async fn reply(&self, handoff: &ConversationHandoff) -> Result<String, AgentError> {
            Ok(format!(
                "({} prior) you said: {}",
                handoff.history.len(),
                handoff.inbound
            ))
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        store: Arc<InMemoryAutomationStore>,
        messages: Arc<RecordingDispatch>,
        history: Arc<InMemoryConversationHistory>,
        capabilities: Arc<FixedCapabilities>,
        creator_id: CreatorId,
    }

    fn harness_with(messages: RecordingDispatch, policy: MatchPolicy) -> Harness {
        let creator_id = CreatorId::new();
        let store = Arc::new(InMemoryAutomationStore::new());
        let messages = Arc::new(messages);
        let history = Arc::new(InMemoryConversationHistory::new());
        let capabilities = Arc::new(FixedCapabilities::new());
        let resolver = ListenerResolver::new(
            capabilities.clone(),
            history.clone(),
            Arc::new(FixedStorefronts::new().with(creator_id, "https://shop.example/maya")),
        );
        let dispatcher = Dispatcher::new(
            store.clone(),
            resolver,
            messages.clone(),
            Arc::new(EchoAgent),
            DispatchConfig {
                match_policy: policy,
                retry_backoff_ms: 0,
                ..DispatchConfig::default()
            },
        );
        Harness {
            dispatcher,
            store,
            messages,
            history,
            capabilities,
            creator_id,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingDispatch::default(), MatchPolicy::default())
    }

    impl Harness {
        async fn automation(
            &self,
            types: &[TriggerType],
            scope: Scope,
            keywords: &[&str],
            listener: Listener,
            age: ChronoDuration,
        ) -> Automation {
            let mut a = Automation::new(self.creator_id, None, Utc::now() - age);
            a.set_trigger_types(types.iter().copied()).expect("triggers");
            for word in keywords {
                a.add_keyword(word).expect("keyword");
            }
            a.set_scope(scope);
            a.set_listener(listener).expect("listener");
            a.set_active(true).expect("activate");
            self.store.insert(a).await.expect("insert")
        }
    }

    #[tokio::test]
    async fn scoped_comment_sends_dm_and_counts_it() {
        let h = harness();
        let a1 = h
            .automation(
                &[TriggerType::Comment],
                Scope::enumerated(["post-1"]),
                &["STEMS"],
                Listener::message("Here are the stems {{firstName}}: {{storeUrl}}"),
                ChronoDuration::zero(),
            )
            .await;

        let hit = InboundEvent::comment(h.creator_id, "post-1", "send me the STEMS pls", "actor-9");
        let report = h.dispatcher.handle(&hit).await.expect("handle");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].automation_id, a1.id);
        assert_eq!(report.results[0].keyword.as_deref(), Some("stems"));
        assert_eq!(report.delivered(), 1);

        let sent = h.messages.sent();
        assert_eq!(sent[0].recipient, "actor-9");
        assert_eq!(
            sent[0].rendered_text,
            "Here are the stems there: https://shop.example/maya"
        );
        assert_eq!(h.store.get(a1.id).await.expect("get").counters.dm_count, 1);

        let miss = InboundEvent::comment(h.creator_id, "post-2", "STEMS", "actor-9");
        assert!(h.dispatcher.handle(&miss).await.expect("handle").is_empty());
        assert_eq!(h.messages.sent().len(), 1);
    }

    #[tokio::test]
    async fn comment_reply_counts_both_channels() {
        let h = harness();
        let a = h
            .automation(
                &[TriggerType::Comment],
                Scope::Global,
                &["free"],
                Listener::message_with_comment_reply("Link inside", "Check your DMs!"),
                ChronoDuration::zero(),
            )
            .await;

        let event = InboundEvent::comment(h.creator_id, "post-7", "free?", "actor-1");
        let report = h.dispatcher.handle(&event).await.expect("handle");
        assert_eq!(report.delivered(), 2);

        let counters = h.store.get(a.id).await.expect("get").counters;
        assert_eq!(counters.dm_count, 1);
        assert_eq!(counters.comment_count, 1);
    }

    #[tokio::test]
    async fn first_match_policy_fires_oldest_only() {
        let h = harness();
        let older = h
            .automation(
                &[TriggerType::DirectMessage],
                Scope::Global,
                &["beat"],
                Listener::message("older"),
                ChronoDuration::hours(2),
            )
            .await;
        h.automation(
            &[TriggerType::DirectMessage],
            Scope::Global,
            &["beat"],
            Listener::message("newer"),
            ChronoDuration::hours(1),
        )
        .await;

        let event = InboundEvent::direct_message(h.creator_id, "beat pls", "actor-1");
        let report = h.dispatcher.handle(&event).await.expect("handle");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].automation_id, older.id);
        assert_eq!(h.messages.sent()[0].rendered_text, "older");
    }

    #[tokio::test]
    async fn all_policy_fires_every_match() {
        let h = harness_with(RecordingDispatch::default(), MatchPolicy::All);
        for (text, age) in [("older", 2), ("newer", 1)] {
            h.automation(
                &[TriggerType::DirectMessage],
                Scope::Global,
                &["beat"],
                Listener::message(text),
                ChronoDuration::hours(age),
            )
            .await;
        }

        let event = InboundEvent::direct_message(h.creator_id, "beat pls", "actor-1");
        let report = h.dispatcher.handle(&event).await.expect("handle");
        assert_eq!(report.delivered(), 2);
    }

    #[tokio::test]
    async fn conversational_without_capability_is_not_dispatched() {
        let h = harness();
        let a = h
            .automation(
                &[TriggerType::DirectMessage],
                Scope::Global,
                &["stems"],
                Listener::conversational("You sell beats."),
                ChronoDuration::zero(),
            )
            .await;

        let event = InboundEvent::direct_message(h.creator_id, "stems?", "actor-1");
        let report = h.dispatcher.handle(&event).await.expect("handle");
        assert_eq!(
            report.results[0].outcome,
            DispatchOutcome::Denied(ResolveError::CapabilityDenied {
                creator_id: h.creator_id
            })
        );
        assert!(h.messages.sent().is_empty());
        assert_eq!(h.store.get(a.id).await.expect("get").counters.dm_count, 0);
    }

    #[tokio::test]
    async fn conversational_reply_is_sent_and_recorded() {
        let h = harness();
        h.capabilities.grant(h.creator_id);
        let a = h
            .automation(
                &[TriggerType::DirectMessage],
                Scope::Global,
                &["stems"],
                Listener::conversational("You sell beats."),
                ChronoDuration::zero(),
            )
            .await;

        let event = InboundEvent::direct_message(h.creator_id, "stems?", "actor-1");
        let report = h.dispatcher.handle(&event).await.expect("handle");
        assert_eq!(report.delivered(), 1);
        assert_eq!(h.messages.sent()[0].rendered_text, "(0 prior) you said: stems?");

        let turns = h
            .history
            .recent(&ConversationKey::new(a.id, "actor-1"), 10)
            .await
            .expect("recent");
        let roles: Vec<TurnRole> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::Assistant]);
    }

    #[tokio::test]
    async fn unmatched_dm_continues_existing_conversation() {
        let h = harness();
        h.capabilities.grant(h.creator_id);
        let a = h
            .automation(
                &[TriggerType::DirectMessage],
                Scope::Global,
                &["stems"],
                Listener::conversational("You sell beats."),
                ChronoDuration::zero(),
            )
            .await;
        let opener = InboundEvent::direct_message(h.creator_id, "stems?", "actor-1");
        h.dispatcher.handle(&opener).await.expect("handle");

        let follow_up = InboundEvent::direct_message(h.creator_id, "what about drums", "actor-1");
        let report = h.dispatcher.handle(&follow_up).await.expect("handle");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].automation_id, a.id);
        assert_eq!(report.results[0].keyword, None);
        assert_eq!(
            h.messages.sent()[1].rendered_text,
            "(2 prior) you said: what about drums"
        );

        let stranger = InboundEvent::direct_message(h.creator_id, "what about drums", "actor-2");
        assert!(h.dispatcher.handle(&stranger).await.expect("handle").is_empty());
    }

    #[tokio::test]
    async fn continuation_stops_after_deactivation() {
        let h = harness();
        h.capabilities.grant(h.creator_id);
        let a = h
            .automation(
                &[TriggerType::DirectMessage],
                Scope::Global,
                &["stems"],
                Listener::conversational("You sell beats."),
                ChronoDuration::zero(),
            )
            .await;
        let opener = InboundEvent::direct_message(h.creator_id, "stems?", "actor-1");
        h.dispatcher.handle(&opener).await.expect("handle");

        let mut stored = h.store.get(a.id).await.expect("get");
        stored.set_active(false).expect("deactivate");
        h.store.update(&stored).await.expect("update");

        let follow_up = InboundEvent::direct_message(h.creator_id, "hello again", "actor-1");
        assert!(h.dispatcher.handle(&follow_up).await.expect("handle").is_empty());
    }

    #[tokio::test]
    async fn retryable_send_failure_is_retried() {
        let h = harness_with(
            RecordingDispatch::failing_with(vec![SendError::retryable("rate limited")]),
            MatchPolicy::default(),
        );
        h.automation(
            &[TriggerType::DirectMessage],
            Scope::Global,
            &["stems"],
            Listener::message("here"),
            ChronoDuration::zero(),
        )
        .await;

        let event = InboundEvent::direct_message(h.creator_id, "stems", "actor-1");
        let report = h.dispatcher.handle(&event).await.expect("handle");
        assert_eq!(report.delivered(), 1);
    }

    #[tokio::test]
    async fn exhausted_or_terminal_send_failure_is_reported() {
        let h = harness_with(
            RecordingDispatch::failing_with(vec![
                SendError::retryable("rate limited"),
                SendError::retryable("rate limited"),
                SendError::retryable("rate limited"),
                SendError::terminal("user blocked the account"),
            ]),
            MatchPolicy::default(),
        );
        h.automation(
            &[TriggerType::DirectMessage],
            Scope::Global,
            &["stems"],
            Listener::message("here"),
            ChronoDuration::zero(),
        )
        .await;
        let event = InboundEvent::direct_message(h.creator_id, "stems", "actor-1");

        let exhausted = h.dispatcher.handle(&event).await.expect("handle");
        assert_eq!(
            exhausted.results[0].outcome,
            DispatchOutcome::Failed(DispatchError::Send(SendError::retryable("rate limited")))
        );

        let terminal = h.dispatcher.handle(&event).await.expect("handle");
        assert_eq!(
            terminal.results[0].outcome,
            DispatchOutcome::Failed(DispatchError::Send(SendError::terminal(
                "user blocked the account"
            )))
        );
        assert!(h.messages.sent().is_empty());
    }
}
