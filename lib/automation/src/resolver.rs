//! Listener resolution.
//!
//! Turns a matched automation and its triggering event into a `ReplyPlan`.
//! Resolution never changes the automation. A conversational resolution
//! appends the inbound message to the (automation, actor) history, and
//! only does so after the capability check passed.

use crate::automation::{Automation, TriggerType};
use crate::error::ResolveError;
use crate::event::{InboundEvent, OutboundMessage};
use crate::listener::Listener;
use async_trait::async_trait;
use creator_flow_conversation::{ConversationHistory, ConversationKey, DEFAULT_HISTORY_LIMIT, Turn};
use creator_flow_core::{AutomationId, CreatorId, Storefronts, TemplateVars, render};
use std::sync::Arc;
use tracing::{debug, warn};

/// First name used when the platform gives no display name.
pub const FALLBACK_FIRST_NAME: &str = "there";

/// Answers whether a creator's subscription tier includes a capability.
#[async_trait]
pub trait CapabilityCheck: Send + Sync {
    /// Returns true if the creator may use conversational listeners.
    async fn allows_conversational(&self, creator_id: CreatorId) -> Result<bool, ResolveError>;
}

/// Everything a conversational agent needs to answer one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHandoff {
    pub automation_id: AutomationId,
    pub actor_id: String,
    pub system_prompt: String,
    /// Prior turns for this (automation, actor) pair, oldest first.
    pub history: Vec<Turn>,
    /// The message being answered.
    pub inbound: String,
}

impl ConversationHandoff {
    /// Returns the history scope of this conversation.
    #[must_use]
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.automation_id, self.actor_id.clone())
    }
}

/// What to send in response to a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPlan {
    /// Templated replies, already rendered.
    StaticMessage {
        direct: OutboundMessage,
        /// Present only for comment events with a comment reply template.
        public_reply: Option<OutboundMessage>,
    },
    /// Hand the message to the conversational agent.
    Conversational(ConversationHandoff),
}

/// Resolves listeners into reply plans.
#[derive(Clone)]
pub struct ListenerResolver {
    capabilities: Arc<dyn CapabilityCheck>,
    history: Arc<dyn ConversationHistory>,
    storefronts: Arc<dyn Storefronts>,
    history_limit: usize,
}

impl ListenerResolver {
    /// Creates a resolver with the default history window.
    #[must_use]
    pub fn new(
        capabilities: Arc<dyn CapabilityCheck>,
        history: Arc<dyn ConversationHistory>,
        storefronts: Arc<dyn Storefronts>,
    ) -> Self {
        Self {
            capabilities,
            history,
            storefronts,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Sets how many prior turns a handoff carries.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Returns the conversation history store.
    #[must_use]
    pub fn history(&self) -> &Arc<dyn ConversationHistory> {
        &self.history
    }

    /// Produces the reply plan for a matched automation.
    ///
    /// # Errors
    ///
    /// - `MissingListener` if the automation has no listener.
    /// - `CapabilityDenied` for a conversational listener on a creator without
    ///   the capability. Nothing is written in that case.
    pub async fn resolve(
        &self,
        automation: &Automation,
        event: &InboundEvent,
    ) -> Result<ReplyPlan, ResolveError> {
        let Some(listener) = &automation.listener else {
            return Err(ResolveError::MissingListener {
                automation_id: automation.id,
            });
        };

        match listener {
            Listener::StaticMessage {
                message,
                comment_reply,
            } => {
                let store_url = self.storefronts.store_url(automation.creator_id).await;
                if store_url.is_none() {
                    warn!(
                        automation_id = %automation.id,
                        creator_id = %automation.creator_id,
                        "No storefront URL for creator, leaving placeholder unrendered"
                    );
                }
                let first_name = event
                    .actor_name
                    .as_deref()
                    .and_then(|name| name.split_whitespace().next())
                    .unwrap_or(FALLBACK_FIRST_NAME);
                let vars = TemplateVars::subscriber(first_name, store_url);

                let direct = OutboundMessage::direct(&event.actor_id, render(message, &vars));
                let public_reply = comment_reply
                    .as_deref()
                    .filter(|_| event.event_type == TriggerType::Comment)
                    .filter(|reply| !reply.trim().is_empty())
                    .map(|reply| OutboundMessage::comment(&event.actor_id, render(reply, &vars)));
                Ok(ReplyPlan::StaticMessage {
                    direct,
                    public_reply,
                })
            }
            Listener::Conversational { system_prompt } => {
                if !self
                    .capabilities
                    .allows_conversational(automation.creator_id)
                    .await?
                {
                    return Err(ResolveError::CapabilityDenied {
                        creator_id: automation.creator_id,
                    });
                }

                let key = ConversationKey::new(automation.id, event.actor_id.clone());
                let history = self.history.recent(&key, self.history_limit).await?;
                self.history.append(&key, Turn::user(&event.text)).await?;
                debug!(
                    automation_id = %automation.id,
                    prior_turns = history.len(),
                    "Prepared conversation handoff"
                );

                Ok(ReplyPlan::Conversational(ConversationHandoff {
                    automation_id: automation.id,
                    actor_id: event.actor_id.clone(),
                    system_prompt: system_prompt.clone(),
                    history,
                    inbound: event.text.clone(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::Scope;
    use crate::memory::FixedCapabilities;
    use chrono::Utc;
    use creator_flow_conversation::{InMemoryConversationHistory, TurnRole};
    use creator_flow_core::FixedStorefronts;

    struct Fixture {
        resolver: ListenerResolver,
        history: Arc<InMemoryConversationHistory>,
        capabilities: Arc<FixedCapabilities>,
        creator_id: CreatorId,
    }

    fn fixture() -> Fixture {
        let creator_id = CreatorId::new();
        let history = Arc::new(InMemoryConversationHistory::new());
        let capabilities = Arc::new(FixedCapabilities::new());
        let resolver = ListenerResolver::new(
            capabilities.clone(),
            history.clone(),
            Arc::new(FixedStorefronts::new().with(creator_id, "https://shop.example/maya")),
        );
        Fixture {
            resolver,
            history,
            capabilities,
            creator_id,
        }
    }

    fn automation(creator_id: CreatorId, listener: Listener) -> Automation {
        let mut a = Automation::new(creator_id, None, Utc::now());
        a.set_trigger_types([TriggerType::Comment, TriggerType::DirectMessage])
            .expect("triggers");
        a.add_keyword("stems").expect("keyword");
        a.set_scope(Scope::Global);
        a.set_listener(listener).expect("listener");
        a
    }

    #[tokio::test]
    async fn static_message_renders_variables() {
        let f = fixture();
        let a = automation(
            f.creator_id,
            Listener::message("Hey {{firstName}}, grab them at {{storeUrl}}"),
        );
        let event = InboundEvent::direct_message(f.creator_id, "stems?", "actor-1")
            .with_actor_name("Jordan Lee");

        let plan = f.resolver.resolve(&a, &event).await.expect("resolve");
        let ReplyPlan::StaticMessage {
            direct,
            public_reply,
        } = plan
        else {
            panic!("expected a static plan");
        };
        assert_eq!(direct.recipient, "actor-1");
        assert_eq!(direct.channel, TriggerType::DirectMessage);
        assert_eq!(
            direct.rendered_text,
            "Hey Jordan, grab them at https://shop.example/maya"
        );
        assert!(public_reply.is_none());
    }

    #[tokio::test]
    async fn missing_storefront_leaves_store_url_placeholder() {
        let f = fixture();
        let unlisted = CreatorId::new();
        let a = automation(unlisted, Listener::message("Grab them at {{storeUrl}}"));
        let event = InboundEvent::direct_message(unlisted, "stems?", "actor-1");

        let ReplyPlan::StaticMessage { direct, .. } =
            f.resolver.resolve(&a, &event).await.expect("resolve")
        else {
            panic!("expected a static plan");
        };
        assert_eq!(direct.rendered_text, "Grab them at {{storeUrl}}");
    }

    #[tokio::test]
    async fn comment_reply_only_for_comment_events() {
        let f = fixture();
        let a = automation(
            f.creator_id,
            Listener::message_with_comment_reply("Sent you a DM {{firstName}}", "Check your DMs!"),
        );

        let comment = InboundEvent::comment(f.creator_id, "post-1", "stems", "actor-1");
        let ReplyPlan::StaticMessage {
            direct,
            public_reply,
        } = f.resolver.resolve(&a, &comment).await.expect("resolve")
        else {
            panic!("expected a static plan");
        };
        assert_eq!(direct.rendered_text, "Sent you a DM there");
        let public_reply = public_reply.expect("public reply");
        assert_eq!(public_reply.channel, TriggerType::Comment);
        assert_eq!(public_reply.rendered_text, "Check your DMs!");

        let dm = InboundEvent::direct_message(f.creator_id, "stems", "actor-1");
        let ReplyPlan::StaticMessage { public_reply, .. } =
            f.resolver.resolve(&a, &dm).await.expect("resolve")
        else {
            panic!("expected a static plan");
        };
        assert!(public_reply.is_none());
    }

    #[tokio::test]
    async fn conversational_without_capability_is_denied() {
        let f = fixture();
        let a = automation(f.creator_id, Listener::conversational("You sell beats."));
        let event = InboundEvent::direct_message(f.creator_id, "stems?", "actor-1");

        let result = f.resolver.resolve(&a, &event).await;
        assert_eq!(
            result,
            Err(ResolveError::CapabilityDenied {
                creator_id: f.creator_id
            })
        );

        let key = ConversationKey::new(a.id, "actor-1");
        assert!(f.history.recent(&key, 10).await.expect("recent").is_empty());
    }

    #[tokio::test]
    async fn conversational_handoff_carries_prior_turns() {
        let f = fixture();
        f.capabilities.grant(f.creator_id);
        let a = automation(f.creator_id, Listener::conversational("You sell beats."));
        let key = ConversationKey::new(a.id, "actor-1");
        f.history
            .append(&key, Turn::user("hi"))
            .await
            .expect("append");
        f.history
            .append(&key, Turn::assistant("hello!"))
            .await
            .expect("append");

        let event = InboundEvent::direct_message(f.creator_id, "do you have stems?", "actor-1");
        let ReplyPlan::Conversational(handoff) =
            f.resolver.resolve(&a, &event).await.expect("resolve")
        else {
            panic!("expected a handoff");
        };
        assert_eq!(handoff.system_prompt, "You sell beats.");
        assert_eq!(handoff.inbound, "do you have stems?");
        let roles: Vec<TurnRole> = handoff.history.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![TurnRole::User, TurnRole::Assistant]);

        let stored = f.history.recent(&key, 10).await.expect("recent");
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].content, "do you have stems?");
    }

    #[tokio::test]
    async fn handoff_history_is_windowed() {
        let f = fixture();
        f.capabilities.grant(f.creator_id);
        let resolver = f.resolver.clone().with_history_limit(2);
        let a = automation(f.creator_id, Listener::conversational("You sell beats."));
        let key = ConversationKey::new(a.id, "actor-1");
        for i in 0..5 {
            f.history
                .append(&key, Turn::user(format!("turn {i}")))
                .await
                .expect("append");
        }

        let event = InboundEvent::direct_message(f.creator_id, "stems", "actor-1");
        let ReplyPlan::Conversational(handoff) = resolver.resolve(&a, &event).await.expect("resolve")
        else {
            panic!("expected a handoff");
        };
        let contents: Vec<&str> = handoff.history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["turn 3", "turn 4"]);
    }

    #[tokio::test]
    async fn missing_listener_is_an_error() {
        let f = fixture();
        let a = Automation::new(f.creator_id, None, Utc::now());
        let event = InboundEvent::direct_message(f.creator_id, "stems", "actor-1");
        assert!(matches!(
            f.resolver.resolve(&a, &event).await,
            Err(ResolveError::MissingListener { .. })
        ));
    }
}
