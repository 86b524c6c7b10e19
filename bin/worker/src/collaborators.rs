//! Log-only stand-ins for the external delivery services.
//!
//! The worker runs without email or messaging providers wired in; these
//! implementations record what would have been sent.

use async_trait::async_trait;
use creator_flow_automation::{
    AgentError, ConversationAgent, ConversationHandoff, MessageDispatch, OutboundMessage,
};
use creator_flow_core::SendError;
use creator_flow_workflow::{EmailSender, OutboundEmail};
use tracing::info;

/// Reply used when no conversational agent is configured.
pub const HOLDING_REPLY: &str = "Thanks for the message! I'll get back to you soon.";

/// Logs outbound workflow emails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<(), SendError> {
        info!(
            recipient = %email.recipient,
            subject = %email.subject,
            body_bytes = email.body_html.len(),
            "Email send"
        );
        Ok(())
    }
}

/// Logs outbound social replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMessageDispatch;

#[async_trait]
impl MessageDispatch for LogMessageDispatch {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        info!(
            channel = %message.channel,
            recipient = %message.recipient,
            text = %message.rendered_text,
            "Social reply send"
        );
        Ok(())
    }
}

/// Answers every handoff with a fixed holding reply.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldingAgent;

#[async_trait]
impl ConversationAgent for HoldingAgent {
    async fn reply(&self, handoff: &ConversationHandoff) -> Result<String, AgentError> {
        info!(
            automation_id = %handoff.automation_id,
            actor_id = %handoff.actor_id,
            history_turns = handoff.history.len(),
            "Conversational handoff"
        );
        Ok(HOLDING_REPLY.to_string())
    }
}
