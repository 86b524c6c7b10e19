//! Demo data for local runs.
//!
//! Publishes the generated workflow set for one creator, enrolls a subscriber
//! through the lead-signup trigger, and fires a sample comment at a keyword
//! automation. The sweep then carries the enrolled runs forward.

use crate::error::WorkerError;
use crate::runtime::Runtime;
use chrono::{DateTime, Utc};
use creator_flow_automation::{InboundEvent, Listener, Scope, TriggerType};
use creator_flow_core::{CreatorId, SubscriberId};
use creator_flow_workflow::{
    CreatorContext, Enrollment, EnrollmentEvent, GraphStore, SubscriberProfile, Tone, generate,
};
use rootcause::prelude::Report;
use tracing::info;

/// Demo storefront URL.
pub const DEMO_STORE_URL: &str = "https://store.example/demo";

const DEMO_POST: &str = "demo-post";

/// What the seed created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub workflows: usize,
    pub runs_started: usize,
    pub replies_delivered: usize,
}

/// Seeds demo data for `creator_id`.
///
/// # Errors
///
/// Returns the first step that fails.
pub async fn seed_demo(
    runtime: &Runtime,
    creator_id: CreatorId,
    now: DateTime<Utc>,
) -> Result<SeedSummary, Report<WorkerError>> {
    let context = CreatorContext {
        creator_name: "Demo Creator".to_string(),
        store_name: "Demo Store".to_string(),
        ..CreatorContext::default()
    };
    let drafts =
        generate(&context, Tone::Casual).map_err(|e| WorkerError::seed("generate", e))?;
    let workflows = drafts.len();
    for draft in drafts {
        let published = draft
            .publish(creator_id, now)
            .map_err(|e| WorkerError::seed("publish", e))?;
        runtime
            .graphs
            .publish(published)
            .await
            .map_err(|e| WorkerError::seed("publish", e))?;
    }

    runtime.capabilities.grant(creator_id);

    let subscriber_id = SubscriberId::new();
    runtime.subscribers.insert(SubscriberProfile {
        id: subscriber_id,
        creator_id,
        email: "sam@example.com".to_string(),
        first_name: Some("Sam".to_string()),
    });
    let enrollments = runtime
        .executor
        .enroll_matching(creator_id, &EnrollmentEvent::LeadSignup, subscriber_id, now)
        .await
        .map_err(|e| WorkerError::seed("enroll", e))?;
    let runs_started = enrollments
        .iter()
        .filter(|(_, e)| matches!(e, Enrollment::Started { .. }))
        .count();

    let replies_delivered = seed_automation(runtime, creator_id).await?;

    let summary = SeedSummary {
        workflows,
        runs_started,
        replies_delivered,
    };
    info!(
        creator_id = %creator_id,
        workflows = summary.workflows,
        runs_started = summary.runs_started,
        replies_delivered = summary.replies_delivered,
        "Seeded demo data"
    );
    Ok(summary)
}

async fn seed_automation(
    runtime: &Runtime,
    creator_id: CreatorId,
) -> Result<usize, Report<WorkerError>> {
    let service = &runtime.automations;
    let step = |e: Report<_>| WorkerError::seed("automation", e);

    let automation = service
        .create(creator_id, Some("Free stems".to_string()))
        .await
        .map_err(step)?;
    service
        .save_triggers(automation.id, &[TriggerType::Comment, TriggerType::DirectMessage])
        .await
        .map_err(step)?;
    service
        .add_keyword(automation.id, "stems")
        .await
        .map_err(step)?;
    service
        .save_scope(automation.id, Scope::enumerated([DEMO_POST]))
        .await
        .map_err(step)?;
    service
        .save_listener(
            automation.id,
            Listener::message_with_comment_reply(
                "Hey {{firstName}}! Grab the free stems here: {{storeUrl}}",
                "Sent you a DM!",
            ),
        )
        .await
        .map_err(step)?;
    service.set_active(automation.id, true).await.map_err(step)?;

    let event = InboundEvent::comment(creator_id, DEMO_POST, "Can I get the STEMS?", "demo-fan")
        .with_actor_name("Riley Fan");
    let report = runtime
        .dispatcher
        .handle(&event)
        .await
        .map_err(|e| WorkerError::seed("dispatch", e))?;
    Ok(report.delivered())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use creator_flow_core::FixedStorefronts;

    #[tokio::test]
    async fn seed_publishes_enrolls_and_replies() {
        let creator_id = CreatorId::new();
        let runtime = Runtime::in_memory(
            &WorkerConfig::default(),
            FixedStorefronts::new().with(creator_id, DEMO_STORE_URL),
        );

        let summary = seed_demo(&runtime, creator_id, Utc::now())
            .await
            .expect("seed");

        // Welcome and win-back with an empty catalog.
        assert_eq!(summary.workflows, 2);
        // Only the welcome series enrolls on lead signup.
        assert_eq!(summary.runs_started, 1);
        // One DM and one public comment reply.
        assert_eq!(summary.replies_delivered, 2);

        let automations = runtime.automations.list(creator_id).await.expect("list");
        assert_eq!(automations.len(), 1);
        assert_eq!(automations[0].counters.dm_count, 1);
        assert_eq!(automations[0].counters.comment_count, 1);
    }

    #[tokio::test]
    async fn seeded_runs_are_picked_up_by_the_sweep() {
        let creator_id = CreatorId::new();
        let runtime = Runtime::in_memory(&WorkerConfig::default(), FixedStorefronts::new());
        let now = Utc::now();
        seed_demo(&runtime, creator_id, now).await.expect("seed");

        let report = runtime
            .sweeper
            .sweep_once(now + chrono::Duration::days(2))
            .await
            .expect("sweep");
        assert_eq!(report.resumed, 1);
    }
}
