//! Wiring of stores, collaborators and services.

use crate::collaborators::{HoldingAgent, LogEmailSender, LogMessageDispatch};
use crate::config::WorkerConfig;
use creator_flow_automation::memory::{FixedCapabilities, InMemoryAutomationStore};
use creator_flow_automation::{AutomationService, Dispatcher, ListenerResolver};
use creator_flow_conversation::InMemoryConversationHistory;
use creator_flow_core::FixedStorefronts;
use creator_flow_scheduler::Sweeper;
use creator_flow_workflow::memory::{
    InMemoryEngagement, InMemoryGraphStore, InMemoryRunStore, InMemorySubscriberStore,
};
use creator_flow_workflow::{Collaborators, Executor};
use std::sync::Arc;

/// Everything the worker runs, backed by in-memory stores.
pub struct Runtime {
    pub graphs: Arc<InMemoryGraphStore>,
    pub subscribers: Arc<InMemorySubscriberStore>,
    pub capabilities: Arc<FixedCapabilities>,
    pub executor: Executor,
    pub automations: AutomationService,
    pub dispatcher: Dispatcher,
    pub sweeper: Sweeper,
}

impl Runtime {
    /// Builds the runtime from configuration.
    #[must_use]
    pub fn in_memory(config: &WorkerConfig, storefronts: FixedStorefronts) -> Self {
        let graphs = Arc::new(InMemoryGraphStore::new());
        let runs = Arc::new(InMemoryRunStore::new());
        let subscribers = Arc::new(InMemorySubscriberStore::new());
        let storefronts = Arc::new(storefronts);

        let executor = Executor::new(
            graphs.clone(),
            runs,
            Collaborators {
                subscribers: subscribers.clone(),
                email: Arc::new(LogEmailSender),
                engagement: Arc::new(InMemoryEngagement::new()),
                storefronts: storefronts.clone(),
            },
            config.executor.clone(),
        );

        let automation_store = Arc::new(InMemoryAutomationStore::new());
        let capabilities = Arc::new(FixedCapabilities::new());
        let resolver = ListenerResolver::new(
            capabilities.clone(),
            Arc::new(InMemoryConversationHistory::new()),
            storefronts,
        )
        .with_history_limit(config.conversation.history_limit);
        let dispatcher = Dispatcher::new(
            automation_store.clone(),
            resolver,
            Arc::new(LogMessageDispatch),
            Arc::new(HoldingAgent),
            config.dispatch.clone(),
        );

        Self {
            graphs,
            subscribers,
            capabilities,
            sweeper: Sweeper::new(executor.clone(), config.sweep.clone()),
            executor,
            automations: AutomationService::new(automation_store),
            dispatcher,
        }
    }
}
