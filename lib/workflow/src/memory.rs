//! In-memory implementations of the workflow stores and collaborators.
//!
//! Used by tests and by the worker binary when no durable backend is
//! configured. Every map sits behind a `std::sync::RwLock`; no lock is held
//! across an await point.

use crate::definition::PublishedWorkflow;
use crate::error::{CollaboratorError, StoreError};
use crate::execution::{RunState, WorkflowRun};
use crate::node::NodeId;
use crate::services::{
    CatalogSummary, CourseSummary, EngagementQuery, ProductSummary, SubscriberProfile,
    SubscriberStore,
};
use crate::store::{GraphStore, RunStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creator_flow_core::{CreatorId, SubscriberId, WorkflowId, WorkflowRunId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

fn poisoned() -> StoreError {
    StoreError::StorageFailed {
        reason: "lock poisoned".to_string(),
    }
}

fn validated(workflow: &PublishedWorkflow) -> Result<(), StoreError> {
    workflow
        .graph
        .validate()
        .map_err(|source| StoreError::InvalidGraph {
            workflow_id: workflow.id,
            source,
        })
}

/// In-memory graph store. Keeps every published version.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    versions: Arc<RwLock<HashMap<WorkflowId, Vec<Arc<PublishedWorkflow>>>>>,
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn publish(&self, workflow: PublishedWorkflow) -> Result<(), StoreError> {
        validated(&workflow)?;
        let mut versions = self.versions.write().map_err(|_| poisoned())?;
        if let Some(existing) = versions.get(&workflow.id) {
            return Err(StoreError::VersionConflict {
                expected: 0,
                found: existing.len() as u64,
            });
        }
        versions.insert(workflow.id, vec![Arc::new(workflow)]);
        Ok(())
    }

    async fn replace(&self, workflow: PublishedWorkflow) -> Result<(), StoreError> {
        validated(&workflow)?;
        let mut versions = self.versions.write().map_err(|_| poisoned())?;
        let history = versions
            .get_mut(&workflow.id)
            .ok_or(StoreError::WorkflowNotFound {
                workflow_id: workflow.id,
            })?;
        let latest = history.last().map_or(0, |w| w.version);
        if workflow.version != latest + 1 {
            return Err(StoreError::VersionConflict {
                expected: u64::from(latest + 1),
                found: u64::from(workflow.version),
            });
        }
        history.push(Arc::new(workflow));
        Ok(())
    }

    async fn latest(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Arc<PublishedWorkflow>, StoreError> {
        let versions = self.versions.read().map_err(|_| poisoned())?;
        versions
            .get(&workflow_id)
            .and_then(|history| history.last().cloned())
            .ok_or(StoreError::WorkflowNotFound { workflow_id })
    }

    async fn get_version(
        &self,
        workflow_id: WorkflowId,
        version: u32,
    ) -> Result<Arc<PublishedWorkflow>, StoreError> {
        let versions = self.versions.read().map_err(|_| poisoned())?;
        versions
            .get(&workflow_id)
            .and_then(|history| history.iter().find(|w| w.version == version).cloned())
            .ok_or(StoreError::WorkflowNotFound { workflow_id })
    }

    async fn list_for_creator(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<Arc<PublishedWorkflow>>, StoreError> {
        let versions = self.versions.read().map_err(|_| poisoned())?;
        let mut found: Vec<Arc<PublishedWorkflow>> = versions
            .values()
            .filter_map(|history| history.last())
            .filter(|w| w.creator_id == creator_id)
            .cloned()
            .collect();
        found.sort_by_key(|w| w.id);
        Ok(found)
    }
}

/// In-memory run store with optimistic versioning.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunStore {
    runs: Arc<RwLock<HashMap<WorkflowRunId, WorkflowRun>>>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn insert_if_no_live(&self, mut run: WorkflowRun) -> Result<WorkflowRun, StoreError> {
        let mut runs = self.runs.write().map_err(|_| poisoned())?;
        let live = runs.values().find(|r| {
            r.workflow_id == run.workflow_id
                && r.subscriber_id == run.subscriber_id
                && !r.is_terminal()
        });
        if let Some(live) = live {
            return Err(StoreError::LiveRunExists { run_id: live.id });
        }
        run.version = 1;
        runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get(&self, run_id: WorkflowRunId) -> Result<WorkflowRun, StoreError> {
        let runs = self.runs.read().map_err(|_| poisoned())?;
        runs.get(&run_id)
            .cloned()
            .ok_or(StoreError::RunNotFound { run_id })
    }

    async fn update(&self, run: &WorkflowRun) -> Result<WorkflowRun, StoreError> {
        let mut runs = self.runs.write().map_err(|_| poisoned())?;
        let stored = runs
            .get_mut(&run.id)
            .ok_or(StoreError::RunNotFound { run_id: run.id })?;
        if stored.version != run.version {
            return Err(StoreError::VersionConflict {
                expected: run.version,
                found: stored.version,
            });
        }
        let mut next = run.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn due_runs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WorkflowRunId>, StoreError> {
        let runs = self.runs.read().map_err(|_| poisoned())?;
        let mut due: Vec<&WorkflowRun> = runs
            .values()
            .filter(|r| match &r.state {
                RunState::Running { .. } => !r.is_claimed_at(now),
                RunState::Suspended { wake_at, .. } => *wake_at <= now,
                RunState::Completed | RunState::Aborted { .. } => false,
            })
            .collect();
        due.sort_by_key(|r| (r.updated_at, r.id));
        Ok(due.into_iter().take(limit).map(|r| r.id).collect())
    }

    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowRun>, StoreError> {
        let runs = self.runs.read().map_err(|_| poisoned())?;
        let mut found: Vec<WorkflowRun> = runs
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }
}

#[derive(Debug, Clone)]
struct SubscriberRecord {
    profile: SubscriberProfile,
    tags: Vec<String>,
    suppressed: bool,
}

/// In-memory subscriber records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriberStore {
    subscribers: Arc<RwLock<HashMap<SubscriberId, SubscriberRecord>>>,
}

impl InMemorySubscriberStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a subscriber.
    pub fn insert(&self, profile: SubscriberProfile) {
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.insert(
                profile.id,
                SubscriberRecord {
                    profile,
                    tags: Vec::new(),
                    suppressed: false,
                },
            );
        }
    }

    /// Marks a subscriber as unsubscribed.
    pub fn suppress(&self, subscriber_id: SubscriberId) {
        if let Ok(mut subscribers) = self.subscribers.write()
            && let Some(record) = subscribers.get_mut(&subscriber_id)
        {
            record.suppressed = true;
        }
    }

    fn with_record<T>(
        &self,
        subscriber_id: SubscriberId,
        f: impl FnOnce(&mut SubscriberRecord) -> T,
    ) -> Result<T, StoreError> {
        let mut subscribers = self.subscribers.write().map_err(|_| poisoned())?;
        let record = subscribers
            .get_mut(&subscriber_id)
            .ok_or(StoreError::SubscriberNotFound { subscriber_id })?;
        Ok(f(record))
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn profile(&self, subscriber_id: SubscriberId) -> Result<SubscriberProfile, StoreError> {
        self.with_record(subscriber_id, |r| r.profile.clone())
    }

    async fn tags(&self, subscriber_id: SubscriberId) -> Result<Vec<String>, StoreError> {
        self.with_record(subscriber_id, |r| r.tags.clone())
    }

    async fn add_tag(&self, subscriber_id: SubscriberId, tag: &str) -> Result<(), StoreError> {
        self.with_record(subscriber_id, |r| {
            if !r.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                r.tags.push(tag.to_string());
            }
        })
    }

    async fn remove_tag(&self, subscriber_id: SubscriberId, tag: &str) -> Result<(), StoreError> {
        self.with_record(subscriber_id, |r| {
            r.tags.retain(|t| !t.eq_ignore_ascii_case(tag));
        })
    }

    async fn is_suppressed(&self, subscriber_id: SubscriberId) -> Result<bool, StoreError> {
        self.with_record(subscriber_id, |r| r.suppressed)
    }
}

type EngagementKey = (SubscriberId, WorkflowId);

/// In-memory engagement tracking.
///
/// Records which Email nodes a subscriber opened or clicked through.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngagement {
    opens: Arc<RwLock<HashMap<EngagementKey, HashSet<NodeId>>>>,
    clicks: Arc<RwLock<HashMap<EngagementKey, HashSet<NodeId>>>>,
}

impl InMemoryEngagement {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the subscriber opened the email sent by `email`.
    pub fn record_open(&self, subscriber_id: SubscriberId, workflow_id: WorkflowId, email: NodeId) {
        if let Ok(mut opens) = self.opens.write() {
            opens
                .entry((subscriber_id, workflow_id))
                .or_default()
                .insert(email);
        }
    }

    /// Records that the subscriber clicked a link in the email sent by `email`.
    pub fn record_click(
        &self,
        subscriber_id: SubscriberId,
        workflow_id: WorkflowId,
        email: NodeId,
    ) {
        if let Ok(mut clicks) = self.clicks.write() {
            clicks
                .entry((subscriber_id, workflow_id))
                .or_default()
                .insert(email);
        }
    }
}

fn lookup(
    table: &RwLock<HashMap<EngagementKey, HashSet<NodeId>>>,
    key: EngagementKey,
    email: Option<&NodeId>,
) -> Result<bool, CollaboratorError> {
    let table = table.read().map_err(|_| CollaboratorError::Unavailable {
        reason: "engagement lock poisoned".to_string(),
    })?;
    Ok(table.get(&key).is_some_and(|seen| match email {
        Some(node) => seen.contains(node),
        None => !seen.is_empty(),
    }))
}

#[async_trait]
impl EngagementQuery for InMemoryEngagement {
    async fn opened_email(
        &self,
        subscriber_id: SubscriberId,
        workflow_id: WorkflowId,
        email: Option<&NodeId>,
    ) -> Result<bool, CollaboratorError> {
        lookup(&self.opens, (subscriber_id, workflow_id), email)
    }

    async fn clicked_link(
        &self,
        subscriber_id: SubscriberId,
        workflow_id: WorkflowId,
        email: Option<&NodeId>,
    ) -> Result<bool, CollaboratorError> {
        lookup(&self.clicks, (subscriber_id, workflow_id), email)
    }
}

/// In-memory product and course listings, keyed by creator.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<CreatorId, Vec<ProductSummary>>>>,
    courses: Arc<RwLock<HashMap<CreatorId, Vec<CourseSummary>>>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a published product to the creator's listing.
    pub fn add_product(&self, creator_id: CreatorId, product: ProductSummary) {
        if let Ok(mut products) = self.products.write() {
            products.entry(creator_id).or_default().push(product);
        }
    }

    /// Appends a course to the creator's listing.
    pub fn add_course(&self, creator_id: CreatorId, course: CourseSummary) {
        if let Ok(mut courses) = self.courses.write() {
            courses.entry(creator_id).or_default().push(course);
        }
    }
}

fn listing<T: Clone>(
    table: &RwLock<HashMap<CreatorId, Vec<T>>>,
    creator_id: CreatorId,
) -> Result<Vec<T>, CollaboratorError> {
    let table = table.read().map_err(|_| CollaboratorError::Unavailable {
        reason: "catalog lock poisoned".to_string(),
    })?;
    Ok(table.get(&creator_id).cloned().unwrap_or_default())
}

#[async_trait]
impl CatalogSummary for InMemoryCatalog {
    async fn published_products(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<ProductSummary>, CollaboratorError> {
        listing(&self.products, creator_id)
    }

    async fn courses(&self, creator_id: CreatorId) -> Result<Vec<CourseSummary>, CollaboratorError> {
        listing(&self.courses, creator_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowKind;
    use crate::edge::Edge;
    use crate::execution::AbortReason;
    use crate::graph::WorkflowGraph;
    use crate::node::{EnrollmentTrigger, Node, TagOperation};

    fn run(workflow_id: WorkflowId, subscriber_id: SubscriberId) -> WorkflowRun {
        WorkflowRun::new(
            workflow_id,
            1,
            CreatorId::new(),
            subscriber_id,
            NodeId::new("trigger"),
            Utc::now(),
        )
    }

    fn cyclic_workflow() -> PublishedWorkflow {
        let mut graph = WorkflowGraph::new();
        graph
            .add_node(Node::trigger("t", EnrollmentTrigger::LeadSignup))
            .unwrap();
        graph
            .add_node(Node::action("a", TagOperation::AddTag, "one"))
            .unwrap();
        graph
            .add_node(Node::action("b", TagOperation::AddTag, "two"))
            .unwrap();
        graph.add_edge(&"t".into(), &"a".into(), Edge::plain()).unwrap();
        graph.add_edge(&"a".into(), &"b".into(), Edge::plain()).unwrap();
        graph.add_edge(&"b".into(), &"a".into(), Edge::plain()).unwrap();
        PublishedWorkflow {
            id: WorkflowId::new(),
            creator_id: CreatorId::new(),
            name: "Loop".to_string(),
            description: String::new(),
            kind: WorkflowKind::Custom,
            version: 1,
            graph,
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn graph_store_rejects_unvalidated_workflows() {
        let store = InMemoryGraphStore::new();
        let cyclic = cyclic_workflow();
        let workflow_id = cyclic.id;

        let result = store.publish(cyclic.clone()).await;
        assert!(matches!(result, Err(StoreError::InvalidGraph { .. })));
        assert_eq!(
            store.latest(workflow_id).await.err(),
            Some(StoreError::WorkflowNotFound { workflow_id })
        );

        let result = store
            .replace(PublishedWorkflow {
                version: 2,
                ..cyclic
            })
            .await;
        assert!(matches!(result, Err(StoreError::InvalidGraph { .. })));
    }

    #[tokio::test]
    async fn at_most_one_live_run_per_pair() {
        let store = InMemoryRunStore::new();
        let workflow_id = WorkflowId::new();
        let subscriber_id = SubscriberId::new();

        let first = store
            .insert_if_no_live(run(workflow_id, subscriber_id))
            .await
            .expect("insert");
        let second = store.insert_if_no_live(run(workflow_id, subscriber_id)).await;
        assert_eq!(second, Err(StoreError::LiveRunExists { run_id: first.id }));

        // A different subscriber is unaffected.
        assert!(
            store
                .insert_if_no_live(run(workflow_id, SubscriberId::new()))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn terminal_run_allows_fresh_enrollment() {
        let store = InMemoryRunStore::new();
        let workflow_id = WorkflowId::new();
        let subscriber_id = SubscriberId::new();

        let mut first = store
            .insert_if_no_live(run(workflow_id, subscriber_id))
            .await
            .expect("insert");
        first.abort(AbortReason::UserCancelled, Utc::now());
        store.update(&first).await.expect("update");

        assert!(
            store
                .insert_if_no_live(run(workflow_id, subscriber_id))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn stale_update_is_rejected() {
        let store = InMemoryRunStore::new();
        let stored = store
            .insert_if_no_live(run(WorkflowId::new(), SubscriberId::new()))
            .await
            .expect("insert");
        let stale = stored.clone();

        let mut fresh = stored;
        fresh.record_attempt(Utc::now(), chrono::Duration::minutes(5));
        let written = store.update(&fresh).await.expect("first write");
        assert_eq!(written.version, 2);

        let result = store.update(&stale).await;
        assert_eq!(
            result,
            Err(StoreError::VersionConflict {
                expected: 1,
                found: 2
            })
        );
    }

    #[tokio::test]
    async fn due_runs_skips_running_runs_with_a_live_claim() {
        let store = InMemoryRunStore::new();
        let now = Utc::now();
        let mut claimed = store
            .insert_if_no_live(run(WorkflowId::new(), SubscriberId::new()))
            .await
            .expect("insert");
        claimed.record_attempt(now, chrono::Duration::minutes(5));
        store.update(&claimed).await.expect("update");

        assert!(store.due_runs(now, 10).await.expect("due").is_empty());
        let due = store
            .due_runs(now + chrono::Duration::minutes(5), 10)
            .await
            .expect("due");
        assert_eq!(due, vec![claimed.id]);
    }

    #[tokio::test]
    async fn due_runs_respects_wake_time() {
        let store = InMemoryRunStore::new();
        let now = Utc::now();
        let mut later = store
            .insert_if_no_live(run(WorkflowId::new(), SubscriberId::new()))
            .await
            .expect("insert");
        later.suspend("delay".into(), now + chrono::Duration::hours(1), now);
        store.update(&later).await.expect("update");

        assert!(store.due_runs(now, 10).await.expect("due").is_empty());
        let due = store
            .due_runs(now + chrono::Duration::hours(2), 10)
            .await
            .expect("due");
        assert_eq!(due, vec![later.id]);
    }

    #[tokio::test]
    async fn subscriber_tags_are_case_insensitive() {
        let store = InMemorySubscriberStore::new();
        let id = SubscriberId::new();
        store.insert(SubscriberProfile {
            id,
            creator_id: CreatorId::new(),
            email: "fan@example.com".to_string(),
            first_name: None,
        });

        store.add_tag(id, "Inactive").await.expect("add");
        store.add_tag(id, "inactive").await.expect("add");
        assert_eq!(store.tags(id).await.expect("tags").len(), 1);

        store.remove_tag(id, "INACTIVE").await.expect("remove");
        assert!(store.tags(id).await.expect("tags").is_empty());
    }

    #[tokio::test]
    async fn engagement_any_email_versus_specific() {
        let engagement = InMemoryEngagement::new();
        let subscriber = SubscriberId::new();
        let workflow = WorkflowId::new();
        engagement.record_open(subscriber, workflow, "node_1".into());

        assert!(engagement.opened_email(subscriber, workflow, None).await.expect("query"));
        assert!(
            !engagement
                .opened_email(subscriber, workflow, Some(&"node_3".into()))
                .await
                .expect("query")
        );
        assert!(!engagement.clicked_link(subscriber, workflow, None).await.expect("query"));
    }
}
