//! External collaborators used by the executor and generator.
//!
//! These traits are the boundary to systems outside the engine: the email
//! provider, engagement tracking, subscriber records, and the product
//! catalog. Implementations are supplied by the host application.

use crate::error::{CollaboratorError, StoreError};
use crate::node::NodeId;
use async_trait::async_trait;
use creator_flow_core::{CreatorId, SendError, SubscriberId, WorkflowId};
use serde::{Deserialize, Serialize};

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    /// Recipient address.
    pub recipient: String,
    /// Rendered subject line.
    pub subject: String,
    /// Rendered HTML body.
    pub body_html: String,
}

/// Sends emails for Email nodes.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Attempts one delivery.
    async fn send(&self, email: &OutboundEmail) -> Result<(), SendError>;
}

/// Answers engagement predicates for Condition nodes.
///
/// `email` names the Email node whose message is asked about; `None` asks
/// about any email this subscriber received from the workflow.
#[async_trait]
pub trait EngagementQuery: Send + Sync {
    /// Did the subscriber open the email?
    async fn opened_email(
        &self,
        subscriber_id: SubscriberId,
        workflow_id: WorkflowId,
        email: Option<&NodeId>,
    ) -> Result<bool, CollaboratorError>;

    /// Did the subscriber click a link in the email?
    async fn clicked_link(
        &self,
        subscriber_id: SubscriberId,
        workflow_id: WorkflowId,
        email: Option<&NodeId>,
    ) -> Result<bool, CollaboratorError>;
}

/// Contact details for a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberProfile {
    /// Identifier.
    pub id: SubscriberId,
    /// The creator whose list this subscriber is on.
    pub creator_id: CreatorId,
    /// Email address.
    pub email: String,
    /// First name, if known.
    pub first_name: Option<String>,
}

/// Subscriber records and tag state.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Loads a subscriber's profile.
    async fn profile(&self, subscriber_id: SubscriberId) -> Result<SubscriberProfile, StoreError>;

    /// Returns the subscriber's tags.
    async fn tags(&self, subscriber_id: SubscriberId) -> Result<Vec<String>, StoreError>;

    /// Adds a tag. Adding a tag the subscriber already has is a no-op.
    async fn add_tag(&self, subscriber_id: SubscriberId, tag: &str) -> Result<(), StoreError>;

    /// Removes a tag. Removing an absent tag is a no-op.
    async fn remove_tag(&self, subscriber_id: SubscriberId, tag: &str) -> Result<(), StoreError>;

    /// Returns true if the subscriber unsubscribed or bounced.
    async fn is_suppressed(&self, subscriber_id: SubscriberId) -> Result<bool, StoreError>;
}

/// A published product as seen by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    /// Product identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category (e.g. `sample-pack`, `preset`).
    pub category: String,
}

/// A course as seen by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    /// Course identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// URL slug.
    pub slug: String,
}

/// Read-only product and course listings.
#[async_trait]
pub trait CatalogSummary: Send + Sync {
    /// Published products, in catalog order.
    async fn published_products(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<ProductSummary>, CollaboratorError>;

    /// Courses, in catalog order.
    async fn courses(&self, creator_id: CreatorId)
    -> Result<Vec<CourseSummary>, CollaboratorError>;
}
