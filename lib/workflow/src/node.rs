//! Workflow node types and payloads.
//!
//! A node is one step of a marketing sequence. Its payload is a closed sum
//! type: each variant carries exactly the fields that node type needs, so an
//! Email node cannot accidentally carry a delay duration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// A graph-local identifier for a node.
///
/// Node identifiers only need to be unique within one graph. They are plain
/// strings so that generated graphs have stable, readable identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The type of a node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry point; exactly one per graph.
    Trigger,
    /// Sends an email to the subscriber.
    Email,
    /// Suspends the run for a duration.
    Delay,
    /// Branches on a runtime predicate.
    Condition,
    /// Mutates subscriber tag state.
    Action,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Trigger => "trigger",
            Self::Email => "email",
            Self::Delay => "delay",
            Self::Condition => "condition",
            Self::Action => "action",
        };
        f.write_str(name)
    }
}

/// The enrollment condition carried by a Trigger node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrollmentTrigger {
    /// A lead joined the creator's email list.
    LeadSignup,
    /// A product was purchased; `None` matches any product.
    ProductPurchase { product_id: Option<String> },
    /// A subscriber enrolled in a specific course.
    CourseEnrollment { course_id: String },
    /// A tag was added to the subscriber.
    TagAdded { tag: String },
}

/// An event that may enroll a subscriber into matching workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnrollmentEvent {
    /// A lead joined the creator's email list.
    LeadSignup,
    /// A product was purchased.
    ProductPurchase { product_id: String },
    /// A subscriber enrolled in a course.
    CourseEnrollment { course_id: String },
    /// A tag was added to the subscriber.
    TagAdded { tag: String },
}

impl EnrollmentTrigger {
    /// Returns true if the event satisfies this trigger.
    #[must_use]
    pub fn matches(&self, event: &EnrollmentEvent) -> bool {
        match (self, event) {
            (Self::LeadSignup, EnrollmentEvent::LeadSignup) => true,
            (
                Self::ProductPurchase { product_id },
                EnrollmentEvent::ProductPurchase {
                    product_id: bought,
                },
            ) => product_id.as_ref().is_none_or(|wanted| wanted == bought),
            (
                Self::CourseEnrollment { course_id },
                EnrollmentEvent::CourseEnrollment { course_id: joined },
            ) => course_id == joined,
            (Self::TagAdded { tag }, EnrollmentEvent::TagAdded { tag: added }) => {
                tag.eq_ignore_ascii_case(added)
            }
            _ => false,
        }
    }
}

/// Email node payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailNode {
    /// Subject template.
    pub subject: String,
    /// HTML body template.
    pub body: String,
}

/// Unit for a delay duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Minutes,
    Hours,
    Days,
}

/// Longest delay a published graph may contain.
pub const MAX_DELAY_DAYS: i64 = 365;

/// Delay node payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayNode {
    /// Number of units to wait.
    pub value: u32,
    /// The unit of `value`.
    pub unit: DelayUnit,
}

impl DelayNode {
    /// Creates a delay of `value` days.
    #[must_use]
    pub const fn days(value: u32) -> Self {
        Self {
            value,
            unit: DelayUnit::Days,
        }
    }

    /// Creates a delay of `value` hours.
    #[must_use]
    pub const fn hours(value: u32) -> Self {
        Self {
            value,
            unit: DelayUnit::Hours,
        }
    }

    /// Returns the delay as a duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        let value = i64::from(self.value);
        match self.unit {
            DelayUnit::Minutes => Duration::minutes(value),
            DelayUnit::Hours => Duration::hours(value),
            DelayUnit::Days => Duration::days(value),
        }
    }

    /// Returns true if the delay is no longer than [`MAX_DELAY_DAYS`].
    #[must_use]
    pub fn is_within_limit(&self) -> bool {
        self.duration() <= Duration::days(MAX_DELAY_DAYS)
    }
}

/// A named runtime predicate evaluated by a Condition node.
///
/// Unknown predicate kinds deserialize to `Unrecognized` instead of failing,
/// so a stored graph written by a newer editor still loads; the executor
/// aborts the affected run rather than guessing a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Did the subscriber open an email? `None` means any email of this workflow.
    OpenedEmail { email: Option<NodeId> },
    /// Did the subscriber click a link? `None` means any email of this workflow.
    ClickedLink { email: Option<NodeId> },
    /// Does the subscriber carry a tag? Compared case-insensitively.
    HasTag { tag: String },
    /// A predicate kind this engine does not know how to evaluate.
    #[serde(other)]
    Unrecognized,
}

/// Condition node payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionNode {
    /// The predicate deciding between the `yes` and `no` branches.
    pub predicate: Predicate,
}

/// A tag mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOperation {
    AddTag,
    RemoveTag,
}

/// Action node payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionNode {
    /// Add or remove.
    pub operation: TagOperation,
    /// The tag to mutate.
    pub tag: String,
}

/// Node payload, one variant per node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NodeKind {
    Trigger(EnrollmentTrigger),
    Email(EmailNode),
    Delay(DelayNode),
    Condition(ConditionNode),
    Action(ActionNode),
}

impl NodeKind {
    /// Returns the node type.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Trigger(_) => NodeType::Trigger,
            Self::Email(_) => NodeType::Email,
            Self::Delay(_) => NodeType::Delay,
            Self::Condition(_) => NodeType::Condition,
            Self::Action(_) => NodeType::Action,
        }
    }
}

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique within the graph.
    pub id: NodeId,
    /// Human-readable label (e.g. "Welcome Email").
    pub label: String,
    /// Typed payload.
    pub kind: NodeKind,
}

impl Node {
    /// Creates a node.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }

    /// Creates a trigger node.
    #[must_use]
    pub fn trigger(id: impl Into<NodeId>, trigger: EnrollmentTrigger) -> Self {
        Self::new(id, "Trigger", NodeKind::Trigger(trigger))
    }

    /// Creates an email node.
    #[must_use]
    pub fn email(
        id: impl Into<NodeId>,
        label: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            label,
            NodeKind::Email(EmailNode {
                subject: subject.into(),
                body: body.into(),
            }),
        )
    }

    /// Creates a delay node.
    #[must_use]
    pub fn delay(id: impl Into<NodeId>, delay: DelayNode) -> Self {
        Self::new(id, "Delay", NodeKind::Delay(delay))
    }

    /// Creates a condition node.
    #[must_use]
    pub fn condition(id: impl Into<NodeId>, predicate: Predicate) -> Self {
        Self::new(id, "Condition", NodeKind::Condition(ConditionNode { predicate }))
    }

    /// Creates a tag action node.
    #[must_use]
    pub fn action(id: impl Into<NodeId>, operation: TagOperation, tag: impl Into<String>) -> Self {
        Self::new(
            id,
            "Action",
            NodeKind::Action(ActionNode {
                operation,
                tag: tag.into(),
            }),
        )
    }

    /// Returns the node type.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&NodeId> for NodeId {
    fn from(value: &NodeId) -> Self {
        value.clone()
    }
}
