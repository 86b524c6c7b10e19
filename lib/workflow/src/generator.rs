//! Default workflow generation from a creator's catalog.
//!
//! Generation is a pure function of `(CreatorContext, Tone)`: the same inputs
//! always yield the same graph set, with the same node identifiers and edges.
//! Nothing is persisted here; callers publish the drafts they keep.

use crate::definition::{WorkflowDraft, WorkflowKind};
use crate::edge::{Edge, EdgeRef};
use crate::error::{CollaboratorError, GraphError};
use crate::graph::{GraphDocument, WorkflowGraph};
use crate::node::{DelayNode, EnrollmentTrigger, Node, NodeId, Predicate, TagOperation};
use crate::services::{CatalogSummary, CourseSummary, ProductSummary};
use crate::tone::{Phrases, Tone};
use creator_flow_core::CreatorId;
use std::collections::HashSet;

/// Maximum number of course onboarding workflows generated.
pub const MAX_COURSE_WORKFLOWS: usize = 3;

/// Tag applied when a subscriber is considered inactive.
pub const INACTIVE_TAG: &str = "inactive";

const SOUND_CATEGORIES: [&str; 3] = ["sample-pack", "preset-pack", "midi-pack"];

/// Everything the generator needs to know about a creator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatorContext {
    /// The creator's display name, used to sign emails.
    pub creator_name: String,
    /// The storefront's display name.
    pub store_name: String,
    /// Published products, in catalog order.
    pub products: Vec<ProductSummary>,
    /// Courses, in catalog order.
    pub courses: Vec<CourseSummary>,
}

impl CreatorContext {
    /// Loads a creator's inventory from the catalog.
    ///
    /// # Errors
    ///
    /// Returns the catalog's error if either listing fails.
    pub async fn load(
        catalog: &dyn CatalogSummary,
        creator_id: CreatorId,
        creator_name: impl Into<String>,
        store_name: impl Into<String>,
    ) -> Result<Self, CollaboratorError> {
        let (products, courses) = futures::try_join!(
            catalog.published_products(creator_id),
            catalog.courses(creator_id)
        )?;
        Ok(Self {
            creator_name: creator_name.into(),
            store_name: store_name.into(),
            products,
            courses,
        })
    }

    fn sells_sounds(&self) -> bool {
        self.products
            .iter()
            .any(|p| SOUND_CATEGORIES.contains(&p.category.as_str()))
    }

    fn what_you_get(&self) -> &'static str {
        match (self.sells_sounds(), !self.courses.is_empty()) {
            (true, true) => "sample packs, courses, and exclusive content",
            (true, false) => "sample packs, sounds, and production tips",
            (false, true) => "courses, tutorials, and production knowledge",
            (false, false) => "exclusive content and production resources",
        }
    }
}

/// Generates the default workflow set for a creator.
///
/// Produces, in order:
/// - a Welcome series, always
/// - a Purchase Follow-up, if the creator has at least one published product
/// - one Course Onboarding per course, for the first three courses
/// - a Win-back, always
///
/// # Errors
///
/// Returns a `GraphError` only if a generated graph is malformed.
pub fn generate(context: &CreatorContext, tone: Tone) -> Result<Vec<WorkflowDraft>, GraphError> {
    let mut drafts = vec![welcome(context, tone)?];
    if !context.products.is_empty() {
        drafts.push(purchase_follow_up(context, tone)?);
    }
    let mut slugs = HashSet::new();
    for course in context.courses.iter().take(MAX_COURSE_WORKFLOWS) {
        let slug = unique_slug(slugify(course_title(course)), &mut slugs);
        drafts.push(course_onboarding(context, course, &slug, tone)?);
    }
    drafts.push(win_back(context, tone)?);
    Ok(drafts)
}

/// Converts a title to a lowercase dash-separated slug.
#[must_use]
pub fn slugify(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Suffixes `-2`, `-3`, ... onto `base` until it is unused, then records it.
fn unique_slug(base: String, used: &mut HashSet<String>) -> String {
    let mut slug = base.clone();
    let mut n = 2;
    while !used.insert(slug.clone()) {
        slug = format!("{base}-{n}");
        n += 1;
    }
    slug
}

fn course_title(course: &CourseSummary) -> &str {
    if course.title.is_empty() {
        "the course"
    } else {
        course.title.as_str()
    }
}

fn node_id(index: usize) -> NodeId {
    NodeId::new(format!("node_{index}"))
}

fn paragraphs(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| format!("<p>{line}</p>"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn sign_off(p: &Phrases, creator: &str) -> String {
    format!("{},<br>{creator}", p.closing)
}

/// Builds the shared shape: trigger, three emails split by two delays, a closing tag.
fn three_email_sequence(
    trigger: EnrollmentTrigger,
    emails: [(&str, String, String); 3],
    delays: [DelayNode; 2],
    closing_tag: String,
) -> Result<WorkflowGraph, GraphError> {
    let [first, second, third] = emails;
    let email = |index, (label, subject, body): (&str, String, String)| {
        Node::email(node_id(index), label, subject, body)
    };
    let nodes = vec![
        Node::trigger(node_id(0), trigger),
        email(1, first),
        Node::delay(node_id(2), delays[0]),
        email(3, second),
        Node::delay(node_id(4), delays[1]),
        email(5, third),
        Node::action(node_id(6), TagOperation::AddTag, closing_tag),
    ];
    let edges = (0..6)
        .map(|i| EdgeRef::new(node_id(i), node_id(i + 1), Edge::plain()))
        .collect();
    WorkflowGraph::try_from(GraphDocument { nodes, edges })
}

fn welcome(context: &CreatorContext, tone: Tone) -> Result<WorkflowDraft, GraphError> {
    let p = tone.phrases();
    let s = tone.subjects();
    let creator = &context.creator_name;
    let store = &context.store_name;

    let intro = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        format!("{} {store}. {} have you here.", p.welcome, p.excited),
        format!(
            "I'm {creator}. Here's what you can expect from me: {}, behind-the-scenes looks at my workflow, and early access to new releases.",
            context.what_you_get()
        ),
        "Hit reply and tell me: what's your biggest challenge in production right now?"
            .to_string(),
        sign_off(p, creator),
    ]);
    let tip = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        "<strong>Finish tracks. Don't just start them.</strong>".to_string(),
        "Set a two-hour limit on your next beat. When time's up, export whatever you have and move on. You learn more from finishing ten beats than from endlessly tweaking one."
            .to_string(),
        sign_off(p, creator),
    ]);
    let offer = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        format!(
            "{} for joining. Here's <strong>15% off your first purchase</strong> with code <strong>WELCOME15</strong>.",
            p.thanks
        ),
        format!("<a href=\"{{{{storeUrl}}}}\">{}</a>", p.cta),
        sign_off(p, creator),
    ]);

    let graph = three_email_sequence(
        EnrollmentTrigger::LeadSignup,
        [
            ("Welcome Email", s.welcome.replace("{store}", store), intro),
            ("Value Email", s.value_tip.to_string(), tip),
            ("CTA Email", s.welcome_offer.to_string(), offer),
        ],
        [DelayNode::days(2), DelayNode::days(3)],
        "completed-welcome".to_string(),
    )?;

    Ok(WorkflowDraft {
        key: "welcome-series".to_string(),
        name: "Welcome Series".to_string(),
        description: "Automatically welcome new subscribers and introduce them to your content"
            .to_string(),
        kind: WorkflowKind::Welcome,
        graph,
    })
}

fn purchase_follow_up(context: &CreatorContext, tone: Tone) -> Result<WorkflowDraft, GraphError> {
    let p = tone.phrases();
    let s = tone.subjects();
    let creator = &context.creator_name;

    let tip = if context.sells_sounds() {
        "Pick your ten favorite sounds and drag them into a separate folder. They'll become your secret weapons."
    } else {
        "Open your DAW and try it out in your next session while it's fresh."
    };
    let access = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        format!("{} for your purchase!", p.thanks),
        format!(
            "Log in at {}, head to your Library, and download your files.",
            context.store_name
        ),
        format!("<strong>Tip:</strong> {tip}"),
        sign_off(p, creator),
    ]);
    let check_in = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        "Have you had a chance to use your new content yet? Reply and let me know what you made."
            .to_string(),
        sign_off(p, creator),
    ]);
    let review = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        "Would you leave a quick review? It takes thirty seconds and helps other producers decide."
            .to_string(),
        format!("<a href=\"{{{{storeUrl}}}}\">{}</a>", p.cta),
        sign_off(p, creator),
    ]);

    let graph = three_email_sequence(
        EnrollmentTrigger::ProductPurchase { product_id: None },
        [
            ("Purchase Thank You", s.purchase_access.to_string(), access),
            ("Check-in", s.purchase_check_in.to_string(), check_in),
            ("Review Request", s.review_request.to_string(), review),
        ],
        [DelayNode::days(3), DelayNode::days(4)],
        "review-requested".to_string(),
    )?;

    Ok(WorkflowDraft {
        key: "purchase-followup".to_string(),
        name: "Purchase Follow-up".to_string(),
        description: "Thank buyers, check in on their experience, and ask for a review"
            .to_string(),
        kind: WorkflowKind::PurchaseFollowUp,
        graph,
    })
}

fn course_onboarding(
    context: &CreatorContext,
    course: &CourseSummary,
    slug: &str,
    tone: Tone,
) -> Result<WorkflowDraft, GraphError> {
    let p = tone.phrases();
    let s = tone.subjects();
    let creator = &context.creator_name;
    let title = course_title(course);

    let start = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        format!("{} {title}. {} have you in the course.", p.welcome, p.excited),
        "Start with the first module today. Even fifteen minutes is enough to build momentum."
            .to_string(),
        sign_off(p, creator),
    ]);
    let check_in = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        format!("Just checking in on your progress with {title}. Any breakthroughs yet?"),
        "Consistency beats intensity. Let me know if you have any questions.".to_string(),
        sign_off(p, creator),
    ]);
    let finish = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        format!("You're close to finishing {title}. Push through the last modules."),
        format!("<a href=\"{{{{storeUrl}}}}\">{}</a>", p.cta),
        sign_off(p, creator),
    ]);

    let graph = three_email_sequence(
        EnrollmentTrigger::CourseEnrollment {
            course_id: course.id.clone(),
        },
        [
            (
                "Course Welcome",
                s.course_welcome.replace("{course}", title),
                start,
            ),
            ("Progress Check-in", s.course_check_in.to_string(), check_in),
            ("Completion Push", s.course_finish.to_string(), finish),
        ],
        [DelayNode::days(3), DelayNode::days(7)],
        format!("{slug}-emails-complete"),
    )?;

    Ok(WorkflowDraft {
        key: format!("course-{slug}"),
        name: format!("{title} Onboarding"),
        description: format!("Guide students through {title} with check-ins and encouragement"),
        kind: WorkflowKind::CourseOnboarding,
        graph,
    })
}

fn win_back(context: &CreatorContext, tone: Tone) -> Result<WorkflowDraft, GraphError> {
    let p = tone.phrases();
    let s = tone.subjects();
    let creator = &context.creator_name;

    let check_in = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        "It's been a while. Are you still making music? I'd love to hear what you're working on."
            .to_string(),
        sign_off(p, creator),
    ]);
    let offer = paragraphs(&[
        format!("{} {{{{firstName}}}},", p.greeting),
        "Here's <strong>30% off anything</strong> in my store with code <strong>COMEBACK30</strong>. Valid for 48 hours."
            .to_string(),
        format!("<a href=\"{{{{storeUrl}}}}\">{}</a>", p.cta),
        sign_off(p, creator),
    ]);

    let nodes = vec![
        Node::trigger(
            node_id(0),
            EnrollmentTrigger::TagAdded {
                tag: INACTIVE_TAG.to_string(),
            },
        ),
        Node::email(
            node_id(1),
            "Re-engagement Email",
            s.winback_check_in,
            check_in,
        ),
        Node::delay(node_id(2), DelayNode::days(4)),
        Node::condition(
            node_id(3),
            Predicate::OpenedEmail {
                email: Some(node_id(1)),
            },
        ),
        Node::action(node_id(4), TagOperation::RemoveTag, INACTIVE_TAG),
        Node::email(node_id(5), "Win-back Offer", s.winback_offer, offer),
        Node::action(node_id(6), TagOperation::AddTag, "winback-attempted"),
    ];
    let edges = vec![
        EdgeRef::new(node_id(0), node_id(1), Edge::plain()),
        EdgeRef::new(node_id(1), node_id(2), Edge::plain()),
        EdgeRef::new(node_id(2), node_id(3), Edge::plain()),
        EdgeRef::new(node_id(3), node_id(4), Edge::yes()),
        EdgeRef::new(node_id(3), node_id(5), Edge::no()),
        EdgeRef::new(node_id(5), node_id(6), Edge::plain()),
    ];

    Ok(WorkflowDraft {
        key: "winback".to_string(),
        name: "Win Back Inactive Subscribers".to_string(),
        description: "Re-engage subscribers who haven't opened emails in a while".to_string(),
        kind: WorkflowKind::WinBack,
        graph: WorkflowGraph::try_from(GraphDocument { nodes, edges })?,
    })
}
