//! Tone phrase sets for generated email copy.
//!
//! Every generated template is assembled from one fixed phrase set, so
//! switching tone means regenerating, not editing text in place.

use serde::{Deserialize, Serialize};

/// The voice used in generated email copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Hype,
}

/// Short phrases substituted into template bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phrases {
    pub greeting: &'static str,
    pub thanks: &'static str,
    pub closing: &'static str,
    pub excited: &'static str,
    pub welcome: &'static str,
    pub cta: &'static str,
}

/// Subject lines, one per generated email.
///
/// Course subjects contain a `{course}` marker replaced with the course title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subjects {
    pub welcome: &'static str,
    pub value_tip: &'static str,
    pub welcome_offer: &'static str,
    pub purchase_access: &'static str,
    pub purchase_check_in: &'static str,
    pub review_request: &'static str,
    pub course_welcome: &'static str,
    pub course_check_in: &'static str,
    pub course_finish: &'static str,
    pub winback_check_in: &'static str,
    pub winback_offer: &'static str,
}

const PROFESSIONAL: Phrases = Phrases {
    greeting: "Hello",
    thanks: "Thank you",
    closing: "Best regards",
    excited: "I'm pleased to",
    welcome: "Welcome to",
    cta: "Get started",
};

const CASUAL: Phrases = Phrases {
    greeting: "Hey",
    thanks: "Thanks so much",
    closing: "Cheers",
    excited: "I'm stoked to",
    welcome: "Welcome to the fam!",
    cta: "Let's go",
};

const HYPE: Phrases = Phrases {
    greeting: "Yo",
    thanks: "THANK YOU",
    closing: "Let's get it",
    excited: "I'm HYPED to",
    welcome: "LET'S GO! Welcome to",
    cta: "Let's make some heat",
};

const PROFESSIONAL_SUBJECTS: Subjects = Subjects {
    welcome: "Welcome to {store}",
    value_tip: "A principle for production success",
    welcome_offer: "A special offer for you",
    purchase_access: "Thank you for your purchase",
    purchase_check_in: "Following up on your purchase",
    review_request: "Would you mind leaving a review?",
    course_welcome: "Welcome to {course}",
    course_check_in: "Checking on your progress",
    course_finish: "Approaching course completion",
    winback_check_in: "We miss you, {{firstName}}",
    winback_offer: "A special offer for you",
};

const CASUAL_SUBJECTS: Subjects = Subjects {
    welcome: "Welcome! Here's what's next...",
    value_tip: "A tip that changed everything for me",
    welcome_offer: "Something for you (15% off)",
    purchase_access: "You're in! Here's how to access everything",
    purchase_check_in: "How's it going?",
    review_request: "Quick favor?",
    course_welcome: "Welcome to {course}! Let's get started",
    course_check_in: "How's it going?",
    course_finish: "You're almost there!",
    winback_check_in: "Hey {{firstName}}, still making music?",
    winback_offer: "A little gift for you",
};

const HYPE_SUBJECTS: Subjects = Subjects {
    welcome: "LET'S GO! Welcome to the fam",
    value_tip: "The #1 thing holding you back",
    welcome_offer: "Ready to level up? (15% off inside)",
    purchase_access: "YOU'RE IN! Here's your stuff",
    purchase_check_in: "Made anything yet?",
    review_request: "Quick favor? (30 sec)",
    course_welcome: "LET'S GO! Welcome to {course}",
    course_check_in: "How's the course going?!",
    course_finish: "FINISH STRONG! You're almost there",
    winback_check_in: "{{firstName}}! You still there?",
    winback_offer: "A gift for you (30% off!)",
};

impl Tone {
    /// All tones, in display order.
    pub const ALL: [Self; 3] = [Self::Professional, Self::Casual, Self::Hype];

    /// Returns this tone's phrase set.
    #[must_use]
    pub fn phrases(self) -> &'static Phrases {
        match self {
            Self::Professional => &PROFESSIONAL,
            Self::Casual => &CASUAL,
            Self::Hype => &HYPE,
        }
    }

    /// Returns this tone's subject lines.
    #[must_use]
    pub fn subjects(self) -> &'static Subjects {
        match self {
            Self::Professional => &PROFESSIONAL_SUBJECTS,
            Self::Casual => &CASUAL_SUBJECTS,
            Self::Hype => &HYPE_SUBJECTS,
        }
    }
}
