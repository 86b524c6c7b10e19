//! Automation records.
//!
//! An automation binds trigger types, keywords and a post scope to a
//! listener. Records are mutated one field at a time by the creator; each
//! mutation goes through a method here so the invariants hold on every
//! persisted version.

use crate::error::AutomationError;
use crate::listener::{Listener, ResponseCounters};
use chrono::{DateTime, Utc};
use creator_flow_core::{AutomationId, CreatorId, KeywordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The kind of social event an automation reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// A public comment on a post.
    Comment,
    /// A direct message.
    DirectMessage,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comment => write!(f, "comment"),
            Self::DirectMessage => write!(f, "direct_message"),
        }
    }
}

/// A keyword owned by one automation.
///
/// Stored trimmed and lowercased; matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub word: String,
}

impl Keyword {
    /// Normalizes and validates a keyword.
    ///
    /// # Errors
    ///
    /// Returns `EmptyKeyword` if the word is empty after trimming.
    pub fn new(word: &str) -> Result<Self, AutomationError> {
        let word = normalize(word);
        if word.is_empty() {
            return Err(AutomationError::EmptyKeyword);
        }
        Ok(Self {
            id: KeywordId::new(),
            word,
        })
    }

    /// Returns true if the keyword appears in the text, ignoring case.
    #[must_use]
    pub fn found_in(&self, text: &str) -> bool {
        normalize(text).contains(&self.word)
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// The posts an automation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "posts", rename_all = "snake_case")]
pub enum Scope {
    /// An explicit, ordered set of post identifiers.
    Enumerated(Vec<String>),
    /// Every current and future post of the creator.
    Global,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Enumerated(Vec::new())
    }
}

impl Scope {
    /// Creates an enumerated scope, dropping duplicates but keeping order.
    #[must_use]
    pub fn enumerated<I, S>(posts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for post in posts {
            let post = post.into();
            if !unique.contains(&post) {
                unique.push(post);
            }
        }
        Self::Enumerated(unique)
    }

    /// Returns true if the scope covers the given post.
    #[must_use]
    pub fn covers(&self, post_id: &str) -> bool {
        match self {
            Self::Global => true,
            Self::Enumerated(posts) => posts.iter().any(|p| p == post_id),
        }
    }
}

/// A creator's keyword automation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    pub creator_id: CreatorId,
    pub name: String,
    pub active: bool,
    pub trigger_types: BTreeSet<TriggerType>,
    pub keywords: Vec<Keyword>,
    pub scope: Scope,
    pub listener: Option<Listener>,
    pub counters: ResponseCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version. Zero until first stored.
    pub version: u64,
}

impl Automation {
    /// Creates an empty, inactive automation.
    #[must_use]
    pub fn new(creator_id: CreatorId, name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: AutomationId::new(),
            creator_id,
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            active: false,
            trigger_types: BTreeSet::new(),
            keywords: Vec::new(),
            scope: Scope::default(),
            listener: None,
            counters: ResponseCounters::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Adds a keyword. Adding an existing word returns the existing keyword.
    ///
    /// # Errors
    ///
    /// Returns `EmptyKeyword` for blank input.
    pub fn add_keyword(&mut self, word: &str) -> Result<Keyword, AutomationError> {
        let keyword = Keyword::new(word)?;
        if let Some(existing) = self.keywords.iter().find(|k| k.word == keyword.word) {
            return Ok(existing.clone());
        }
        self.keywords.push(keyword.clone());
        Ok(keyword)
    }

    /// Removes a keyword by ID.
    ///
    /// # Errors
    ///
    /// Returns `KeywordNotFound` if the automation doesn't own the keyword.
    pub fn remove_keyword(&mut self, keyword_id: KeywordId) -> Result<(), AutomationError> {
        let before = self.keywords.len();
        self.keywords.retain(|k| k.id != keyword_id);
        if self.keywords.len() == before {
            return Err(AutomationError::KeywordNotFound { keyword_id });
        }
        Ok(())
    }

    /// Replaces the trigger type set.
    ///
    /// An active automation cannot drop to zero trigger types.
    ///
    /// # Errors
    ///
    /// Returns `NoTriggerTypes` when emptying an active automation.
    pub fn set_trigger_types(
        &mut self,
        types: impl IntoIterator<Item = TriggerType>,
    ) -> Result<(), AutomationError> {
        let types: BTreeSet<TriggerType> = types.into_iter().collect();
        if self.active && types.is_empty() {
            return Err(AutomationError::NoTriggerTypes {
                automation_id: self.id,
            });
        }
        self.trigger_types = types;
        Ok(())
    }

    /// Replaces the listener, discarding the previous variant's content.
    ///
    /// # Errors
    ///
    /// Returns `EmptyListener` if the template or prompt is blank.
    pub fn set_listener(&mut self, listener: Listener) -> Result<(), AutomationError> {
        listener.validate()?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Replaces the post scope.
    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    /// Activates or deactivates the automation.
    ///
    /// # Errors
    ///
    /// Returns `NoTriggerTypes` when activating without trigger types.
    pub fn set_active(&mut self, active: bool) -> Result<(), AutomationError> {
        if active && self.trigger_types.is_empty() {
            return Err(AutomationError::NoTriggerTypes {
                automation_id: self.id,
            });
        }
        self.active = active;
        Ok(())
    }

    /// Returns true if the automation reacts to this event type.
    #[must_use]
    pub fn triggers_on(&self, event_type: TriggerType) -> bool {
        self.trigger_types.contains(&event_type)
    }

    /// Returns the first keyword found in the text, in insertion order.
    #[must_use]
    pub fn matched_keyword(&self, text: &str) -> Option<&Keyword> {
        self.keywords.iter().find(|k| k.found_in(text))
    }
}
