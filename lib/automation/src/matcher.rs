//! Trigger matching.
//!
//! Matching is a pure function of the event and the automations handed in.
//! An automation matches when all of the following hold:
//! - it is active and belongs to the event's creator
//! - its trigger types include the event type
//! - its scope covers the event's post (events without a post skip this check)
//! - at least one of its keywords occurs in the text, ignoring case
//!
//! An automation without keywords never matches.

use crate::automation::{Automation, Keyword};
use crate::event::InboundEvent;
use serde::{Deserialize, Serialize};

/// Which matches the dispatcher fires when several automations match one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Fire only the oldest matching automation.
    #[default]
    FirstMatch,
    /// Fire every matching automation.
    All,
}

/// The policy used when none is configured.
pub const DEFAULT_MATCH_POLICY: MatchPolicy = MatchPolicy::FirstMatch;

impl MatchPolicy {
    /// Narrows an ordered match list according to the policy.
    #[must_use]
    pub fn select<'a>(self, mut matches: Vec<Match<'a>>) -> Vec<Match<'a>> {
        if self == Self::FirstMatch {
            matches.truncate(1);
        }
        matches
    }
}

/// An automation that matched, with the keyword that matched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    pub automation: &'a Automation,
    pub keyword: &'a Keyword,
}

/// Returns every automation matching the event, oldest first.
///
/// Ties on creation time are broken by automation ID.
#[must_use]
pub fn match_event<'a>(event: &InboundEvent, automations: &'a [Automation]) -> Vec<Match<'a>> {
    let mut matches: Vec<Match<'a>> = automations
        .iter()
        .filter(|a| a.active && a.creator_id == event.creator_id)
        .filter(|a| a.triggers_on(event.event_type))
        .filter(|a| {
            event
                .post_id
                .as_deref()
                .is_none_or(|post_id| a.scope.covers(post_id))
        })
        .filter_map(|automation| {
            automation
                .matched_keyword(&event.text)
                .map(|keyword| Match {
                    automation,
                    keyword,
                })
        })
        .collect();
    matches.sort_by_key(|m| (m.automation.created_at, m.automation.id));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{Scope, TriggerType};
    use chrono::{Duration, Utc};
    use creator_flow_core::CreatorId;

    fn automation(
        creator_id: CreatorId,
        types: &[TriggerType],
        scope: Scope,
        keywords: &[&str],
    ) -> Automation {
        let mut a = Automation::new(creator_id, None, Utc::now());
        a.set_trigger_types(types.iter().copied()).expect("triggers");
        for word in keywords {
            a.add_keyword(word).expect("keyword");
        }
        a.set_scope(scope);
        a.set_active(true).expect("activate");
        a
    }

    #[test]
    fn comment_on_scoped_post_matches() {
        let creator = CreatorId::new();
        let a1 = automation(
            creator,
            &[TriggerType::Comment],
            Scope::enumerated(["post-1"]),
            &["STEMS"],
        );
        let automations = vec![a1.clone()];

        let hit = InboundEvent::comment(creator, "post-1", "send me the STEMS pls", "actor-9");
        let matches = match_event(&hit, &automations);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].automation.id, a1.id);
        assert_eq!(matches[0].keyword.word, "stems");

        let miss = InboundEvent::comment(creator, "post-2", "STEMS", "actor-9");
        assert!(match_event(&miss, &automations).is_empty());
    }

    #[test]
    fn automation_without_keywords_never_matches() {
        let creator = CreatorId::new();
        let automations = vec![automation(
            creator,
            &[TriggerType::Comment, TriggerType::DirectMessage],
            Scope::Global,
            &[],
        )];

        for text in ["", "anything", "STEMS", "a b c"] {
            let comment = InboundEvent::comment(creator, "post-1", text, "actor");
            let dm = InboundEvent::direct_message(creator, text, "actor");
            assert!(match_event(&comment, &automations).is_empty());
            assert!(match_event(&dm, &automations).is_empty());
        }
    }

    #[test]
    fn event_type_outside_trigger_set_is_excluded() {
        let creator = CreatorId::new();
        let automations = vec![
            automation(creator, &[TriggerType::Comment], Scope::Global, &["beat"]),
            automation(creator, &[TriggerType::DirectMessage], Scope::Global, &["beat"]),
        ];

        let dm = InboundEvent::direct_message(creator, "beat please", "actor");
        let matches = match_event(&dm, &automations);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].automation.id, automations[1].id);

        let comment = InboundEvent::comment(creator, "post-1", "beat please", "actor");
        let matches = match_event(&comment, &automations);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].automation.id, automations[0].id);
    }

    #[test]
    fn global_scope_matches_any_post() {
        let creator = CreatorId::new();
        let automations = vec![automation(
            creator,
            &[TriggerType::Comment],
            Scope::Global,
            &["free"],
        )];

        for post in ["post-1", "post-2", "a-post-published-tomorrow"] {
            let event = InboundEvent::comment(creator, post, "is it FREE?", "actor");
            assert_eq!(match_event(&event, &automations).len(), 1);
        }
    }

    #[test]
    fn inactive_and_foreign_automations_are_ignored() {
        let creator = CreatorId::new();
        let mut inactive = automation(creator, &[TriggerType::Comment], Scope::Global, &["x"]);
        inactive.set_active(false).expect("deactivate");
        let foreign = automation(CreatorId::new(), &[TriggerType::Comment], Scope::Global, &["x"]);
        let automations = vec![inactive, foreign];

        let event = InboundEvent::comment(creator, "post-1", "x", "actor");
        assert!(match_event(&event, &automations).is_empty());
    }

    #[test]
    fn matches_are_ordered_oldest_first_and_policy_narrows() {
        let creator = CreatorId::new();
        let mut newer = automation(creator, &[TriggerType::Comment], Scope::Global, &["stems"]);
        let mut older = automation(creator, &[TriggerType::Comment], Scope::Global, &["stems"]);
        newer.created_at = Utc::now();
        older.created_at = newer.created_at - Duration::hours(1);
        let automations = vec![newer.clone(), older.clone()];

        let event = InboundEvent::comment(creator, "post-1", "stems", "actor");
        let matches = match_event(&event, &automations);
        let ids: Vec<_> = matches.iter().map(|m| m.automation.id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);

        assert_eq!(MatchPolicy::All.select(matches.clone()).len(), 2);
        let first = DEFAULT_MATCH_POLICY.select(matches);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].automation.id, older.id);
    }
}
