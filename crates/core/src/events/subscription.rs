// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic patterns and subscriptions

use crate::lease::ResourceType;
use serde::{Deserialize, Serialize};

/// Topics have exactly three segments; the last (resource id) may contain `:`
const TOPIC_SEGMENTS: usize = 3;

/// Marks a pattern segment that must equal the topic segment verbatim
const LITERAL: char = '=';

/// Pattern for matching event topics (`event:type:id`)
/// Supports:
///   - Exact: "lease_acquired:project:P1"
///   - Single wildcard: "*:project:P1" matches both events for one record
///   - Rest wildcard: "lease_released:**" matches every release
///   - Literal segment: "*:project:=*" matches only the record whose id is `*`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicPattern(String);

impl TopicPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Every event
    pub fn all() -> Self {
        Self::new("**")
    }

    /// Every event for one resource type
    pub fn for_type(resource_type: ResourceType) -> Self {
        Self(format!("*:{}:*", resource_type))
    }

    /// Every event for one record. The id is matched literally, so ids
    /// such as `*` or `**` never widen the subscription.
    pub fn for_resource(resource_type: ResourceType, resource_id: &str) -> Self {
        Self(format!("*:{}:{}{}", resource_type, LITERAL, resource_id))
    }

    /// Check if this pattern matches a topic
    pub fn matches(&self, topic: &str) -> bool {
        if self.0.is_empty() {
            return false;
        }

        let pattern_parts: Vec<&str> = self.0.splitn(TOPIC_SEGMENTS, ':').collect();
        let topic_parts: Vec<&str> = topic.splitn(TOPIC_SEGMENTS, ':').collect();

        Self::match_segments(&pattern_parts, &topic_parts)
    }

    fn match_segments(pattern: &[&str], topic: &[&str]) -> bool {
        match (pattern.first(), topic.first()) {
            (None, None) => true,
            (Some(p), Some(t)) if p.starts_with(LITERAL) => {
                p[LITERAL.len_utf8()..] == **t && Self::match_segments(&pattern[1..], &topic[1..])
            }
            (Some(&"**"), _) => true,
            (Some(&"*"), Some(_)) => Self::match_segments(&pattern[1..], &topic[1..]),
            (Some(p), Some(t)) if p == t => Self::match_segments(&pattern[1..], &topic[1..]),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Subscriber handle for unsubscribing
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub String);

/// A subscription to topic patterns
#[derive(Clone, Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub patterns: Vec<TopicPattern>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, patterns: Vec<TopicPattern>) -> Self {
        Self {
            id: SubscriberId(id.into()),
            patterns,
        }
    }

    /// Check if any pattern matches the topic
    pub fn matches(&self, topic: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        exact = { "lease_acquired:project:P1", "lease_acquired:project:P1", true },
        any_event_for_record = { "*:project:P1", "lease_released:project:P1", true },
        other_record = { "*:project:P1", "lease_released:project:P2", false },
        any_in_type = { "*:vehicle:*", "lease_acquired:vehicle:V7", true },
        other_type = { "*:vehicle:*", "lease_acquired:employee:V7", false },
        rest = { "lease_released:**", "lease_released:employee:E1", true },
        rest_wrong_event = { "lease_released:**", "lease_acquired:employee:E1", false },
        everything = { "**", "lease_acquired:project:P1", true },
        id_with_colons = { "*:project:a:b:c", "lease_acquired:project:a:b:c", true },
        star_covers_colon_id = { "*:project:*", "lease_acquired:project:a:b", true },
        too_short = { "*:project", "lease_acquired:project:P1", false },
        empty = { "", "lease_acquired:project:P1", false },
        literal_id = { "*:project:=P1", "lease_acquired:project:P1", true },
        literal_star_id = { "*:project:=*", "lease_acquired:project:*", true },
        literal_star_other = { "*:project:=*", "lease_acquired:project:P2", false },
        literal_rest_id = { "*:project:=**", "lease_released:project:P2", false },
        literal_colon_id = { "*:project:=a:b", "lease_released:project:a:b", true },
    )]
    fn pattern_matching(pattern: &str, topic: &str, expected: bool) {
        assert_eq!(TopicPattern::new(pattern).matches(topic), expected);
    }

    #[test]
    fn helper_constructors() {
        assert_eq!(
            TopicPattern::for_resource(ResourceType::Project, "P1").as_str(),
            "*:project:=P1"
        );
        assert_eq!(
            TopicPattern::for_type(ResourceType::Employee).as_str(),
            "*:employee:*"
        );
        assert_eq!(TopicPattern::all().as_str(), "**");
    }

    #[parameterized(
        star = { "*" },
        double_star = { "**" },
        literal_marker = { "=P1" },
    )]
    fn resource_pattern_matches_only_its_own_record(id: &str) {
        let pattern = TopicPattern::for_resource(ResourceType::Project, id);
        assert!(pattern.matches(&format!("lease_acquired:project:{}", id)));
        assert!(pattern.matches(&format!("lease_released:project:{}", id)));
        assert!(!pattern.matches("lease_acquired:project:P2"));
        assert!(!pattern.matches("lease_acquired:employee:*"));
    }

    #[test]
    fn subscription_matches_any_pattern() {
        let sub = Subscription::new(
            "viewer",
            vec![
                TopicPattern::for_resource(ResourceType::Project, "P1"),
                TopicPattern::for_type(ResourceType::Vehicle),
            ],
        );
        assert!(sub.matches("lease_acquired:project:P1"));
        assert!(sub.matches("lease_released:vehicle:V1"));
        assert!(!sub.matches("lease_released:employee:E1"));
    }
}
