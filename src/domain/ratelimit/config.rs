//! Rate limit rules per notification category

use std::collections::HashMap;
use std::time::Duration;

use crate::config::RateLimitSettings;
use crate::domain::notification::NotificationCategory;

/// At most `max_count` admissions per `window`.
///
/// The default (zero) rule admits nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitRule {
    pub max_count: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(max_count: u32, window: Duration) -> Self {
        Self { max_count, window }
    }
}

/// Source of rate limit rules.
pub trait RuleDirectory: Send + Sync {
    /// Rule for `category`; the zero rule when none is configured.
    fn rule_for(&self, category: &NotificationCategory) -> RateLimitRule;

    fn contains(&self, category: &NotificationCategory) -> bool;
}

/// Fixed rule table, built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct RateLimitRules {
    rules: HashMap<NotificationCategory, RateLimitRule>,
}

impl RateLimitRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, category: NotificationCategory, rule: RateLimitRule) -> Self {
        self.rules.insert(category, rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<&RateLimitSettings> for RateLimitRules {
    fn from(settings: &RateLimitSettings) -> Self {
        let rules = settings
            .rules
            .iter()
            .map(|(name, rule)| {
                (
                    NotificationCategory::from_name(name),
                    RateLimitRule::new(rule.max_count, rule.window()),
                )
            })
            .collect();
        Self { rules }
    }
}

impl RuleDirectory for RateLimitRules {
    fn rule_for(&self, category: &NotificationCategory) -> RateLimitRule {
        self.rules.get(category).copied().unwrap_or_default()
    }

    fn contains(&self, category: &NotificationCategory) -> bool {
        self.rules.contains_key(category)
    }
}
