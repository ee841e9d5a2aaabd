//! Publish/subscribe topic configuration.

use serde::{Deserialize, Serialize};

use crate::duration::ManifestDuration;

/// Topics a workload publishes to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<Topic>,
}

impl PublishConfig {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// A topic owned by the publishing workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Topics a worker subscribes to, and its default queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<TopicSubscription>,

    /// Shared queue receiving every subscription without a dedicated queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<SqsQueue>,
}

impl SubscribeConfig {
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.queue.is_none()
    }
}

/// Subscription to a topic published by another service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicSubscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Publishing service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// `true` or a queue configuration gives the subscription its own queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<SqsQueueOrBool>,
}

impl TopicSubscription {
    pub fn new(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            service: Some(service.into()),
            queue: None,
        }
    }

    /// Whether events for this topic land in a dedicated queue.
    pub fn has_dedicated_queue(&self) -> bool {
        match &self.queue {
            Some(SqsQueueOrBool::Enabled(enabled)) => *enabled,
            Some(SqsQueueOrBool::Advanced(_)) => true,
            None => false,
        }
    }
}

/// A dedicated queue written as `true` or as queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqsQueueOrBool {
    Enabled(bool),
    Advanced(SqsQueue),
}

/// Queue settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqsQueue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<ManifestDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<ManifestDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<ManifestDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter: Option<DeadLetterQueue>,
}

/// Redrive policy for messages that keep failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterQueue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tries: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedicated_queue() {
        let mut sub = TopicSubscription::new("orders", "created");
        assert!(!sub.has_dedicated_queue());

        sub.queue = Some(SqsQueueOrBool::Enabled(true));
        assert!(sub.has_dedicated_queue());

        sub.queue = Some(SqsQueueOrBool::Advanced(SqsQueue::default()));
        assert!(sub.has_dedicated_queue());
    }

    #[test]
    fn test_subscription_from_yaml() {
        let raw = "topics:\n  - name: created\n    service: orders\n    queue: true\n";
        let cfg: SubscribeConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(cfg.topics.len(), 1);
        assert!(cfg.topics[0].has_dedicated_queue());
        assert!(cfg.queue.is_none());
    }
}
