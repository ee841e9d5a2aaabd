//! Follow-up actions suggested after a successful deployment.

use crate::stack::{ResolvedSubscription, StackConfiguration, StackKind};

pub const TOPIC_ARNS_ENV_VAR: &str = "WHARF_SNS_TOPIC_ARNS";
pub const QUEUE_URI_ENV_VAR: &str = "WHARF_QUEUE_URI";
pub const TOPIC_QUEUE_URIS_ENV_VAR: &str = "WHARF_TOPIC_QUEUE_URIS";

/// Recommendations for an applied stack, in display order.
pub fn recommended_actions(stack: &StackConfiguration) -> Vec<String> {
    let name = stack.workload.as_str();
    let mut recs = Vec::new();
    recs.extend(alias_actions(&stack.kind));
    recs.extend(publish_actions(name, stack));
    recs.extend(subscribe_actions(name, &stack.kind));
    recs
}

fn alias_actions(kind: &StackKind) -> Option<String> {
    let StackKind::RequestDrivenWebService { alias: Some(alias), .. } = kind else {
        return None;
    };
    Some(format!(
        "The validation process for https://{alias} can take more than 15 minutes.\n    \
         Check the certificate status of the custom domain in the console."
    ))
}

fn publish_actions(name: &str, stack: &StackConfiguration) -> Option<String> {
    if stack.manifest.publish_topics().is_empty() {
        return None;
    }
    Some(format!(
        "Update {name}'s code to leverage the injected environment variable \"{TOPIC_ARNS_ENV_VAR}\".\n    \
         In JavaScript you can write `const {{<topicName>}} = JSON.parse(process.env.{TOPIC_ARNS_ENV_VAR})`."
    ))
}

fn subscribe_actions(name: &str, kind: &StackKind) -> Vec<String> {
    let StackKind::WorkerService { subscriptions } = kind else {
        return Vec::new();
    };
    let mut recs = vec![format!(
        "Update {name}'s code to leverage the injected environment variable \"{QUEUE_URI_ENV_VAR}\".\n    \
         In JavaScript you can write `const eventsQueueURI = process.env.{QUEUE_URI_ENV_VAR}`."
    )];

    let queues = worker_queue_names(subscriptions);
    if !queues.is_empty() {
        recs.push(format!(
            "You can retrieve topic-specific queues by writing\n    \
             `const {{{}}} = JSON.parse(process.env.{TOPIC_QUEUE_URIS_ENV_VAR})`.",
            queues.join(", ")
        ));
    }
    recs
}

/// Names of the dedicated queues created for resolved `subscriptions`.
pub fn worker_queue_names(subscriptions: &[ResolvedSubscription]) -> Vec<String> {
    subscriptions
        .iter()
        .filter(|s| s.dedicated_queue)
        .map(|s| {
            let service = strip_non_alphanumeric(&s.service);
            let topic = strip_non_alphanumeric(&s.topic);
            format!("{service}{}EventsQueue", capitalize(&topic))
        })
        .collect()
}

fn strip_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{AppInformation, RuntimeConfig};
    use wharf_manifest::WorkloadManifest;

    fn resolved(service: &str, topic: &str, dedicated_queue: bool) -> ResolvedSubscription {
        ResolvedSubscription {
            service: service.into(),
            topic: topic.into(),
            topic_arn: format!("arn:aws:sns:us-west-2:123456789012:shop-test-{service}-{topic}"),
            dedicated_queue,
        }
    }

    fn stack(raw: &str, kind: StackKind) -> StackConfiguration {
        let manifest = WorkloadManifest::from_yaml(raw).unwrap();
        StackConfiguration::new("shop", "test", manifest, kind, RuntimeConfig::default())
    }

    #[test]
    fn test_worker_queue_names() {
        let subs = vec![
            resolved("orders-api", "order_created", true),
            resolved("users", "deleted", false),
            resolved("users", "signed-up", true),
        ];
        assert_eq!(
            worker_queue_names(&subs),
            vec!["ordersapiOrdercreatedEventsQueue", "usersSignedupEventsQueue"]
        );
    }

    #[test]
    fn test_publisher_and_subscriber_actions() {
        let raw = r#"
name: processor
type: Worker Service
image:
  location: example/processor
publish:
  topics:
    - name: processed
subscribe:
  topics:
    - name: created
      service: orders
      queue: true
"#;
        let kind = StackKind::WorkerService {
            subscriptions: vec![resolved("orders", "created", true)],
        };
        let recs = recommended_actions(&stack(raw, kind));
        assert_eq!(recs.len(), 3);
        assert!(recs[0].contains("WHARF_SNS_TOPIC_ARNS"));
        assert!(recs[1].contains("WHARF_QUEUE_URI"));
        assert!(recs[2].contains("const {ordersCreatedEventsQueue} = JSON.parse"));
    }

    #[test]
    fn test_queue_names_follow_resolved_subscriptions() {
        let raw = "name: processor\ntype: Worker Service\nimage:\n  location: example/processor\n";
        let kind = StackKind::WorkerService {
            subscriptions: vec![resolved("billing", "paid", false)],
        };
        let recs = recommended_actions(&stack(raw, kind));
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("WHARF_QUEUE_URI"));
    }

    #[test]
    fn test_backend_without_topics_has_no_actions() {
        let raw = "name: api\ntype: Backend Service\nimage:\n  location: nginx\n";
        assert!(recommended_actions(&stack(raw, StackKind::BackendService)).is_empty());
    }

    #[test]
    fn test_request_driven_alias_action() {
        let raw = "name: web\ntype: Request-Driven Web Service\nimage:\n  location: nginx\n  port: 80\nhttp:\n  alias: web.example.com\n";
        let kind = StackKind::RequestDrivenWebService {
            app_info: AppInformation::default(),
            alias: Some("web.example.com".into()),
            custom_resource_urls: Default::default(),
        };
        let recs = recommended_actions(&stack(raw, kind));
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("The validation process for https://web.example.com"));
    }
}
