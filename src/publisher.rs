//! Publishing with hash-based deduplication
//!
//! The publisher hashes the payload content, compares it with the last
//! published hash and only posts to the webhook when something changed
//! (or when forced). State is written only after a successful send.

use crate::client::{WebhookResponse, WebhookTransport};
use crate::error::HealthError;
use crate::state::{PublishState, StateStore};
use crate::types::Payload;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Content hash of a payload: SHA-256 hex of its compact JSON with the
/// generation timestamp removed. Object keys serialize in sorted order.
pub fn payload_hash(payload: &Payload) -> Result<String, HealthError> {
    let mut value = serde_json::to_value(payload)?;
    if let Value::Object(map) = &mut value {
        map.remove("generated_at");
    }
    let bytes = serde_json::to_vec(&value)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Webhook request body; cards keep their display order
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MergeVariables<'a> {
    pub merge_variables: &'a Payload,
}

/// Options for a single publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Send even if the hash matches the last publish
    pub force: bool,
    /// Build the request body without reading state or sending
    pub dry_run: bool,
}

/// What a publish did
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// `body` is the pretty-printed request body
    DryRun { hash: String, body: String },
    Unchanged { hash: String },
    Sent { hash: String, response: WebhookResponse },
}

impl PublishOutcome {
    pub fn hash(&self) -> &str {
        match self {
            PublishOutcome::DryRun { hash, .. }
            | PublishOutcome::Unchanged { hash }
            | PublishOutcome::Sent { hash, .. } => hash,
        }
    }
}

/// Sends payloads through a transport, deduplicated against a state store
#[derive(Debug)]
pub struct Publisher<S, T> {
    store: S,
    transport: T,
}

impl<S: StateStore, T: WebhookTransport> Publisher<S, T> {
    pub fn new(store: S, transport: T) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Publish `payload`; `now` is recorded as the publish time on success
    pub fn publish(
        &self,
        payload: &Payload,
        options: PublishOptions,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, HealthError> {
        let hash = payload_hash(payload)?;
        let body = MergeVariables {
            merge_variables: payload,
        };

        if options.dry_run {
            tracing::info!(%hash, "dry run; not sending");
            return Ok(PublishOutcome::DryRun {
                hash,
                body: serde_json::to_string_pretty(&body)?,
            });
        }

        if !options.force {
            let previous = self.store.load()?;
            if previous.is_some_and(|state| state.last_payload_hash == hash) {
                tracing::info!(%hash, "payload unchanged; skipping send");
                return Ok(PublishOutcome::Unchanged { hash });
            }
        }

        let response = self.transport.post(&body)?;
        self.store.save(&PublishState {
            last_payload_hash: hash.clone(),
            last_published_at: now,
        })?;
        tracing::info!(%hash, forced = options.force, "published payload");

        Ok(PublishOutcome::Sent { hash, response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use crate::types::{Card, CardId, CardRow};
    use chrono::TimeZone;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    /// Counts posts; fails with the given status when set
    #[derive(Default)]
    struct FakeTransport {
        calls: Cell<usize>,
        last_body: RefCell<Option<Value>>,
        fail_with: Option<u16>,
    }

    impl WebhookTransport for FakeTransport {
        fn post(&self, body: &MergeVariables<'_>) -> Result<WebhookResponse, HealthError> {
            self.calls.set(self.calls.get() + 1);
            *self.last_body.borrow_mut() = Some(serde_json::to_value(body)?);
            match self.fail_with {
                Some(status) => Err(HealthError::HttpStatus {
                    status,
                    body: "error".to_string(),
                }),
                None => Ok(WebhookResponse::Json(json!({"message": "ok"}))),
            }
        }
    }

    fn payload(weight: &str, generated_at: &str) -> Payload {
        Payload {
            header: weight.to_string(),
            subtitle: "+3.5 kg to target (75.0 kg)".to_string(),
            generated_at: generated_at.to_string(),
            progress: None,
            cards: vec![Card {
                id: CardId::Weight,
                title: "Weight".to_string(),
                rows: vec![CardRow::new("Latest", weight)],
            }],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_hash_ignores_generation_time() {
        let a = payload_hash(&payload("78.5 kg", "2024-03-07 08:00")).unwrap();
        let b = payload_hash(&payload("78.5 kg", "2024-03-07 09:15")).unwrap();
        let c = payload_hash(&payload("78.4 kg", "2024-03-07 08:00")).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_identical_payload_sends_once() {
        let publisher = Publisher::new(MemoryStateStore::new(), FakeTransport::default());
        let p = payload("78.5 kg", "2024-03-07 08:00");

        let first = publisher.publish(&p, PublishOptions::default(), now()).unwrap();
        let second = publisher.publish(&p, PublishOptions::default(), now()).unwrap();

        assert!(matches!(first, PublishOutcome::Sent { .. }));
        assert!(matches!(second, PublishOutcome::Unchanged { .. }));
        assert_eq!(first.hash(), second.hash());
        assert_eq!(publisher.transport().calls.get(), 1);
    }

    #[test]
    fn test_changed_payload_is_sent() {
        let publisher = Publisher::new(MemoryStateStore::new(), FakeTransport::default());

        publisher
            .publish(&payload("78.5 kg", "a"), PublishOptions::default(), now())
            .unwrap();
        publisher
            .publish(&payload("78.3 kg", "b"), PublishOptions::default(), now())
            .unwrap();

        assert_eq!(publisher.transport().calls.get(), 2);
    }

    #[test]
    fn test_force_always_sends() {
        let publisher = Publisher::new(MemoryStateStore::new(), FakeTransport::default());
        let p = payload("78.5 kg", "2024-03-07 08:00");
        let force = PublishOptions {
            force: true,
            ..Default::default()
        };

        publisher.publish(&p, force, now()).unwrap();
        publisher.publish(&p, force, now()).unwrap();

        assert_eq!(publisher.transport().calls.get(), 2);
    }

    #[test]
    fn test_body_wraps_merge_variables() {
        let publisher = Publisher::new(MemoryStateStore::new(), FakeTransport::default());
        publisher
            .publish(&payload("78.5 kg", "t"), PublishOptions::default(), now())
            .unwrap();

        let body = publisher.transport().last_body.borrow().clone().unwrap();
        assert_eq!(body["merge_variables"]["header"], "78.5 kg");
        assert_eq!(body["merge_variables"]["cards"]["weight"]["title"], "Weight");
    }

    #[test]
    fn test_failed_send_leaves_state_untouched() {
        let earlier = PublishState {
            last_payload_hash: "previous".to_string(),
            last_published_at: Utc.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap(),
        };
        let publisher = Publisher::new(
            MemoryStateStore::with_state(earlier.clone()),
            FakeTransport {
                fail_with: Some(500),
                ..Default::default()
            },
        );

        let result = publisher.publish(&payload("78.5 kg", "t"), PublishOptions::default(), now());

        assert!(matches!(result, Err(HealthError::HttpStatus { status: 500, .. })));
        assert_eq!(publisher.store().current(), Some(earlier));
    }

    #[test]
    fn test_success_records_hash_and_time() {
        let publisher = Publisher::new(MemoryStateStore::new(), FakeTransport::default());
        let outcome = publisher
            .publish(&payload("78.5 kg", "t"), PublishOptions::default(), now())
            .unwrap();

        let state = publisher.store().current().unwrap();
        assert_eq!(state.last_payload_hash, outcome.hash());
        assert_eq!(state.last_published_at, now());
    }

    #[test]
    fn test_dry_run_sends_nothing() {
        let publisher = Publisher::new(MemoryStateStore::new(), FakeTransport::default());
        let outcome = publisher
            .publish(
                &payload("78.5 kg", "t"),
                PublishOptions {
                    dry_run: true,
                    ..Default::default()
                },
                now(),
            )
            .unwrap();

        let body = match outcome {
            PublishOutcome::DryRun { body, .. } => body,
            other => panic!("expected dry run, got {other:?}"),
        };
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["merge_variables"]["header"], "78.5 kg");
        assert_eq!(publisher.transport().calls.get(), 0);
        assert_eq!(publisher.store().current(), None);
    }
}
