//! Remote metadata resolver
//!
//! Fetches and merges ticket, organization, user and audit data from the
//! helpdesk REST API, against one explicitly owned set of caches. The
//! resolver is the only component that mutates the caches.
//!
//! Ticket entries move through `Uncached → Pending → {Cached | Evicted}`.
//! `Pending` occupies the slot while a fetch is in flight and suppresses
//! duplicate requests for the same ticket: a caller that observes it gets
//! `None` immediately, with no waiter queue, and is expected to re-poll. Any
//! transport failure evicts the slot so the next call starts over from
//! `Uncached`.
//!
//! The cache mutex is a plain (non-async) lock and is never held across an
//! await point.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::helpdesk::transport::ApiTransport;
use crate::helpdesk::types::{
    ArticleEnvelope, AuditEvent, AuditPage, OrganizationMetadata, TicketMetadata, UserEnvelope,
};

/// State of one ticket cache slot. Absence from the map is both `Uncached`
/// and `Evicted`.
#[derive(Debug, Clone)]
enum TicketSlot {
    /// A fetch is in flight; duplicate requests are suppressed.
    Pending,
    Cached(TicketMetadata),
}

/// The three process-wide caches, explicitly constructed and singly owned by
/// the resolver. Lifetime is the hosting session; there is no eviction other
/// than the failure paths described on [`MetadataResolver`].
#[derive(Default)]
struct ResolverCache {
    account_codes: HashMap<String, String>,
    organizations: HashMap<String, OrganizationMetadata>,
    tickets: HashMap<String, TicketSlot>,
}

/// Helpdesk metadata lookups with request de-duplication.
pub struct MetadataResolver<T> {
    transport: T,
    base: Url,
    cache: Mutex<ResolverCache>,
}

impl<T: ApiTransport> MetadataResolver<T> {
    /// A resolver with fresh caches. `base` is the helpdesk origin, e.g.
    /// `https://example.zendesk.com/`.
    pub fn new(transport: T, base: Url) -> Self {
        Self {
            transport,
            base,
            cache: Mutex::new(ResolverCache::default()),
        }
    }

    fn api_url(&self, path: &str) -> String {
        match self.base.join(path) {
            Ok(url) => url.into(),
            Err(_) => format!("{}/{}", self.base.as_str().trim_end_matches('/'), path),
        }
    }

    /// Resolve a ticket's metadata, fetching at most once per ticket id.
    ///
    /// - Cached: the value is returned immediately, no network.
    /// - Pending: `None` immediately; the original caller's fetch is already
    ///   in flight and this call must not start another.
    /// - Uncached: the slot is marked pending, the ticket detail (with
    ///   embedded organizations) is fetched, and the result is merged into
    ///   the slot. A failure or an empty union evicts instead.
    pub async fn check_ticket(&self, ticket_id: &str) -> Option<TicketMetadata> {
        {
            let mut cache = self.cache.lock();
            match cache.tickets.get(ticket_id) {
                Some(TicketSlot::Pending) => return None,
                Some(TicketSlot::Cached(info)) => return Some(info.clone()),
                None => {}
            }
            cache
                .tickets
                .insert(ticket_id.to_string(), TicketSlot::Pending);
        }

        let fetched = self.fetch_ticket(ticket_id).await;
        self.store_partial(ticket_id, fetched)
    }

    /// Merge a partial view into the ticket's slot. An empty union (or a
    /// failed fetch) evicts the slot so a later call can retry.
    fn store_partial(
        &self,
        ticket_id: &str,
        partial: Option<TicketMetadata>,
    ) -> Option<TicketMetadata> {
        let mut cache = self.cache.lock();

        let mut running = match cache.tickets.remove(ticket_id) {
            Some(TicketSlot::Cached(existing)) => existing,
            _ => TicketMetadata::default(),
        };
        if let Some(update) = partial {
            running.merge(update);
        }

        if running.is_empty() {
            // Leave the slot absent: the next check_ticket starts over.
            return None;
        }

        for organization in &running.organizations {
            if let Some(code) = organization.organization_fields.account_code.clone() {
                cache.organizations.insert(code, organization.clone());
            }
        }
        cache
            .tickets
            .insert(ticket_id.to_string(), TicketSlot::Cached(running.clone()));
        Some(running)
    }

    async fn fetch_ticket(&self, ticket_id: &str) -> Option<TicketMetadata> {
        let url = self.api_url(&format!("api/v2/tickets/{ticket_id}?include=organizations"));

        let body = match self.transport.get_json(&url).await {
            Ok(body) => body,
            Err(error) => {
                warn!(%url, %error, "ticket fetch failed");
                return None;
            }
        };
        let mut info: TicketMetadata = match serde_json::from_value(body) {
            Ok(info) => info,
            Err(error) => {
                warn!(%url, %error, "ticket payload did not decode");
                return None;
            }
        };

        // A ticket without embedded organizations still has a requester whose
        // user record carries them.
        if info.organizations.is_empty() {
            let Some(requester_id) = info.ticket.as_ref().and_then(|ticket| ticket.requester_id)
            else {
                return Some(info);
            };

            let url = self.api_url(&format!("api/v2/users/{requester_id}?include=organizations"));
            let body = match self.transport.get_json(&url).await {
                Ok(body) => body,
                Err(error) => {
                    warn!(%url, %error, "requester fetch failed");
                    return None;
                }
            };
            let user: UserEnvelope = match serde_json::from_value(body) {
                Ok(user) => user,
                Err(error) => {
                    warn!(%url, %error, "requester payload did not decode");
                    return None;
                }
            };
            info.organizations = user.organizations;
        }

        Some(info)
    }

    /// Fetch the full audit trail, one page at a time, and attach it to the
    /// cached ticket payload.
    ///
    /// Pages are inherently sequential: each request depends on the previous
    /// page's pagination cursor. Completion happens exactly once, when this
    /// future resolves: `Some` with the accumulated events in page order, or
    /// `None` if a page failed (nothing is attached in that case).
    pub async fn check_events(&self, ticket_id: &str) -> Option<Vec<AuditEvent>> {
        let mut audits: Vec<AuditEvent> = Vec::new();
        let mut page_id = 1u32;

        loop {
            let url = self.api_url(&format!(
                "api/v2/tickets/{ticket_id}/audits.json?page={page_id}"
            ));
            let body = match self.transport.get_json(&url).await {
                Ok(body) => body,
                Err(error) => {
                    warn!(%url, %error, "audit page fetch failed");
                    return None;
                }
            };
            let page: AuditPage = match serde_json::from_value(body) {
                Ok(page) => page,
                Err(error) => {
                    warn!(%url, %error, "audit page did not decode");
                    return None;
                }
            };

            audits.extend(page.audits);

            match page.next_page {
                Some(ref next) if is_truthy(next) => page_id += 1,
                _ => break,
            }
        }

        let mut cache = self.cache.lock();
        if let Some(TicketSlot::Cached(info)) = cache.tickets.get_mut(ticket_id) {
            info.audits = Some(audits.clone());
        }

        Some(audits)
    }

    /// Resolve the account code for a ticket.
    ///
    /// Precedence: a previously resolved code for this ticket id; else the
    /// unambiguous single-organization case; else the manually entered
    /// sidebar field (`form_value`, already read by the caller). Only
    /// non-null results are cached; a miss stays retryable for when the
    /// user fills the field in.
    pub fn account_code(
        &self,
        ticket_id: Option<&str>,
        info: Option<&TicketMetadata>,
        form_value: Option<&str>,
    ) -> Option<String> {
        if let Some(ticket_id) = ticket_id {
            if let Some(code) = self.cache.lock().account_codes.get(ticket_id) {
                return Some(code.clone());
            }
        }

        let code = match info {
            // Exactly one organization is unambiguous; the sidebar field is
            // not consulted even if that organization carries no code.
            Some(info) if info.organizations.len() == 1 => {
                info.organizations[0].organization_fields.account_code.clone()
            }
            _ => form_value
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        };

        if let (Some(ticket_id), Some(code)) = (ticket_id, code.as_ref()) {
            self.cache
                .lock()
                .account_codes
                .insert(ticket_id.to_string(), code.clone());
        }

        code
    }

    /// Organization previously cached under this account code.
    pub fn organization(&self, account_code: &str) -> Option<OrganizationMetadata> {
        self.cache.lock().organizations.get(account_code).cloned()
    }

    /// Ticket ids referenced by a knowledge-base article.
    ///
    /// Articles link back to the tickets they were distilled from via
    /// all-numeric label names. Transport failure degrades to an empty list.
    pub async fn article_ticket_ids(&self, article_id: &str) -> Vec<String> {
        let url = self.api_url(&format!("api/v2/help_center/articles/{article_id}.json"));

        let body = match self.transport.get_json(&url).await {
            Ok(body) => body,
            Err(error) => {
                warn!(%url, %error, "article fetch failed");
                return Vec::new();
            }
        };
        let envelope: ArticleEnvelope = match serde_json::from_value(body) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%url, %error, "article payload did not decode");
                return Vec::new();
            }
        };

        envelope
            .article
            .map(|article| article.label_names)
            .unwrap_or_default()
            .into_iter()
            .filter(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_digit()))
            .collect()
    }
}

/// Derive the article id from a help-center path like
/// `/hc/en-us/articles/360123456-deploy-guide`.
pub fn article_id_from_path(path: &str) -> Option<String> {
    if !path.starts_with("/hc/") || !path.contains("/articles/") {
        return None;
    }

    let tail = path.rsplit('/').next()?;
    let id = tail.split('-').next().unwrap_or(tail);
    (!id.is_empty()).then(|| id.to_string())
}

/// JavaScript truthiness for the pagination cursor: the API reports "no more
/// pages" as null, false, zero or the empty string depending on version.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::helpdesk::transport::TransportError;
    use crate::helpdesk::transport::testing::MockTransport;
    use crate::helpdesk::types::{OrganizationFields, Ticket};

    const BASE: &str = "https://support.example.test/";

    fn resolver(transport: MockTransport) -> MetadataResolver<MockTransport> {
        MetadataResolver::new(transport, Url::parse(BASE).unwrap())
    }

    fn ticket_url(id: &str) -> String {
        format!("{BASE}api/v2/tickets/{id}?include=organizations")
    }

    fn user_url(id: u64) -> String {
        format!("{BASE}api/v2/users/{id}?include=organizations")
    }

    fn audits_url(id: &str, page: u32) -> String {
        format!("{BASE}api/v2/tickets/{id}/audits.json?page={page}")
    }

    fn ticket_body(id: u64, organizations: Value) -> Value {
        json!({
            "ticket": {"id": id, "subject": "s", "requester_id": 9001},
            "organizations": organizations
        })
    }

    fn org_body(code: &str) -> Value {
        json!({"organization_fields": {"account_code": code, "support_region": "us"}})
    }

    #[tokio::test]
    async fn caches_ticket_with_embedded_organizations() {
        let transport = MockTransport::new();
        transport.route_json(
            &ticket_url("101"),
            Ok(ticket_body(101, json!([org_body("ABC123")]))),
        );
        let resolver = resolver(transport);

        let info = resolver.check_ticket("101").await.expect("resolved");
        assert_eq!(
            info.organizations[0].organization_fields.account_code.as_deref(),
            Some("ABC123")
        );
        // Organization cached by account code.
        assert!(resolver.organization("ABC123").is_some());

        // Second call is served from cache: no further fetch.
        let again = resolver.check_ticket("101").await.expect("cached");
        assert_eq!(again, info);
        assert_eq!(resolver.transport.calls_for(&ticket_url("101")), 1);
    }

    #[tokio::test]
    async fn falls_back_to_requester_organizations() {
        let transport = MockTransport::new();
        transport.route_json(&ticket_url("102"), Ok(ticket_body(102, json!([]))));
        transport.route_json(
            &user_url(9001),
            Ok(json!({"user": {"id": 9001}, "organizations": [org_body("XYZ999")]})),
        );
        let resolver = resolver(transport);

        let info = resolver.check_ticket("102").await.expect("resolved");
        assert_eq!(
            info.organizations[0].organization_fields.account_code.as_deref(),
            Some("XYZ999")
        );
        assert!(resolver.organization("XYZ999").is_some());
    }

    #[tokio::test]
    async fn concurrent_checks_fetch_exactly_once() {
        let transport = MockTransport::new();
        let release = transport.gate(&ticket_url("103"));
        transport.route_json(
            &ticket_url("103"),
            Ok(ticket_body(103, json!([org_body("ABC123")]))),
        );
        let resolver = Arc::new(resolver(transport));

        let first = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.check_ticket("103").await }
        });

        // Let the first call reach the transport and park on the gate.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        // The slot is pending: no callback, and crucially no second fetch.
        assert!(resolver.check_ticket("103").await.is_none());
        assert_eq!(resolver.transport.calls_for(&ticket_url("103")), 1);

        release.send(()).unwrap();
        let info = first.await.unwrap().expect("original caller resolves");
        assert_eq!(info.ticket.and_then(|t| t.id), Some(103));
        assert_eq!(resolver.transport.calls_for(&ticket_url("103")), 1);
    }

    #[tokio::test]
    async fn transport_failure_evicts_and_allows_retry() {
        let transport = MockTransport::new();
        transport.route_json(
            &ticket_url("104"),
            Err(TransportError::Status {
                status: 500,
                url: ticket_url("104"),
            }),
        );
        transport.route_json(
            &ticket_url("104"),
            Ok(ticket_body(104, json!([org_body("ABC123")]))),
        );
        let resolver = resolver(transport);

        assert!(resolver.check_ticket("104").await.is_none());
        // The failure evicted the slot, so this retries from scratch.
        assert!(resolver.check_ticket("104").await.is_some());
        assert_eq!(resolver.transport.calls_for(&ticket_url("104")), 2);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_fetch_failure() {
        let transport = MockTransport::new();
        transport.route_json(&ticket_url("105"), Ok(json!({"ticket": "not-an-object"})));
        let resolver = resolver(transport);

        assert!(resolver.check_ticket("105").await.is_none());
    }

    #[test]
    fn empty_union_leaves_the_slot_absent() {
        let transport = MockTransport::new();
        let resolver = resolver(transport);

        assert!(resolver
            .store_partial("106", Some(TicketMetadata::default()))
            .is_none());

        // Not present-with-empty-object: the slot is simply gone.
        assert!(!resolver.cache.lock().tickets.contains_key("106"));
    }

    #[tokio::test]
    async fn audit_pagination_accumulates_in_page_order() {
        let transport = MockTransport::new();
        transport.route_json(
            &ticket_url("107"),
            Ok(ticket_body(107, json!([org_body("ABC123")]))),
        );
        transport.route_json(
            &audits_url("107", 1),
            Ok(json!({
                "audits": [{"id": 1}, {"id": 2}],
                "next_page": format!("{BASE}api/v2/tickets/107/audits.json?page=2")
            })),
        );
        transport.route_json(
            &audits_url("107", 2),
            Ok(json!({"audits": [{"id": 3}], "next_page": null})),
        );
        let resolver = resolver(transport);

        resolver.check_ticket("107").await.expect("cached");
        let audits = resolver.check_events("107").await.expect("completed");

        let ids: Vec<_> = audits.iter().filter_map(|audit| audit.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(resolver.transport.calls_for(&audits_url("107", 1)), 1);
        assert_eq!(resolver.transport.calls_for(&audits_url("107", 2)), 1);

        // Attached to the cached payload.
        let info = resolver.check_ticket("107").await.expect("cached");
        assert_eq!(info.audits.map(|audits| audits.len()), Some(3));
    }

    #[tokio::test]
    async fn audit_failure_completes_without_attaching() {
        let transport = MockTransport::new();
        transport.route_json(
            &ticket_url("108"),
            Ok(ticket_body(108, json!([org_body("ABC123")]))),
        );
        transport.route_json(
            &audits_url("108", 1),
            Err(TransportError::Network {
                url: audits_url("108", 1),
                detail: "connection reset".to_string(),
            }),
        );
        let resolver = resolver(transport);

        resolver.check_ticket("108").await.expect("cached");
        assert!(resolver.check_events("108").await.is_none());

        let info = resolver.check_ticket("108").await.expect("cached");
        assert!(info.audits.is_none());
    }

    #[test]
    fn organization_beats_the_sidebar_field() {
        let resolver = resolver(MockTransport::new());
        let info = TicketMetadata {
            ticket: Some(Ticket::default()),
            organizations: vec![OrganizationMetadata {
                organization_fields: OrganizationFields {
                    account_code: Some("ABC123".to_string()),
                    ..OrganizationFields::default()
                },
                ..OrganizationMetadata::default()
            }],
            audits: None,
        };

        let code = resolver.account_code(Some("109"), Some(&info), Some("XYZ999"));
        assert_eq!(code.as_deref(), Some("ABC123"));

        // Resolved codes are cached by ticket id.
        let cached = resolver.account_code(Some("109"), None, None);
        assert_eq!(cached.as_deref(), Some("ABC123"));
    }

    #[test]
    fn unresolved_account_code_is_not_cached() {
        let resolver = resolver(MockTransport::new());

        assert!(resolver.account_code(Some("110"), None, None).is_none());
        // A later call with the field filled in succeeds.
        let code = resolver.account_code(Some("110"), None, Some("MNO456"));
        assert_eq!(code.as_deref(), Some("MNO456"));
    }

    #[test]
    fn ambiguous_organizations_fall_back_to_the_field() {
        let resolver = resolver(MockTransport::new());
        let info = TicketMetadata {
            organizations: vec![OrganizationMetadata::default(), OrganizationMetadata::default()],
            ..TicketMetadata::default()
        };

        let code = resolver.account_code(None, Some(&info), Some("XYZ999"));
        assert_eq!(code.as_deref(), Some("XYZ999"));
    }

    #[tokio::test]
    async fn article_labels_filter_to_numeric_ticket_ids() {
        let transport = MockTransport::new();
        transport.route_json(
            &format!("{BASE}api/v2/help_center/articles/360123.json"),
            Ok(json!({
                "article": {"label_names": ["360045", "kcs", "7.2", "12345"]}
            })),
        );
        let resolver = resolver(transport);

        let ids = resolver.article_ticket_ids("360123").await;
        assert_eq!(ids, vec!["360045".to_string(), "12345".to_string()]);
    }

    #[test]
    fn article_id_parses_from_help_center_paths() {
        assert_eq!(
            article_id_from_path("/hc/en-us/articles/360123456-deploy-guide"),
            Some("360123456".to_string())
        );
        assert_eq!(
            article_id_from_path("/hc/en-us/articles/360123456"),
            Some("360123456".to_string())
        );
        assert_eq!(article_id_from_path("/agent/tickets/101"), None);
    }

    #[test]
    fn pagination_cursor_truthiness_matches_the_api() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!("https://next")));
        assert!(is_truthy(&json!(2)));
    }
}
