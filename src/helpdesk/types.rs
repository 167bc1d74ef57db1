//! REST payload model for the helpdesk API
//!
//! Serde views over the JSON the helpdesk returns. Every field is defaulted:
//! the API evolves without notice and a partially populated payload is still
//! useful; whether a view is worth keeping is decided by the merge rules on
//! [`TicketMetadata`], not by deserialization failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The ticket record embedded in a ticket detail response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub requester_id: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Custom fields carried by an organization record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationFields {
    #[serde(default)]
    pub account_code: Option<String>,
    #[serde(default)]
    pub support_region: Option<String>,
}

/// A customer account entity linked to tickets and users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationMetadata {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub organization_fields: OrganizationFields,
}

/// An immutable log entry describing one ticket state change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub author_id: Option<u64>,
    #[serde(default)]
    pub events: Vec<Value>,
}

/// Everything the engine knows about one ticket.
///
/// Built up from partial API views (ticket detail, requester's user record,
/// audit pages) by shallow field union.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketMetadata {
    #[serde(default)]
    pub ticket: Option<Ticket>,
    #[serde(default)]
    pub organizations: Vec<OrganizationMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audits: Option<Vec<AuditEvent>>,
}

impl TicketMetadata {
    /// Shallow field union: populated fields of `other` replace the
    /// corresponding fields here; unpopulated fields leave the existing
    /// values alone.
    pub fn merge(&mut self, other: TicketMetadata) {
        if other.ticket.is_some() {
            self.ticket = other.ticket;
        }
        if !other.organizations.is_empty() {
            self.organizations = other.organizations;
        }
        if other.audits.is_some() {
            self.audits = other.audits;
        }
    }

    /// A union that ended up with no populated field carries no information
    /// and must not occupy a cache slot.
    pub fn is_empty(&self) -> bool {
        self.ticket.is_none() && self.organizations.is_empty() && self.audits.is_none()
    }
}

/// Envelope of `GET /api/v2/users/{id}?include=organizations`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct UserEnvelope {
    #[serde(default)]
    pub organizations: Vec<OrganizationMetadata>,
}

/// One page of `GET /api/v2/tickets/{id}/audits.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AuditPage {
    #[serde(default)]
    pub audits: Vec<AuditEvent>,
    /// Pagination cursor; any JS-falsy value means this was the last page.
    #[serde(default)]
    pub next_page: Option<Value>,
}

/// Envelope of `GET /api/v2/help_center/articles/{id}.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ArticleEnvelope {
    #[serde(default)]
    pub article: Option<Article>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Article {
    #[serde(default)]
    pub label_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn organization(code: &str) -> OrganizationMetadata {
        OrganizationMetadata {
            organization_fields: OrganizationFields {
                account_code: Some(code.to_string()),
                ..OrganizationFields::default()
            },
            ..OrganizationMetadata::default()
        }
    }

    #[test]
    fn merge_is_a_shallow_field_union() {
        let mut running = TicketMetadata {
            ticket: Some(Ticket {
                id: Some(101),
                ..Ticket::default()
            }),
            ..TicketMetadata::default()
        };

        running.merge(TicketMetadata {
            organizations: vec![organization("ABC123")],
            ..TicketMetadata::default()
        });

        assert_eq!(running.ticket.as_ref().and_then(|t| t.id), Some(101));
        assert_eq!(running.organizations.len(), 1);
        assert!(!running.is_empty());
    }

    #[test]
    fn union_of_two_empty_views_is_empty() {
        let mut running = TicketMetadata::default();
        running.merge(TicketMetadata::default());
        assert!(running.is_empty());
    }

    #[test]
    fn ticket_detail_payload_deserializes_with_unknown_fields() {
        let payload: TicketMetadata = serde_json::from_value(json!({
            "ticket": {
                "id": 101,
                "subject": "Cannot deploy hotfix",
                "requester_id": 9001,
                "created_at": "2020-03-07T10:00:00Z",
                "tags": ["7.2"],
                "via": {"channel": "web"}
            },
            "organizations": [{
                "id": 55,
                "name": "ACME",
                "organization_fields": {
                    "account_code": "ABC123",
                    "support_region": "us",
                    "sla": "platinum"
                }
            }],
            "next_page": null
        }))
        .unwrap();

        assert_eq!(payload.ticket.as_ref().and_then(|t| t.requester_id), Some(9001));
        assert_eq!(
            payload.organizations[0].organization_fields.account_code.as_deref(),
            Some("ABC123")
        );
        assert!(payload.audits.is_none());
    }
}
