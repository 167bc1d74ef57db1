//! Helpdesk REST integration: payload model, transport seam, and the caching
//! metadata resolver.

pub mod resolver;
pub mod transport;
pub mod types;

pub use resolver::{MetadataResolver, article_id_from_path};
pub use transport::{ApiTransport, HttpTransport, TransportError, TransportResult};
pub use types::{AuditEvent, OrganizationFields, OrganizationMetadata, Ticket, TicketMetadata};
