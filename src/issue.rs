//! Issue-tracker creation modal automation
//!
//! The "create issue" modal is a reactive form with no programmatic fill
//! API, so the engine drives it the way a user would: strictly ordered field
//! writes and dropdown choreography built from the automation layer. Source
//! data comes from the resolved ticket metadata; the baseline build version
//! is looked up on the patch portal.

use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use tracing::warn;

use crate::automation::input::FieldValue;
use crate::automation::poll::DEFAULT_POLL_INTERVAL;
use crate::automation::sequence::{
    InteractionStep, LabelField, SearchSelect, Sequencer, add_label_values, search_select_steps,
};
use crate::automation::surface::{SurfaceResult, UiSurface, await_element};
use crate::helpdesk::transport::ApiTransport;
use crate::helpdesk::types::TicketMetadata;

/// Form field test-ids used by the issue tracker's modal markup.
const SUMMARY_FIELD: &str = "input[data-test-id=summary]";
const CREATION_DATE_FIELD: &str = "span[data-test-id=customfield_10134] input";
const BASELINE_FIELD: &str = "input[data-test-id=customfield_10172]";
const SUPPORT_OFFICE_FIELD: &str = "customfield_10133";
const AFFECTS_VERSION_FIELD: &str = "versions";

/// Build the selector bundle for a `data-test-id` search-select control:
/// the popup list and the filter input hang off the same test-id with
/// `-list` and `-search` suffixes.
pub fn search_select_control(test_id: &str) -> SearchSelect {
    SearchSelect {
        control: format!("div[data-test-id={test_id}]"),
        expanded_marker: format!("div[data-test-id={test_id}] div[aria-haspopup=true]"),
        trigger: format!("div[data-test-id={test_id}] div[role=button]"),
        search_input: format!("input[data-test-id={test_id}-search]"),
        options: format!("div[data-test-id={test_id}-list] div[class*=\"optionText\"]"),
    }
}

/// Selector bundle for a `data-test-id` tag-list field.
pub fn label_field(test_id: &str) -> LabelField {
    LabelField {
        input: format!("div[data-test-id={test_id}] input"),
        items: "div[class*=\"ssc-scrollable\"] div[role=menuitem]".to_string(),
    }
}

/// Support offices responsible for a region.
pub fn support_offices(support_region: &str) -> Vec<&'static str> {
    match support_region {
        "australia" => vec!["APAC", "AU/NZ"],
        "brazil" => vec!["Brazil"],
        "hungary" => vec!["EU"],
        "india" => vec!["India"],
        "japan" => vec!["Japan"],
        "spain" => vec!["Spain"],
        "us" => vec!["US"],
        _ => Vec::new(),
    }
}

/// Product version lines named by the ticket's tags, in tag order.
pub fn product_versions(tags: &[String]) -> Vec<String> {
    const LINES: [&str; 5] = ["7.0", "7.1", "7.2", "7.3", "7.4"];

    let mut versions = Vec::new();
    for tag in tags {
        let matched = LINES
            .iter()
            .find(|line| tag == *line || tag.ends_with(&line.replace('.', "_")));
        if let Some(line) = matched {
            if !versions.contains(&line.to_string()) {
                versions.push(line.to_string());
            }
        }
    }
    versions
}

/// The affects-version label for the oldest product line on the ticket.
pub fn affects_version(versions: &[String]) -> Option<&'static str> {
    if versions.iter().any(|v| v == "7.0") {
        Some("7.0.10")
    } else if versions.iter().any(|v| v == "7.1") {
        Some("7.1.10")
    } else if versions.iter().any(|v| v == "7.2") {
        Some("7.2.10")
    } else if versions.iter().any(|v| v == "7.3") {
        Some("7.3.10")
    } else {
        None
    }
}

/// Data seeding the modal, extracted from resolved ticket metadata.
#[derive(Debug, Clone, Default)]
pub struct IssueSeed {
    pub subject: String,
    pub created_at: Option<NaiveDate>,
    pub account_code: Option<String>,
    pub support_region: Option<String>,
    pub tags: Vec<String>,
}

impl IssueSeed {
    pub fn from_ticket(info: &TicketMetadata) -> Self {
        let ticket = info.ticket.as_ref();
        let organization = (info.organizations.len() == 1).then(|| &info.organizations[0]);

        Self {
            subject: ticket
                .and_then(|t| t.subject.clone())
                .unwrap_or_default(),
            created_at: ticket
                .and_then(|t| t.created_at.as_deref())
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|parsed| parsed.date_naive()),
            account_code: organization
                .and_then(|org| org.organization_fields.account_code.clone()),
            support_region: organization
                .and_then(|org| org.organization_fields.support_region.clone()),
            tags: ticket.map(|t| t.tags.clone()).unwrap_or_default(),
        }
    }
}

/// Fills the creation modal field by field, in declared order.
pub struct IssueFormFiller<'a, S, T>
where
    S: UiSurface + ?Sized,
    T: ApiTransport + ?Sized,
{
    surface: &'a S,
    transport: &'a T,
    portal_base: &'a str,
    interval: Duration,
}

impl<'a, S, T> IssueFormFiller<'a, S, T>
where
    S: UiSurface + ?Sized,
    T: ApiTransport + ?Sized,
{
    pub fn new(surface: &'a S, transport: &'a T, portal_base: &'a str) -> Self {
        Self {
            surface,
            transport,
            portal_base,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Pick the project in the modal's search-select.
    pub async fn select_project(&self, project_key: &str) -> SurfaceResult<()> {
        let sequencer = Sequencer::with_interval(self.surface, self.interval);
        sequencer
            .run(&search_select_steps(
                &search_select_control("projectId"),
                project_key,
            ))
            .await
    }

    /// Populate the modal from the seed: summary, creation date, baseline
    /// build version, support offices, affects version, then return focus to
    /// the summary. Steps that have no data (no creation date, unknown
    /// region, no matching version line) are skipped and the chain
    /// continues.
    pub async fn populate(&self, seed: &IssueSeed) -> SurfaceResult<()> {
        let sequencer = Sequencer::with_interval(self.surface, self.interval);

        let mut steps = vec![InteractionStep::SetField {
            input: SUMMARY_FIELD.to_string(),
            value: FieldValue::Text(seed.subject.clone()),
        }];
        if let Some(created) = seed.created_at {
            steps.push(InteractionStep::SetField {
                input: CREATION_DATE_FIELD.to_string(),
                value: FieldValue::Date(created),
            });
        }
        sequencer.run(&steps).await?;

        // The baseline lookup degrades to an empty write on any failure so
        // the rest of the form still fills in.
        let baseline = match seed.account_code.as_deref() {
            Some(code) => fetch_baseline_version(self.transport, self.portal_base, code).await,
            None => None,
        };
        sequencer
            .run(&[InteractionStep::SetField {
                input: BASELINE_FIELD.to_string(),
                value: FieldValue::Text(baseline.unwrap_or_default()),
            }])
            .await?;

        if let Some(region) = seed.support_region.as_deref() {
            let offices = support_offices(region);
            if !offices.is_empty() {
                sequencer
                    .run(&add_label_values(
                        &label_field(SUPPORT_OFFICE_FIELD),
                        &offices,
                    ))
                    .await?;
            }
        }

        if let Some(version) = affects_version(&product_versions(&seed.tags)) {
            sequencer
                .run(&add_label_values(&label_field(AFFECTS_VERSION_FIELD), &[version]))
                .await?;
        }

        let summary = await_element(self.surface, SUMMARY_FIELD, self.interval).await?;
        self.surface.focus(&summary).await
    }
}

/// Look up the baseline build version for an account on the patch portal.
///
/// The portal exposes no token endpoint; the auth token is scraped from the
/// script block of the landing page, then a form-encoded invoke call returns
/// the account's builds. Every failure path (no token, transport error,
/// unexpected payload) degrades to `None`.
pub async fn fetch_baseline_version<T>(
    transport: &T,
    portal_base: &str,
    account_code: &str,
) -> Option<String>
where
    T: ApiTransport + ?Sized,
{
    let portal = portal_base.trim_end_matches('/');

    let landing = match transport.get_text(&format!("{portal}/api/jsonws")).await {
        Ok(body) => body,
        Err(error) => {
            warn!(%error, "patch portal unreachable");
            return None;
        }
    };
    let auth_token = extract_auth_token(&landing)?;

    let command = serde_json::json!({"/osb-patcher-portlet.accounts/view": {}}).to_string();
    let response = match transport
        .post_form(
            &format!("{portal}/api/jsonws/invoke"),
            &[
                ("limit", "1"),
                ("patcherBuildAccountEntryCode", account_code),
                ("cmd", &command),
                ("p_auth", &auth_token),
            ],
        )
        .await
    {
        Ok(response) => response,
        Err(error) => {
            warn!(%error, account_code, "patch portal account query failed");
            return None;
        }
    };

    response
        .get("data")?
        .as_array()?
        .first()?
        .get("patcherProjectVersionName")?
        .as_str()
        .map(str::to_string)
}

/// The portal embeds its CSRF token as `Liferay.authToken="..."` in an
/// inline script.
fn extract_auth_token(body: &str) -> Option<String> {
    let marker = "Liferay.authToken=\"";
    let start = body.find(marker)? + marker.len();
    let rest = &body[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}
