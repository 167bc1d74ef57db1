//! Synthetic input driver for reactive-framework form fields
//!
//! Assigning `element.value` directly leaves the framework's internal state
//! untouched, so the next reconciliation pass reverts the field. The write
//! has to go through the property setter the framework installed on the
//! element prototype, and only then may the bubbling `input` event fire so
//! listeners pick up the mutation.

use std::time::Duration;

use chrono::NaiveDate;
use tracing::debug;

use crate::automation::surface::{SetterKind, SurfaceResult, UiSurface, await_element};

/// A value destined for a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Rendered the way the reactive datepicker displays dates.
    Date(NaiveDate),
}

impl FieldValue {
    /// The string actually typed into the field.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Date(date) => date.format("%m/%d/%Y").to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(date: NaiveDate) -> Self {
        FieldValue::Date(date)
    }
}

/// Set a framework-managed input field to `value`.
///
/// The selector may reference an element the framework has not mounted yet;
/// the driver polls until it resolves rather than failing. Once found:
///
/// 1. date values are formatted `MM/DD/YYYY`;
/// 2. the prototype-level `value` setter is preferred (the framework hooks it
///    to trigger state reconciliation), with the instance setter as fallback;
/// 3. the value is written and a bubbling `input` event is dispatched.
///
/// If the element carries no setter at all, the value is silently not set;
/// raising here would halt an automation chain that can otherwise still make
/// progress. Repeat calls with the same value dispatch again; the field is
/// not re-queried for its prior contents.
pub async fn set_field_value<S>(
    surface: &S,
    selector: &str,
    value: &FieldValue,
    interval: Duration,
) -> SurfaceResult<()>
where
    S: UiSurface + ?Sized,
{
    let element = await_element(surface, selector, interval).await?;
    let rendered = value.render();

    let setters = surface.value_setters(&element).await?;
    let setter = if setters.prototype {
        SetterKind::Prototype
    } else if setters.instance {
        SetterKind::Instance
    } else {
        debug!(selector, "no value setter on element; field left unchanged");
        return Ok(());
    };

    surface.write_value(&element, setter, &rendered).await?;
    surface.dispatch_input(&element).await?;

    Ok(())
}
