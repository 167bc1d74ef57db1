//! Guided interaction sequencer
//!
//! The third-party widgets on the target pages expose no "set selected
//! options" API; the only way to reach their internal state is to simulate
//! the user: open the control, wait for the popup to render, type into the
//! filter, wait for the match list to narrow, click. Each of those waits is
//! asynchronous with respect to the triggering interaction, so a procedure is
//! expressed as an ordered list of [`InteractionStep`]s and executed by an
//! index-advancing loop: step N+1 never begins before step N has completed.

use std::time::Duration;

use tracing::debug;

use crate::automation::input::{FieldValue, set_field_value};
use crate::automation::poll::DEFAULT_POLL_INTERVAL;
use crate::automation::surface::{
    SurfaceResult, UiSurface, await_element, await_matches, await_sole_match,
};

/// Re-check cadence while draining an incrementally loaded conversation.
pub const CONVERSATION_RECHECK_INTERVAL: Duration = Duration::from_millis(500);

/// One operation in a guided interaction.
#[derive(Debug, Clone)]
pub enum InteractionStep {
    /// Click the dropdown trigger, unless the control is already expanded.
    OpenDropdown {
        control: String,
        expanded_marker: String,
        trigger: String,
    },
    /// Wait until the popup list has rendered at least one option.
    AwaitOptions { options: String },
    /// Type into a filter/search field through the synthetic input driver.
    TypeSearch { input: String, value: FieldValue },
    /// Wait until the option list narrows to exactly one match, then click
    /// every match (by construction, exactly one).
    ClickSoleMatch { options: String },
    /// Move focus to an input directly; tag-style fields open their menu on
    /// focus without a separate trigger.
    FocusInput { input: String },
    /// Wait until the menu has at least one item, then click them all.
    ClickAllItems { items: String },
    /// Plain field write with no popup choreography.
    SetField { input: String, value: FieldValue },
}

/// Executes interaction steps strictly in declared order.
pub struct Sequencer<'a, S: UiSurface + ?Sized> {
    surface: &'a S,
    interval: Duration,
}

impl<'a, S: UiSurface + ?Sized> Sequencer<'a, S> {
    pub fn new(surface: &'a S) -> Self {
        Self::with_interval(surface, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(surface: &'a S, interval: Duration) -> Self {
        Self { surface, interval }
    }

    /// Run the steps front to back. A step that is waiting on the UI holds
    /// the whole sequence; later steps never start early.
    pub async fn run(&self, steps: &[InteractionStep]) -> SurfaceResult<()> {
        let mut index = 0;
        while index < steps.len() {
            debug!(step = index, total = steps.len(), "executing interaction step");
            self.execute(&steps[index]).await?;
            index += 1;
        }
        Ok(())
    }

    async fn execute(&self, step: &InteractionStep) -> SurfaceResult<()> {
        match step {
            InteractionStep::OpenDropdown {
                control,
                expanded_marker,
                trigger,
            } => {
                await_element(self.surface, control, self.interval).await?;

                // Idempotent: a control that already has its popup open must
                // not be clicked shut again.
                if self.surface.query(expanded_marker).await?.is_none() {
                    let trigger = await_element(self.surface, trigger, self.interval).await?;
                    self.surface.click(&trigger).await?;
                }
                Ok(())
            }
            InteractionStep::AwaitOptions { options } => {
                await_matches(self.surface, options, self.interval).await?;
                Ok(())
            }
            InteractionStep::TypeSearch { input, value } => {
                set_field_value(self.surface, input, value, self.interval).await
            }
            InteractionStep::ClickSoleMatch { options } => {
                let matches = await_sole_match(self.surface, options, self.interval).await?;
                for option in &matches {
                    self.surface.click(option).await?;
                }
                Ok(())
            }
            InteractionStep::FocusInput { input } => {
                let input = await_element(self.surface, input, self.interval).await?;
                self.surface.focus(&input).await
            }
            InteractionStep::ClickAllItems { items } => {
                let items = await_matches(self.surface, items, self.interval).await?;
                for item in &items {
                    self.surface.click(item).await?;
                }
                Ok(())
            }
            InteractionStep::SetField { input, value } => {
                set_field_value(self.surface, input, value, self.interval).await
            }
        }
    }
}

/// Selector bundle for a search-select dropdown: a trigger that opens a
/// popup, a filter input, and an option list that narrows as the filter is
/// typed.
#[derive(Debug, Clone)]
pub struct SearchSelect {
    pub control: String,
    pub expanded_marker: String,
    pub trigger: String,
    pub search_input: String,
    pub options: String,
}

/// Selector bundle for a tag-list field whose menu opens on focus.
#[derive(Debug, Clone)]
pub struct LabelField {
    pub input: String,
    pub items: String,
}

/// Open the dropdown, wait for options, filter, click the single match.
pub fn search_select_steps(select: &SearchSelect, value: impl Into<FieldValue>) -> Vec<InteractionStep> {
    vec![
        InteractionStep::OpenDropdown {
            control: select.control.clone(),
            expanded_marker: select.expanded_marker.clone(),
            trigger: select.trigger.clone(),
        },
        InteractionStep::AwaitOptions {
            options: select.options.clone(),
        },
        InteractionStep::TypeSearch {
            input: select.search_input.clone(),
            value: value.into(),
        },
        InteractionStep::ClickSoleMatch {
            options: select.options.clone(),
        },
    ]
}

/// Focus the tag input, filter, click everything the menu offers.
pub fn add_label_steps(field: &LabelField, value: impl Into<FieldValue>) -> Vec<InteractionStep> {
    vec![
        InteractionStep::FocusInput {
            input: field.input.clone(),
        },
        InteractionStep::TypeSearch {
            input: field.input.clone(),
            value: value.into(),
        },
        InteractionStep::ClickAllItems {
            items: field.items.clone(),
        },
    ]
}

/// Add several tag values. Values are applied strictly in the order given.
pub fn add_label_values<V>(field: &LabelField, values: &[V]) -> Vec<InteractionStep>
where
    V: Clone + Into<FieldValue>,
{
    values
        .iter()
        .flat_map(|value| add_label_steps(field, value.clone()))
        .collect()
}

/// Drain an incrementally loaded conversation.
///
/// While a "show more" control exists, click it and re-check after
/// `interval`; while a progress indicator exists, re-check; once neither
/// remains, the conversation is fully loaded.
pub async fn expand_conversation<S>(
    surface: &S,
    show_more: &str,
    progress: &str,
    interval: Duration,
) -> SurfaceResult<()>
where
    S: UiSurface + ?Sized,
{
    loop {
        if let Some(button) = surface.query(show_more).await? {
            surface.click(&button).await?;
            tokio::time::sleep(interval).await;
            continue;
        }

        if surface.query(progress).await?.is_some() {
            tokio::time::sleep(interval).await;
            continue;
        }

        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::surface::testing::{MockElement, MockSurface};

    const CONTROL: &str = "div[data-test-id=projectId]";
    const EXPANDED: &str = "div[data-test-id=projectId] div[aria-haspopup=true]";
    const TRIGGER: &str = "div[data-test-id=projectId] div[role=button]";
    const SEARCH: &str = "input[data-test-id=projectId-search]";
    const OPTIONS: &str = "div[data-test-id=projectId-list] .option";

    fn project_select() -> SearchSelect {
        SearchSelect {
            control: CONTROL.to_string(),
            expanded_marker: EXPANDED.to_string(),
            trigger: TRIGGER.to_string(),
            search_input: SEARCH.to_string(),
            options: OPTIONS.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn search_select_runs_the_full_choreography() {
        let surface = MockSurface::new();
        surface.mount(CONTROL, MockElement::present());
        surface.mount(TRIGGER, MockElement::present());
        surface.mount(SEARCH, MockElement::input());
        // Popup options render a few polls after the trigger click, and the
        // list narrows to one entry a few polls after the filter is typed.
        surface.on_click_mount(
            TRIGGER,
            OPTIONS,
            MockElement::present().with_count(3).appearing_after(2),
        );
        surface.on_write_mount(
            SEARCH,
            OPTIONS,
            MockElement::present().appearing_after(2),
        );

        let sequencer = Sequencer::new(&surface);
        sequencer
            .run(&search_select_steps(&project_select(), "LPP"))
            .await
            .unwrap();

        let log = surface.log();
        let trigger_click = log
            .iter()
            .position(|line| line == "click:div[data-test-id=projectId] div[role=button][0]")
            .expect("trigger clicked");
        let typed = log
            .iter()
            .position(|line| line == "set:input[data-test-id=projectId-search]=LPP via prototype")
            .expect("filter typed");
        let option_click = log
            .iter()
            .position(|line| line == "click:div[data-test-id=projectId-list] .option[0]")
            .expect("option clicked");

        assert!(trigger_click < typed);
        assert!(typed < option_click);
        assert_eq!(surface.logged("click:div[data-test-id=projectId-list] .option[0]"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_dropdown_is_idempotent_when_already_expanded() {
        let surface = MockSurface::new();
        surface.mount(CONTROL, MockElement::present());
        surface.mount(EXPANDED, MockElement::present());
        surface.mount(TRIGGER, MockElement::present());
        surface.mount(SEARCH, MockElement::input());
        surface.mount(OPTIONS, MockElement::present());

        let sequencer = Sequencer::new(&surface);
        sequencer
            .run(&search_select_steps(&project_select(), "LPP"))
            .await
            .unwrap();

        assert_eq!(
            surface.logged("click:div[data-test-id=projectId] div[role=button][0]"),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn label_adder_clicks_every_menu_item() {
        let surface = MockSurface::new();
        let field = LabelField {
            input: "div[data-test-id=customfield_10133] input".to_string(),
            items: "div.menu div[role=menuitem]".to_string(),
        };
        surface.mount(&field.input, MockElement::input());
        surface.mount("div.menu div[role=menuitem]", MockElement::present().with_count(2));

        let sequencer = Sequencer::new(&surface);
        sequencer
            .run(&add_label_steps(&field, "APAC"))
            .await
            .unwrap();

        assert_eq!(surface.logged("focus:div[data-test-id=customfield_10133] input"), 1);
        assert_eq!(surface.logged("click:div.menu div[role=menuitem][0]"), 1);
        assert_eq!(surface.logged("click:div.menu div[role=menuitem][1]"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn multi_value_labels_apply_in_declared_order() {
        let surface = MockSurface::new();
        let field = LabelField {
            input: "div[data-test-id=offices] input".to_string(),
            items: "div.menu div[role=menuitem]".to_string(),
        };
        surface.mount(&field.input, MockElement::input());
        surface.mount("div.menu div[role=menuitem]", MockElement::present());

        let sequencer = Sequencer::new(&surface);
        sequencer
            .run(&add_label_values(&field, &["APAC", "AU/NZ"]))
            .await
            .unwrap();

        let log = surface.log();
        let first = log
            .iter()
            .position(|line| line == "set:div[data-test-id=offices] input=APAC via prototype")
            .expect("first value typed");
        let second = log
            .iter()
            .position(|line| line == "set:div[data-test-id=offices] input=AU/NZ via prototype")
            .expect("second value typed");
        assert!(first < second);
    }

    #[tokio::test(start_paused = true)]
    async fn expand_conversation_clicks_show_more_until_gone() {
        let surface = MockSurface::new();
        surface.mount("button.show-more", MockElement::present());
        // One click exhausts the hidden comments; the button unmounts.
        surface.on_click_mount(
            "button.show-more",
            "button.show-more",
            MockElement::present().with_count(0),
        );

        expand_conversation(
            &surface,
            "button.show-more",
            "[role=progressbar]",
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(surface.logged("click:button.show-more[0]"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expand_conversation_waits_out_the_progress_bar() {
        let surface = std::sync::Arc::new(MockSurface::new());
        surface.mount("[role=progressbar]", MockElement::present());

        let waiter = tokio::spawn({
            let surface = surface.clone();
            async move {
                expand_conversation(
                    &*surface,
                    "button.show-more",
                    "[role=progressbar]",
                    Duration::from_millis(10),
                )
                .await
                .unwrap();
            }
        });

        tokio::time::sleep(Duration::from_millis(45)).await;
        surface.unmount("[role=progressbar]");

        waiter.await.unwrap();
    }
}
