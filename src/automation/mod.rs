//! The asynchronous polling and UI-automation engine
//!
//! Layered bottom-up: `poll` is the single retry-until-ready primitive,
//! `surface` is the seam to the live page, `input` drives reactive-framework
//! fields through it, and `sequence` composes the other three into guided
//! multi-step interactions.

pub mod input;
pub mod poll;
pub mod sequence;
pub mod surface;

pub use input::{FieldValue, set_field_value};
pub use poll::{DEFAULT_POLL_INTERVAL, poll};
pub use sequence::{
    CONVERSATION_RECHECK_INTERVAL, InteractionStep, LabelField, SearchSelect, Sequencer,
    add_label_steps, add_label_values, expand_conversation, search_select_steps,
};
pub use surface::{
    ElementHandle, SetterKind, SurfaceError, SurfaceResult, UiSurface, ValueSetters,
    await_element, await_matches, await_sole_match,
};
