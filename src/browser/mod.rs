//! Browser infrastructure: process lifecycle and the CDP-backed UI surface.

mod surface;
mod wrapper;

pub use surface::CdpSurface;
pub use wrapper::{BrowserWrapper, get_current_page, open_page};
