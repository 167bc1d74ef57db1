//! Agent-side enhancement engine for helpdesk web UIs
//!
//! Waits for transient DOM state, drives reactive-framework widgets through
//! synthesized events, and coordinates concurrent REST fetches with shared
//! caches.

pub mod attachments;
pub mod automation;
mod browser;
pub mod browser_setup;
pub mod helpdesk;
pub mod issue;
mod manager;
pub mod render;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Origin of the helpdesk instance.
    #[serde(default = "default_helpdesk_url")]
    pub helpdesk_url: String,

    /// Origin of the patch portal used for baseline build lookups.
    #[serde(default = "default_patch_portal_url")]
    pub patch_portal_url: String,

    /// Interval between DOM-readiness polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_helpdesk_url() -> String {
    "https://liferay-support.zendesk.com".to_string()
}

fn default_patch_portal_url() -> String {
    "https://patcher.liferay.com".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_headless() -> bool {
    false // the operator watches and supervises the live page
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

impl Default for Config {
    fn default() -> Self {
        Self {
            helpdesk_url: default_helpdesk_url(),
            patch_portal_url: default_patch_portal_url(),
            poll_interval_ms: default_poll_interval_ms(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Config {
    /// The poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Load config from config.yaml in the working directory
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from("config.yaml");

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

pub use attachments::{
    ArchiveOutcome, Archiver, AttachmentRecord, AttachmentSelection, MemoryArchiver,
    attachment_file_name, download_selected, is_large_attachment, table_rows,
};
pub use automation::{
    DEFAULT_POLL_INTERVAL, ElementHandle, FieldValue, InteractionStep, LabelField, SearchSelect,
    Sequencer, SurfaceError, UiSurface, await_element, expand_conversation, poll, set_field_value,
};
pub use browser::{BrowserWrapper, CdpSurface, open_page};
pub use helpdesk::{ApiTransport, HttpTransport, MetadataResolver, TicketMetadata, TransportError};
pub use issue::{IssueFormFiller, IssueSeed, fetch_baseline_version, support_offices};
pub use manager::BrowserManager;
pub use render::{LogRenderer, Renderer};
