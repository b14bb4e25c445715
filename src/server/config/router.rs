use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{lib::errors::ConfigError, registry::DescriptionPolicy, router::RouterOptions};

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=600;
const CALL_TIMEOUT_RANGE: std::ops::RangeInclusive<u64> = 1..=3600;

/// Ranking and session tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSection {
    pub connect_timeout_secs: u64,
    pub call_timeout_secs: u64,
    pub description_policy: DescriptionPolicy,
    pub qualify_tool_text: bool,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            description_policy: DescriptionPolicy::default(),
            qualify_tool_text: true,
        }
    }
}

impl RouterSection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn options(&self) -> RouterOptions {
        RouterOptions {
            connect_timeout: self.connect_timeout(),
            call_timeout: self.call_timeout(),
            qualify_tool_text: self.qualify_tool_text,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawRouterSection {
    pub connect_timeout_secs: Option<u64>,
    pub call_timeout_secs: Option<u64>,
    pub description_policy: Option<String>,
    pub qualify_tool_text: Option<bool>,
}

pub fn parse_router_section(
    raw: Option<RawRouterSection>,
    path: &Path,
) -> Result<RouterSection, ConfigError> {
    let router_raw = raw.unwrap_or_default();

    let connect_timeout_secs = router_raw
        .connect_timeout_secs
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    validate_range(
        path,
        "router.connect_timeout_secs",
        connect_timeout_secs,
        CONNECT_TIMEOUT_RANGE,
    )?;

    let call_timeout_secs = router_raw
        .call_timeout_secs
        .unwrap_or(DEFAULT_CALL_TIMEOUT_SECS);
    validate_range(
        path,
        "router.call_timeout_secs",
        call_timeout_secs,
        CALL_TIMEOUT_RANGE,
    )?;

    let description_policy = match router_raw.description_policy {
        None => DescriptionPolicy::default(),
        Some(raw_policy) => {
            DescriptionPolicy::parse(&raw_policy).ok_or_else(|| ConfigError::InvalidField {
                path: path.to_path_buf(),
                field: "router.description_policy".into(),
                message: format!("Expected \"synthesize\" or \"empty\", got \"{raw_policy}\""),
            })?
        }
    };

    Ok(RouterSection {
        connect_timeout_secs,
        call_timeout_secs,
        description_policy,
        qualify_tool_text: router_raw.qualify_tool_text.unwrap_or(true),
    })
}

fn validate_range(
    path: &Path,
    field: &str,
    value: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<(), ConfigError> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::InvalidField {
        path: path.to_path_buf(),
        field: field.to_string(),
        message: format!(
            "Use a value between {} and {} seconds",
            range.start(),
            range.end()
        ),
    })
}
