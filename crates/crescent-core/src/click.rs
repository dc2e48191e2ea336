use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::refresh::RefreshSink;
use crate::store::Store;
use crate::task::deserialize_id;
use crate::toggle::{self, ToggleError, Toggled};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickAction {
    Open,
    Toggle,
}

/// Part of a task row that received the click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Row,
    Checkmark,
}

impl Region {
    fn implied_action(self) -> ClickAction {
        match self {
            Region::Row => ClickAction::Open,
            Region::Checkmark => ClickAction::Toggle,
        }
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "row" => Ok(Region::Row),
            "check" | "checkmark" => Ok(Region::Checkmark),
            other => Err(anyhow!("unknown click region: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickPayload {
    pub task_id: String,
    pub click_action: ClickAction,
}

#[derive(Debug, Deserialize)]
struct RawClick {
    #[serde(deserialize_with = "deserialize_id")]
    task_id: String,
    #[serde(default)]
    click_action: Option<ClickAction>,
}

#[derive(Debug, Error)]
pub enum ClickError {
    #[error("malformed click payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ClickPayload {
    pub fn new(task_id: &str, click_action: ClickAction) -> Self {
        Self {
            task_id: task_id.to_string(),
            click_action,
        }
    }

    /// Parses a delivered payload. Payloads without `click_action` take
    /// the action of the region that was struck.
    pub fn parse(raw: &str, region: Region) -> Result<Self, ClickError> {
        let raw: RawClick = serde_json::from_str(raw)?;
        let click_action = raw.click_action.unwrap_or_else(|| {
            debug!(?region, "click payload without action; using region");
            region.implied_action()
        });
        Ok(Self {
            task_id: raw.task_id,
            click_action,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Toggled(Toggled),
    /// Navigation to the task is left to the host.
    Open { task_id: String },
}

#[instrument(skip(store, refresh))]
pub fn handle_click(
    store: &dyn Store,
    refresh: &dyn RefreshSink,
    payload: &ClickPayload,
) -> Result<ClickOutcome, ToggleError> {
    match payload.click_action {
        ClickAction::Toggle => {
            toggle::toggle(store, refresh, &payload.task_id).map(ClickOutcome::Toggled)
        }
        ClickAction::Open => Ok(ClickOutcome::Open {
            task_id: payload.task_id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ClickAction, ClickOutcome, ClickPayload, Region, handle_click};
    use crate::refresh::RefreshLog;
    use crate::store::{MemoryStore, keys};
    use crate::toggle::ToggleError;

    #[test]
    fn explicit_action_wins_over_region() {
        let payload = ClickPayload::parse(r#"{"task_id": "4", "click_action": "open"}"#, Region::Checkmark)
            .expect("parse");
        assert_eq!(payload, ClickPayload::new("4", ClickAction::Open));
    }

    #[test]
    fn legacy_payload_takes_action_from_region() {
        let raw = r#"{"task_id": 4}"#;
        assert_eq!(
            ClickPayload::parse(raw, Region::Row).expect("parse").click_action,
            ClickAction::Open
        );
        assert_eq!(
            ClickPayload::parse(raw, Region::Checkmark).expect("parse").click_action,
            ClickAction::Toggle
        );
        assert!(ClickPayload::parse(r#"{"click_action": "toggle"}"#, Region::Row).is_err());
    }

    #[test]
    fn open_does_not_touch_the_store() {
        let store = MemoryStore::new();
        let refresh = RefreshLog::new();
        let outcome = handle_click(&store, &refresh, &ClickPayload::new("1", ClickAction::Open))
            .expect("click");
        assert_eq!(
            outcome,
            ClickOutcome::Open {
                task_id: "1".to_string()
            }
        );
        assert!(store.write_log().expect("log").is_empty());
    }

    #[test]
    fn toggle_click_runs_toggle_handler() {
        let store = MemoryStore::with_values([(
            keys::TASKS_LIST,
            r#"[{"id": "1", "title": "Pray", "isCompleted": true, "type": "todo"}]"#,
        )]);
        let refresh = RefreshLog::new();

        let outcome = handle_click(&store, &refresh, &ClickPayload::new("1", ClickAction::Toggle))
            .expect("click");
        let ClickOutcome::Toggled(toggled) = outcome else {
            panic!("expected a toggle outcome");
        };
        assert!(!toggled.is_completed);

        let missing = handle_click(&store, &refresh, &ClickPayload::new("2", ClickAction::Toggle));
        assert!(matches!(missing, Err(ToggleError::NotFound(_))));
    }
}
