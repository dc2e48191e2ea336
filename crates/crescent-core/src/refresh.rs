use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier of one placed widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(pub i64);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WidgetId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(WidgetId)
            .map_err(|err| anyhow!("invalid widget id {s:?}: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Tasks,
    Tally,
    Phrase,
    Prayer,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    All,
    Instance(WidgetId),
}

/// A request to re-render a surface from the current store contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshRequest {
    pub surface: Surface,
    pub target: RefreshTarget,
}

impl RefreshRequest {
    pub fn all(surface: Surface) -> Self {
        Self {
            surface,
            target: RefreshTarget::All,
        }
    }

    pub fn instance(surface: Surface, widget: WidgetId) -> Self {
        Self {
            surface,
            target: RefreshTarget::Instance(widget),
        }
    }
}

pub trait RefreshSink: Send + Sync {
    fn request(&self, request: RefreshRequest) -> anyhow::Result<()>;
}

/// Collects refresh requests in arrival order until drained.
#[derive(Debug, Default)]
pub struct RefreshLog {
    pending: Mutex<Vec<RefreshRequest>>,
}

impl RefreshLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the pending requests, dropping repeats of an earlier request.
    pub fn drain(&self) -> anyhow::Result<Vec<RefreshRequest>> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| anyhow!("refresh log lock poisoned"))?;
        let mut out: Vec<RefreshRequest> = Vec::with_capacity(pending.len());
        for request in pending.drain(..) {
            if !out.contains(&request) {
                out.push(request);
            }
        }
        Ok(out)
    }
}

impl RefreshSink for RefreshLog {
    fn request(&self, request: RefreshRequest) -> anyhow::Result<()> {
        debug!(?request, "refresh requested");
        self.pending
            .lock()
            .map_err(|_| anyhow!("refresh log lock poisoned"))?
            .push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{RefreshLog, RefreshRequest, RefreshSink, Surface, WidgetId};

    #[test]
    fn drain_keeps_first_occurrence_order() {
        let log = RefreshLog::new();
        log.request(RefreshRequest::all(Surface::Tasks)).expect("request");
        log.request(RefreshRequest::instance(Surface::Phrase, WidgetId(4)))
            .expect("request");
        log.request(RefreshRequest::all(Surface::Tasks)).expect("request");

        let drained = log.drain().expect("drain");
        assert_eq!(
            drained,
            vec![
                RefreshRequest::all(Surface::Tasks),
                RefreshRequest::instance(Surface::Phrase, WidgetId(4)),
            ]
        );
        assert!(log.drain().expect("drain").is_empty());
    }

    #[test]
    fn widget_id_parses_trimmed_integers() {
        assert_eq!(" 12 ".parse::<WidgetId>().expect("parse"), WidgetId(12));
        assert!("twelve".parse::<WidgetId>().is_err());
    }
}
