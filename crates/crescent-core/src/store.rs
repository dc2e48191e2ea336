use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, trace, warn};

/// Keys shared between the host application and the widgets.
pub mod keys {
    use crate::refresh::WidgetId;

    pub const TASKS_LIST: &str = "tasks_list";
    pub const TASKS_DONE_COUNT: &str = "tasks_done_count";
    pub const TASKS_TOTAL_COUNT: &str = "tasks_total_count";
    pub const TASKS_SUMMARY: &str = "tasks_summary";

    pub const SEBHA_COUNT: &str = "sebha_count";

    pub const ZIKR_LIST: &str = "zikr_list";
    pub const ZIKR_TEXT: &str = "zikr_text";

    pub const NEXT_PRAYER_NAME: &str = "next_prayer_name";
    pub const NEXT_PRAYER_TIME: &str = "next_prayer_time";
    pub const NEXT_PRAYER_MILLIS: &str = "next_prayer_millis";
    pub const HIJRI_DATE: &str = "hijri_date";
    pub const LOCATION: &str = "location";

    pub fn filter_type(widget: WidgetId) -> String {
        format!("filter_type_{widget}")
    }

    pub fn zikr_manual_index(widget: WidgetId) -> String {
        format!("zikr_manual_index_{widget}")
    }
}

/// A value as the host writes it. Anything that is not a bool, an
/// integer or a string (floats, `null`, nested JSON) lands in `Other`;
/// it is kept as written and the typed accessors treat it as a mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Other(Value),
}

impl StoreValue {
    /// Integer view; numeric strings are accepted.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StoreValue::Int(value) => Some(*value),
            StoreValue::Str(text) => text.trim().parse().ok(),
            StoreValue::Bool(_) | StoreValue::Other(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StoreValue::Bool(value) => Some(*value),
            StoreValue::Int(0) => Some(false),
            StoreValue::Int(1) => Some(true),
            StoreValue::Int(_) => None,
            StoreValue::Str(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            StoreValue::Other(_) => None,
        }
    }

    /// Text view; every primitive has one, `Other` does not.
    pub fn as_text(&self) -> Option<String> {
        match self {
            StoreValue::Other(_) => None,
            value => Some(value.to_string()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            StoreValue::Bool(_) => "bool",
            StoreValue::Int(_) => "int",
            StoreValue::Str(_) => "string",
            StoreValue::Other(Value::Null) => "null",
            StoreValue::Other(Value::Number(_)) => "number",
            StoreValue::Other(_) => "json",
        }
    }
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::Bool(value) => write!(f, "{value}"),
            StoreValue::Int(value) => write!(f, "{value}"),
            StoreValue::Str(text) => f.write_str(text),
            StoreValue::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for StoreValue {
    fn from(value: bool) -> Self {
        StoreValue::Bool(value)
    }
}

impl From<i64> for StoreValue {
    fn from(value: i64) -> Self {
        StoreValue::Int(value)
    }
}

impl From<usize> for StoreValue {
    fn from(value: usize) -> Self {
        StoreValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        StoreValue::Str(value)
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        StoreValue::Str(value.to_string())
    }
}

/// An ordered batch of writes. Stores apply the writes in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edit {
    writes: Vec<(String, StoreValue)>,
}

impl Edit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: impl Into<String>, value: impl Into<StoreValue>) -> Self {
        self.writes.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.writes.iter().map(|(key, _)| key.as_str())
    }

    fn apply_to(self, values: &mut BTreeMap<String, StoreValue>) -> Vec<String> {
        let mut written = Vec::with_capacity(self.writes.len());
        for (key, value) in self.writes {
            trace!(key = %key, value = %value, "applying store write");
            values.insert(key.clone(), value);
            written.push(key);
        }
        written
    }
}

/// Shared key/value preference store.
///
/// There are no transactions across calls: a `get` followed by an `edit`
/// may interleave with writes from other processes or widget instances.
/// Only the writes inside one [`Edit`] are applied together, in order.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<StoreValue>>;

    fn edit(&self, edit: Edit) -> anyhow::Result<()>;

    fn put(&self, key: &str, value: StoreValue) -> anyhow::Result<()> {
        self.edit(Edit::new().put(key, value))
    }

    /// String view of a key. A value with no text form reads as absent.
    fn get_string(&self, key: &str) -> anyhow::Result<Option<String>> {
        let Some(value) = self.get(key)? else {
            return Ok(None);
        };
        Ok(value.as_text().or_else(|| {
            warn!(key, kind = value.kind(), value = %value, "store value is not a string; ignoring it");
            None
        }))
    }

    fn string_or(&self, key: &str, default: &str) -> anyhow::Result<String> {
        Ok(self
            .get_string(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    fn int_or(&self, key: &str, default: i64) -> anyhow::Result<i64> {
        let Some(value) = self.get(key)? else {
            return Ok(default);
        };
        Ok(value.as_int().unwrap_or_else(|| {
            warn!(key, kind = value.kind(), value = %value, default, "store value is not an integer; using default");
            default
        }))
    }

    fn bool_or(&self, key: &str, default: bool) -> anyhow::Result<bool> {
        let Some(value) = self.get(key)? else {
            return Ok(default);
        };
        Ok(value.as_bool().unwrap_or_else(|| {
            warn!(key, kind = value.kind(), value = %value, default, "store value is not a boolean; using default");
            default
        }))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    values: BTreeMap<String, StoreValue>,
    write_log: Vec<String>,
}

/// In-process store. Each [`Edit`] is applied under one lock, and every
/// written key is appended to a log so tests can check write ordering.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<StoreValue>,
    {
        let values = values
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            state: Mutex::new(MemoryState {
                values,
                write_log: vec![],
            }),
        }
    }

    pub fn write_log(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.lock()?.write_log.clone())
    }

    pub fn snapshot(&self) -> anyhow::Result<BTreeMap<String, StoreValue>> {
        Ok(self.lock()?.values.clone())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<StoreValue>> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    fn edit(&self, edit: Edit) -> anyhow::Result<()> {
        let mut state = self.lock()?;
        let written = edit.apply_to(&mut state.values);
        state.write_log.extend(written);
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// Reads always go to disk so writes made by another process are seen.
/// Writes are read-modify-write under an in-process lock and land through
/// an atomic rename, so one [`Edit`] is never observed half applied.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    #[tracing::instrument(skip(path))]
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let path = path.to_path_buf();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        if !path.exists() {
            fs::write(&path, "{}")
                .with_context(|| format!("failed to create {}", path.display()))?;
        }

        info!(store = %path.display(), "opened widget store");

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn snapshot(&self) -> anyhow::Result<BTreeMap<String, StoreValue>> {
        self.load()
    }

    fn load(&self) -> anyhow::Result<BTreeMap<String, StoreValue>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let values: BTreeMap<String, StoreValue> = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        debug!(file = %self.path.display(), count = values.len(), "loaded store values");
        Ok(values)
    }

    fn save_atomic(&self, values: &BTreeMap<String, StoreValue>) -> anyhow::Result<()> {
        debug!(file = %self.path.display(), count = values.len(), "saving store atomically");

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, values)?;
        writeln!(temp)?;
        temp.flush()?;

        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        Ok(())
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<StoreValue>> {
        Ok(self.load()?.remove(key))
    }

    #[tracing::instrument(skip(self, edit), fields(keys = ?edit.keys().collect::<Vec<_>>()))]
    fn edit(&self, edit: Edit) -> anyhow::Result<()> {
        if edit.is_empty() {
            return Ok(());
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("file store lock poisoned"))?;
        let mut values = self.load()?;
        edit.apply_to(&mut values);
        self.save_atomic(&values)
            .with_context(|| format!("failed to save {}", self.path.display()))
    }
}
