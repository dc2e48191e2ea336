use std::collections::BTreeMap;

use anyhow::Context;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::{Store, keys};

/// Category tag of a task record. Anything the codec does not recognise
/// is a plain to-do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskKind {
    #[default]
    Todo,
    HabitAcquire,
    HabitQuit,
}

impl TaskKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "habit_acquire" => TaskKind::HabitAcquire,
            "habit_quit" => TaskKind::HabitQuit,
            _ => TaskKind::Todo,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            TaskKind::Todo => "todo",
            TaskKind::HabitAcquire => "habit_acquire",
            TaskKind::HabitQuit => "habit_quit",
        }
    }

    pub fn is_habit(&self) -> bool {
        matches!(self, TaskKind::HabitAcquire | TaskKind::HabitQuit)
    }
}

impl Serialize for TaskKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for TaskKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(TaskKind::from_tag).unwrap_or_default())
    }
}

/// One entry of the `tasks_list` array.
///
/// Fields this crate does not know about are kept in `extra` so that a
/// toggle writes back everything the host stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,

    #[serde(default, deserialize_with = "deserialize_title")]
    pub title: String,

    #[serde(rename = "isCompleted", default, deserialize_with = "deserialize_flag")]
    pub is_completed: bool,

    #[serde(rename = "type", default)]
    pub kind: TaskKind,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            is_completed: false,
            kind,
            extra: BTreeMap::new(),
        }
    }
}

// Hosts have written ids both as strings and as JSON numbers.
pub(crate) fn deserialize_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(de::Error::custom(format!(
            "task id must be a string or number, got {other}"
        ))),
    }
}

fn deserialize_title<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(text) => text.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Splits a stored task list into its raw elements, exactly as written.
/// An absent or unparseable value has no elements.
pub fn decode_elements(raw: Option<&str>) -> Vec<Value> {
    let Some(raw) = raw else {
        debug!("no task list stored");
        return vec![];
    };

    match serde_json::from_str(raw) {
        Ok(elements) => elements,
        Err(err) => {
            warn!(error = %err, "stored task list is not a JSON array; treating as empty");
            vec![]
        }
    }
}

/// The record held by one list element, or `None` when it cannot form one.
pub fn record_at(index: usize, element: &Value) -> Option<TaskRecord> {
    match TaskRecord::deserialize(element) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(index, error = %err, "skipping malformed task record");
            None
        }
    }
}

/// Decodes a stored task list. Never fails: an absent or unparseable value
/// is an empty list, and elements that cannot form a record are skipped.
#[tracing::instrument(skip(raw))]
pub fn decode(raw: Option<&str>) -> Vec<TaskRecord> {
    let out: Vec<TaskRecord> = decode_elements(raw)
        .iter()
        .enumerate()
        .filter_map(|(idx, element)| record_at(idx, element))
        .collect();

    debug!(count = out.len(), "decoded task list");
    out
}

/// Sets the completion flag on a raw element, leaving every other field
/// as the host wrote it.
pub fn set_completed(element: &mut Value, is_completed: bool) {
    if let Some(fields) = element.as_object_mut() {
        fields.insert("isCompleted".to_string(), Value::Bool(is_completed));
    }
}

pub fn encode(records: &[TaskRecord]) -> anyhow::Result<String> {
    serde_json::to_string(records).context("failed to encode task list")
}

/// Reads and decodes `tasks_list`. Only a store failure is an error.
pub fn load(store: &dyn Store) -> anyhow::Result<Vec<TaskRecord>> {
    let raw = store.get_string(keys::TASKS_LIST)?;
    Ok(decode(raw.as_deref()))
}
