use anyhow::Context;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::refresh::{RefreshRequest, RefreshSink, Surface};
use crate::store::{Edit, Store, keys};
use crate::task::{self, TaskRecord};
use crate::view::{self, Summary};

#[derive(Debug, Error)]
pub enum ToggleError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggled {
    pub task_id: String,
    pub is_completed: bool,
    pub summary: Summary,
}

/// Flips the completion flag of the first record whose id is `task_id`.
///
/// Only that element's `isCompleted` changes. Every other element goes back
/// exactly as stored, including ones that are not valid records. The list
/// and both counters go out in one edit, list first, so a reader never sees
/// counters that belong to a newer list than the one stored. An unknown id
/// writes nothing and requests no refresh.
#[instrument(skip(store, refresh))]
pub fn toggle(
    store: &dyn Store,
    refresh: &dyn RefreshSink,
    task_id: &str,
) -> Result<Toggled, ToggleError> {
    let raw = store.get_string(keys::TASKS_LIST)?;
    let mut elements = task::decode_elements(raw.as_deref());

    let mut records = Vec::with_capacity(elements.len());
    let mut target = None;
    for (idx, element) in elements.iter().enumerate() {
        let Some(record) = task::record_at(idx, element) else {
            continue;
        };
        if target.is_none() && record.id == task_id {
            target = Some((idx, records.len()));
        }
        records.push(record);
    }

    let Some((element_idx, record_idx)) = target else {
        warn!(task_id, "toggle requested for unknown task");
        return Err(ToggleError::NotFound(task_id.to_string()));
    };
    let record = &mut records[record_idx];
    record.is_completed = !record.is_completed;
    let is_completed = record.is_completed;
    task::set_completed(&mut elements[element_idx], is_completed);

    let list = serde_json::to_string(&elements).context("failed to encode task list")?;
    let summary = view::summary(&records);
    write_list(store, list, summary)?;
    info!(
        task_id,
        is_completed,
        done = summary.done,
        total = summary.total,
        "toggled task"
    );

    refresh.request(RefreshRequest::all(Surface::Tasks))?;

    Ok(Toggled {
        task_id: task_id.to_string(),
        is_completed,
        summary,
    })
}

/// Host-side replacement of the whole list, counters included.
#[instrument(skip(store, refresh, records), fields(count = records.len()))]
pub fn publish_tasks(
    store: &dyn Store,
    refresh: &dyn RefreshSink,
    records: &[TaskRecord],
) -> anyhow::Result<Summary> {
    let summary = view::summary(records);
    write_list(store, task::encode(records)?, summary)?;
    info!(done = summary.done, total = summary.total, "published task list");

    refresh.request(RefreshRequest::all(Surface::Tasks))?;
    Ok(summary)
}

fn write_list(store: &dyn Store, list: String, summary: Summary) -> anyhow::Result<()> {
    store.edit(
        Edit::new()
            .put(keys::TASKS_LIST, list)
            .put(keys::TASKS_DONE_COUNT, summary.done)
            .put(keys::TASKS_TOTAL_COUNT, summary.total),
    )
}
