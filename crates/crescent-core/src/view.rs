use tracing::{debug, instrument};

use crate::click::{ClickAction, ClickPayload};
use crate::filter::{self, TaskFilter};
use crate::refresh::WidgetId;
use crate::store::{Store, keys};
use crate::task::{self, TaskKind, TaskRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub done: usize,
    pub total: usize,
}

/// Records admitted by `filter`, in list order.
pub fn visible(records: &[TaskRecord], filter: TaskFilter) -> Vec<&TaskRecord> {
    records
        .iter()
        .filter(|record| filter.admits(record.kind))
        .collect()
}

pub fn summary<'a, I>(records: I) -> Summary
where
    I: IntoIterator<Item = &'a TaskRecord>,
{
    records
        .into_iter()
        .fold(Summary::default(), |acc, record| Summary {
            done: acc.done + usize::from(record.is_completed),
            total: acc.total + 1,
        })
}

pub fn category_label(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Todo => "task",
        TaskKind::HabitAcquire => "habit to build",
        TaskKind::HabitQuit => "habit to quit",
    }
}

/// Display fields for one list row. `open` is bound to the row body and
/// `toggle` to the checkmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub task_id: String,
    pub title: String,
    pub category: &'static str,
    pub checked: bool,
    pub open: ClickPayload,
    pub toggle: ClickPayload,
}

pub fn render_row(record: &TaskRecord) -> RowView {
    RowView {
        task_id: record.id.clone(),
        title: record.title.clone(),
        category: category_label(record.kind),
        checked: record.is_completed,
        open: ClickPayload::new(&record.id, ClickAction::Open),
        toggle: ClickPayload::new(&record.id, ClickAction::Toggle),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TasksView {
    pub widget: Option<WidgetId>,
    pub filter: TaskFilter,
    pub summary: Summary,
    pub rows: Vec<RowView>,
}

impl TasksView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builds the task widget for one instance, or with no filter when no
/// instance is given. The header counts the whole list regardless of
/// the filter.
#[instrument(skip(store))]
pub fn tasks_view(store: &dyn Store, widget: Option<WidgetId>) -> anyhow::Result<TasksView> {
    let records = task::load(store)?;
    let filter = match widget {
        Some(widget) => filter::filter_for(store, widget)?,
        None => TaskFilter::All,
    };

    let header = summary(&records);
    let stored_done = store.int_or(keys::TASKS_DONE_COUNT, 0)?;
    let stored_total = store.int_or(keys::TASKS_TOTAL_COUNT, 0)?;
    if usize::try_from(stored_done).ok() != Some(header.done)
        || usize::try_from(stored_total).ok() != Some(header.total)
    {
        debug!(
            stored_done,
            stored_total,
            done = header.done,
            total = header.total,
            "stored task counters are stale; using counts derived from the list"
        );
    }

    let rows: Vec<RowView> = visible(&records, filter)
        .into_iter()
        .map(render_row)
        .collect();
    debug!(filter = filter.as_tag(), rows = rows.len(), "built task widget");

    Ok(TasksView {
        widget,
        filter,
        summary: header,
        rows,
    })
}
