use tracing::{debug, info, instrument};

use crate::refresh::{RefreshRequest, RefreshSink, Surface, WidgetId};
use crate::store::{Store, StoreValue, keys};
use crate::task::TaskKind;

/// Per-instance category filter of the task widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    Todo,
    Habit,
    #[default]
    All,
}

impl TaskFilter {
    /// Unrecognised tags mean `All`.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "todo" => TaskFilter::Todo,
            "habit" => TaskFilter::Habit,
            _ => TaskFilter::All,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            TaskFilter::Todo => "todo",
            TaskFilter::Habit => "habit",
            TaskFilter::All => "all",
        }
    }

    pub fn admits(&self, kind: TaskKind) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Todo => kind == TaskKind::Todo,
            TaskFilter::Habit => kind.is_habit(),
        }
    }
}

/// Stores the filter for `widget` and asks for that instance to be redrawn.
#[instrument(skip(store, refresh))]
pub fn set_filter(
    store: &dyn Store,
    refresh: &dyn RefreshSink,
    widget: WidgetId,
    tag: &str,
) -> anyhow::Result<TaskFilter> {
    let filter = TaskFilter::from_tag(tag);
    store.put(&keys::filter_type(widget), StoreValue::from(filter.as_tag()))?;
    info!(%widget, filter = filter.as_tag(), "configured task widget filter");

    refresh.request(RefreshRequest::instance(Surface::Tasks, widget))?;
    Ok(filter)
}

pub fn filter_for(store: &dyn Store, widget: WidgetId) -> anyhow::Result<TaskFilter> {
    let filter = store
        .get_string(&keys::filter_type(widget))?
        .map(|tag| TaskFilter::from_tag(&tag))
        .unwrap_or_default();
    debug!(%widget, filter = filter.as_tag(), "resolved task widget filter");
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::{TaskFilter, filter_for, set_filter};
    use crate::refresh::{RefreshLog, RefreshRequest, Surface, WidgetId};
    use crate::store::{MemoryStore, Store, StoreValue, keys};

    #[test]
    fn unknown_tags_fall_back_to_all() {
        assert_eq!(TaskFilter::from_tag("habit"), TaskFilter::Habit);
        assert_eq!(TaskFilter::from_tag(" TODO "), TaskFilter::Todo);
        assert_eq!(TaskFilter::from_tag("chores"), TaskFilter::All);
    }

    #[test]
    fn set_filter_persists_per_instance_and_refreshes_it() {
        let store = MemoryStore::new();
        let refresh = RefreshLog::new();

        let stored = set_filter(&store, &refresh, WidgetId(11), "weekly").expect("set");
        assert_eq!(stored, TaskFilter::All);
        assert_eq!(
            store.get(&keys::filter_type(WidgetId(11))).expect("get"),
            Some(StoreValue::from("all"))
        );

        set_filter(&store, &refresh, WidgetId(12), "todo").expect("set");
        assert_eq!(filter_for(&store, WidgetId(12)).expect("filter"), TaskFilter::Todo);
        assert_eq!(filter_for(&store, WidgetId(13)).expect("filter"), TaskFilter::All);

        assert_eq!(
            refresh.drain().expect("drain"),
            vec![
                RefreshRequest::instance(Surface::Tasks, WidgetId(11)),
                RefreshRequest::instance(Surface::Tasks, WidgetId(12)),
            ]
        );
    }
}
