use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::refresh::{RefreshRequest, RefreshSink, Surface, WidgetId};
use crate::store::{Store, StoreValue, keys};

/// Stored manual index meaning "follow the calendar".
const UNSET_INDEX: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseView {
    pub widget: WidgetId,
    pub text: String,
    /// Position in `zikr_list`, or `None` when a fallback text is shown.
    pub index: Option<usize>,
}

impl PhraseView {
    /// Text to hand to the clipboard, if there is any.
    pub fn copy_text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(self.text.as_str())
    }
}

/// Picks the phrase for `widget`. Without a manual index the day of the
/// year selects the phrase, so every instance rotates daily.
#[instrument(skip(store, fallback))]
pub fn phrase_view(
    store: &dyn Store,
    widget: WidgetId,
    day_of_year: u32,
    fallback: &str,
) -> anyhow::Result<PhraseView> {
    let manual = store.int_or(&keys::zikr_manual_index(widget), UNSET_INDEX)?;
    let position = if manual == UNSET_INDEX {
        i64::from(day_of_year)
    } else {
        manual
    };

    let list = store.get_string(keys::ZIKR_LIST)?;
    if let Some((index, text)) = select(list.as_deref(), position) {
        debug!(%widget, index, "selected phrase from list");
        return Ok(PhraseView {
            widget,
            text,
            index: Some(index),
        });
    }

    let text = store.string_or(keys::ZIKR_TEXT, fallback)?;
    debug!(%widget, "phrase list unavailable; using fallback text");
    Ok(PhraseView {
        widget,
        text,
        index: None,
    })
}

/// Advances `widget` to the next phrase and returns the stored index.
#[instrument(skip(store, refresh))]
pub fn next_phrase(
    store: &dyn Store,
    refresh: &dyn RefreshSink,
    widget: WidgetId,
    day_of_year: u32,
) -> anyhow::Result<i64> {
    let key = keys::zikr_manual_index(widget);
    let current = match store.int_or(&key, UNSET_INDEX)? {
        UNSET_INDEX => i64::from(day_of_year),
        index => index,
    };
    let next = current.saturating_add(1);

    store.put(&key, StoreValue::Int(next))?;
    info!(%widget, index = next, "advanced phrase");

    refresh.request(RefreshRequest::instance(Surface::Phrase, widget))?;
    Ok(next)
}

fn select(raw: Option<&str>, position: i64) -> Option<(usize, String)> {
    let raw = raw?;
    let list: Vec<Value> = match serde_json::from_str(raw) {
        Ok(list) => list,
        Err(err) => {
            warn!(error = %err, "stored phrase list is not a JSON array");
            return None;
        }
    };
    if list.is_empty() {
        return None;
    }

    let len = i64::try_from(list.len()).ok()?;
    let index = usize::try_from(position.rem_euclid(len)).ok()?;
    let text = match &list[index] {
        Value::String(text) => text.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    Some((index, text))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{next_phrase, phrase_view};
    use crate::refresh::{RefreshLog, RefreshRequest, Surface, WidgetId};
    use crate::store::{MemoryStore, Store, StoreValue, keys};

    const LIST: &str = r#"["a", "b", "c"]"#;

    #[test]
    fn day_of_year_selects_phrase_when_unset() {
        let store = MemoryStore::with_values([(keys::ZIKR_LIST, LIST)]);
        let view = phrase_view(&store, WidgetId(1), 50, "fallback").expect("view");
        assert_eq!(view.index, Some(2));
        assert_eq!(view.text, "c");
    }

    #[test]
    fn next_starts_from_day_of_year_then_increments() {
        let store = MemoryStore::with_values([(keys::ZIKR_LIST, LIST)]);
        let refresh = RefreshLog::new();
        let widget = WidgetId(7);

        assert_eq!(next_phrase(&store, &refresh, widget, 50).expect("next"), 51);
        assert_eq!(phrase_view(&store, widget, 50, "-").expect("view").text, "a");
        assert_eq!(next_phrase(&store, &refresh, widget, 50).expect("next"), 52);
        assert_eq!(phrase_view(&store, widget, 50, "-").expect("view").text, "b");

        // Other instances keep following the calendar.
        assert_eq!(phrase_view(&store, WidgetId(8), 50, "-").expect("view").text, "c");
        assert_eq!(
            refresh.drain().expect("drain"),
            vec![RefreshRequest::instance(Surface::Phrase, widget)]
        );
    }

    #[test]
    fn negative_manual_index_wraps() {
        let store = MemoryStore::with_values([
            (keys::ZIKR_LIST.to_string(), StoreValue::from(LIST)),
            (keys::zikr_manual_index(WidgetId(2)), StoreValue::Int(-4)),
        ]);
        let view = phrase_view(&store, WidgetId(2), 1, "-").expect("view");
        assert_eq!(view.index, Some(2));
    }

    #[test]
    fn falls_back_to_stored_text_then_default() {
        let store = MemoryStore::with_values([(keys::ZIKR_LIST, "[]")]);
        let view = phrase_view(&store, WidgetId(1), 10, "default").expect("view");
        assert_eq!(view.text, "default");
        assert_eq!(view.index, None);

        store
            .put(keys::ZIKR_TEXT, StoreValue::from("from host"))
            .expect("put");
        store
            .put(keys::ZIKR_LIST, StoreValue::from("broken"))
            .expect("put");
        let view = phrase_view(&store, WidgetId(1), 10, "default").expect("view");
        assert_eq!(view.text, "from host");
    }

    #[test]
    fn copy_text_skips_blank_phrases() {
        let store = MemoryStore::with_values([(keys::ZIKR_LIST, r#"["  "]"#)]);
        let view = phrase_view(&store, WidgetId(1), 3, "-").expect("view");
        assert_eq!(view.copy_text(), None);

        let store = MemoryStore::with_values([(keys::ZIKR_LIST, LIST)]);
        let view = phrase_view(&store, WidgetId(1), 3, "-").expect("view");
        assert_eq!(view.copy_text(), Some("a"));
    }
}
