use std::fs;
use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cli::{Command, PhraseAction, TallyAction, ValueKind};
use crate::click::{self, ClickOutcome, ClickPayload};
use crate::config::Config;
use crate::datetime::WidgetClock;
use crate::filter;
use crate::phrase;
use crate::prayer;
use crate::refresh::{RefreshLog, RefreshRequest, RefreshTarget, Surface, WidgetId};
use crate::render::Renderer;
use crate::store::{Store, StoreValue};
use crate::tally;
use crate::task;
use crate::toggle;
use crate::view;

/// Everything a command needs besides its arguments.
pub struct Session<'a, W: Write> {
    pub store: &'a dyn Store,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub clock: WidgetClock,
    pub now: DateTime<Utc>,
    pub out: W,
    refresh: RefreshLog,
}

impl<'a, W: Write> Session<'a, W> {
    pub fn new(
        store: &'a dyn Store,
        cfg: &'a Config,
        renderer: &'a Renderer,
        clock: WidgetClock,
        now: DateTime<Utc>,
        out: W,
    ) -> Self {
        Self {
            store,
            cfg,
            renderer,
            clock,
            now,
            out,
            refresh: RefreshLog::new(),
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn day_of_year(&self) -> u32 {
        self.clock.day_of_year(self.now)
    }

    fn render(&mut self, surface: Surface, widget: Option<WidgetId>) -> anyhow::Result<()> {
        match surface {
            Surface::Tasks => {
                let view = view::tasks_view(self.store, widget)?;
                self.renderer.write_tasks(&mut self.out, &view)
            }
            Surface::Tally => {
                let view = tally::tally_view(self.store)?;
                self.renderer.write_tally(&mut self.out, &view)
            }
            Surface::Phrase => {
                let view = phrase::phrase_view(
                    self.store,
                    widget.unwrap_or(WidgetId(0)),
                    self.day_of_year(),
                    &self.cfg.zikr_fallback(),
                )?;
                self.renderer.write_phrase(&mut self.out, &view)
            }
            Surface::Prayer => {
                let view = prayer::prayer_view(
                    self.store,
                    self.now,
                    &self.clock,
                    &self.cfg.location_placeholder(),
                )?;
                self.renderer.write_prayer(&mut self.out, &view)
            }
            Surface::Summary => {
                let card = prayer::summary_card(self.store)?;
                self.renderer.write_summary_card(&mut self.out, &card)
            }
        }
    }

    /// Redraws every surface a handler asked for.
    fn flush_refresh(&mut self) -> anyhow::Result<()> {
        for RefreshRequest { surface, target } in self.refresh.drain()? {
            debug!(?surface, ?target, "rendering refreshed surface");
            let widget = match target {
                RefreshTarget::All => None,
                RefreshTarget::Instance(widget) => Some(widget),
            };
            self.render(surface, widget)?;
        }
        Ok(())
    }
}

#[instrument(skip(session, command))]
pub fn dispatch<W: Write>(session: &mut Session<'_, W>, command: Command) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Tasks { widget } => session.render(Surface::Tasks, widget)?,
        Command::Toggle { task_id } => {
            toggle::toggle(session.store, &session.refresh, &task_id)?;
        }
        Command::Click { payload, region } => {
            let payload = ClickPayload::parse(&payload, region)?;
            match click::handle_click(session.store, &session.refresh, &payload)? {
                ClickOutcome::Toggled(_) => {}
                ClickOutcome::Open { task_id } => {
                    info!(task_id = %task_id, "open requested");
                    writeln!(session.out, "open task {task_id}")?;
                }
            }
        }
        Command::Filter { widget, tag } => {
            filter::set_filter(session.store, &session.refresh, widget, &tag)?;
        }
        Command::Publish { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let records: Vec<task::TaskRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("failed parsing task list {}", file.display()))?;
            toggle::publish_tasks(session.store, &session.refresh, &records)?;
        }
        Command::Tally { action } => match action {
            Some(TallyAction::Inc) => {
                tally::increment(session.store, &session.refresh)?;
            }
            Some(TallyAction::Reset) => {
                tally::reset(session.store, &session.refresh)?;
            }
            None => session.render(Surface::Tally, None)?,
        },
        Command::Phrase { widget, action } => match action {
            Some(PhraseAction::Next) => {
                let day = session.day_of_year();
                phrase::next_phrase(session.store, &session.refresh, widget, day)?;
            }
            Some(PhraseAction::Copy) => {
                let view = phrase::phrase_view(
                    session.store,
                    widget,
                    session.day_of_year(),
                    &session.cfg.zikr_fallback(),
                )?;
                let text = view
                    .copy_text()
                    .ok_or_else(|| anyhow!("nothing to copy for widget {widget}"))?;
                writeln!(session.out, "{text}")?;
            }
            None => session.render(Surface::Phrase, Some(widget))?,
        },
        Command::Prayer => session.render(Surface::Prayer, None)?,
        Command::Summary => session.render(Surface::Summary, None)?,
        Command::Set { key, value, kind } => {
            let value = match kind {
                ValueKind::Str => StoreValue::Str(value),
                ValueKind::Int => StoreValue::Int(
                    value
                        .trim()
                        .parse()
                        .with_context(|| format!("not an integer: {value}"))?,
                ),
                ValueKind::Bool => StoreValue::from(value.as_str())
                    .as_bool()
                    .map(StoreValue::Bool)
                    .ok_or_else(|| anyhow!("not a boolean: {value}"))?,
            };
            info!(key = %key, value = %value, "writing raw store value");
            session.store.put(&key, value)?;
        }
    }

    session.flush_refresh()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::{Session, dispatch};
    use crate::cli::{Command, TallyAction, ValueKind};
    use crate::config::Config;
    use crate::datetime::WidgetClock;
    use crate::refresh::WidgetId;
    use crate::render::Renderer;
    use crate::store::{MemoryStore, Store, StoreValue, keys};

    fn run(store: &MemoryStore, command: Command) -> anyhow::Result<String> {
        let cfg = Config::defaults();
        let renderer = Renderer::plain();
        let now = Utc.with_ymd_and_hms(2026, 2, 18, 12, 0, 0).unwrap();
        let mut session = Session::new(
            store,
            &cfg,
            &renderer,
            WidgetClock::Zone(chrono_tz::UTC),
            now,
            Vec::new(),
        );
        dispatch(&mut session, command)?;
        Ok(String::from_utf8(session.into_output())?)
    }

    #[test]
    fn toggle_renders_refreshed_task_widget() {
        let store = MemoryStore::with_values([(
            keys::TASKS_LIST,
            r#"[{"id":"1","title":"Pray","isCompleted":false,"type":"todo"}]"#,
        )]);

        let out = run(
            &store,
            Command::Toggle {
                task_id: "1".to_string(),
            },
        )
        .expect("toggle");
        assert!(out.starts_with("Tasks 1/1 done (all)\n"));
        assert!(out.contains("[x] 1"));
    }

    #[test]
    fn toggle_of_unknown_task_is_an_error() {
        let store = MemoryStore::new();
        let err = run(
            &store,
            Command::Toggle {
                task_id: "404".to_string(),
            },
        )
        .expect_err("unknown task");
        assert!(err.to_string().contains("task not found: 404"));
    }

    #[test]
    fn tally_increment_redraws_tally() {
        let store = MemoryStore::new();
        let out = run(
            &store,
            Command::Tally {
                action: Some(TallyAction::Inc),
            },
        )
        .expect("tally");
        assert_eq!(out, "Tally 1\n");
    }

    #[test]
    fn filter_redraws_only_that_instance() {
        let store = MemoryStore::with_values([(
            keys::TASKS_LIST,
            r#"[{"id":"1","title":"Pray"},{"id":"2","title":"Quit","type":"habit_quit"}]"#,
        )]);
        let out = run(
            &store,
            Command::Filter {
                widget: WidgetId(9),
                tag: "habit".to_string(),
            },
        )
        .expect("filter");
        assert!(out.starts_with("Tasks 0/2 done (widget 9, habit)\n"));
        assert!(out.contains("Quit"));
        assert!(!out.contains("Pray"));
    }

    #[test]
    fn set_parses_value_kinds() {
        let store = MemoryStore::new();
        run(
            &store,
            Command::Set {
                key: "sebha_count".to_string(),
                value: " 12 ".to_string(),
                kind: ValueKind::Int,
            },
        )
        .expect("set int");
        assert_eq!(
            store.get(keys::SEBHA_COUNT).expect("get"),
            Some(StoreValue::Int(12))
        );

        assert!(
            run(
                &store,
                Command::Set {
                    key: "flag".to_string(),
                    value: "maybe".to_string(),
                    kind: ValueKind::Bool,
                },
            )
            .is_err()
        );
    }
}
