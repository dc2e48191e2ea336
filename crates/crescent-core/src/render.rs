use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::phrase::PhraseView;
use crate::prayer::{PrayerView, SummaryCard};
use crate::tally::TallyView;
use crate::view::TasksView;

/// Plain-text surface for the widget view-models.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, view), fields(rows = view.rows.len()))]
    pub fn write_tasks<W: Write>(&self, mut out: W, view: &TasksView) -> anyhow::Result<()> {
        let scope = match view.widget {
            Some(widget) => format!("widget {widget}, {}", view.filter.as_tag()),
            None => view.filter.as_tag().to_string(),
        };
        writeln!(
            out,
            "Tasks {}/{} done ({scope})",
            view.summary.done, view.summary.total
        )?;

        if view.is_empty() {
            writeln!(out, "No tasks")?;
            return Ok(());
        }

        let headers = vec![
            String::new(),
            "ID".to_string(),
            "Title".to_string(),
            "Category".to_string(),
        ];

        let rows = view
            .rows
            .iter()
            .map(|row| {
                let check = if row.checked {
                    self.paint("[x]", "33")
                } else {
                    self.paint("[ ]", "90")
                };
                vec![
                    check,
                    row.task_id.clone(),
                    row.title.clone(),
                    row.category.to_string(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_tally<W: Write>(&self, mut out: W, view: &TallyView) -> anyhow::Result<()> {
        writeln!(out, "Tally {}", self.paint(&view.count.to_string(), "1"))?;
        Ok(())
    }

    pub fn write_phrase<W: Write>(&self, mut out: W, view: &PhraseView) -> anyhow::Result<()> {
        let position = view
            .index
            .map(|index| format!("#{index}"))
            .unwrap_or_else(|| "fallback".to_string());
        writeln!(out, "Phrase (widget {}, {position})", view.widget)?;
        writeln!(out, "  {}", view.text)?;
        Ok(())
    }

    pub fn write_prayer<W: Write>(&self, mut out: W, view: &PrayerView) -> anyhow::Result<()> {
        writeln!(out, "{}", view.date_line)?;
        writeln!(out, "{}", view.location)?;
        writeln!(
            out,
            "{} {}  {}",
            self.paint(&view.name, "1"),
            view.time,
            view.countdown.display()
        )?;
        Ok(())
    }

    pub fn write_summary_card<W: Write>(
        &self,
        mut out: W,
        card: &SummaryCard,
    ) -> anyhow::Result<()> {
        writeln!(out, "{} {}", self.paint(&card.prayer_name, "1"), card.prayer_time)?;
        writeln!(out, "{}", card.tasks_summary)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut line = String::new();
    for (idx, header) in headers.iter().enumerate() {
        line.push_str(&pad(header, widths[idx]));
    }
    writeln!(writer, "{}", line.trim_end())?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate() {
            line.push_str(&pad(cell, widths[idx]));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    let padding = width.saturating_sub(visible_width);
    format!("{cell}{} ", " ".repeat(padding))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Renderer, strip_ansi};
    use crate::filter::TaskFilter;
    use crate::refresh::WidgetId;
    use crate::task::{TaskKind, TaskRecord};
    use crate::view::{Summary, TasksView, render_row};

    #[test]
    fn task_table_aligns_columns() {
        let mut done = TaskRecord::new("1", "Pray", TaskKind::Todo);
        done.is_completed = true;
        let view = TasksView {
            widget: Some(WidgetId(5)),
            filter: TaskFilter::All,
            summary: Summary { done: 1, total: 2 },
            rows: vec![
                render_row(&done),
                render_row(&TaskRecord::new("22", "Quit smoking", TaskKind::HabitQuit)),
            ],
        };

        let mut out = Vec::new();
        Renderer::plain().write_tasks(&mut out, &view).expect("render");
        let text = String::from_utf8(out).expect("utf8");

        let expected = [
            "Tasks 1/2 done (widget 5, all)".to_string(),
            format!("    ID Title{}Category", " ".repeat(8)),
            format!("[x] 1  Pray{}task", " ".repeat(9)),
            "[ ] 22 Quit smoking habit to quit".to_string(),
        ];
        assert_eq!(text.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn empty_task_view_says_so() {
        let view = TasksView {
            widget: None,
            filter: TaskFilter::Habit,
            summary: Summary::default(),
            rows: vec![],
        };
        let mut out = Vec::new();
        Renderer::plain().write_tasks(&mut out, &view).expect("render");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "Tasks 0/0 done (habit)\nNo tasks\n"
        );
    }

    #[test]
    fn ansi_sequences_do_not_count_towards_width() {
        assert_eq!(strip_ansi("\x1b[33m[x]\x1b[0m"), "[x]");
    }
}
