use std::io::{self, IsTerminal, Write};

use chrono::Local;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::derive::CategoryStats;
use crate::task::{Category, Task};

const SHORT_ID_LEN: usize = 8;
const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.color()?;

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn print_task_table(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let color = self.use_color();
        self.write_task_table(&mut out, tasks, color)
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn print_category_stats(&self, stats: &CategoryStats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let color = self.use_color();
        self.write_category_stats(&mut out, stats, color)
    }

    pub fn print_categories(&self) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for category in Category::ALL {
            writeln!(out, "{category}")?;
        }
        Ok(())
    }

    fn write_task_table<W: Write>(
        &self,
        mut out: W,
        tasks: &[Task],
        color: bool,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks yet.")?;
            writeln!(out, "Run `tasker add <title>` to add one!")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Category".to_string(),
            "Title".to_string(),
            "Created".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let id = paint(short_id(&task.id), "33", color);
                let done = if task.completed {
                    paint("[x]", "32", color)
                } else {
                    "[ ]".to_string()
                };
                let title = if task.completed {
                    paint(&task.title, "2", color)
                } else {
                    task.title.clone()
                };
                let created = task
                    .created()
                    .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();

                vec![id, done, task.category.to_string(), title, created]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    fn write_category_stats<W: Write>(
        &self,
        mut out: W,
        stats: &CategoryStats,
        color: bool,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Category".to_string(),
            "Tasks".to_string(),
            "Done".to_string(),
            "Progress".to_string(),
        ];

        let rows = stats
            .iter()
            .map(|(category, count)| {
                let pct = count.percentage();
                let progress = format!("{} {pct:>3}%", paint(&bar(pct), "35", color));
                vec![
                    category.to_string(),
                    count.count.to_string(),
                    count.completed.to_string(),
                    progress,
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    fn use_color(&self) -> bool {
        self.color && io::stdout().is_terminal()
    }
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn bar(pct: u32) -> String {
    let filled = (pct.min(100) as usize * BAR_WIDTH + 50) / 100;
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
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

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
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
    use super::*;
    use crate::derive::category_stats;
    use crate::task::seed_tasks;

    fn renderer() -> Renderer {
        Renderer::new(&Config::default()).expect("renderer")
    }

    #[test]
    fn rejects_unknown_color_setting() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn accepts_every_flag_spelling_for_color() {
        for raw in ["y", "n", "yes", "off", "1"] {
            let mut cfg = Config::default();
            cfg.apply_overrides(vec![("color".to_string(), raw.to_string())]);
            assert!(Renderer::new(&cfg).is_ok(), "{raw}");
        }
    }

    #[test]
    fn empty_list_prints_hint() {
        let mut buf = Vec::new();
        renderer().write_task_table(&mut buf, &[], false).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("No tasks yet."));
    }

    #[test]
    fn task_table_aligns_columns_ignoring_color() {
        let tasks = seed_tasks(0);
        let mut plain = Vec::new();
        let mut colored = Vec::new();
        renderer().write_task_table(&mut plain, &tasks, false).expect("write");
        renderer().write_task_table(&mut colored, &tasks, true).expect("write");

        let plain = String::from_utf8(plain).expect("utf8");
        let colored = String::from_utf8(colored).expect("utf8");
        assert_eq!(strip_ansi(&colored), plain);

        let lines: Vec<_> = plain.lines().collect();
        assert_eq!(lines.len(), 2 + tasks.len());
        assert!(lines[0].starts_with("ID"));
        assert!(lines[2].contains("[x]"));
        assert!(lines[2].contains("Wake up by 6am"));
    }

    #[test]
    fn stats_table_lists_every_category() {
        let stats = category_stats(&seed_tasks(0));
        let mut buf = Vec::new();
        renderer().write_category_stats(&mut buf, &stats, false).expect("write");
        let text = String::from_utf8(buf).expect("utf8");

        for category in Category::ALL {
            assert!(text.contains(category.label()));
        }
        assert!(text.contains("100%"));
        assert!(text.contains("  0%"));
    }

    #[test]
    fn bar_and_short_id() {
        assert_eq!(bar(0), ".".repeat(BAR_WIDTH));
        assert_eq!(bar(100), "#".repeat(BAR_WIDTH));
        assert_eq!(bar(50).matches('#').count(), BAR_WIDTH / 2);
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("1"), "1");
    }
}
