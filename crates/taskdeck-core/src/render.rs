use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Local, NaiveDate};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::task::{Task, User};

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

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, owner_name))]
    pub fn print_task_table(
        &mut self,
        tasks: &[Task],
        owner_name: impl Fn(Option<i64>) -> String,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "Status", "Pri", "Due", "Owner", "Title"];
        let today = Local::now().date_naive();

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = task
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let id = self.paint(&id, "33");

            let status = self.paint(
                task.status.label(),
                match task.status {
                    crate::task::Status::Pending => "0",
                    crate::task::Status::InProgress => "34",
                    crate::task::Status::Completed => "32",
                },
            );

            let due = task.due_date.clone().unwrap_or_default();
            let due = if is_overdue(task.due_date.as_deref(), today) {
                self.paint(&due, "31")
            } else {
                due
            };

            rows.push(vec![
                id,
                status,
                task.priority.label().to_string(),
                due,
                owner_name(task.owner),
                task.title.clone(),
            ]);
        }

        write_table(&mut out, &headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task, owner_name))]
    pub fn print_task_info(
        &mut self,
        task: &Task,
        owner_name: impl Fn(Option<i64>) -> String,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(
            out,
            "id          {}",
            task.id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(out, "title       {}", task.title)?;
        if task.description.is_empty() {
            writeln!(out, "description (no description)")?;
        } else {
            writeln!(out, "description {}", task.description)?;
        }
        writeln!(out, "status      {}", task.status.label())?;
        writeln!(out, "priority    {}", task.priority.label())?;
        writeln!(
            out,
            "due         {}",
            task.due_date.clone().unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(out, "owner       {}", owner_name(task.owner))?;
        if let Some(created) = &task.created_at {
            writeln!(out, "created     {created}")?;
        }
        if let Some(updated) = &task.updated_at {
            writeln!(out, "updated     {updated}")?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, users))]
    pub fn print_user_table(&mut self, users: &[User]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if users.is_empty() {
            writeln!(out, "No users.")?;
            return Ok(());
        }

        let rows = users
            .iter()
            .map(|user| vec![self.paint(&user.id.to_string(), "33"), user.username.clone()])
            .collect();
        write_table(&mut out, &["ID", "Username"], rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn is_overdue(due_date: Option<&str>, today: NaiveDate) -> bool {
    due_date
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .map(|due| due < today)
        .unwrap_or(false)
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$} ", header, width = widths[idx])?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "", width = width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let padding = widths[idx].saturating_sub(visible_width(cell));
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn visible_width(cell: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(cell).as_str())
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
    use chrono::NaiveDate;

    use super::{is_overdue, strip_ansi, write_table};

    #[test]
    fn overdue_only_for_parseable_past_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 23).expect("date");
        assert!(is_overdue(Some("2026-08-22"), today));
        assert!(!is_overdue(Some("2026-08-23"), today));
        assert!(!is_overdue(Some("not-a-date"), today));
        assert!(!is_overdue(None, today));
    }

    #[test]
    fn table_columns_align_ignoring_ansi() {
        let mut buffer = Vec::new();
        write_table(
            &mut buffer,
            &["ID", "Title"],
            vec![
                vec!["\x1b[33m1\x1b[0m".to_string(), "short".to_string()],
                vec!["12".to_string(), "a longer title".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0].trim_end(), "ID Title");
        assert!(strip_ansi(lines[2]).starts_with("1  short"));
    }
}
