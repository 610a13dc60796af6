use std::io::{self, IsTerminal};

use crate::app::{ContainerView, DayCounts};
use crate::container::ContainerKey;
use crate::domain::dates::{format_date, format_timestamp};
use crate::domain::{Task, TaskState};

const SHORT_ID_LEN: usize = 8;

pub fn print_containers(views: &[ContainerView]) {
    let palette = Palette::auto();
    if views.is_empty() {
        println!("{}", palette.dim("no tasks matched"));
        return;
    }

    let mut total = 0usize;
    for view in views {
        println!("{}", palette.heading(&container_heading(view.container)));
        for task in &view.tasks {
            println!("  {}", format_task_row(task, &palette));
        }
        total += view.tasks.len();
    }
    println!("{}", palette.dim(&format!("{total} task(s)")));
}

/// One-line confirmation such as `punted 1a2b3c4d [ACTIVE] call bank`.
pub fn print_task_line(verb: &str, task: &Task) {
    let palette = Palette::auto();
    println!("{} {}", verb, format_task_row(task, &palette));
}

pub fn print_task_show(task: &Task) {
    let palette = Palette::auto();
    println!("{} {}", palette.id(task.id.as_str()), palette.state(task.state));
    println!("text:       {}", task.text);
    let location = task
        .date
        .map(format_date)
        .unwrap_or_else(|| "graveyard".to_string());
    println!("date:       {}", location);
    println!("category:   {}", task.category);
    println!("created_at: {}", format_timestamp(task.created_at));
    println!("punt_days:  {}", task.punt_days);
    if let Some(order) = &task.order {
        println!("{}", palette.dim(&format!("order:      {}", order.as_str())));
    }
}

pub fn print_counts(counts: &[DayCounts]) {
    let palette = Palette::auto();
    if counts.is_empty() {
        println!("{}", palette.dim("no scheduled tasks"));
        return;
    }
    for day in counts {
        println!(
            "{} {} {} {} {}",
            palette.heading(&day.date),
            palette.paint(state_color_code(TaskState::Active), &format!("active={}", day.active)),
            palette.paint(
                state_color_code(TaskState::Completed),
                &format!("completed={}", day.completed)
            ),
            palette.paint(state_color_code(TaskState::Failed), &format!("failed={}", day.failed)),
            palette.dim(&format!("total={}", day.total))
        );
    }
}

/// Tail of the id; the head of a v7 id is a timestamp shared by tasks
/// created together.
pub fn display_id(id: &str) -> &str {
    let start = id.len().saturating_sub(SHORT_ID_LEN);
    id.get(start..).unwrap_or(id)
}

fn container_heading(key: ContainerKey) -> String {
    match key {
        ContainerKey::Day {
            date,
            category,
            state,
        } => format!("{} {} {}", format_date(date), category, state),
        ContainerKey::Graveyard => "Graveyard".to_string(),
    }
}

fn format_task_row(task: &Task, palette: &Palette) -> String {
    let mut line = format!(
        "{} {} {}",
        palette.id(display_id(task.id.as_str())),
        palette.state(task.state),
        task.text
    );
    if task.punt_days > 0 {
        line.push(' ');
        line.push_str(&palette.punted(&format!("(+{}d)", task.punt_days)));
    }
    line
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn state(&self, state: TaskState) -> String {
        let upper = state.as_str().to_ascii_uppercase();
        self.paint(state_color_code(state), &format!("[{upper}]"))
    }

    fn punted(&self, text: &str) -> String {
        self.paint("33", text)
    }
}

fn state_color_code(state: TaskState) -> &'static str {
    match state {
        TaskState::Active => "37",
        TaskState::Completed => "32",
        TaskState::Failed => "31",
    }
}

#[cfg(test)]
mod tests {
    use super::{container_heading, display_id, format_task_row, Palette};
    use crate::container::ContainerKey;
    use crate::domain::{Category, Task, TaskState};
    use time::macros::{date, datetime};

    #[test]
    fn display_id_keeps_the_tail() {
        assert_eq!(display_id("0190a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b"), "2e3f4a5b");
        assert_eq!(display_id("short"), "short");
    }

    #[test]
    fn rows_show_punt_marker_only_when_punted() {
        let plain = Palette { enabled: false };
        let mut task = Task::new(
            "call bank",
            date!(2025 - 01 - 03),
            Category::Life,
            datetime!(2025-01-03 9:00 UTC),
        );
        let row = format_task_row(&task, &plain);
        assert!(row.ends_with("[ACTIVE] call bank"));

        task.punt_days = 2;
        task.state = TaskState::Failed;
        let row = format_task_row(&task, &plain);
        assert!(row.contains("[FAILED] call bank (+2d)"));
    }

    #[test]
    fn headings_name_day_category_and_state() {
        let key = ContainerKey::day(date!(2025 - 01 - 03), Category::Work, TaskState::Completed);
        assert_eq!(container_heading(key), "2025-01-03 work completed");
        assert_eq!(container_heading(ContainerKey::Graveyard), "Graveyard");
    }
}
