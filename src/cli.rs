use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, CommandFactory, Parser, Subcommand};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

#[derive(Debug, Parser)]
#[command(name = "dayboard")]
#[command(bin_name = "dayboard")]
#[command(version)]
#[command(about = "Day-by-day task board with ordering, punting, and a graveyard")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        global = true,
        env = "DAYBOARD_DB_PATH",
        default_value = ".dayboard/state.sqlite",
        help = "Path to the SQLite task database."
    )]
    pub db: PathBuf,

    #[arg(
        short = 'c',
        long,
        global = true,
        env = "DAYBOARD_CONFIG",
        default_value = ".dayboard/config.toml",
        help = "Path to the TOML config file."
    )]
    pub config: PathBuf,

    #[arg(
        long,
        global = true,
        env = "DAYBOARD_TODAY",
        help = "Pretend today is this date (YYYY-MM-DD)."
    )]
    pub today: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Add a task to a day.")]
    Add(AddArgs),
    #[command(about = "List tasks grouped by container.")]
    Ls(ListArgs),
    #[command(about = "Show one task.")]
    Show(ShowArgs),
    #[command(about = "Per-day active/completed/failed counts.")]
    Counts(CountsArgs),
    #[command(about = "Replace a task's text.")]
    Edit(EditArgs),
    #[command(about = "Delete a task.")]
    Rm(IdArgs),
    #[command(about = "Cycle a task through active, completed, failed.")]
    Toggle(IdArgs),
    #[command(about = "Set a task's state.")]
    State(StateArgs),
    #[command(about = "Punt a task to today, or to the next day if it is already current.")]
    Punt(IdArgs),
    #[command(name = "punt-day", about = "Punt every active task on a day.")]
    PuntDay(DayArgs),
    #[command(name = "fail-day", about = "Mark every active task on a day as failed.")]
    FailDay(DayArgs),
    #[command(about = "Move tasks to the graveyard.")]
    Bury(BuryArgs),
    #[command(name = "bury-day", about = "Move every active task on a day to the graveyard.")]
    BuryDay(DayArgs),
    #[command(about = "Bring a task back from the graveyard.")]
    Resurrect(ResurrectArgs),
    #[command(about = "Move tasks to a position within a container.")]
    Mv(MoveArgs),
    #[command(about = "Generate or install shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(help = "Task text.")]
    pub text: String,

    #[arg(
        short = 'D',
        long,
        default_value = "today",
        help = "Day to schedule on (YYYY-MM-DD, today, tomorrow, yesterday)."
    )]
    pub date: String,

    #[arg(short = 'k', long, default_value = "life", help = "Category (life or work).")]
    pub category: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(short = 'k', long, help = "Only show this category.")]
    pub category: Option<String>,

    #[arg(
        short = 'D',
        long,
        conflicts_with_all = ["from", "to", "graveyard"],
        help = "Only show one day."
    )]
    pub date: Option<String>,

    #[arg(long, requires = "to", conflicts_with = "graveyard", help = "First day of a range.")]
    pub from: Option<String>,

    #[arg(long, requires = "from", help = "Last day of a range.")]
    pub to: Option<String>,

    #[arg(short = 'g', long, help = "Only show the graveyard.")]
    pub graveyard: bool,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Task id, or a unique prefix or suffix of one.")]
    pub id: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CountsArgs {
    #[arg(short = 'k', long, help = "Only count this category.")]
    pub category: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    #[arg(help = "Task id, or a unique prefix or suffix of one.")]
    pub id: String,

    #[arg(help = "New task text.")]
    pub text: String,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    #[arg(help = "Task id, or a unique prefix or suffix of one.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct StateArgs {
    #[arg(help = "Task id, or a unique prefix or suffix of one.")]
    pub id: String,

    #[arg(help = "Target state (active, completed, failed).")]
    pub state: String,
}

#[derive(Debug, Args)]
pub struct DayArgs {
    #[arg(
        default_value = "today",
        help = "Day to act on (YYYY-MM-DD, today, tomorrow, yesterday)."
    )]
    pub date: String,

    #[arg(short = 'k', long, help = "Only touch this category.")]
    pub category: Option<String>,
}

#[derive(Debug, Args)]
pub struct BuryArgs {
    #[arg(required = true, help = "Task ids to bury.")]
    pub ids: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ResurrectArgs {
    #[arg(help = "Task id, or a unique prefix or suffix of one.")]
    pub id: String,

    #[arg(short = 'D', long, default_value = "today", help = "Day to bring the task back to.")]
    pub date: String,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    #[arg(
        help = "Destination: graveyard, DATE/CATEGORY, or DATE/CATEGORY/STATE (DATE may be today)."
    )]
    pub to: String,

    #[arg(required = true, help = "Task ids to move, kept in this order.")]
    pub ids: Vec<String>,

    #[arg(
        short = 'i',
        long,
        help = "Position among the other tasks in the destination (defaults to the end)."
    )]
    pub index: Option<usize>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish). Auto-detected if omitted.")]
    pub shell: Option<String>,

    #[arg(
        short = 'i',
        long = "install",
        help = "Write completions to the canonical path for the shell."
    )]
    pub install: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
