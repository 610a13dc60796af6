use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use dayboard::app::{parse_day, parse_destination, App, AppError, ListFilter};
use dayboard::clock::{Clock, FixedClock, SystemClock};
use dayboard::config::Config;
use dayboard::domain::dates::parse_date;
use dayboard::domain::{Category, TaskState};
use dayboard::engine::EngineOptions;
use dayboard::{cli, completions, logging, ui};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization should work")
    );
}

fn run() -> Result<(), AppError> {
    use clap::Parser;
    use cli::Commands;

    let cli = cli::Cli::parse();
    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref(), args.install);
    }

    let config = Config::load(&cli.config)?;
    start_logging(&config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(dispatch(cli, config));
    if let Err(err) = &result {
        log::error!("event=command_failed error={}", err);
    }
    result
}

fn start_logging(config: &Config) {
    let dir = absolute(&config.logging.dir);
    if let Err(err) = logging::init_logging(&config.logging.level, &dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn build_clock(today: Option<&str>, config: &Config) -> Result<Arc<dyn Clock>, AppError> {
    Ok(match today {
        Some(raw) => {
            let date = parse_date(raw)?;
            Arc::new(FixedClock::new(date, config.utc_offset))
        }
        None => Arc::new(SystemClock::new(config.utc_offset)),
    })
}

fn parse_optional_category(raw: Option<&str>) -> Result<Option<Category>, AppError> {
    raw.map(Category::from_str).transpose().map_err(AppError::from)
}

async fn dispatch(cli: cli::Cli, config: Config) -> Result<(), AppError> {
    use cli::Commands;

    let clock = build_clock(cli.today.as_deref(), &config)?;
    let options = EngineOptions {
        debounce: config.debounce,
    };
    let app = App::open(&cli.db, clock, options)?;
    let today = app.today();

    if let Commands::Ls(args) = &cli.command {
        let days = match (&args.date, &args.from, &args.to) {
            (Some(day), _, _) => {
                let day = parse_day(day, today)?;
                Some((day, day))
            }
            (None, Some(from), Some(to)) => {
                Some((parse_day(from, today)?, parse_day(to, today)?))
            }
            _ => None,
        };
        if let Some((start, end)) = days {
            if start > end {
                return Err(AppError::InvalidArgument(
                    "--from must not be after --to".to_string(),
                ));
            }
        }
        let filter = ListFilter {
            category: parse_optional_category(args.category.as_deref())?,
            days,
            graveyard: args.graveyard,
        };
        app.load_for(&filter).await?;
        let views = app.list(&filter);
        if args.json {
            print_json(&views);
        } else {
            ui::print_containers(&views);
        }
        return Ok(());
    }

    app.load_all().await?;
    match cli.command {
        Commands::Add(args) => {
            let date = parse_day(&args.date, today)?;
            let category = Category::from_str(&args.category)?;
            let task = app.add(&args.text, date, category).await?;
            if args.json {
                print_json(&task);
            } else {
                ui::print_task_line("created", &task);
            }
        }
        Commands::Show(args) => {
            let task = app.show(&args.id)?;
            if args.json {
                print_json(&task);
            } else {
                ui::print_task_show(&task);
            }
        }
        Commands::Counts(args) => {
            let counts = app.counts(parse_optional_category(args.category.as_deref())?);
            if args.json {
                print_json(&counts);
            } else {
                ui::print_counts(&counts);
            }
        }
        Commands::Edit(args) => {
            let task = app.edit(&args.id, &args.text).await?;
            ui::print_task_line("edited", &task);
        }
        Commands::Rm(args) => {
            let task = app.remove(&args.id).await?;
            ui::print_task_line("removed", &task);
        }
        Commands::Toggle(args) => {
            let task = app.toggle(&args.id).await?;
            ui::print_task_line("toggled", &task);
        }
        Commands::State(args) => {
            let state = TaskState::from_str(&args.state)?;
            let task = app.set_state(&args.id, state).await?;
            ui::print_task_line("updated", &task);
        }
        Commands::Punt(args) => {
            let task = app.punt(&args.id).await?;
            ui::print_task_line("punted", &task);
        }
        Commands::PuntDay(args) => {
            let date = parse_day(&args.date, today)?;
            let category = parse_optional_category(args.category.as_deref())?;
            let moved = app.punt_day(date, category).await?;
            println!("punted {} task(s)", moved);
        }
        Commands::FailDay(args) => {
            let date = parse_day(&args.date, today)?;
            let category = parse_optional_category(args.category.as_deref())?;
            let failed = app.fail_day(date, category).await?;
            println!("failed {} task(s)", failed);
        }
        Commands::Bury(args) => {
            for task in app.bury(&args.ids).await? {
                ui::print_task_line("buried", &task);
            }
        }
        Commands::BuryDay(args) => {
            let date = parse_day(&args.date, today)?;
            let category = parse_optional_category(args.category.as_deref())?;
            let buried = app.bury_day(date, category).await?;
            println!("buried {} task(s)", buried);
        }
        Commands::Resurrect(args) => {
            let date = parse_day(&args.date, today)?;
            let task = app.resurrect(&args.id, date).await?;
            ui::print_task_line("resurrected", &task);
        }
        Commands::Mv(args) => {
            let destination = parse_destination(&args.to, today)?;
            let index = args.index.unwrap_or(usize::MAX);
            for task in app.move_tasks(&args.ids, destination, index).await? {
                ui::print_task_line("moved", &task);
            }
        }
        Commands::Ls(_) | Commands::Completions(_) => {
            unreachable!("handled before the full load")
        }
    }

    Ok(())
}
