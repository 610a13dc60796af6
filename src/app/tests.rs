use super::{parse_day, parse_destination, App, AppError, ListFilter};
use crate::clock::FixedClock;
use crate::container::ContainerKey;
use crate::db;
use crate::domain::{Category, TaskState};
use crate::engine::EngineOptions;
use std::path::PathBuf;
use std::sync::Arc;
use time::macros::{date, offset};
use time::Date;
use uuid::Uuid;

const TODAY: Date = date!(2025 - 01 - 03);

struct Workspace {
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let root = std::env::temp_dir().join(format!("dayboard-app-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&root).expect("temp workspace should be creatable");
        Self { root }
    }

    fn db_path(&self) -> PathBuf {
        self.root.join(".dayboard/state.sqlite")
    }

    fn open(&self) -> App {
        App::open(
            &self.db_path(),
            Arc::new(FixedClock::new(TODAY, offset!(UTC))),
            EngineOptions::default(),
        )
        .expect("app should open")
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

#[tokio::test]
async fn added_tasks_survive_a_reopen() {
    let workspace = Workspace::new();
    let created = {
        let app = workspace.open();
        app.load_all().await.expect("load should succeed");
        app.add("  write report ", TODAY, Category::Work)
            .await
            .expect("add should succeed")
    };
    assert_eq!(created.text, "write report");
    assert!(created.order.is_some());

    let app = workspace.open();
    assert_eq!(app.load_all().await.expect("reload"), 1);
    let shown = app.show(created.id.as_str()).expect("show should find the task");
    assert_eq!(shown.id, created.id);
    assert_eq!(shown.category, Category::Work);
    assert_eq!(shown.state, TaskState::Active);
}

#[tokio::test]
async fn ids_resolve_by_unique_prefix_or_suffix() {
    let workspace = Workspace::new();
    let app = workspace.open();
    app.load_all().await.expect("load should succeed");
    let task = app
        .add("water plants", TODAY, Category::Life)
        .await
        .expect("add should succeed");

    let id = task.id.as_str();
    let suffix = &id[id.len() - 8..];
    assert_eq!(app.show(suffix).expect("suffix should resolve").id, task.id);
    assert!(matches!(app.show("abc"), Err(AppError::NotFound(_))));
    assert!(matches!(app.show("ffffffff"), Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn toggle_writes_immediately_and_cycles_state() {
    let workspace = Workspace::new();
    let app = workspace.open();
    app.load_all().await.expect("load should succeed");
    let task = app
        .add("stretch", TODAY, Category::Life)
        .await
        .expect("add should succeed");

    let toggled = app.toggle(task.id.as_str()).await.expect("toggle should succeed");
    assert_eq!(toggled.state, TaskState::Completed);

    let reopened = workspace.open();
    reopened.load_all().await.expect("reload");
    assert_eq!(
        reopened.show(task.id.as_str()).expect("task exists").state,
        TaskState::Completed
    );
}

#[tokio::test]
async fn punt_day_moves_only_active_tasks() {
    let workspace = Workspace::new();
    let app = workspace.open();
    app.load_all().await.expect("load should succeed");
    let yesterday = date!(2025 - 01 - 02);
    let open = app.add("open", yesterday, Category::Work).await.expect("add");
    let done = app.add("done", yesterday, Category::Work).await.expect("add");
    app.set_state(done.id.as_str(), TaskState::Completed)
        .await
        .expect("set_state should succeed");

    let moved = app.punt_day(yesterday, None).await.expect("punt_day should succeed");
    assert_eq!(moved, 1);

    let open = app.show(open.id.as_str()).expect("open task");
    assert_eq!(open.date, Some(TODAY));
    assert_eq!(open.punt_days, 1);
    assert_eq!(app.show(done.id.as_str()).expect("done task").date, Some(yesterday));
}

#[tokio::test]
async fn bury_and_resurrect_through_the_graveyard_listing() {
    let workspace = Workspace::new();
    let app = workspace.open();
    app.load_all().await.expect("load should succeed");
    let task = app.add("someday", TODAY, Category::Life).await.expect("add");

    app.bury(&[task.id.to_string()]).await.expect("bury should succeed");
    let graveyard = app.list(&ListFilter {
        graveyard: true,
        ..ListFilter::default()
    });
    assert_eq!(graveyard.len(), 1);
    assert_eq!(graveyard[0].container, ContainerKey::Graveyard);

    let back = app
        .resurrect(task.id.as_str(), date!(2025 - 01 - 05))
        .await
        .expect("resurrect should succeed");
    assert_eq!(back.date, Some(date!(2025 - 01 - 05)));
    assert!(app
        .list(&ListFilter {
            graveyard: true,
            ..ListFilter::default()
        })
        .is_empty());
}

#[tokio::test]
async fn category_filter_applies_to_the_graveyard() {
    let workspace = Workspace::new();
    let app = workspace.open();
    app.load_all().await.expect("load should succeed");
    let chore = app.add("life chore", TODAY, Category::Life).await.expect("add");
    app.bury(&[chore.id.to_string()]).await.expect("bury life task");

    let work_graveyard = ListFilter {
        category: Some(Category::Work),
        graveyard: true,
        ..ListFilter::default()
    };
    assert!(app.list(&work_graveyard).is_empty());

    let item = app.add("work item", TODAY, Category::Work).await.expect("add");
    app.bury(&[item.id.to_string()]).await.expect("bury work task");
    let views = app.list(&work_graveyard);
    assert_eq!(views.len(), 1);
    let texts: Vec<&str> = views[0].tasks.iter().map(|task| task.text.as_str()).collect();
    assert_eq!(texts, vec!["work item"]);

    let work_only = app.list(&ListFilter {
        category: Some(Category::Work),
        ..ListFilter::default()
    });
    assert_eq!(work_only.len(), 1);
    assert_eq!(work_only[0].container, ContainerKey::Graveyard);
    assert_eq!(work_only[0].tasks.len(), 1);
}

#[tokio::test]
async fn move_places_task_at_index_in_another_container() {
    let workspace = Workspace::new();
    let app = workspace.open();
    app.load_all().await.expect("load should succeed");
    let first = app.add("first", TODAY, Category::Work).await.expect("add");
    let second = app.add("second", TODAY, Category::Work).await.expect("add");
    let mover = app.add("mover", TODAY, Category::Life).await.expect("add");

    let destination = ContainerKey::day(TODAY, Category::Work, TaskState::Active);
    app.move_tasks(&[mover.id.to_string()], destination, 1)
        .await
        .expect("move should succeed");

    let listed = app.list(&ListFilter {
        category: Some(Category::Work),
        days: Some((TODAY, TODAY)),
        graveyard: false,
    });
    assert_eq!(listed.len(), 1);
    let order = listed[0]
        .tasks
        .iter()
        .map(|task| task.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(order, vec![first.id, mover.id, second.id]);
}

#[tokio::test]
async fn write_against_a_vanished_row_rolls_back() {
    let workspace = Workspace::new();
    let app = workspace.open();
    app.load_all().await.expect("load should succeed");
    let task = app.add("ghost", TODAY, Category::Life).await.expect("add");

    let conn = db::open_connection(&workspace.db_path().display().to_string())
        .expect("side connection should open");
    db::delete_task(&conn, task.id.as_str()).expect("side delete should succeed");

    let result = app.set_state(task.id.as_str(), TaskState::Failed).await;
    assert!(matches!(result, Err(AppError::RolledBack(_))));
    assert_eq!(
        app.show(task.id.as_str()).expect("local task restored").state,
        TaskState::Active
    );
}

#[tokio::test]
async fn counts_report_each_day() {
    let workspace = Workspace::new();
    let app = workspace.open();
    app.load_all().await.expect("load should succeed");
    let a = app.add("a", TODAY, Category::Work).await.expect("add");
    app.add("b", TODAY, Category::Life).await.expect("add");
    app.set_state(a.id.as_str(), TaskState::Failed)
        .await
        .expect("set_state");

    let all = app.counts(None);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].date, "2025-01-03");
    assert_eq!((all[0].active, all[0].failed, all[0].total), (1, 1, 2));

    let work = app.counts(Some(Category::Work));
    assert_eq!(work[0].total, 1);
}

#[test]
fn parse_day_understands_relative_names() {
    assert_eq!(parse_day("today", TODAY).expect("today"), TODAY);
    assert_eq!(
        parse_day("Tomorrow", TODAY).expect("tomorrow"),
        date!(2025 - 01 - 04)
    );
    assert_eq!(
        parse_day("yesterday", TODAY).expect("yesterday"),
        date!(2025 - 01 - 02)
    );
    assert_eq!(
        parse_day("2025-02-10", TODAY).expect("iso date"),
        date!(2025 - 02 - 10)
    );
    assert!(matches!(
        parse_day("next week", TODAY),
        Err(AppError::ParseDate(_))
    ));
}

#[test]
fn destinations_accept_relative_days() {
    assert_eq!(
        parse_destination("tomorrow/work", TODAY).expect("relative destination"),
        ContainerKey::day(date!(2025 - 01 - 04), Category::Work, TaskState::Active)
    );
    assert_eq!(
        parse_destination("graveyard", TODAY).expect("graveyard"),
        ContainerKey::Graveyard
    );
    assert!(matches!(
        parse_destination("today/work/sleeping", TODAY),
        Err(AppError::ParseContainer(_))
    ));
}
