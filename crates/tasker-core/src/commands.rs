use tracing::{debug, info, instrument, warn};

use crate::cli::Command;
use crate::config::Config;
use crate::derive::{category_stats, display_order};
use crate::render::Renderer;
use crate::store::TaskStore;
use crate::task::Category;

#[instrument(skip(store, cfg, renderer))]
pub fn dispatch(
    store: &mut TaskStore,
    cfg: &Config,
    renderer: &Renderer,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let command = match command {
        Some(command) => command,
        None => {
            let name = cfg.default_command();
            debug!(command = %name, "no explicit command, using default");
            Command::from_default_name(&name)?
        }
    };

    match command {
        Command::Add { category, title } => cmd_add(store, category, &title.join(" ")),
        Command::Edit {
            id,
            title,
            category,
        } => cmd_edit(store, &id, title, category),
        Command::Toggle { id } => cmd_toggle(store, &id),
        Command::Delete { id } => cmd_delete(store, &id),
        Command::List { category } => cmd_list(store, renderer, category),
        Command::Stats => renderer.print_category_stats(&category_stats(store.tasks())),
        Command::Categories => renderer.print_categories(),
    }
}

#[instrument(skip(store))]
fn cmd_add(store: &mut TaskStore, category: Category, title: &str) -> anyhow::Result<()> {
    info!("command add");

    match store.create(title, category)? {
        Some(id) => println!("Created task {id}."),
        None => println!("Task title cannot be empty; nothing added."),
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_edit(
    store: &mut TaskStore,
    id: &str,
    title: Option<String>,
    category: Option<Category>,
) -> anyhow::Result<()> {
    info!("command edit");

    let Some(current) = store.resolve(id).cloned() else {
        return report_no_match(id);
    };

    let title = title.unwrap_or_else(|| current.title.clone());
    let category = category.unwrap_or(current.category);
    if title.trim().is_empty() {
        println!("Task title cannot be empty; task {} unchanged.", current.id);
        return Ok(());
    }

    if store.update(&current.id, &title, category)? {
        println!("Modified task {}.", current.id);
    } else {
        println!("Task {} already matches; nothing changed.", current.id);
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_toggle(store: &mut TaskStore, id: &str) -> anyhow::Result<()> {
    info!("command toggle");

    let Some(target) = store.resolve(id).map(|t| t.id.clone()) else {
        return report_no_match(id);
    };

    store.toggle(&target)?;
    let state = match store.find(&target) {
        Some(task) if task.completed => "done",
        _ => "open",
    };
    println!("Task {target} is now {state}.");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_delete(store: &mut TaskStore, id: &str) -> anyhow::Result<()> {
    info!("command delete");

    let Some(target) = store.resolve(id).map(|t| t.id.clone()) else {
        return report_no_match(id);
    };

    store.remove(&target)?;
    println!("Deleted task {target}.");
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_list(
    store: &TaskStore,
    renderer: &Renderer,
    category: Option<Category>,
) -> anyhow::Result<()> {
    let ordered = display_order(store.tasks());
    let shown: Vec<_> = match category {
        Some(category) => ordered
            .into_iter()
            .filter(|t| t.category == category)
            .collect(),
        None => ordered,
    };

    debug!(count = shown.len(), "listing tasks");
    renderer.print_task_table(&shown)
}

fn report_no_match(id: &str) -> anyhow::Result<()> {
    warn!(id, "no unique task matches id");
    println!("No task matches '{id}'.");
    Ok(())
}
