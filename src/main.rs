mod cli;
mod llm;
mod models;
mod server;
mod state;
mod store;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use state::AppState;
use store::Store;
use ui::run_tui;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The serve path installs its own tracing subscriber, which also claims
    // the `log` facade; only one global logger may exist.
    if !matches!(cli.command, Some(Commands::Serve { .. })) {
        env_logger::init();
    }

    match cli.command {
        Some(Commands::Add { description, time }) => {
            let store = Store::open_default()?;
            let mut state = AppState::new(store.load_tasks()?);
            if state.add_task(time.as_deref().unwrap_or(""), &description) {
                store.save_tasks(&state.tasks)?;
                println!("Added.");
            } else {
                println!("Nothing to add: the task description is empty.");
            }
        }
        Some(Commands::List) => {
            let store = Store::open_default()?;
            let state = AppState::new(store.load_tasks()?);
            if state.tasks.is_empty() {
                println!("No tasks yet.");
            } else {
                for task in state.sorted_tasks() {
                    print_task_line(task);
                }
            }
        }
        Some(Commands::Done { id }) => {
            let store = Store::open_default()?;
            let mut state = AppState::new(store.load_tasks()?);
            match resolve_id(&state, &id) {
                Some(full_id) => {
                    state.toggle_complete(&full_id);
                    store.save_tasks(&state.tasks)?;
                    println!("Toggled.");
                }
                None => println!("No task matches '{}'.", id),
            }
        }
        Some(Commands::Delete { id }) => {
            let store = Store::open_default()?;
            let mut state = AppState::new(store.load_tasks()?);
            match resolve_id(&state, &id) {
                Some(full_id) => {
                    state.delete_task(&full_id);
                    store.save_tasks(&state.tasks)?;
                    println!("Deleted.");
                }
                None => println!("No task matches '{}'.", id),
            }
        }
        Some(Commands::Clear { yes }) => {
            let store = Store::open_default()?;
            let mut state = AppState::new(store.load_tasks()?);
            if state.tasks.is_empty() {
                println!("No tasks to clear.");
            } else if yes
                || ask_user_confirmation(&format!("Delete all {} tasks?", state.tasks.len()))?
            {
                state.clear_all();
                store.save_tasks(&state.tasks)?;
                println!("All tasks cleared.");
            } else {
                println!("Left unchanged.");
            }
        }
        Some(Commands::Generate { text, yes }) => {
            if text.trim().is_empty() {
                println!("Please provide your schedule text.");
                return Ok(());
            }
            let store = Store::open_default()?;
            let mut state = AppState::new(store.load_tasks()?);

            let rt = tokio::runtime::Runtime::new()?;
            let client = llm::client::ProposalClient::from_env();
            match rt.block_on(client.generate(&text)) {
                Ok(proposal) => {
                    println!("Proposed schedule:");
                    for entry in &proposal {
                        println!("  {}  {}", entry.time, entry.task);
                    }
                    if yes
                        || ask_user_confirmation(&format!(
                            "Replace your current {} tasks with this proposal?",
                            state.tasks.len()
                        ))?
                    {
                        state.commit_proposal(proposal);
                        store.save_tasks(&state.tasks)?;
                        println!("Schedule replaced.");
                    } else {
                        println!("Proposal discarded.");
                    }
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        Some(Commands::Serve { bind }) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::run(bind))?;
        }
        Some(Commands::Completions { shell }) => {
            use clap_complete::{generate, Shell};
            let shell = shell.to_lowercase();
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "elvish" => Shell::Elvish,
                "powershell" => Shell::PowerShell,
                _ => {
                    println!("Unsupported shell: {}", shell);
                    return Ok(());
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "dayplan", &mut std::io::stdout());
        }
        Some(Commands::Tui) | None => {
            let store = Store::open_default()?;
            run_tui(store)?;
        }
    }

    Ok(())
}

fn print_task_line(task: &models::Task) {
    let mark = if task.is_completed { "x" } else { " " };
    let short_id = &task.id[..8.min(task.id.len())];
    match &task.completed_at {
        Some(at) => println!(
            "[{}] {}  {}  {}  (done {})",
            mark, short_id, task.time, task.task, at
        ),
        None => println!("[{}] {}  {}  {}", mark, short_id, task.time, task.task),
    }
}

/// Matches an exact id or a unique prefix; ambiguous or unknown input
/// resolves to nothing.
fn resolve_id(state: &AppState, needle: &str) -> Option<String> {
    if let Some(task) = state.tasks.iter().find(|t| t.id == needle) {
        return Some(task.id.clone());
    }
    let mut matches = state.tasks.iter().filter(|t| t.id.starts_with(needle));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.id.clone())
}

fn ask_user_confirmation(question: &str) -> Result<bool> {
    use std::io::Write;
    print!("{} (y/n): ", question);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
