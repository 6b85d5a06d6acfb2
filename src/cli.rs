use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "Daily schedule to-do list with AI-assisted generation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a task to today's schedule
    Add {
        #[arg(value_name = "DESCRIPTION")]
        description: String,
        /// Display time, e.g. "09:00"; omitted means unscheduled
        #[arg(short, long, value_name = "TIME")]
        time: Option<String>,
    },
    /// List tasks in display order
    List,
    /// Toggle completion for a task (accepts a unique id prefix)
    Done {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Delete a task (accepts a unique id prefix)
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Delete all tasks (asks for confirmation)
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Turn free-form schedule text into a proposed task list
    Generate {
        #[arg(value_name = "TEXT")]
        text: String,
        /// Accept the proposal without the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Run the schedule proposal service
    Serve {
        /// Bind address, e.g. "0.0.0.0:8787"
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Launch the TUI interface
    Tui,
    /// Generate shell completion scripts
    Completions {
        #[arg(value_name = "SHELL")]
        shell: String,
    },
}
