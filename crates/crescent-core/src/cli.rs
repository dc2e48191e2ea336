use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::click::Region;
use crate::refresh::WidgetId;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "crescent",
    version,
    about = "Home-screen widget data: tasks, tally, phrases and prayer card",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "store")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the task widget
    Tasks {
        #[arg(long)]
        widget: Option<WidgetId>,
    },
    /// Flip the completion flag of a task
    Toggle { task_id: String },
    /// Deliver a click payload from a task row
    Click {
        payload: String,
        #[arg(long, default_value = "row")]
        region: Region,
    },
    /// Set the category filter of a task widget instance
    Filter { widget: WidgetId, tag: String },
    /// Replace the task list from a JSON file, as the host app does
    Publish { file: PathBuf },
    /// Show or change the tally counter
    Tally {
        #[arg(value_enum)]
        action: Option<TallyAction>,
    },
    /// Show, advance or copy the rotating phrase
    Phrase {
        #[arg(long, default_value = "0")]
        widget: WidgetId,
        #[arg(value_enum)]
        action: Option<PhraseAction>,
    },
    /// Show the next-prayer card
    Prayer,
    /// Show the summary card
    Summary,
    /// Write a raw value into the store
    Set {
        key: String,
        value: String,
        #[arg(long, value_enum, default_value = "str")]
        kind: ValueKind,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyAction {
    Inc,
    Reset,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseAction {
    Next,
    Copy,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Str,
    Int,
    Bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
