use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use ifrrpc_channel::ChannelConfig;

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod call;
pub mod frame;
pub mod page;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the frame side: accept one page and answer its calls.
    Frame(FrameArgs),
    /// Run the page side against a frame.
    Page(PageArgs),
    /// Send a single call to a frame.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Frame(args) => frame::run(args, format),
        Command::Page(args) => page::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Channel tuning shared by the long-running commands.
#[derive(Args, Debug)]
pub struct ChannelArgs {
    /// How long an outbound call waits for its reply (e.g. 30s, 500ms).
    #[arg(long, env = "IFRRPC_CALL_TIMEOUT", default_value = "30s")]
    pub call_timeout: String,
    /// Maximum number of calls awaiting a reply.
    #[arg(long, env = "IFRRPC_MAX_PENDING", default_value_t = 256)]
    pub max_pending: usize,
}

impl ChannelArgs {
    pub fn to_config(&self) -> CliResult<ChannelConfig> {
        if self.max_pending == 0 {
            return Err(CliError::usage("--max-pending must be greater than zero"));
        }
        Ok(ChannelConfig {
            call_timeout: parse_duration(&self.call_timeout)?,
            max_pending: self.max_pending,
            ..ChannelConfig::default()
        })
    }
}

#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Suggestions sent back for each `history` call (repeatable).
    /// Default: one suggestion derived from the page id.
    #[arg(long = "suggest", value_name = "ITEM")]
    pub suggestions: Vec<String>,
    #[command(flatten)]
    pub channel: ChannelArgs,
}

#[derive(Args, Debug)]
pub struct PageArgs {
    /// Socket path of the frame to connect to.
    pub path: PathBuf,
    /// Page description as JSON (identity + prefs).
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with_all = ["media_id", "canonical", "hostname", "cookie", "session"]
    )]
    pub page_env: Option<PathBuf>,
    /// Audience media id of the page.
    #[arg(long)]
    pub media_id: Option<String>,
    /// Canonical link href of the page.
    #[arg(long)]
    pub canonical: Option<String>,
    /// Hostname of the page.
    #[arg(long)]
    pub hostname: Option<String>,
    /// Cookie string (`name=value; name=value`).
    #[arg(long)]
    pub cookie: Option<String>,
    /// Session storage entry as KEY=VALUE (repeatable).
    #[arg(long, value_name = "KEY=VALUE")]
    pub session: Vec<String>,
    /// Leave after this long even if the frame has not quit (e.g. 5s).
    #[arg(long, value_name = "DURATION")]
    pub linger: Option<String>,
    #[command(flatten)]
    pub channel: ChannelArgs,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path of the frame to connect to.
    pub path: PathBuf,
    /// Method to call.
    pub method: String,
    /// Positional params as JSON. A non-array value is sent as the only param.
    #[arg(long, value_name = "JSON")]
    pub params: Option<String>,
    /// Wait for the reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Reply timeout when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Flag cleared on Ctrl-C.
pub fn interrupt_flag() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let handle = Arc::clone(&running);
    ctrlc::set_handler(move || handle.store(false, Ordering::SeqCst))
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}
