use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod agent;
mod cmd;
mod config;
mod error;
mod utils;

use agent::HttpClient;
use cmd::{AppContext, ExecCmdArgs, MiscCommand, ProjectsCommand, SdksCommand};
use config::{
    DEFAULT_AGENT_URL, DEFAULT_EXEC_TIMEOUT, DEFAULT_SERVER_INDEX, EnvFile, KEY_AGENT_URL,
    KEY_EXEC_TIMEOUT, KEY_SERVER_INDEX, resolve_number, resolve_string,
};
use error::ExitError;

/// XDS CLI - drive a remote XDS agent from the command line.
///
/// Command layout:
///   xds-cli exec --id <PROJECT> [--rpath PATH] [--sdkid SDK] -- <cmd> [args...]
///   xds-cli sdks list [-v] | get <ID> | add | remove <ID>
///   xds-cli projects list [-v]
///   xds-cli misc version
///
/// Global flags / env:
///   -v / -vv          Increase verbosity (before the subcommand)
///   -q / --quiet      Errors only
///   --url URL         Agent location (XDS_AGENT_URL, default localhost:8800)
///   --config FILE     Env file of KEY=VALUE lines (XDS_CONFIG)
///   --timestamp       Prefix remote output with its timestamp
///   RUST_LOG          Overrides the -v/-q log level
///
/// Exit codes:
///   0   success
///   1   missing input or failed request
///   2   event channel lost during exec
///   N   remote command exit code
///
/// Examples:
///   xds-cli exec --id 4021617e-ced0-11e7-acd2-3c970e49ad9b -- make all
///   XDS_PROJECT_ID=4021617e xds-cli exec --sdkid poky-agl_aarch64 -- make
///   xds-cli --url 192.168.1.10:8800 sdks list
#[derive(Parser, Debug)]
#[command(
    name = "xds-cli",
    version,
    author,
    about = "XDS CLI - run commands and inspect SDKs on a remote XDS agent",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// XDS agent URL
    #[arg(long, global = true, env = "XDS_AGENT_URL", value_name = "URL")]
    url: Option<String>,

    /// Env file providing defaults and the remote command environment
    #[arg(short = 'c', long, global = true, env = "XDS_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Prefix command output with its timestamp
    #[arg(long, global = true)]
    timestamp: bool,

    /// Index of the XDS server used for SDK requests
    #[arg(long, global = true, env = "XDS_SERVER_INDEX", value_name = "INDEX")]
    server_index: Option<usize>,

    /// Timeout (seconds) the server applies to executed commands
    #[arg(long, global = true, env = "XDS_EXEC_TIMEOUT", value_name = "SECONDS")]
    exec_timeout: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a command in a project on the XDS server
    Exec(ExecCmdArgs),

    /// SDKs management
    #[command(visible_alias = "sdk", subcommand)]
    Sdks(SdksCommand),

    /// Projects management
    #[command(visible_alias = "prj", subcommand)]
    Projects(ProjectsCommand),

    /// Miscellaneous commands
    #[command(subcommand)]
    Misc(MiscCommand),
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    if let Err(err) = run(cli) {
        let (code, message) = error::exit_status(&err);
        tracing::debug!(code, "command failed");
        if !message.is_empty() {
            eprintln!("{message}");
        }
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = build_context(&cli)?;
    match cli.command {
        Commands::Exec(args) => cmd::execute_exec(&ctx, args),
        Commands::Sdks(command) => cmd::execute_sdks(&ctx, command),
        Commands::Projects(command) => cmd::execute_projects(&ctx, command),
        Commands::Misc(command) => cmd::execute_misc(&ctx, command),
    }
}

/// Settings precedence: flag, process environment, env file, default.
fn build_context(cli: &Cli) -> Result<AppContext> {
    let env = match &cli.config {
        Some(path) => EnvFile::load(path).map_err(ExitError::fatal)?,
        None => EnvFile::default(),
    };

    let raw_url = resolve_string(cli.url.as_deref(), &env, KEY_AGENT_URL)
        .unwrap_or_else(|| DEFAULT_AGENT_URL.to_string());
    let agent = agent::parse_agent_url(&raw_url).map_err(ExitError::fatal)?;
    tracing::info!("Agent URL: {agent} (from '{}')", agent.original());

    let server_index = resolve_number(
        cli.server_index,
        &env,
        KEY_SERVER_INDEX,
        DEFAULT_SERVER_INDEX,
    )
    .map_err(ExitError::fatal)?;
    let exec_timeout = resolve_number(
        cli.exec_timeout,
        &env,
        KEY_EXEC_TIMEOUT,
        DEFAULT_EXEC_TIMEOUT,
    )
    .map_err(ExitError::fatal)?;

    let sid = agent::events::new_sid();
    let events_url = agent.events_url(&sid).map_err(ExitError::fatal)?;
    let api = HttpClient::new(agent.api_base()?)?.with_sid(sid.clone());
    tracing::debug!(sid = %sid, base = %api.base(), "agent client ready");

    Ok(AppContext::new(Arc::new(api))
        .with_env(env)
        .with_timestamp(cli.timestamp)
        .with_events(events_url, sid)
        .with_server_index(server_index)
        .with_exec_timeout(exec_timeout))
}
