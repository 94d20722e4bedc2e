/*!
`exec.rs`

Implements the `exec` subcommand: run a command inside a project on the
remote agent and mirror its output and exit code locally.

Flow:
  1. Resolve and validate inputs (project id is mandatory)
  2. Log the agent version (cached; failure ignored)
  3. Register output / exit / disconnection / project-change handlers,
     then subscribe to project changes (`POST /events/register`)
  4. Fetch the project (`GET /projects/{id}`) and derive the relative path
     from the current directory when `--rpath` is not given
  5. Submit the command (`POST /exec`)
  6. Wait for the first of {exit event, disconnection}

Exit codes:
  - remote command code on an exit event
  - 2 when the event channel drops first
  - 1 for any local or setup failure

No client-side timeout: the wait only ends on one of the two events.
*/

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Args;
use tokio::sync::oneshot;

use crate::agent::types::{
    EVT_PROJECT_CHANGE, EXEC_EXIT_EVENT, EXEC_OUT_EVENT, EventMsg, EventRegisterArgs, ExecArgs,
    ExecExitMsg, ExecOutMsg, ProjectConfig,
};
use crate::agent::{AgentApiExt, EventChannel, EventHub};
use crate::cmd::format::stamp;
use crate::cmd::shared::{AppContext, log_post, runtime};
use crate::config::{KEY_PROJECT_ID, KEY_RPATH, KEY_SDK_ID, resolve_string};
use crate::error::{ExitError, codes};

/* -------------------------------------------------------------------------- */
/* Argument Struct                                                            */
/* -------------------------------------------------------------------------- */

#[derive(Args, Debug, Default)]
pub struct ExecCmdArgs {
    /// Project ID to run the command in (mandatory)
    #[arg(long, env = "XDS_PROJECT_ID", value_name = "ID")]
    pub id: Option<String>,

    /// Relative path into the project (derived from the current directory if omitted)
    #[arg(short = 'p', long, env = "XDS_RPATH", value_name = "PATH")]
    pub rpath: Option<String>,

    /// Cross SDK ID to build with
    #[arg(long = "sdkid", visible_alias = "sdk", env = "XDS_SDK_ID", value_name = "ID")]
    pub sdkid: Option<String>,

    /// Command and its arguments (place after `--`)
    #[arg(
        value_name = "CMD",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 1..
    )]
    pub command: Vec<String>,
}

/// Validated inputs of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecInput {
    pub project_id: String,
    pub rpath: Option<String>,
    pub sdk_id: String,
    pub command: Vec<String>,
}

impl ExecInput {
    /// Apply env-file fallbacks and check mandatory inputs. Never touches
    /// the network.
    pub fn resolve(args: &ExecCmdArgs, ctx: &AppContext) -> Result<Self> {
        let Some(project_id) = resolve_string(args.id.as_deref(), &ctx.env, KEY_PROJECT_ID) else {
            return Err(ExitError::new(
                codes::FAILURE,
                "project id must be set (see --id option)",
            )
            .into());
        };
        if args.command.is_empty() {
            return Err(ExitError::new(codes::FAILURE, "command must be set (see exec --help)").into());
        }
        Ok(Self {
            project_id,
            rpath: resolve_string(args.rpath.as_deref(), &ctx.env, KEY_RPATH),
            sdk_id: resolve_string(args.sdkid.as_deref(), &ctx.env, KEY_SDK_ID).unwrap_or_default(),
            command: args.command.clone(),
        })
    }
}

/* -------------------------------------------------------------------------- */
/* Public Entry Point                                                         */
/* -------------------------------------------------------------------------- */

pub fn execute_exec(ctx: &AppContext, args: ExecCmdArgs) -> Result<()> {
    let input = ExecInput::resolve(&args, ctx)?;
    tracing::info!("Execute: /exec {:?}", input.command);

    let Some(events_url) = ctx.events_url.clone() else {
        return Err(ExitError::new(codes::FAILURE, "event channel endpoint not configured").into());
    };

    let rt = runtime()?;
    rt.block_on(async {
        let hub = EventHub::new();
        let channel = EventChannel::connect(events_url, ctx.sid.clone(), hub.clone())
            .await
            .map_err(ExitError::fatal)?;
        tracing::debug!(sid = channel.sid(), "event channel connected");
        run_exec(ctx, &hub, input).await
    })
}

/* -------------------------------------------------------------------------- */
/* Core Orchestration                                                         */
/* -------------------------------------------------------------------------- */

/// Run one remote execution against an already connected hub.
pub async fn run_exec(ctx: &AppContext, hub: &EventHub, input: ExecInput) -> Result<()> {
    match ctx.version().await {
        Ok(ver) => tracing::info!("XDS version: {ver:?}"),
        Err(e) => tracing::info!("XDS version unavailable: {e:#}"),
    }
    tracing::info!("XDS server id: '{}'", ctx.server_id().await);

    let (signal, done) = ExitSignal::channel();
    register_handlers(hub, &signal, ctx.show_timestamp);

    let reg = EventRegisterArgs {
        name: EVT_PROJECT_CHANGE.to_string(),
        filter_project_id: None,
    };
    ctx.api
        .post("/events/register", &reg)
        .await
        .map_err(ExitError::fatal)?;

    let prj: ProjectConfig = ctx
        .api
        .get(&format!("/projects/{}", input.project_id))
        .await
        .map_err(ExitError::fatal)?;

    let rpath = match input.rpath {
        Some(rp) => rp,
        None => auto_rpath(&prj.client_path),
    };

    if !ctx.env.is_empty() {
        tracing::debug!("Command env: {:?}", ctx.env);
    }
    let args = build_exec_args(
        &input.project_id,
        &input.sdk_id,
        &input.command,
        ctx.env.to_env_list(),
        rpath,
        ctx.exec_timeout(),
    )?;

    log_post("POST /exec", &args);
    ctx.api
        .post("/exec", &args)
        .await
        .map_err(ExitError::fatal)?;

    let outcome = done.await.unwrap_or_else(|_| ExecOutcome::disconnected(None));
    finish(outcome)
}

fn register_handlers(hub: &EventHub, signal: &Arc<ExitSignal>, with_timestamp: bool) {
    let s = signal.clone();
    hub.on_disconnect(move |reason| {
        tracing::debug!(?reason, "event channel disconnection");
        s.fire(ExecOutcome::disconnected(reason));
    });

    hub.on(EXEC_OUT_EVENT, move |ev: ExecOutMsg| {
        write_output(
            &ev,
            with_timestamp,
            &mut std::io::stdout().lock(),
            &mut std::io::stderr().lock(),
        );
    });

    let s = signal.clone();
    hub.on(EXEC_EXIT_EVENT, move |ev: ExecExitMsg| {
        s.fire(ExecOutcome {
            code: ev.code,
            error: ev.error,
        });
    });

    hub.on(EVT_PROJECT_CHANGE, |ev: EventMsg| {
        let prj = ev.decode_project_config().unwrap_or_default();
        tracing::info!("Event {} ({}): {:?}", ev.kind, ev.time, prj);
    });
}

/// Forward one output chunk. Write errors (closed pipe) are ignored.
fn write_output(
    ev: &ExecOutMsg,
    with_timestamp: bool,
    out: &mut impl Write,
    err: &mut impl Write,
) {
    if !ev.stdout.is_empty() {
        let _ = out.write_all(stamp(&ev.timestamp, &ev.stdout, with_timestamp).as_bytes());
        let _ = out.flush();
    }
    if !ev.stderr.is_empty() {
        let _ = err.write_all(stamp(&ev.timestamp, &ev.stderr, with_timestamp).as_bytes());
        let _ = err.flush();
    }
}

/* -------------------------------------------------------------------------- */
/* Completion Signal                                                          */
/* -------------------------------------------------------------------------- */

/// Terminal result of a remote execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub code: i32,
    pub error: Option<String>,
}

impl ExecOutcome {
    fn disconnected(reason: Option<String>) -> Self {
        Self {
            code: codes::DISCONNECTED,
            error: Some(reason.unwrap_or_else(|| "disconnected from agent".to_string())),
        }
    }
}

/// One-shot slot: the first `fire` delivers, later calls are no-ops.
struct ExitSignal {
    slot: Mutex<Option<oneshot::Sender<ExecOutcome>>>,
}

impl ExitSignal {
    fn channel() -> (Arc<Self>, oneshot::Receiver<ExecOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                slot: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    fn fire(&self, outcome: ExecOutcome) -> bool {
        let tx = self.slot.lock().unwrap_or_else(|p| p.into_inner()).take();
        match tx {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

/// Map the outcome to the command result `main` turns into an exit code.
fn finish(outcome: ExecOutcome) -> Result<()> {
    if outcome.code == codes::SUCCESS {
        tracing::debug!("Exit successfully");
    }
    match outcome.error.filter(|e| !e.is_empty()) {
        Some(err) => {
            tracing::debug!("Exit with ERROR: {err}");
            Err(ExitError::new(outcome.code, err).into())
        }
        None if outcome.code == codes::SUCCESS => Ok(()),
        None => Err(ExitError::new(outcome.code, "").into()),
    }
}

/* -------------------------------------------------------------------------- */
/* Request Building                                                           */
/* -------------------------------------------------------------------------- */

/// Best-effort relative path: the part of the current directory after the
/// project's client path. Empty when the directory is unreadable.
fn auto_rpath(client_path: &str) -> String {
    match std::env::current_dir() {
        Ok(cwd) => {
            let cwd = cwd.to_string_lossy();
            tracing::debug!("Try to auto-setup rPath: cwd={cwd} ; ClientPath={client_path}");
            let rpath = derive_rpath(&cwd, client_path);
            tracing::debug!("Auto-setup rPath to: '{rpath}'");
            rpath
        }
        Err(e) => {
            tracing::debug!("cannot read current directory: {e}");
            String::new()
        }
    }
}

/// Substring split of `cwd` on `/<client_path>`. Only a single occurrence
/// yields a path; zero or several occurrences yield an empty path.
/// Partial segment matches count (`prj` matches inside `/myprj`).
pub fn derive_rpath(cwd: &str, client_path: &str) -> String {
    let prefix = if client_path.starts_with('/') {
        client_path.to_string()
    } else {
        format!("/{client_path}")
    };
    let mut hits = cwd.match_indices(prefix.as_str());
    match (hits.next(), hits.next()) {
        (Some((at, _)), None) => cwd[at + prefix.len()..].trim_matches('/').to_string(),
        _ => String::new(),
    }
}

pub fn build_exec_args(
    project_id: &str,
    sdk_id: &str,
    command: &[String],
    env: Vec<String>,
    rpath: String,
    timeout: u32,
) -> Result<ExecArgs> {
    let Some((cmd, rest)) = command.split_first() else {
        return Err(ExitError::new(codes::FAILURE, "command must be set (see exec --help)").into());
    };
    Ok(ExecArgs {
        id: project_id.to_string(),
        sdk_id: sdk_id.to_string(),
        cmd: cmd.trim_matches(' ').to_string(),
        args: rest.to_vec(),
        env,
        rpath,
        cmd_timeout: timeout,
    })
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */
