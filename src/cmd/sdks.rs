/*!
`sdks.rs`

Implements the `sdks` command group (alias `sdk`):

  - list (ls)   : installed SDKs of the selected server, ID/NAME table or
                  verbose per-SDK blocks
  - get         : one SDK by id (`--id ID` or positional), verbose block
  - add (a)     : not supported yet
  - remove (rm) : not supported yet (id still required)

SDK requests address `servers/{index}/sdks`, the index coming from the
application context.
*/

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::agent::AgentApiExt;
use crate::agent::types::Sdk;
use crate::cmd::format::{sdk_details, sdk_list};
use crate::cmd::shared::{AppContext, resolve_id, runtime};
use crate::error::{ExitError, codes};

#[derive(Subcommand, Debug)]
pub enum SdksCommand {
    /// Add a new SDK
    #[command(visible_alias = "a")]
    Add(SdkAddArgs),

    /// Get a property of a SDK
    Get(SdkIdArgs),

    /// List installed SDKs
    #[command(visible_alias = "ls")]
    List(SdkListArgs),

    /// Remove an existing SDK
    #[command(visible_alias = "rm")]
    Remove(SdkIdArgs),
}

#[derive(Args, Debug, Default)]
pub struct SdkAddArgs {
    /// Ignored for now
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub rest: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct SdkIdArgs {
    /// SDK id
    #[arg(long)]
    pub id: Option<String>,

    /// SDK id (alternative to --id)
    #[arg(value_name = "ID")]
    pub positional: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct SdkListArgs {
    /// Display every SDK field
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute_sdks(ctx: &AppContext, command: SdksCommand) -> Result<()> {
    match command {
        SdksCommand::List(args) => {
            let sdks = runtime()?.block_on(fetch_sdks(ctx))?;
            println!("{}", render(&sdks, args.verbose));
            Ok(())
        }
        SdksCommand::Get(args) => {
            let id = required_id(&args)?;
            let sdk = runtime()?.block_on(fetch_sdk(ctx, &id))?;
            println!("{}", sdk_details(std::slice::from_ref(&sdk)));
            Ok(())
        }
        SdksCommand::Add(_) => anyhow::bail!("not supported yet"),
        SdksCommand::Remove(args) => {
            required_id(&args)?;
            anyhow::bail!("not supported yet")
        }
    }
}

fn render(sdks: &[Sdk], verbose: bool) -> String {
    if verbose && !sdks.is_empty() {
        sdk_details(sdks)
    } else {
        sdk_list(sdks)
    }
}

fn required_id(args: &SdkIdArgs) -> Result<String> {
    let id = resolve_id(args.id.as_deref(), args.positional.as_deref());
    if id.is_empty() {
        return Err(ExitError::new(codes::FAILURE, "id parameter or option must be set").into());
    }
    Ok(id)
}

/// All SDKs of the selected server.
pub async fn fetch_sdks(ctx: &AppContext) -> Result<Vec<Sdk>> {
    let url = format!("servers/{}/sdks", ctx.server_index());
    let sdks: Option<Vec<Sdk>> = ctx.api.get(&url).await.map_err(ExitError::fatal)?;
    tracing::debug!("Result of {url}: {sdks:?}");
    Ok(sdks.unwrap_or_default())
}

pub async fn fetch_sdk(ctx: &AppContext, id: &str) -> Result<Sdk> {
    let url = format!("servers/{}/sdks/{id}", ctx.server_index());
    let sdk = ctx.api.get(&url).await.map_err(ExitError::fatal)?;
    Ok(sdk)
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */
