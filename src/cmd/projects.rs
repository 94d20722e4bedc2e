/*!
`projects.rs`

`projects` command group (alias `prj`):

  - list (ls) : projects declared on the agent, ID/LABEL/CLIENT PATH table
                or verbose per-project blocks
*/

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::agent::AgentApi;
use crate::agent::types::ProjectConfig;
use crate::cmd::format::{project_details, project_list};
use crate::cmd::shared::{AppContext, runtime};
use crate::error::ExitError;

#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    /// List existing projects
    #[command(visible_alias = "ls")]
    List(ProjectListArgs),
}

#[derive(Args, Debug, Default)]
pub struct ProjectListArgs {
    /// Display every project field
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute_projects(ctx: &AppContext, command: ProjectsCommand) -> Result<()> {
    match command {
        ProjectsCommand::List(args) => {
            let projects = runtime()?.block_on(fetch_projects(ctx))?;
            println!("{}", render(&projects, args.verbose));
            Ok(())
        }
    }
}

fn render(projects: &[ProjectConfig], verbose: bool) -> String {
    if verbose && !projects.is_empty() {
        project_details(projects)
    } else {
        project_list(projects)
    }
}

pub async fn fetch_projects(ctx: &AppContext) -> Result<Vec<ProjectConfig>> {
    let raw = ctx
        .api
        .get_value("/projects")
        .await
        .map_err(ExitError::fatal)?;
    tracing::debug!("Result of /projects: {raw}");
    let projects = serde_json::from_value::<Option<Vec<ProjectConfig>>>(raw)
        .map_err(ExitError::fatal)?
        .unwrap_or_default();
    Ok(projects)
}

/* ---- Tests ---- */
