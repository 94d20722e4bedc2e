/*!
`misc.rs`

`misc` command group:

  - version : this client, the agent and every XDS server behind it
*/

use anyhow::Result;
use clap::Subcommand;

use crate::agent::types::{VersionData, XdsVersion};
use crate::cmd::format::aligned;
use crate::cmd::shared::{AppContext, runtime};
use crate::error::ExitError;

#[derive(Subcommand, Debug)]
pub enum MiscCommand {
    /// Display version of the CLI, the agent and the servers
    Version,
}

pub fn execute_misc(ctx: &AppContext, command: MiscCommand) -> Result<()> {
    match command {
        MiscCommand::Version => {
            let report = runtime()?.block_on(async {
                let ver = ctx.version().await.map_err(ExitError::fatal)?;
                Ok::<_, anyhow::Error>(version_report(ver, ctx.server_index()))
            })?;
            println!("{report}");
            Ok(())
        }
    }
}

fn version_block(data: &VersionData) -> String {
    let rows = [
        ("ID", &data.id),
        ("Version", &data.version),
        ("API Version", &data.api_version),
        ("Git Tag", &data.git_tag),
    ]
    .iter()
    .map(|(k, v)| vec![format!("{k}:"), v.to_string()])
    .collect::<Vec<_>>();
    aligned(&rows, 4)
}

/// Text of `misc version`; the selected server is marked with `*`.
pub fn version_report(ver: &XdsVersion, selected: usize) -> String {
    let mut out = vec![
        format!("CLI:\n    Version: {}", env!("CARGO_PKG_VERSION")),
        format!("Agent:\n{}", version_block(&ver.client)),
    ];
    if ver.servers.is_empty() {
        out.push("Servers: none connected".to_string());
    }
    for (idx, srv) in ver.servers.iter().enumerate() {
        let mark = if idx == selected { " *" } else { "" };
        out.push(format!("Server [{idx}]{mark}:\n{}", version_block(srv)));
    }
    out.join("\n")
}
