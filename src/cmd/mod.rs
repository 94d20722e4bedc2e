/*!
Command dispatcher module.

Only module declarations and re-exports live here; each command group has
its own file:

  src/cmd/
    mod.rs       (this file)
    exec.rs      (ExecCmdArgs + execute_exec)
    sdks.rs      (SdksCommand + execute_sdks)
    projects.rs  (ProjectsCommand + execute_projects)
    misc.rs      (MiscCommand + execute_misc)
    shared.rs    (AppContext, runtime, id resolution)
    format.rs    (tables and detail blocks)

Conventions:
  - Each command module exposes one public `execute_*` function taking the
    shared `AppContext` and returning `anyhow::Result<()>`.
  - Failures that need a specific exit code are wrapped in `ExitError`.
*/

pub mod exec;
pub mod format;
pub mod misc;
pub mod projects;
pub mod sdks;
pub mod shared;

pub use exec::{ExecCmdArgs, execute_exec};
pub use misc::{MiscCommand, execute_misc};
pub use projects::{ProjectsCommand, execute_projects};
pub use sdks::{SdksCommand, execute_sdks};
pub use shared::AppContext;
