use clap::Args;

use deploystep::exec::SystemRunner;
use deploystep::files::LocalFiles;
use deploystep::transport::change::{self, ChangeStatus, CheckChangeConfig};

use super::{CmdResult, GlobalArgs, StepArgs};

pub const COMMAND: &str = "check-change-in-development";
pub const STEP: &str = "checkChangeInDevelopment";

#[derive(Args)]
pub struct CheckChangeArgs {
    #[command(flatten)]
    pub step: StepArgs,
}

pub fn run(args: CheckChangeArgs, global: &GlobalArgs) -> CmdResult<ChangeStatus> {
    let config: CheckChangeConfig = global.step_config(STEP, &args.step.extra, &LocalFiles)?;
    let mut runner = SystemRunner::new();
    Ok((change::run(&config, &mut runner)?, 0))
}
