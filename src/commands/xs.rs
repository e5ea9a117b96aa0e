use clap::Args;

use deploystep::exec::SystemRunner;
use deploystep::files::LocalFiles;
use deploystep::xs::{self, XsDeployConfig, XsDeployReport};
use deploystep::Error;

use super::{CmdResult, GlobalArgs, StepArgs};

pub const COMMAND: &str = "xs-deploy";
pub const STEP: &str = "xsDeploy";

#[derive(Args)]
pub struct XsDeployArgs {
    #[command(flatten)]
    pub step: StepArgs,
}

pub fn run(args: XsDeployArgs, global: &GlobalArgs) -> CmdResult<XsDeployReport> {
    let fs = LocalFiles;
    let config: XsDeployConfig = global.step_config(STEP, &args.step.extra, &fs)?;
    let home = dirs::home_dir().ok_or_else(|| {
        Error::internal_unexpected("Cannot determine home directory for the xs session file")
    })?;
    let mut runner = SystemRunner::new();
    let report = xs::run(&config, &mut runner, &fs, &home)?;
    Ok((report, 0))
}
