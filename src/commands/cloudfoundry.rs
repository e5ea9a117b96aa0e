use clap::Args;

use deploystep::cloudfoundry::{self, CloudFoundryDeployConfig, DeployReport};
use deploystep::exec::SystemRunner;
use deploystep::files::LocalFiles;

use super::{CmdResult, GlobalArgs, StepArgs};

pub const COMMAND: &str = "cloud-foundry-deploy";
pub const STEP: &str = "cloudFoundryDeploy";

#[derive(Args)]
pub struct CloudFoundryDeployArgs {
    #[command(flatten)]
    pub step: StepArgs,
}

pub fn run(args: CloudFoundryDeployArgs, global: &GlobalArgs) -> CmdResult<DeployReport> {
    let fs = LocalFiles;
    let config: CloudFoundryDeployConfig = global.step_config(STEP, &args.step.extra, &fs)?;
    let mut runner = SystemRunner::new();
    let report = cloudfoundry::deploy(&config, &mut runner, &fs, global.verbose)?;
    Ok((report, 0))
}
