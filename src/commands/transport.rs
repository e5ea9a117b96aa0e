use clap::Args;

use deploystep::exec::SystemRunner;
use deploystep::files::LocalFiles;
use deploystep::transport::cts::{self, CtsUploadConfig, CtsUploadReport};
use deploystep::transport::solman::{self, SolmanUploadConfig, SolmanUploadReport};

use super::{CmdResult, GlobalArgs, StepArgs};

pub const CTS_COMMAND: &str = "transport-request-upload-cts";
pub const CTS_STEP: &str = "transportRequestUploadCTS";
pub const SOLMAN_COMMAND: &str = "transport-request-upload-solman";
pub const SOLMAN_STEP: &str = "transportRequestUploadSOLMAN";

#[derive(Args)]
pub struct UploadArgs {
    #[command(flatten)]
    pub step: StepArgs,
}

pub fn run_cts(args: UploadArgs, global: &GlobalArgs) -> CmdResult<CtsUploadReport> {
    let fs = LocalFiles;
    let config: CtsUploadConfig = global.step_config(CTS_STEP, &args.step.extra, &fs)?;
    let mut runner = SystemRunner::new();
    Ok((cts::run(&config, &fs, &mut runner)?, 0))
}

pub fn run_solman(args: UploadArgs, global: &GlobalArgs) -> CmdResult<SolmanUploadReport> {
    let fs = LocalFiles;
    let config: SolmanUploadConfig = global.step_config(SOLMAN_STEP, &args.step.extra, &fs)?;
    let mut runner = SystemRunner::new();
    Ok((solman::run(&config, &fs, &mut runner)?, 0))
}
