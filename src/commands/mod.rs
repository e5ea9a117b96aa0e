use clap::Args;

use deploystep::config::{self, ConfigSources};
use deploystep::files::FileSystem;
use serde::de::DeserializeOwned;

pub type CmdResult<T> = deploystep::Result<(T, i32)>;

/// Flags shared by every command.
pub(crate) struct GlobalArgs {
    pub config: Option<String>,
    pub verbose: bool,
}

impl GlobalArgs {
    /// Typed options of `step` from config file, environment and `extra` flags.
    pub fn step_config<T: DeserializeOwned>(
        &self,
        step: &str,
        extra: &[String],
        fs: &dyn FileSystem,
    ) -> deploystep::Result<T> {
        let sources = ConfigSources::from_process(self.config.as_deref(), extra.to_vec());
        config::resolve(step, &sources, fs)
    }
}

/// Step options as trailing `--key value` pairs.
///
/// Keys may be kebab-case or camelCase (`--deploy-tool` and `--deployTool`
/// are the same option). Repeat a flag to pass a list:
///
/// ```sh
/// deploystep cloud-foundry-deploy --deploy-tool cf_native \
///     --manifest-variables appName=demo --manifest-variables instances=2
/// ```
#[derive(Args, Default, Debug)]
pub struct StepArgs {
    /// Step options (e.g., --api-endpoint https://api.cf.example.org)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra: Vec<String>,
}

pub mod change;
pub mod cloudfoundry;
pub mod manifest;
pub mod transport;
pub mod xs;

/// Subcommand names that take trailing step options.
pub(crate) const STEP_COMMANDS: &[&str] = &[
    cloudfoundry::COMMAND,
    xs::COMMAND,
    transport::CTS_COMMAND,
    transport::SOLMAN_COMMAND,
    change::COMMAND,
];

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        deploystep::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

/// Pipeline step name of a command, used for the config section and the log span.
pub(crate) fn step_name(command: &crate::Commands) -> &'static str {
    match command {
        crate::Commands::CloudFoundryDeploy(_) => cloudfoundry::STEP,
        crate::Commands::XsDeploy(_) => xs::STEP,
        crate::Commands::TransportRequestUploadCts(_) => transport::CTS_STEP,
        crate::Commands::TransportRequestUploadSolman(_) => transport::SOLMAN_STEP,
        crate::Commands::CheckChangeInDevelopment(_) => change::STEP,
        crate::Commands::Manifest(_) => manifest::STEP,
    }
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (deploystep::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::CloudFoundryDeploy(args) => dispatch!(args, global, cloudfoundry),
        crate::Commands::XsDeploy(args) => dispatch!(args, global, xs),
        crate::Commands::TransportRequestUploadCts(args) => {
            deploystep::output::map_cmd_result_to_json(transport::run_cts(args, global))
        }
        crate::Commands::TransportRequestUploadSolman(args) => {
            deploystep::output::map_cmd_result_to_json(transport::run_solman(args, global))
        }
        crate::Commands::CheckChangeInDevelopment(args) => dispatch!(args, global, change),
        crate::Commands::Manifest(args) => dispatch!(args, global, manifest),
    }
}
