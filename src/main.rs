use clap::{Parser, Subcommand};

use deploystep::logging::{self, LogFormat, LoggingConfig};
use deploystep::utils::args;

mod commands;

use commands::{change, cloudfoundry, manifest, transport, xs, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Global flags and whether they take a value.
const GLOBAL_FLAGS: &[(&str, bool)] = &[
    ("--config", true),
    ("--verbose", false),
    ("-v", false),
    ("--log-format", true),
    ("--correlation-id", true),
    ("--help", false),
    ("-h", false),
];

#[derive(Parser)]
#[command(name = "deploystep")]
#[command(version = VERSION)]
#[command(about = "Pipeline steps for Cloud Foundry, XS advanced and transport management deployments")]
struct Cli {
    /// Pipeline configuration file (YAML or JSON) with `general` and `steps` sections
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<String>,

    /// Debug logging and CF trace output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log line format on stderr
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Id attached to every log line of this run
    #[arg(long, global = true)]
    correlation_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy to Cloud Foundry with the cf CLI (cf_native or mtaDeployPlugin)
    #[command(name = "cloud-foundry-deploy", visible_alias = "cloudFoundryDeploy")]
    CloudFoundryDeploy(cloudfoundry::CloudFoundryDeployArgs),
    /// Deploy a multi-target archive to XS advanced
    #[command(name = "xs-deploy", visible_alias = "xsDeploy")]
    XsDeploy(xs::XsDeployArgs),
    /// Upload a UI5 application into an ABAP transport request
    #[command(
        name = "transport-request-upload-cts",
        visible_alias = "transportRequestUploadCTS"
    )]
    TransportRequestUploadCts(transport::UploadArgs),
    /// Upload a file into a SOLMAN transport request
    #[command(
        name = "transport-request-upload-solman",
        visible_alias = "transportRequestUploadSOLMAN"
    )]
    TransportRequestUploadSolman(transport::UploadArgs),
    /// Fail unless a change document is in development
    #[command(
        name = "check-change-in-development",
        visible_alias = "checkChangeInDevelopment"
    )]
    CheckChangeInDevelopment(change::CheckChangeArgs),
    /// Manifest utilities
    Manifest(manifest::ManifestArgs),
}

fn main() -> std::process::ExitCode {
    let argv = args::normalize_step_args(
        std::env::args().collect(),
        commands::STEP_COMMANDS,
        GLOBAL_FLAGS,
    );
    let cli = Cli::parse_from(argv);

    logging::init_logging(LoggingConfig::new(cli.verbose, cli.log_format));

    let correlation_id = cli
        .correlation_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let step = commands::step_name(&cli.command);
    let span = tracing::info_span!("step", step, correlation_id = %correlation_id);
    let _entered = span.enter();

    let global = GlobalArgs {
        config: cli.config,
        verbose: cli.verbose,
    };

    tracing::info!(version = VERSION, "running step");
    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    match &json_result {
        Ok(_) => tracing::info!("step finished"),
        Err(err) => tracing::error!(code = err.code.as_str(), "step failed: {}", err),
    }

    if let Err(err) = deploystep::output::print_json_result(json_result) {
        eprintln!("{}", err);
    }
    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
