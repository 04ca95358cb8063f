use std::process::ExitCode;

use clap::Parser;
use ldap_target_ctl::{
    cli::Cli,
    config::Config,
    emcli_client::EmcliClient,
    errors::AppError,
    execute, logging, plan, prompt,
};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init_logging();

    let invocation = match Cli::parse().into_invocation() {
        Ok(invocation) => invocation,
        Err(err) => err.exit(),
    };

    match run(invocation).await {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("ERROR: {err}");
            error!(error = %err, "provisioning aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(invocation: ldap_target_ctl::cli::Invocation) -> Result<i32, AppError> {
    let config = match &invocation.config {
        Some(path) => Config::from_path(path)?,
        None => Config::discover()?,
    };
    let plan = plan(invocation, &config)?;

    let password = prompt::read_masked(&format!("OEM Password for {}: ", plan.em_login))
        .map_err(AppError::Prompt)?;
    let client = EmcliClient::new(
        config.emcli_path(),
        config.oem_url(),
        plan.em_login.as_str(),
        password,
    );

    info!(
        config = %config.path.display(),
        oem_url = config.oem_url(),
        em_login = %plan.em_login,
        "starting provisioning"
    );
    execute(&plan, &client).await
}

fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}
