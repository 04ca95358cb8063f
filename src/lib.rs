use std::path::PathBuf;

pub mod cli;
pub mod config;
pub mod domain;
pub mod emcli_client;
pub mod errors;
pub mod logging;
pub mod prompt;

use cli::{Invocation, Mode};
use config::{BeaconMap, Config};
use domain::{
    batch::{add_batch_targets, BatchRequest},
    provision::{add_single_target, remove_target, SingleTarget},
    validation::{require_non_empty, resolve_entity, resolve_pod, Lifecycle},
};
use emcli_client::ManagementClient;
use errors::AppError;

#[derive(Debug, Clone)]
pub enum Action {
    Single(SingleTarget),
    Batch {
        request: BatchRequest,
        path: PathBuf,
        beacons: BeaconMap,
    },
    Remove {
        host: String,
    },
}

/// A fully validated run, ready to be executed once a client is available.
#[derive(Debug, Clone)]
pub struct Plan {
    pub em_login: String,
    pub action: Action,
}

/// Resolves lifecycle, entity number and pod against the configuration.
/// Nothing remote happens here, so every rejection leaves no side effects.
pub fn plan(invocation: Invocation, config: &Config) -> Result<Plan, AppError> {
    let Invocation {
        em_login,
        ldap,
        group,
        mode,
        ..
    } = invocation;

    let action = match mode {
        Mode::Single {
            host,
            port,
            pod,
            lifecycle,
            entity_number,
        } => {
            require_non_empty("ldap host", &host)?;
            let lifecycle = Lifecycle::parse(&lifecycle)?;
            let entity = resolve_entity(config.entities(), &entity_number)?;
            let beacons = resolve_pod(config.beacons(), &pod)?.to_vec();

            Action::Single(SingleTarget {
                check: ldap.check_for(&host, &port),
                beacons,
                lifecycle,
                entity,
                pod,
                group,
            })
        }
        Mode::Batch {
            path,
            lifecycle,
            entity_number,
        } => {
            let lifecycle = Lifecycle::parse(&lifecycle)?;
            let entity = resolve_entity(config.entities(), &entity_number)?;

            Action::Batch {
                request: BatchRequest {
                    settings: ldap,
                    lifecycle,
                    entity,
                    group,
                },
                path,
                beacons: config.beacons().clone(),
            }
        }
        Mode::Remove { host } => {
            require_non_empty("ldap host", &host)?;
            Action::Remove { host }
        }
    };

    Ok(Plan { em_login, action })
}

/// Runs the plan and returns the process exit code.
pub async fn execute(plan: &Plan, client: &dyn ManagementClient) -> Result<i32, AppError> {
    match &plan.action {
        Action::Single(target) => add_single_target(client, target).await,
        Action::Batch {
            request,
            path,
            beacons,
        } => Ok(add_batch_targets(client, request, beacons, path)
            .await?
            .exit_code()),
        Action::Remove { host } => Ok(remove_target(client, host).await),
    }
}
