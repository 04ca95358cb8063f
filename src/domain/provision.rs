//! Target provisioning against the management client
//!
//! Creation, sync and property steps abort the target on failure. Group steps
//! never abort; only a single target's return code reflects a failed add.

use std::fmt;

use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::{
    domain::{
        template::{LdapCheck, ServiceTemplate},
        validation::{Entity, Lifecycle},
    },
    emcli_client::{CommandOutcome, ManagementClient, PropertyRecord, GENERIC_SERVICE_TYPE},
    errors::AppError,
};

pub const TARGET_SUFFIX: &str = "_ldap";
pub const FUNCTION_NAME: &str = "LDAP Service";

pub fn target_name(host: &str) -> String {
    format!("{host}{TARGET_SUFFIX}")
}

pub fn property_record(department: &str, lifecycle: Lifecycle, pod: &str) -> PropertyRecord {
    PropertyRecord::from([
        ("Department".to_string(), department.to_string()),
        ("Function".to_string(), FUNCTION_NAME.to_string()),
        (
            "Lifecycle Status".to_string(),
            lifecycle.display_name().to_string(),
        ),
        ("Pod".to_string(), pod.to_string()),
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Login,
    Sync,
    CreateTarget,
    SetProperties,
    CreateGroup,
    AddToGroup,
    DeleteTarget,
    Logout,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "login",
            Self::Sync => "sync",
            Self::CreateTarget => "create target",
            Self::SetProperties => "set target properties",
            Self::CreateGroup => "create group",
            Self::AddToGroup => "add to group",
            Self::DeleteTarget => "delete target",
            Self::Logout => "logout",
        })
    }
}

/// Echoes the collaborator's output: stdout on success, stderr on failure.
fn echo(step: Step, outcome: &CommandOutcome) {
    if outcome.is_success() {
        let stdout = outcome.stdout.trim();
        if !stdout.is_empty() {
            println!("{stdout}");
        }
    } else {
        let stderr = outcome.stderr.trim();
        if !stderr.is_empty() {
            eprintln!("{stderr}");
        }
        error!(step = %step, code = outcome.code, "management client command failed");
    }
}

/// Steps whose failure stops the current target.
fn strict(step: Step, outcome: &CommandOutcome) -> Result<(), i32> {
    echo(step, outcome);
    if outcome.is_success() {
        Ok(())
    } else {
        Err(outcome.code)
    }
}

/// Steps whose failure is surfaced and then ignored.
fn lenient(step: Step, outcome: &CommandOutcome) {
    echo(step, outcome);
    if !outcome.is_success() {
        warn!(step = %step, code = outcome.code, "continuing after non-fatal failure");
    }
}

/// An authenticated management-client session for one provisioning run.
///
/// Obtained from a successful login; `close` must be called on every path
/// after that to release the remote session.
pub struct Session<'a> {
    client: &'a dyn ManagementClient,
}

impl<'a> Session<'a> {
    /// Logs in. On failure returns the login's code; nothing else is called.
    pub async fn open(client: &'a dyn ManagementClient) -> Result<Session<'a>, i32> {
        let outcome = client.login().await;
        strict(Step::Login, &outcome)?;
        info!("management session opened");
        Ok(Self { client })
    }

    pub fn client(&self) -> &'a dyn ManagementClient {
        self.client
    }

    pub async fn sync(&self) -> Result<(), i32> {
        let outcome = self.client.sync().await;
        strict(Step::Sync, &outcome)
    }

    pub async fn close(self) {
        let outcome = self.client.logout().await;
        lenient(Step::Logout, &outcome);
        info!("management session closed");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub group: String,
    /// Set only when the group was missing and had to be created.
    pub create_code: Option<i32>,
    pub add_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub target_name: String,
    pub create_code: i32,
    /// `None` when creation failed and the step was skipped.
    pub property_code: Option<i32>,
    pub group: Option<GroupOutcome>,
}

impl TargetOutcome {
    /// First failing strict-step code, or 0.
    pub fn code(&self) -> i32 {
        if self.create_code != 0 {
            self.create_code
        } else {
            self.property_code.unwrap_or(0)
        }
    }

    /// Like `code`, but a failed group add is reported once the strict steps
    /// passed. Used for single targets; batch totals ignore group codes.
    pub fn code_with_group(&self) -> i32 {
        match self.code() {
            0 => self.group.as_ref().map_or(0, |group| group.add_code),
            code => code,
        }
    }

    /// Sum of the nonzero create and property codes.
    pub fn error_count(&self) -> i64 {
        i64::from(self.create_code) + i64::from(self.property_code.unwrap_or(0))
    }
}

/// What to create for one target, independent of how it was requested.
#[derive(Debug, Clone)]
pub struct TargetRequest<'a> {
    pub target_name: String,
    pub beacons: &'a [String],
    pub properties: PropertyRecord,
    pub group: Option<&'a str>,
}

/// Create, tag and group one target inside an open session.
///
/// The template file is dropped, and so removed, as soon as the create call
/// returns.
pub async fn provision_target(
    session: &Session<'_>,
    request: &TargetRequest<'_>,
    template_file: NamedTempFile,
) -> TargetOutcome {
    let client = session.client();
    let name = request.target_name.as_str();

    let created = client
        .create_generic_service(name, template_file.path(), request.beacons)
        .await;
    drop(template_file);

    let mut outcome = TargetOutcome {
        target_name: name.to_string(),
        create_code: created.code,
        property_code: None,
        group: None,
    };
    if strict(Step::CreateTarget, &created).is_err() {
        return outcome;
    }

    let tagged = client
        .set_target_property_value(name, GENERIC_SERVICE_TYPE, &request.properties)
        .await;
    outcome.property_code = Some(tagged.code);
    if strict(Step::SetProperties, &tagged).is_err() {
        return outcome;
    }

    if let Some(group) = request.group {
        outcome.group = Some(join_group(client, group, name).await);
    }

    info!(target_name = name, "target provisioned");
    outcome
}

/// Adds the target to `group`, creating the group first when it is missing.
pub async fn join_group(
    client: &dyn ManagementClient,
    group: &str,
    target_name: &str,
) -> GroupOutcome {
    let existing = client.get_groups().await;

    let create_code = if existing.iter().any(|name| name == group) {
        None
    } else {
        info!(group, "group missing, creating it");
        let created = client.create_group(group).await;
        lenient(Step::CreateGroup, &created);
        Some(created.code)
    };

    let added = client
        .add_to_group(group, target_name, GENERIC_SERVICE_TYPE)
        .await;
    lenient(Step::AddToGroup, &added);

    GroupOutcome {
        group: group.to_string(),
        create_code,
        add_code: added.code,
    }
}

#[derive(Debug, Clone)]
pub struct SingleTarget {
    pub check: LdapCheck,
    pub beacons: Vec<String>,
    pub lifecycle: Lifecycle,
    pub entity: Entity,
    pub pod: String,
    pub group: Option<String>,
}

impl SingleTarget {
    pub fn target_name(&self) -> String {
        target_name(&self.check.host)
    }

    pub fn properties(&self) -> PropertyRecord {
        property_record(&self.entity.department, self.lifecycle, &self.pod)
    }
}

/// Provision one target. Returns 0 on success, otherwise the first failing
/// step's code; a failed group add is returned but never stops the run.
/// Template rendering errors surface before any remote call.
pub async fn add_single_target(
    client: &dyn ManagementClient,
    target: &SingleTarget,
) -> Result<i32, AppError> {
    let template_file = ServiceTemplate::build(&target.check).write_temp()?;

    let session = match Session::open(client).await {
        Ok(session) => session,
        Err(code) => return Ok(code),
    };

    let code = match session.sync().await {
        Ok(()) => {
            let request = TargetRequest {
                target_name: target.target_name(),
                beacons: &target.beacons,
                properties: target.properties(),
                group: target.group.as_deref(),
            };
            provision_target(&session, &request, template_file)
                .await
                .code_with_group()
        }
        Err(code) => code,
    };

    session.close().await;
    Ok(code)
}

/// Delete the `{host}_ldap` generic service.
pub async fn remove_target(client: &dyn ManagementClient, host: &str) -> i32 {
    let session = match Session::open(client).await {
        Ok(session) => session,
        Err(code) => return code,
    };

    let code = match session.sync().await {
        Ok(()) => {
            let name = target_name(host);
            let deleted = client.delete_target(&name, GENERIC_SERVICE_TYPE).await;
            match strict(Step::DeleteTarget, &deleted) {
                Ok(()) => {
                    info!(target_name = %name, "target removed");
                    0
                }
                Err(code) => code,
            }
        }
        Err(code) => code,
    };

    session.close().await;
    code
}
