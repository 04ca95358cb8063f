//! Batch provisioning from a `host:port:pod` file
//!
//! One session covers the whole file. Records are provisioned one at a time;
//! a failing record never stops the others, but a malformed line halts the
//! batch.

use std::{fs, path::Path};

use tracing::{error, info, warn};

use crate::{
    config::BeaconMap,
    domain::{
        provision::{
            property_record, provision_target, target_name, Session, Step, TargetOutcome,
            TargetRequest,
        },
        template::{LdapCheck, ServiceTemplate},
        validation::{resolve_pod, Entity, Lifecycle},
    },
    emcli_client::ManagementClient,
    errors::{AppError, BatchRecordError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub host: String,
    pub port: String,
    pub pod: String,
}

impl BatchRecord {
    pub fn parse(line_number: usize, line: &str) -> Result<Self, BatchRecordError> {
        let fields = line.trim().split(':').map(str::trim).collect::<Vec<_>>();

        match fields.as_slice() {
            [host, port, pod] if !host.is_empty() && !port.is_empty() && !pod.is_empty() => {
                Ok(Self {
                    host: host.to_string(),
                    port: port.to_string(),
                    pod: pod.to_string(),
                })
            }
            _ => Err(BatchRecordError {
                line_number,
                line: line.trim_end().to_string(),
            }),
        }
    }
}

/// LDAP check fields shared by every record in a batch.
#[derive(Debug, Clone)]
pub struct LdapSettings {
    pub user: String,
    pub password: String,
    pub base: String,
    pub filter: String,
    pub search_attribute: String,
}

impl LdapSettings {
    pub fn check_for(&self, host: &str, port: &str) -> LdapCheck {
        LdapCheck {
            user: self.user.clone(),
            password: self.password.clone(),
            host: host.to_string(),
            port: port.to_string(),
            base: self.base.clone(),
            filter: self.filter.clone(),
            search_attribute: self.search_attribute.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub settings: LdapSettings,
    pub lifecycle: Lifecycle,
    pub entity: Entity,
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Provisioned {
        line_number: usize,
        outcome: TargetOutcome,
    },
    /// The record could not be turned into a create call.
    Failed {
        line_number: usize,
        target_name: String,
        reason: String,
    },
}

impl RecordOutcome {
    pub fn error_count(&self) -> i64 {
        match self {
            Self::Provisioned { outcome, .. } => outcome.error_count(),
            Self::Failed { .. } => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub records: Vec<RecordOutcome>,
    pub halted_at: Option<BatchRecordError>,
}

impl BatchReport {
    pub fn error_total(&self) -> i64 {
        self.records
            .iter()
            .fold(0, |total, record| total + record.error_count())
    }

    /// 0 when every record succeeded, otherwise 1 regardless of how many failed.
    pub fn exit_code(&self) -> i32 {
        if self.halted_at.is_none() && self.error_total() == 0 {
            0
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRun {
    /// Login or sync failed; no record was attempted.
    Aborted { step: Step, code: i32 },
    Completed(BatchReport),
}

impl BatchRun {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Aborted { code, .. } => *code,
            Self::Completed(report) => report.exit_code(),
        }
    }
}

pub fn read_batch_file(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|source| AppError::BatchFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Provision every record of the batch file at `path` in one session.
pub async fn add_batch_targets(
    client: &dyn ManagementClient,
    request: &BatchRequest,
    beacons: &BeaconMap,
    path: &Path,
) -> Result<BatchRun, AppError> {
    let contents = read_batch_file(path)?;

    let session = match Session::open(client).await {
        Ok(session) => session,
        Err(code) => {
            return Ok(BatchRun::Aborted {
                step: Step::Login,
                code,
            })
        }
    };

    let run = match session.sync().await {
        Ok(()) => BatchRun::Completed(process_records(&session, request, beacons, &contents).await),
        Err(code) => BatchRun::Aborted {
            step: Step::Sync,
            code,
        },
    };

    session.close().await;

    if let BatchRun::Completed(report) = &run {
        info!(
            records = report.records.len(),
            error_total = report.error_total(),
            halted = report.halted_at.is_some(),
            "batch finished"
        );
    }
    Ok(run)
}

async fn process_records(
    session: &Session<'_>,
    request: &BatchRequest,
    beacons: &BeaconMap,
    contents: &str,
) -> BatchReport {
    let mut report = BatchReport::default();

    for (index, line) in contents.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let record = match BatchRecord::parse(line_number, line) {
            Ok(record) => record,
            Err(err) => {
                eprintln!("ERROR: {err}");
                error!(line_number, "halting batch on malformed record");
                report.halted_at = Some(err);
                break;
            }
        };

        let outcome = provision_record(session, request, beacons, line_number, &record).await;
        report.records.push(outcome);
    }

    report
}

async fn provision_record(
    session: &Session<'_>,
    request: &BatchRequest,
    beacons: &BeaconMap,
    line_number: usize,
    record: &BatchRecord,
) -> RecordOutcome {
    let name = target_name(&record.host);
    let failed = |reason: String| {
        eprintln!("ERROR: {reason}");
        warn!(line_number, target_name = %name, "skipping batch record");
        RecordOutcome::Failed {
            line_number,
            target_name: name.clone(),
            reason,
        }
    };

    let pod_beacons = match resolve_pod(beacons, &record.pod) {
        Ok(pod_beacons) => pod_beacons,
        Err(err) => return failed(err.to_string()),
    };

    let check = request.settings.check_for(&record.host, &record.port);
    let template_file = match ServiceTemplate::build(&check).write_temp() {
        Ok(file) => file,
        Err(err) => return failed(err.to_string()),
    };

    let target = TargetRequest {
        target_name: name.clone(),
        beacons: pod_beacons,
        properties: property_record(&request.entity.department, request.lifecycle, &record.pod),
        group: request.group.as_deref(),
    };

    RecordOutcome::Provisioned {
        line_number,
        outcome: provision_target(session, &target, template_file).await,
    }
}
