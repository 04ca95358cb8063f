use std::{collections::BTreeMap, path::Path, path::PathBuf, process::Stdio};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, warn};

pub const GENERIC_SERVICE_TYPE: &str = "generic_service";

const RECORD_SUBSEPARATOR: &str = "@@";

/// Exit code and captured output of one management-client command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Target property name to value, e.g. `Department -> TL`.
pub type PropertyRecord = BTreeMap<String, String>;

#[async_trait]
pub trait ManagementClient: Send + Sync {
    async fn login(&self) -> CommandOutcome;
    async fn sync(&self) -> CommandOutcome;
    async fn logout(&self) -> CommandOutcome;
    async fn create_generic_service(
        &self,
        name: &str,
        template_path: &Path,
        beacons: &[String],
    ) -> CommandOutcome;
    async fn set_target_property_value(
        &self,
        name: &str,
        target_type: &str,
        properties: &PropertyRecord,
    ) -> CommandOutcome;
    async fn get_groups(&self) -> Vec<String>;
    async fn create_group(&self, name: &str) -> CommandOutcome;
    async fn add_to_group(&self, group: &str, target: &str, target_type: &str) -> CommandOutcome;
    async fn delete_target(&self, name: &str, target_type: &str) -> CommandOutcome;
}

/// Drives the `emcli` command-line client, one process per command.
#[derive(Debug, Clone)]
pub struct EmcliClient {
    binary: PathBuf,
    url: String,
    username: String,
    password: String,
}

impl EmcliClient {
    pub fn new(
        binary: impl Into<PathBuf>,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    async fn run(&self, args: Vec<String>, stdin: Option<&str>) -> CommandOutcome {
        let verb = args.first().map(String::as_str).unwrap_or_default();
        debug!(binary = %self.binary.display(), verb, "running emcli command");

        let mut command = Command::new(&self.binary);
        command
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return CommandOutcome::failure(
                    1,
                    format!("failed to run {}: {err}", self.binary.display()),
                )
            }
        };

        if let (Some(input), Some(mut handle)) = (stdin, child.stdin.take()) {
            if let Err(err) = handle.write_all(format!("{input}\n").as_bytes()).await {
                warn!(verb, error = %err, "failed to write emcli stdin");
            }
        }

        match child.wait_with_output().await {
            Ok(output) => CommandOutcome {
                code: output.status.code().unwrap_or(1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(err) => CommandOutcome::failure(
                1,
                format!("failed waiting for {}: {err}", self.binary.display()),
            ),
        }
    }
}

#[async_trait]
impl ManagementClient for EmcliClient {
    async fn login(&self) -> CommandOutcome {
        // The password is fed through stdin so it never shows up in `ps`.
        self.run(
            setup_args(&self.url, &self.username),
            Some(self.password.as_str()),
        )
        .await
    }

    async fn sync(&self) -> CommandOutcome {
        self.run(vec!["sync".to_string()], None).await
    }

    async fn logout(&self) -> CommandOutcome {
        self.run(vec!["logout".to_string()], None).await
    }

    async fn create_generic_service(
        &self,
        name: &str,
        template_path: &Path,
        beacons: &[String],
    ) -> CommandOutcome {
        self.run(create_service_args(name, template_path, beacons), None)
            .await
    }

    async fn set_target_property_value(
        &self,
        name: &str,
        target_type: &str,
        properties: &PropertyRecord,
    ) -> CommandOutcome {
        self.run(property_args(name, target_type, properties), None)
            .await
    }

    async fn get_groups(&self) -> Vec<String> {
        let outcome = self
            .run(
                vec![
                    "get_groups".to_string(),
                    "-script".to_string(),
                    "-noheader".to_string(),
                ],
                None,
            )
            .await;

        if !outcome.is_success() {
            warn!(
                code = outcome.code,
                stderr = %outcome.stderr.trim(),
                "failed to list groups"
            );
            return Vec::new();
        }

        parse_group_names(&outcome.stdout)
    }

    async fn create_group(&self, name: &str) -> CommandOutcome {
        self.run(vec!["create_group".to_string(), format!("-name={name}")], None)
            .await
    }

    async fn add_to_group(&self, group: &str, target: &str, target_type: &str) -> CommandOutcome {
        let args = vec![
            "modify_group".to_string(),
            format!("-name={group}"),
            format!("-add_targets={target}:{target_type}"),
        ];
        self.run(args, None).await
    }

    async fn delete_target(&self, name: &str, target_type: &str) -> CommandOutcome {
        let args = vec![
            "delete_target".to_string(),
            format!("-name={name}"),
            format!("-type={target_type}"),
        ];
        self.run(args, None).await
    }
}

fn setup_args(url: &str, username: &str) -> Vec<String> {
    vec![
        "setup".to_string(),
        format!("-url={url}"),
        format!("-username={username}"),
        "-trustall".to_string(),
    ]
}

fn create_service_args(name: &str, template_path: &Path, beacons: &[String]) -> Vec<String> {
    let beacons = beacons
        .iter()
        .map(|beacon| format!("{beacon}:Y"))
        .collect::<Vec<_>>()
        .join(";");

    vec![
        "create_service".to_string(),
        format!("-name={name}"),
        format!("-type={GENERIC_SERVICE_TYPE}"),
        "-availType=test".to_string(),
        "-availOp=or".to_string(),
        format!("-input_file=template:{}", template_path.display()),
        format!("-beacons={beacons}"),
    ]
}

fn property_args(name: &str, target_type: &str, properties: &PropertyRecord) -> Vec<String> {
    let records = properties
        .iter()
        .map(|(key, value)| {
            [name, target_type, key.as_str(), value.as_str()].join(RECORD_SUBSEPARATOR)
        })
        .collect::<Vec<_>>()
        .join(";");

    vec![
        "set_target_property_value".to_string(),
        format!("-property_records={records}"),
        format!("-subseparator=property_records={RECORD_SUBSEPARATOR}"),
    ]
}

/// `get_groups -script` prints one tab-separated `name<TAB>type` row per group.
fn parse_group_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
