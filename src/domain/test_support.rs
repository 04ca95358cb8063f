use std::{collections::HashMap, path::Path, sync::Mutex};

use async_trait::async_trait;

use crate::{
    domain::template::LdapCheck,
    emcli_client::{CommandOutcome, ManagementClient, PropertyRecord},
};

pub fn sample_check(host: &str) -> LdapCheck {
    LdapCheck {
        user: "cn=monitor,cn=Users,dc=example,dc=com".to_string(),
        password: "s3cret".to_string(),
        host: host.to_string(),
        port: "3060".to_string(),
        base: "cn=monitor,cn=Users,dc=example,dc=com".to_string(),
        filter: "cn=monitor".to_string(),
        search_attribute: "Obiee_Auth".to_string(),
    }
}

/// Records every call and fails the ones configured through `failing`.
///
/// A failure key matches either the full call (`"create_generic_service a_ldap"`)
/// or just its verb (`"create_generic_service"`).
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<String>>,
    failures: HashMap<String, i32>,
    groups: Vec<String>,
    template_seen: Mutex<Vec<bool>>,
    properties: Mutex<Vec<PropertyRecord>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|group| group.to_string()).collect();
        self
    }

    pub fn failing(mut self, key: &str, code: i32) -> Self {
        self.failures.insert(key.to_string(), code);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(' ').next() == Some(verb))
            .count()
    }

    pub fn template_seen_during_create(&self) -> Vec<bool> {
        self.template_seen.lock().expect("template lock").clone()
    }

    pub fn recorded_properties(&self) -> Vec<PropertyRecord> {
        self.properties.lock().expect("properties lock").clone()
    }

    fn record(&self, call: String) -> CommandOutcome {
        let verb = call.split(' ').next().unwrap_or_default().to_string();
        let code = self
            .failures
            .get(&call)
            .or_else(|| self.failures.get(&verb))
            .copied();
        self.calls.lock().expect("calls lock").push(call.clone());

        match code {
            Some(code) => CommandOutcome::failure(code, format!("{call} failed")),
            None => CommandOutcome::success(format!("{call} ok")),
        }
    }
}

#[async_trait]
impl ManagementClient for RecordingClient {
    async fn login(&self) -> CommandOutcome {
        self.record("login".to_string())
    }

    async fn sync(&self) -> CommandOutcome {
        self.record("sync".to_string())
    }

    async fn logout(&self) -> CommandOutcome {
        self.record("logout".to_string())
    }

    async fn create_generic_service(
        &self,
        name: &str,
        template_path: &Path,
        _beacons: &[String],
    ) -> CommandOutcome {
        self.template_seen
            .lock()
            .expect("template lock")
            .push(template_path.is_file());
        self.record(format!("create_generic_service {name}"))
    }

    async fn set_target_property_value(
        &self,
        name: &str,
        _target_type: &str,
        properties: &PropertyRecord,
    ) -> CommandOutcome {
        self.properties
            .lock()
            .expect("properties lock")
            .push(properties.clone());
        self.record(format!("set_target_property_value {name}"))
    }

    async fn get_groups(&self) -> Vec<String> {
        self.record("get_groups".to_string());
        self.groups.clone()
    }

    async fn create_group(&self, name: &str) -> CommandOutcome {
        self.record(format!("create_group {name}"))
    }

    async fn add_to_group(&self, group: &str, target: &str, _target_type: &str) -> CommandOutcome {
        self.record(format!("add_to_group {group} {target}"))
    }

    async fn delete_target(&self, name: &str, _target_type: &str) -> CommandOutcome {
        self.record(format!("delete_target {name}"))
    }
}
