//! Command-line surface
//!
//! Batch mode is selected by `-F`; everything else is interactive mode. The
//! management password is never accepted here, it is always prompted for.

use std::{env, path::PathBuf};

use clap::{error::ErrorKind, CommandFactory, Parser};

use crate::domain::batch::LdapSettings;

pub const DEFAULT_LDAP_USER: &str = "cn=XXXXX,cn=Users,dc=us,dc=oracle,dc=com";
pub const DEFAULT_LDAP_PASSWORD: &str = "XXXXXX";
pub const DEFAULT_LDAP_BASE: &str = "cn=XXXXXX,cn=Users,dc=us,dc=oracle,dc=com";
pub const DEFAULT_LDAP_FILTER: &str = "cn=XXXXX";
pub const DEFAULT_SEARCH_ATTRIBUTE: &str = "Taleo_Obiee_Auth";
pub const DEFAULT_GROUP: &str = "OID";
pub const DEFAULT_LIFECYCLE: &str = "production";

#[derive(Debug, Parser)]
#[command(
    name = "ldap_target_ctl",
    version,
    about = "Provision LDAP (OID) targets to be monitored by OEM.",
    long_about = "Provision LDAP (OID) targets to be monitored by OEM. \
                  Use -F to bulk load targets from a batch file with one \
                  ldap_host:ldap_port:pod record per line."
)]
pub struct Cli {
    /// Batch file with one ldap_host:ldap_port:pod record per line
    #[arg(short = 'F', long, value_name = "PATH")]
    pub batch_file: Option<PathBuf>,

    /// FQDN of the LDAP host
    #[arg(short = 'H', long, conflicts_with = "batch_file", required_unless_present = "batch_file")]
    pub ldap_host: Option<String>,

    /// LDAP server port
    #[arg(
        short = 'P',
        long,
        conflicts_with = "batch_file",
        required_unless_present_any = ["batch_file", "remove"]
    )]
    pub ldap_port: Option<String>,

    /// Pod the check should originate from
    #[arg(
        short = 'p',
        long,
        conflicts_with = "batch_file",
        required_unless_present_any = ["batch_file", "remove"]
    )]
    pub pod: Option<String>,

    #[arg(short = 'U', long, default_value = DEFAULT_LDAP_USER)]
    pub ldap_user: String,

    #[arg(short = 'w', long, default_value = DEFAULT_LDAP_PASSWORD)]
    pub ldap_password: String,

    /// LDAP directory base
    #[arg(short = 'B', long, default_value = DEFAULT_LDAP_BASE)]
    pub ldap_base: String,

    #[arg(short = 'f', long, default_value = DEFAULT_LDAP_FILTER)]
    pub ldap_filter: String,

    /// Search attribute compared by the check
    #[arg(short = 'a', long, default_value = DEFAULT_SEARCH_ATTRIBUTE)]
    pub ldap_search_attrib: String,

    /// none, development, test, staging, production or mc (required with -F)
    #[arg(short = 'l', long)]
    pub lifecycle: Option<String>,

    /// Two digit OTES entity number, e.g. 07, 05, 11
    #[arg(short = 'e', long, required_unless_present = "remove")]
    pub entity_number: Option<String>,

    /// OEM group to add the target to; an empty value skips grouping
    #[arg(short = 'g', long, default_value = DEFAULT_GROUP)]
    pub group: String,

    /// OEM user to run the commands as (required with -F, defaults to $USER)
    #[arg(short = 'L', long)]
    pub em_login: Option<String>,

    /// Configuration file to use instead of searching the default locations
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Delete the host's LDAP target instead of creating it
    #[arg(long, conflicts_with = "batch_file")]
    pub remove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Batch {
        path: PathBuf,
        lifecycle: String,
        entity_number: String,
    },
    Single {
        host: String,
        port: String,
        pod: String,
        lifecycle: String,
        entity_number: String,
    },
    Remove {
        host: String,
    },
}

/// A parsed command line with mode-specific requirements already checked.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub config: Option<PathBuf>,
    pub em_login: String,
    pub ldap: LdapSettings,
    pub group: Option<String>,
    pub mode: Mode,
}

impl Cli {
    pub fn into_invocation(self) -> Result<Invocation, clap::Error> {
        let ldap = LdapSettings {
            user: self.ldap_user,
            password: self.ldap_password,
            base: self.ldap_base,
            filter: self.ldap_filter,
            search_attribute: self.ldap_search_attrib,
        };
        let group = Some(self.group.trim().to_string()).filter(|group| !group.is_empty());

        let (mode, em_login) = if let Some(path) = self.batch_file {
            let mode = Mode::Batch {
                path,
                lifecycle: self
                    .lifecycle
                    .ok_or_else(|| missing("--lifecycle <LIFECYCLE>", "batch mode"))?,
                entity_number: self
                    .entity_number
                    .ok_or_else(|| missing("--entity-number <ENTITY_NUMBER>", "batch mode"))?,
            };
            let em_login = self
                .em_login
                .ok_or_else(|| missing("--em-login <EM_LOGIN>", "batch mode"))?;
            (mode, em_login)
        } else {
            let host = self
                .ldap_host
                .ok_or_else(|| missing("--ldap-host <LDAP_HOST>", "interactive mode"))?;
            let mode = if self.remove {
                Mode::Remove { host }
            } else {
                Mode::Single {
                    host,
                    port: self
                        .ldap_port
                        .ok_or_else(|| missing("--ldap-port <LDAP_PORT>", "interactive mode"))?,
                    pod: self
                        .pod
                        .ok_or_else(|| missing("--pod <POD>", "interactive mode"))?,
                    lifecycle: self
                        .lifecycle
                        .unwrap_or_else(|| DEFAULT_LIFECYCLE.to_string()),
                    entity_number: self.entity_number.ok_or_else(|| {
                        missing("--entity-number <ENTITY_NUMBER>", "interactive mode")
                    })?,
                }
            };
            let em_login = self
                .em_login
                .or_else(|| env::var("USER").ok())
                .filter(|login| !login.trim().is_empty())
                .ok_or_else(|| missing("--em-login <EM_LOGIN>", "interactive mode"))?;
            (mode, em_login)
        };

        Ok(Invocation {
            config: self.config,
            em_login,
            ldap,
            group,
            mode,
        })
    }
}

fn missing(argument: &str, mode: &str) -> clap::Error {
    Cli::command().error(
        ErrorKind::MissingRequiredArgument,
        format!("{argument} is required in {mode}"),
    )
}
