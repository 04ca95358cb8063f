//! LDAP generic-service template assembly
//!
//! Builds the `transaction-template` document the monitoring platform imports
//! when a generic service is created. Only seven fields are templated; every
//! timeout, retry count and threshold is fixed.

use std::{borrow::Cow, io::Write};

use quick_xml::{
    escape::escape,
    events::{attributes::Attribute, BytesEnd, BytesStart, Event},
    name::QName,
    Writer,
};
use tempfile::NamedTempFile;

use crate::errors::TemplateError;

// Misspelled in the importer's vocabulary; must stay as-is.
pub const TEMPLATE_TYPE: &str = "generic_serivce";
pub const TEMPLATE_NAMESPACE: &str = "template";
pub const PASSWORD_VARIABLE: &str = "PASSWORD1";
pub const MASKED_PASSWORD: &str = "XXXXXX";
pub const TRANSACTION_NAME: &str = "LDAP_test";
pub const THRESHOLD_METRIC: &str = "ldap_response";
pub const THRESHOLD_COLUMNS: [&str; 6] = [
    "AddressingSearch",
    "BaseSearch",
    "CompareOp",
    "ConnectionTime",
    "MessagingSearch",
    "status",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapCheck {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub base: String,
    pub filter: String,
    pub search_attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    /// Numeric in the importer's eyes; carried verbatim and never parsed here.
    Numeric(String),
}

impl PropertyValue {
    fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    fn numeric(value: &str) -> Self {
        Self::Numeric(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(value) | Self::Numeric(value) => value,
        }
    }

    fn attribute_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "string_value",
            Self::Numeric(_) => "num_value",
        }
    }

    fn prop_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "1",
            Self::Numeric(_) => "2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionProperty {
    pub name: &'static str,
    pub value: PropertyValue,
    pub encrypt: bool,
}

impl TransactionProperty {
    fn plain(name: &'static str, value: PropertyValue) -> Self {
        Self {
            name,
            value,
            encrypt: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdRule {
    pub metric_column: &'static str,
    pub warning_threshold: &'static str,
    pub warning_operator: u8,
    pub critical_threshold: &'static str,
    pub critical_operator: u8,
    pub num_occurrences: u32,
}

impl ThresholdRule {
    fn response_time(metric_column: &'static str) -> Self {
        Self {
            metric_column,
            warning_threshold: "2000.0",
            warning_operator: 0,
            critical_threshold: "4000.0",
            critical_operator: 0,
            num_occurrences: 1,
        }
    }

    fn status() -> Self {
        Self {
            metric_column: "status",
            warning_threshold: "0.0",
            warning_operator: 1,
            critical_threshold: "0.0",
            critical_operator: 1,
            num_occurrences: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTemplate {
    pub properties: Vec<TransactionProperty>,
    pub thresholds: Vec<ThresholdRule>,
}

impl ServiceTemplate {
    pub fn build(check: &LdapCheck) -> Self {
        let properties = vec![
            TransactionProperty::plain(
                "ldap_attrvalue",
                PropertyValue::text(&check.search_attribute),
            ),
            TransactionProperty::plain("Collection Interval", PropertyValue::numeric("5.0")),
            TransactionProperty::plain("connection", PropertyValue::text("plain")),
            TransactionProperty::plain("ldap_timeout", PropertyValue::numeric("60.0")),
            TransactionProperty::plain("ldap_base", PropertyValue::text(&check.base)),
            TransactionProperty::plain("ldap_port", PropertyValue::numeric(&check.port)),
            TransactionProperty::plain("retryinterval", PropertyValue::numeric("5.0")),
            TransactionProperty::plain("ldap_filter", PropertyValue::text(&check.filter)),
            TransactionProperty::plain("ldap_attrname", PropertyValue::text("uid")),
            TransactionProperty::plain("numretries", PropertyValue::numeric("6.0")),
            TransactionProperty::plain("ldap_user_name", PropertyValue::text(&check.user)),
            TransactionProperty {
                name: "ldap_password",
                value: PropertyValue::text(&check.password),
                encrypt: true,
            },
            TransactionProperty::plain("ldap_address", PropertyValue::text(&check.host)),
            TransactionProperty::plain("secure_auth", PropertyValue::text("server")),
        ];

        let thresholds = THRESHOLD_COLUMNS
            .iter()
            .map(|column| match *column {
                "status" => ThresholdRule::status(),
                other => ThresholdRule::response_time(other),
            })
            .collect();

        Self {
            properties,
            thresholds,
        }
    }

    pub fn to_xml(&self) -> Result<String, TemplateError> {
        let mut out = TemplateWriter::new();

        out.start(
            "transaction-template",
            &[
                ("template_type", TEMPLATE_TYPE),
                ("xmlns", TEMPLATE_NAMESPACE),
            ],
        )?;

        out.start("variables", &[])?;
        out.empty(
            "variable",
            &[("name", PASSWORD_VARIABLE), ("value", MASKED_PASSWORD)],
        )?;
        out.end("variables")?;

        out.start("transactions", &[])?;
        out.start("mgmt_bcn_transaction", &[])?;

        out.start("mgmt_bcn_txn_with_props", &[])?;
        out.empty(
            "mgmt_bcn_txn",
            &[
                ("is_representative", "true"),
                ("name", TRANSACTION_NAME),
                ("monitoring", "true"),
                ("txn_type", "LDAP"),
            ],
        )?;
        out.start("properties", &[])?;
        for property in &self.properties {
            out.empty(
                "property",
                &[
                    ("name", property.name),
                    (property.value.attribute_name(), property.value.as_str()),
                    ("prop_type", property.value.prop_type()),
                    ("encrypt", if property.encrypt { "true" } else { "false" }),
                ],
            )?;
        }
        out.end("properties")?;
        out.end("mgmt_bcn_txn_with_props")?;

        out.empty("steps_defn_with_props", &[])?;
        out.empty("stepgroups_defn", &[])?;

        out.start("txn_thresholds", &[])?;
        for rule in &self.thresholds {
            let warning_operator = rule.warning_operator.to_string();
            let critical_operator = rule.critical_operator.to_string();
            let num_occurrences = rule.num_occurrences.to_string();
            out.start(
                "mgmt_bcn_threshold",
                &[
                    ("warning_threshold", rule.warning_threshold),
                    ("warning_operator", warning_operator.as_str()),
                    ("critical_threshold", rule.critical_threshold),
                    ("critical_operator", critical_operator.as_str()),
                    ("num_occurrences", num_occurrences.as_str()),
                ],
            )?;
            // `netric_name` is the importer's spelling.
            out.empty(
                "mgmt_bcn_threshold_key",
                &[
                    ("netric_name", THRESHOLD_METRIC),
                    ("metric_column", rule.metric_column),
                ],
            )?;
            out.end("mgmt_bcn_threshold")?;
        }
        out.end("txn_thresholds")?;

        out.empty("step_thresholds", &[])?;
        out.empty("stepgroup_thresholds", &[])?;

        out.end("mgmt_bcn_transaction")?;
        out.end("transactions")?;
        out.end("transaction-template")?;

        out.finish()
    }

    /// Renders the template into a temporary file that is removed when the
    /// returned handle is dropped.
    pub fn write_temp(&self) -> Result<NamedTempFile, TemplateError> {
        let xml = self.to_xml()?;
        let mut file = tempfile::Builder::new()
            .prefix("ldap_target_")
            .suffix(".xml")
            .tempfile()?;
        file.write_all(xml.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

struct TemplateWriter {
    writer: Writer<Vec<u8>>,
}

impl TemplateWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), TemplateError> {
        let element = element(name, attributes);
        self.writer
            .write_event(Event::Start(element))
            .map_err(render_error)
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), TemplateError> {
        let element = element(name, attributes);
        self.writer
            .write_event(Event::Empty(element))
            .map_err(render_error)
    }

    fn end(&mut self, name: &str) -> Result<(), TemplateError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(render_error)
    }

    fn finish(self) -> Result<String, TemplateError> {
        String::from_utf8(self.writer.into_inner()).map_err(render_error)
    }
}

fn element<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut element = BytesStart::new(name);
    for &(key, value) in attributes {
        element.push_attribute(Attribute {
            key: QName(key.as_bytes()),
            value: Cow::Owned(escape_attribute(value).into_bytes()),
        });
    }
    element
}

/// Markup escaping plus character references for tab, newline and carriage
/// return, which parsers would otherwise normalise to spaces.
fn escape_attribute(value: &str) -> String {
    let escaped = escape(value);
    let mut out = String::with_capacity(escaped.len());
    for character in escaped.chars() {
        match character {
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            other => out.push(other),
        }
    }
    out
}

fn render_error(err: impl std::fmt::Display) -> TemplateError {
    TemplateError::Render(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use quick_xml::{events::Event, Reader};

    use super::*;

    fn sample_check() -> LdapCheck {
        LdapCheck {
            user: "cn=monitor,cn=Users,dc=example,dc=com".to_string(),
            password: "s3cret".to_string(),
            host: "ldap01.example.com".to_string(),
            port: "3060".to_string(),
            base: "cn=monitor,cn=Users,dc=example,dc=com".to_string(),
            filter: "cn=monitor".to_string(),
            search_attribute: "Obiee_Auth".to_string(),
        }
    }

    #[derive(Debug, Default)]
    struct ParsedTemplate {
        root: BTreeMap<String, String>,
        variables: Vec<BTreeMap<String, String>>,
        properties: Vec<BTreeMap<String, String>>,
        thresholds: Vec<BTreeMap<String, String>>,
        threshold_keys: Vec<BTreeMap<String, String>>,
    }

    fn parse(xml: &str) -> ParsedTemplate {
        let mut reader = Reader::from_str(xml);
        let mut parsed = ParsedTemplate::default();

        loop {
            match reader.read_event().expect("well-formed xml") {
                Event::Start(element) | Event::Empty(element) => {
                    let attributes = element
                        .attributes()
                        .map(|attribute| {
                            let attribute = attribute.expect("valid attribute");
                            (
                                String::from_utf8(attribute.key.as_ref().to_vec())
                                    .expect("utf8 key"),
                                attribute.unescape_value().expect("unescape").into_owned(),
                            )
                        })
                        .collect::<BTreeMap<_, _>>();

                    match element.name().as_ref() {
                        b"transaction-template" => parsed.root = attributes,
                        b"variable" => parsed.variables.push(attributes),
                        b"property" => parsed.properties.push(attributes),
                        b"mgmt_bcn_threshold" => parsed.thresholds.push(attributes),
                        b"mgmt_bcn_threshold_key" => parsed.threshold_keys.push(attributes),
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        parsed
    }

    fn property<'a>(parsed: &'a ParsedTemplate, name: &str) -> &'a BTreeMap<String, String> {
        parsed
            .properties
            .iter()
            .find(|property| property.get("name").map(String::as_str) == Some(name))
            .unwrap_or_else(|| panic!("missing property {name}"))
    }

    #[test]
    fn builds_fourteen_properties_and_six_thresholds() {
        let template = ServiceTemplate::build(&sample_check());

        assert_eq!(template.properties.len(), 14);
        assert_eq!(template.thresholds.len(), 6);

        let columns = template
            .thresholds
            .iter()
            .map(|rule| rule.metric_column)
            .collect::<Vec<_>>();
        assert_eq!(columns, THRESHOLD_COLUMNS.to_vec());
    }

    #[test]
    fn only_password_is_encrypted() {
        let template = ServiceTemplate::build(&sample_check());
        let encrypted = template
            .properties
            .iter()
            .filter(|property| property.encrypt)
            .map(|property| property.name)
            .collect::<Vec<_>>();
        assert_eq!(encrypted, vec!["ldap_password"]);
    }

    #[test]
    fn status_threshold_uses_inverted_operator() {
        let template = ServiceTemplate::build(&sample_check());
        let status = template
            .thresholds
            .iter()
            .find(|rule| rule.metric_column == "status")
            .expect("status rule");
        assert_eq!(status.warning_threshold, "0.0");
        assert_eq!(status.warning_operator, 1);
        assert_eq!(status.critical_operator, 1);

        let connection = template
            .thresholds
            .iter()
            .find(|rule| rule.metric_column == "ConnectionTime")
            .expect("connection rule");
        assert_eq!(connection.warning_threshold, "2000.0");
        assert_eq!(connection.critical_threshold, "4000.0");
        assert_eq!(connection.num_occurrences, 1);
    }

    #[test]
    fn rendering_is_deterministic() {
        let first = ServiceTemplate::build(&sample_check()).to_xml().expect("render");
        let second = ServiceTemplate::build(&sample_check()).to_xml().expect("render");
        assert_eq!(first, second);
    }

    #[test]
    fn rendered_document_has_expected_shape() {
        let xml = ServiceTemplate::build(&sample_check()).to_xml().expect("render");
        assert!(xml.starts_with("<transaction-template "));
        assert!(!xml.starts_with("<?xml"));

        let parsed = parse(&xml);
        assert_eq!(parsed.root.get("template_type").map(String::as_str), Some("generic_serivce"));
        assert_eq!(parsed.root.get("xmlns").map(String::as_str), Some("template"));

        assert_eq!(parsed.variables.len(), 1);
        assert_eq!(parsed.variables[0].get("name").map(String::as_str), Some("PASSWORD1"));
        assert_eq!(parsed.variables[0].get("value").map(String::as_str), Some("XXXXXX"));

        assert_eq!(parsed.properties.len(), 14);
        assert_eq!(parsed.thresholds.len(), 6);
        assert_eq!(parsed.threshold_keys.len(), 6);
        assert!(parsed
            .threshold_keys
            .iter()
            .all(|key| key.get("netric_name").map(String::as_str) == Some("ldap_response")));

        let password = property(&parsed, "ldap_password");
        assert_eq!(password.get("encrypt").map(String::as_str), Some("true"));
        assert_eq!(password.get("prop_type").map(String::as_str), Some("1"));

        let timeout = property(&parsed, "ldap_timeout");
        assert_eq!(timeout.get("num_value").map(String::as_str), Some("60.0"));
        assert_eq!(timeout.get("prop_type").map(String::as_str), Some("2"));
        assert!(timeout.get("string_value").is_none());
    }

    #[test]
    fn substituted_fields_round_trip() {
        let check = LdapCheck {
            filter: "(&(objectClass=person)(cn=a<b>\"c\"))".to_string(),
            password: "p&ss'word".to_string(),
            ..sample_check()
        };
        let xml = ServiceTemplate::build(&check).to_xml().expect("render");
        let parsed = parse(&xml);

        let expectations = [
            ("ldap_attrvalue", "string_value", check.search_attribute.as_str()),
            ("ldap_base", "string_value", check.base.as_str()),
            ("ldap_port", "num_value", check.port.as_str()),
            ("ldap_filter", "string_value", check.filter.as_str()),
            ("ldap_user_name", "string_value", check.user.as_str()),
            ("ldap_password", "string_value", check.password.as_str()),
            ("ldap_address", "string_value", check.host.as_str()),
        ];

        for (name, attribute, expected) in expectations {
            assert_eq!(
                property(&parsed, name).get(attribute).map(String::as_str),
                Some(expected),
                "{name}"
            );
        }
    }

    #[test]
    fn whitespace_controls_in_values_survive_parsing() {
        let check = LdapCheck {
            filter: "a\nb\tc".to_string(),
            password: "line1\r\nline2 & more".to_string(),
            ..sample_check()
        };
        let xml = ServiceTemplate::build(&check).to_xml().expect("render");

        assert!(xml.contains(r#"string_value="a&#10;b&#9;c""#));
        assert!(!xml.contains("a\nb"));

        let parsed = parse(&xml);
        assert_eq!(
            property(&parsed, "ldap_filter").get("string_value").map(String::as_str),
            Some("a\nb\tc")
        );
        assert_eq!(
            property(&parsed, "ldap_password").get("string_value").map(String::as_str),
            Some("line1\r\nline2 & more")
        );
    }

    #[test]
    fn non_numeric_port_passes_through() {
        let check = LdapCheck {
            port: "not-a-port".to_string(),
            ..sample_check()
        };
        let parsed = parse(&ServiceTemplate::build(&check).to_xml().expect("render"));
        assert_eq!(
            property(&parsed, "ldap_port").get("num_value").map(String::as_str),
            Some("not-a-port")
        );
    }

    #[test]
    fn temp_file_holds_rendering_and_is_removed_on_drop() {
        let template = ServiceTemplate::build(&sample_check());
        let file = template.write_temp().expect("temp file");
        let path = file.path().to_path_buf();

        let contents = std::fs::read_to_string(&path).expect("read temp file");
        assert_eq!(contents, template.to_xml().expect("render"));
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("xml"));

        drop(file);
        assert!(!path.exists());
    }
}
