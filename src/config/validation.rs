//! Engine configuration validation.
//!
//! # Responsibilities
//! - Structural parsing of the engine's YAML configuration
//! - Semantic checks on the fields the engine would refuse at load time
//! - Extraction of the control-plane address and secret
//!
//! # Design Decisions
//! - Returns all semantic errors, not just the first
//! - Validation is a pure function: text → Result<ValidatedConfig, ValidationError>
//! - A failed strict check is retried once on the auto-fixed text

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::config::autofix::autofix;

/// Controller address the engine uses when the config names none.
pub const DEFAULT_CONTROLLER: &str = "127.0.0.1:9090";

/// Address of the engine's control-plane API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlAddress {
    pub host: String,
    pub port: u16,
}

impl ControlAddress {
    /// Parse `host:port`, dialing loopback when the host is unspecified.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| format!("'{s}' is not host:port"))?;

        let port: u16 = port
            .parse()
            .map_err(|_| format!("'{s}' has an invalid port"))?;
        if port == 0 {
            return Err(format!("'{s}' has port 0"));
        }

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.contains('/') {
            return Err(format!("'{s}' is not host:port"));
        }
        let host = match host {
            "" | "0.0.0.0" | "::" => "127.0.0.1",
            other => other,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Base URL for control requests, e.g. `http://127.0.0.1:9090`.
    pub fn base_url(&self) -> String {
        format!("http://{self}")
    }
}

impl Default for ControlAddress {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9090,
        }
    }
}

impl fmt::Display for ControlAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// The part of an engine configuration the supervisor acts on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedConfig {
    pub controller: ControlAddress,
    /// Control-plane secret, possibly empty.
    pub secret: String,
}

/// A configuration that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    pub parsed: ParsedConfig,
    /// Text to persist; differs from the input when auto-fix was needed.
    pub text: String,
    pub fixed: bool,
}

/// A single semantic problem, tied to a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur during validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("configuration is empty")]
    Empty,

    #[error("configuration root must be a mapping")]
    NotMapping,

    /// YAML syntax or type error; location is 1-based when known.
    #[error("{message}")]
    Syntax {
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error("{}", join_fields(.0))]
    Invalid(Vec<FieldError>),
}

impl ValidationError {
    fn from_yaml(err: serde_yaml::Error) -> Self {
        let location = err.location();
        ValidationError::Syntax {
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
            message: err.to_string(),
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    let mut out = String::from("Validation failed: ");
    for (i, err) in errors.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&err.to_string());
    }
    out
}

#[derive(Debug, Deserialize)]
struct EngineDocument {
    #[serde(rename = "external-controller", default)]
    external_controller: Option<String>,

    #[serde(default, deserialize_with = "scalar_string")]
    secret: Option<String>,

    #[serde(default)]
    port: Option<u16>,

    #[serde(rename = "socks-port", default)]
    socks_port: Option<u16>,

    #[serde(rename = "redir-port", default)]
    redir_port: Option<u16>,

    #[serde(rename = "tproxy-port", default)]
    tproxy_port: Option<u16>,

    #[serde(rename = "mixed-port", default)]
    mixed_port: Option<u16>,

    #[serde(default)]
    proxies: Option<Vec<NamedEntry>>,

    #[serde(rename = "proxy-groups", default)]
    proxy_groups: Option<Vec<NamedEntry>>,

    #[serde(default)]
    rules: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(D::Error::custom("secret must be a scalar")),
    }
}

/// Validate a raw configuration text, auto-fixing it if the strict check fails.
pub fn validate(text: &str) -> Result<ValidatedConfig, ValidationError> {
    let strict = match check(text) {
        Ok(parsed) => {
            return Ok(ValidatedConfig {
                parsed,
                text: text.to_string(),
                fixed: false,
            })
        }
        Err(e) => e,
    };

    let fixed = autofix(text);
    if fixed == text {
        return Err(strict);
    }

    let parsed = check(&fixed)?;
    tracing::debug!(error = %strict, "Configuration accepted after auto-fix");
    Ok(ValidatedConfig {
        parsed,
        text: fixed,
        fixed: true,
    })
}

/// Strict structural and semantic check, without auto-fix.
pub fn check(text: &str) -> Result<ParsedConfig, ValidationError> {
    let mut root: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(ValidationError::from_yaml)?;
    match root {
        serde_yaml::Value::Null => return Err(ValidationError::Empty),
        serde_yaml::Value::Mapping(ref m) if m.is_empty() => return Err(ValidationError::Empty),
        serde_yaml::Value::Mapping(_) => {}
        _ => return Err(ValidationError::NotMapping),
    }

    // The engine resolves `<<: *anchor` merge keys, so check the merged document.
    root.apply_merge().map_err(ValidationError::from_yaml)?;
    let doc: EngineDocument = serde_yaml::from_value(root).map_err(ValidationError::from_yaml)?;

    let mut errors = Vec::new();

    let controller = match doc.external_controller.as_deref().map(str::trim) {
        None | Some("") => ControlAddress::default(),
        Some(addr) => ControlAddress::parse(addr).unwrap_or_else(|message| {
            errors.push(FieldError {
                field: "external-controller".to_string(),
                message,
            });
            ControlAddress::default()
        }),
    };

    let ports = [
        ("port", doc.port),
        ("socks-port", doc.socks_port),
        ("redir-port", doc.redir_port),
        ("tproxy-port", doc.tproxy_port),
        ("mixed-port", doc.mixed_port),
    ];
    let mut seen_ports = HashSet::new();
    for (field, port) in ports {
        if let Some(port) = port.filter(|p| *p != 0) {
            if !seen_ports.insert(port) {
                errors.push(FieldError {
                    field: field.to_string(),
                    message: format!("port {port} is already used by another listener"),
                });
            }
        }
    }

    let proxy_names = check_entries("proxies", doc.proxies.as_deref(), &HashSet::new(), &mut errors);
    check_entries("proxy-groups", doc.proxy_groups.as_deref(), &proxy_names, &mut errors);

    if let Some(rules) = &doc.rules {
        for (i, rule) in rules.iter().enumerate() {
            if rule.trim().is_empty() {
                errors.push(FieldError {
                    field: format!("rules[{i}]"),
                    message: "rule is empty".to_string(),
                });
            }
        }
    }

    if !errors.is_empty() {
        return Err(ValidationError::Invalid(errors));
    }

    Ok(ParsedConfig {
        controller,
        secret: doc.secret.unwrap_or_default(),
    })
}

fn check_entries(
    field: &str,
    entries: Option<&[NamedEntry]>,
    taken: &HashSet<String>,
    errors: &mut Vec<FieldError>,
) -> HashSet<String> {
    let mut names = HashSet::new();
    for (i, entry) in entries.unwrap_or_default().iter().enumerate() {
        let path = format!("{field}[{i}]");
        if entry.name.trim().is_empty() {
            errors.push(FieldError {
                field: format!("{path}.name"),
                message: "name is empty".to_string(),
            });
        } else if taken.contains(&entry.name) || !names.insert(entry.name.clone()) {
            errors.push(FieldError {
                field: format!("{path}.name"),
                message: format!("duplicate name '{}'", entry.name),
            });
        }
        if entry.kind.trim().is_empty() {
            errors.push(FieldError {
                field: format!("{path}.type"),
                message: "type is empty".to_string(),
            });
        }
    }
    names
}
