// Secret reference grammar
//
//   [ws] service [ "(" profile [ "," [region] ] ")" ] ":" parameter [ "::" jsonPath ]
//
// - service: `ssm` | `secretsmanager` (case-insensitive)
// - profile / region / jsonPath: independently optional
// - parameter: greedy, runs up to the LAST `::` (if any)
//
// `regex` has no look-ahead, so the prefix is matched declaratively and the parameter/jsonPath
// split is done on the remaining text.

use regex::Regex;
use std::fmt;
use thiserror::Error;

const REFERENCE_PATTERN: &str = r"(?ix)
    ^\s*
    (?P<service>ssm|secretsmanager)
    (?:
        \(\s*
        (?P<profile>[A-Za-z0-9_-]+)\s*
        (?:,\s*(?P<region>[A-Za-z0-9_-]+)?\s*)?
        \)\s*
    )?
    :\s*
    (?P<rest>.*)
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretService {
    Ssm,
    SecretsManager,
}

impl SecretService {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "ssm" => Some(SecretService::Ssm),
            "secretsmanager" => Some(SecretService::SecretsManager),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecretService::Ssm => "ssm",
            SecretService::SecretsManager => "secretsmanager",
        }
    }
}

impl fmt::Display for SecretService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub service: SecretService,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub parameter: String,
    pub json_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("missing parameter name after '{0}:'")]
    MissingParameter(String),
    #[error("unknown secret service '{0}'")]
    UnknownService(String),
}

/// Compiled reference grammar. Build once per resolver.
#[derive(Debug, Clone)]
pub struct ReferenceGrammar {
    pattern: Regex,
}

impl ReferenceGrammar {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(REFERENCE_PATTERN)?,
        })
    }

    /// `Ok(None)` means the value is a literal.
    pub fn parse(&self, raw: &str) -> Result<Option<SecretReference>, ReferenceError> {
        let Some(caps) = self.pattern.captures(raw) else {
            return Ok(None);
        };

        let service_token = caps.name("service").map(|m| m.as_str()).unwrap_or_default();
        let service = SecretService::from_token(service_token)
            .ok_or_else(|| ReferenceError::UnknownService(service_token.to_string()))?;

        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or_default();
        let (parameter, json_path) = split_parameter(rest);
        let parameter = parameter.trim_end();
        if parameter.trim().is_empty() {
            return Err(ReferenceError::MissingParameter(service.to_string()));
        }

        Ok(Some(SecretReference {
            service,
            profile: caps.name("profile").map(|m| m.as_str().to_string()),
            region: caps.name("region").map(|m| m.as_str().to_string()),
            parameter: parameter.to_string(),
            json_path: json_path
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }))
    }
}

/// Split at the last `::` that has at least one parameter character before it.
fn split_parameter(rest: &str) -> (&str, Option<&str>) {
    match rest.rfind("::") {
        Some(idx) if idx > 0 => (&rest[..idx], Some(&rest[idx + 2..])),
        _ => (rest, None),
    }
}
