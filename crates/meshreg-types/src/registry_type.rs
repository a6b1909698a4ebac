use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Third-party registry dialect a sidecar accepts registrations in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryType {
    Eureka,
    Consul,
}

impl RegistryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryType::Eureka => "eureka",
            RegistryType::Consul => "consul",
        }
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string did not name a supported registry dialect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown registry type '{0}'")]
pub struct ParseRegistryTypeError(pub String);

impl FromStr for RegistryType {
    type Err = ParseRegistryTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eureka" => Ok(RegistryType::Eureka),
            "consul" => Ok(RegistryType::Consul),
            _ => Err(ParseRegistryTypeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Eureka".parse::<RegistryType>(), Ok(RegistryType::Eureka));
        assert_eq!(" consul ".parse::<RegistryType>(), Ok(RegistryType::Consul));
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "zookeeper".parse::<RegistryType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown registry type 'zookeeper'");
    }

    #[test]
    fn display_matches_serde_name() {
        let json = serde_json::to_string(&RegistryType::Consul).unwrap();
        assert_eq!(json, format!("\"{}\"", RegistryType::Consul));
    }
}
