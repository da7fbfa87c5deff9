//! Core type definitions

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RegistryError;

/// Schema identifier: positive, unique within a context
pub type SchemaId = i64;

/// Serialization format of a registered schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    /// Apache Avro, the default when a request omits the type
    #[default]
    Avro,
    /// JSON Schema
    Json,
    /// Protocol Buffers
    Protobuf,
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaType::Avro => write!(f, "AVRO"),
            SchemaType::Json => write!(f, "JSON"),
            SchemaType::Protobuf => write!(f, "PROTOBUF"),
        }
    }
}

impl FromStr for SchemaType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "AVRO" => Ok(SchemaType::Avro),
            "JSON" => Ok(SchemaType::Json),
            "PROTOBUF" => Ok(SchemaType::Protobuf),
            other => Err(RegistryError::InvalidSchemaType(other.to_string())),
        }
    }
}

/// Compatibility level enforced on schema evolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    /// No compatibility required
    None,
    /// New schema can read data written by the previous schema
    #[default]
    Backward,
    /// Backward against every earlier version
    BackwardTransitive,
    /// Previous schema can read data written by the new schema
    Forward,
    /// Forward against every earlier version
    ForwardTransitive,
    /// Both backward and forward
    Full,
    /// Full against every earlier version
    FullTransitive,
}

impl CompatibilityLevel {
    /// Check if this level is checked against every earlier version
    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::FullTransitive
        )
    }

    /// True when the new schema must be able to read old data
    pub fn checks_backward(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Backward
                | CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }

    /// True when old schemas must be able to read new data
    pub fn checks_forward(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Forward
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }
}

impl std::fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompatibilityLevel::None => write!(f, "NONE"),
            CompatibilityLevel::Backward => write!(f, "BACKWARD"),
            CompatibilityLevel::BackwardTransitive => write!(f, "BACKWARD_TRANSITIVE"),
            CompatibilityLevel::Forward => write!(f, "FORWARD"),
            CompatibilityLevel::ForwardTransitive => write!(f, "FORWARD_TRANSITIVE"),
            CompatibilityLevel::Full => write!(f, "FULL"),
            CompatibilityLevel::FullTransitive => write!(f, "FULL_TRANSITIVE"),
        }
    }
}

impl FromStr for CompatibilityLevel {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(CompatibilityLevel::None),
            "BACKWARD" => Ok(CompatibilityLevel::Backward),
            "BACKWARD_TRANSITIVE" => Ok(CompatibilityLevel::BackwardTransitive),
            "FORWARD" => Ok(CompatibilityLevel::Forward),
            "FORWARD_TRANSITIVE" => Ok(CompatibilityLevel::ForwardTransitive),
            "FULL" => Ok(CompatibilityLevel::Full),
            "FULL_TRANSITIVE" => Ok(CompatibilityLevel::FullTransitive),
            other => Err(RegistryError::InvalidCompatibilityLevel(other.to_string())),
        }
    }
}

/// Operating mode controlling which mutations a scope admits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Normal operation
    #[default]
    #[serde(rename = "READWRITE")]
    ReadWrite,
    /// All writes blocked
    #[serde(rename = "READONLY")]
    ReadOnly,
    /// All writes blocked, set by an operator above subject owners
    #[serde(rename = "READONLY_OVERRIDE")]
    ReadOnlyOverride,
    /// Only id-preserving imports admitted
    #[serde(rename = "IMPORT")]
    Import,
}

impl Mode {
    /// Whether plain (non-import) writes are admitted
    pub fn allows_writes(&self) -> bool {
        matches!(self, Mode::ReadWrite)
    }

    /// Whether id-preserving import writes are admitted
    pub fn allows_import(&self) -> bool {
        matches!(self, Mode::Import)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::ReadWrite => write!(f, "READWRITE"),
            Mode::ReadOnly => write!(f, "READONLY"),
            Mode::ReadOnlyOverride => write!(f, "READONLY_OVERRIDE"),
            Mode::Import => write!(f, "IMPORT"),
        }
    }
}

impl FromStr for Mode {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READWRITE" => Ok(Mode::ReadWrite),
            "READONLY" => Ok(Mode::ReadOnly),
            "READONLY_OVERRIDE" => Ok(Mode::ReadOnlyOverride),
            "IMPORT" => Ok(Mode::Import),
            other => Err(RegistryError::InvalidMode(other.to_string())),
        }
    }
}

/// Version selector accepted by read and delete operations
///
/// The string `"latest"` and the integer `-1` both select the highest
/// current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionSpec {
    /// Highest current version (semantics depend on `include_deleted`)
    Latest,
    /// An explicit version number
    Version(u32),
}

impl VersionSpec {
    /// Largest version number a subject may hold
    pub const MAX_VERSION: u32 = i32::MAX as u32;

    /// Build from a raw integer, accepting `-1` as latest
    pub fn from_i64(raw: i64) -> Result<Self, RegistryError> {
        match raw {
            -1 => Ok(VersionSpec::Latest),
            v if v >= 1 && v <= Self::MAX_VERSION as i64 => Ok(VersionSpec::Version(v as u32)),
            other => Err(RegistryError::InvalidVersion(other.to_string())),
        }
    }
}

impl FromStr for VersionSpec {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(VersionSpec::Latest);
        }
        let raw: i64 = s
            .parse()
            .map_err(|_| RegistryError::InvalidVersion(s.to_string()))?;
        VersionSpec::from_i64(raw)
    }
}

impl std::fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSpec::Latest => write!(f, "latest"),
            VersionSpec::Version(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_type_wire_strings() {
        assert_eq!(SchemaType::Avro.to_string(), "AVRO");
        assert_eq!(SchemaType::Json.to_string(), "JSON");
        assert_eq!(SchemaType::Protobuf.to_string(), "PROTOBUF");
        assert_eq!("".parse::<SchemaType>().unwrap(), SchemaType::Avro);
        assert!("THRIFT".parse::<SchemaType>().is_err());
    }

    #[test]
    fn compatibility_level_round_trips() {
        for s in [
            "NONE",
            "BACKWARD",
            "BACKWARD_TRANSITIVE",
            "FORWARD",
            "FORWARD_TRANSITIVE",
            "FULL",
            "FULL_TRANSITIVE",
        ] {
            assert_eq!(s.parse::<CompatibilityLevel>().unwrap().to_string(), s);
        }
        assert_eq!(CompatibilityLevel::default(), CompatibilityLevel::Backward);
    }

    #[test]
    fn transitive_levels() {
        assert!(!CompatibilityLevel::Backward.is_transitive());
        assert!(!CompatibilityLevel::Full.is_transitive());
        assert!(CompatibilityLevel::BackwardTransitive.is_transitive());
        assert!(CompatibilityLevel::ForwardTransitive.is_transitive());
        assert!(CompatibilityLevel::FullTransitive.is_transitive());
    }

    #[test]
    fn directions_per_level() {
        assert!(CompatibilityLevel::Backward.checks_backward());
        assert!(!CompatibilityLevel::Backward.checks_forward());
        assert!(CompatibilityLevel::Forward.checks_forward());
        assert!(CompatibilityLevel::Full.checks_backward());
        assert!(CompatibilityLevel::Full.checks_forward());
        assert!(!CompatibilityLevel::None.checks_backward());
        assert!(!CompatibilityLevel::None.checks_forward());
    }

    #[test]
    fn mode_wire_strings() {
        assert_eq!(Mode::ReadWrite.to_string(), "READWRITE");
        assert_eq!(Mode::ReadOnlyOverride.to_string(), "READONLY_OVERRIDE");
        assert_eq!("IMPORT".parse::<Mode>().unwrap(), Mode::Import);
        assert!("WRITEONLY".parse::<Mode>().is_err());
        assert_eq!(
            serde_json::to_string(&Mode::ReadWrite).unwrap(),
            "\"READWRITE\""
        );
    }

    #[test]
    fn version_spec_parsing() {
        assert_eq!("latest".parse::<VersionSpec>().unwrap(), VersionSpec::Latest);
        assert_eq!(VersionSpec::from_i64(-1).unwrap(), VersionSpec::Latest);
        assert_eq!("3".parse::<VersionSpec>().unwrap(), VersionSpec::Version(3));
        assert!(VersionSpec::from_i64(0).is_err());
        assert!(VersionSpec::from_i64(i64::from(i32::MAX) + 1).is_err());
    }
}
