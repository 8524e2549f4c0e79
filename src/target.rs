//! Table Targets and Table Metadata

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AdapterError;

/// A possibly partially qualified table name: `catalog.schema.name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Presto catalog
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
}

impl Target {
    pub fn new(database: impl Into<String>, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Target {
            database: Some(database.into()),
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Unqualified name, resolved against the session's catalog and schema
    pub fn unqualified(name: impl Into<String>) -> Self {
        Target {
            database: None,
            schema: None,
            name: name.into(),
        }
    }

    /// Dotted name, leaving out missing parts
    pub fn resolve(&self) -> String {
        let mut resolved = String::new();
        for part in [&self.database, &self.schema].into_iter().flatten() {
            resolved.push_str(part);
            resolved.push('.');
        }
        resolved.push_str(&self.name);
        resolved
    }

    /// Dotted name requiring all three parts
    pub fn fully_qualified(&self) -> Result<String, AdapterError> {
        match (&self.database, &self.schema) {
            (Some(database), Some(schema)) => Ok(format!("{database}.{schema}.{}", self.name)),
            _ => Err(AdapterError::InvalidTarget(format!(
                "'{}' must name a catalog and a schema",
                self.resolve()
            ))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resolve())
    }
}

impl FromStr for Target {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(AdapterError::InvalidTarget(format!("empty name component in '{s}'")));
        }
        match parts.as_slice() {
            [name] => Ok(Target::unqualified(*name)),
            [schema, name] => Ok(Target {
                database: None,
                schema: Some((*schema).to_string()),
                name: (*name).to_string(),
            }),
            [database, schema, name] => Ok(Target::new(*database, *schema, *name)),
            _ => Err(AdapterError::InvalidTarget(format!(
                "'{s}' has more than three name components"
            ))),
        }
    }
}

/// One column of a described table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Result of `describe`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub target: Target,
    pub fields: Vec<Field>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_omits_missing_parts() {
        assert_eq!(Target::new("hive", "web", "events").resolve(), "hive.web.events");
        assert_eq!(Target::unqualified("events").resolve(), "events");
        let schema_only = Target {
            database: None,
            schema: Some("web".into()),
            name: "events".into(),
        };
        assert_eq!(schema_only.to_string(), "web.events");
    }

    #[test]
    fn test_fully_qualified_requires_catalog_and_schema() {
        assert_eq!(
            Target::new("hive", "web", "events").fully_qualified().unwrap(),
            "hive.web.events"
        );
        assert!(matches!(
            Target::unqualified("events").fully_qualified(),
            Err(AdapterError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_parse_target() {
        assert_eq!("a.b.c".parse::<Target>().unwrap(), Target::new("a", "b", "c"));
        assert_eq!("c".parse::<Target>().unwrap(), Target::unqualified("c"));
        let two: Target = "b.c".parse().unwrap();
        assert_eq!(two.schema.as_deref(), Some("b"));
        assert!(two.database.is_none());
        assert!("a..c".parse::<Target>().is_err());
        assert!("a.b.c.d".parse::<Target>().is_err());
    }
}
