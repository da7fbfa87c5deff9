//! Context namespaces and qualified subject names
//!
//! A context is a top-level namespace scoping ids, subjects, versions,
//! configs, and modes. Subjects may carry their context inline using the
//! qualified form `:<context>:<subject>`, where the context name itself
//! begins with a dot.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RegistryError, Result};

/// The default context
pub const DEFAULT_CONTEXT: &str = ".";

/// Reserved context, rejected as a write target for data operations
pub const GLOBAL_CONTEXT: &str = "__GLOBAL";

static QUALIFIED_SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:(\.[^:]*):(.*)$").expect("qualified subject pattern"));

/// A subject name resolved to its owning context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedSubject {
    pub context: String,
    pub subject: String,
}

impl QualifiedSubject {
    /// Split a possibly qualified subject name, applying the routing
    /// precedence: inline qualifier, then the request context, then the
    /// default context.
    pub fn resolve(raw: &str, request_context: Option<&str>) -> Result<QualifiedSubject> {
        if let Some(caps) = QUALIFIED_SUBJECT.captures(raw) {
            let context = caps.get(1).map(|m| m.as_str()).unwrap_or(DEFAULT_CONTEXT);
            let subject = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            validate_subject(subject)?;
            return Ok(QualifiedSubject {
                context: context.to_string(),
                subject: subject.to_string(),
            });
        }
        validate_subject(raw)?;
        let context = match request_context {
            Some(ctx) if !ctx.is_empty() => {
                validate_context(ctx)?;
                ctx.to_string()
            }
            _ => DEFAULT_CONTEXT.to_string(),
        };
        Ok(QualifiedSubject {
            context,
            subject: raw.to_string(),
        })
    }
}

impl std::fmt::Display for QualifiedSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.context == DEFAULT_CONTEXT {
            write!(f, "{}", self.subject)
        } else {
            write!(f, ":{}:{}", self.context, self.subject)
        }
    }
}

/// Validate a bare (unqualified) subject name
pub fn validate_subject(subject: &str) -> Result<()> {
    if subject.is_empty() {
        return Err(RegistryError::invalid_schema("subject name is empty"));
    }
    if subject.contains(':') {
        return Err(RegistryError::invalid_schema(format!(
            "subject name '{subject}' contains ':'"
        )));
    }
    if subject.chars().any(|c| c.is_control()) {
        return Err(RegistryError::invalid_schema(format!(
            "subject name '{subject}' contains control characters"
        )));
    }
    Ok(())
}

/// Validate a context name carried out-of-band on a request
pub fn validate_context(context: &str) -> Result<()> {
    if context == DEFAULT_CONTEXT || context == GLOBAL_CONTEXT {
        return Ok(());
    }
    if !context.starts_with('.') || context.contains(':') {
        return Err(RegistryError::invalid_schema(format!(
            "invalid context name '{context}'"
        )));
    }
    Ok(())
}

/// Reject mutating data operations aimed at the reserved context
pub fn ensure_writable_context(context: &str) -> Result<()> {
    if context == GLOBAL_CONTEXT {
        return Err(RegistryError::OperationNotPermitted(format!(
            "context '{GLOBAL_CONTEXT}' is reserved"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unqualified_subject_uses_request_context() {
        let q = QualifiedSubject::resolve("orders", Some(".prod")).unwrap();
        assert_eq!(q.context, ".prod");
        assert_eq!(q.subject, "orders");
    }

    #[test]
    fn unqualified_subject_defaults() {
        let q = QualifiedSubject::resolve("orders", None).unwrap();
        assert_eq!(q.context, DEFAULT_CONTEXT);
    }

    #[test]
    fn qualified_subject_overrides_request_context() {
        let q = QualifiedSubject::resolve(":.prod:orders", Some(".stage")).unwrap();
        assert_eq!(q.context, ".prod");
        assert_eq!(q.subject, "orders");
        assert_eq!(q.to_string(), ":.prod:orders");
    }

    #[test]
    fn default_context_round_trips_bare() {
        let q = QualifiedSubject::resolve(":.:orders", None).unwrap();
        assert_eq!(q.context, DEFAULT_CONTEXT);
        assert_eq!(q.to_string(), "orders");
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert!(QualifiedSubject::resolve("", None).is_err());
        assert!(QualifiedSubject::resolve("a:b", None).is_err());
        assert!(QualifiedSubject::resolve(":.ctx:", None).is_err());
        assert!(validate_context("prod").is_err());
    }

    #[test]
    fn reserved_context_is_not_writable() {
        assert!(ensure_writable_context(GLOBAL_CONTEXT).is_err());
        assert!(ensure_writable_context(".prod").is_ok());
        assert!(ensure_writable_context(DEFAULT_CONTEXT).is_ok());
    }
}
