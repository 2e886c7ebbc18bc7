//! Permission domain models and wildcard pattern matching

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Permission entity: an atomic `(resource, action)` capability node in a
/// hierarchical, optionally wildcarded catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: String,
    /// Parent permission for hierarchy (optional). `parent_id == id` is a
    /// forbidden cycle and rejected on write.
    pub parent_id: Option<Uuid>,
    /// Materialized hierarchy path: `/`-joined chain of ancestor ids down to
    /// this permission's own id. Recomputed on write, never trusted alone.
    pub path: String,
    /// Depth in the hierarchy; root permissions are level 0.
    pub level: u8,
    pub priority: i32,
    pub is_wildcard: bool,
    pub wildcard_pattern: Option<String>,
    pub inherits_from_parent: bool,
    pub is_implicit: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Monotonic per-store sequence; the stable creation-order tie-break.
    pub created_seq: u64,
}

impl Default for Permission {
    fn default() -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            service_id: Uuid::nil(),
            name: String::new(),
            resource: String::new(),
            action: String::new(),
            parent_id: None,
            path: id.to_string(),
            level: 0,
            priority: 0,
            is_wildcard: false,
            wildcard_pattern: None,
            inherits_from_parent: true,
            is_implicit: false,
            is_active: true,
            created_at: Utc::now(),
            created_seq: 0,
        }
    }
}

impl Permission {
    /// Canonical `resource:action` code for this permission.
    pub fn code(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }

    /// Whether this permission covers the requested `(resource, action)` pair.
    /// Wildcard permissions match via their compiled pattern; concrete ones
    /// compare segments case-insensitively.
    pub fn matches_request(&self, resource: &str, action: &str) -> bool {
        if self.is_wildcard {
            match self.compiled_pattern() {
                Ok(pattern) => pattern.matches(resource, action),
                Err(_) => false,
            }
        } else {
            self.resource.eq_ignore_ascii_case(resource)
                && self.action.eq_ignore_ascii_case(action)
        }
    }

    pub fn compiled_pattern(&self) -> Result<WildcardPattern> {
        let raw = self
            .wildcard_pattern
            .as_deref()
            .ok_or_else(|| EngineError::InvalidPattern("wildcard permission without pattern".to_string()))?;
        WildcardPattern::parse(raw)
    }
}

/// Input for creating a permission
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermissionInput {
    pub service_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom(function = "validate_segment"))]
    pub resource: String,
    #[validate(custom(function = "validate_segment"))]
    pub action: String,
    pub parent_id: Option<Uuid>,
    pub priority: i32,
    pub wildcard_pattern: Option<String>,
    #[serde(default = "default_true")]
    pub inherits_from_parent: bool,
    #[serde(default)]
    pub is_implicit: bool,
}

fn default_true() -> bool {
    true
}

fn validate_segment(segment: &str) -> std::result::Result<(), validator::ValidationError> {
    if SEGMENT_REGEX.is_match(segment) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_segment"))
    }
}

lazy_static::lazy_static! {
    /// A single resource or action segment: lowercase alphanumeric with
    /// interior `_`/`-`, e.g. "users", "audit-log", "read".
    pub static ref SEGMENT_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z][a-z0-9_-]*$").unwrap();
}

/// One compiled segment of a wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    Any,
}

/// Compiled segment-glob pattern over `resource:action`.
///
/// `*` matches exactly one segment; a trailing `**` matches one or more
/// remaining segments. Matching is case-insensitive. Without a trailing `**`
/// the segment counts must be equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    segments: Vec<PatternSegment>,
    multi_tail: bool,
    raw: String,
}

impl WildcardPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(EngineError::InvalidPattern("empty pattern".to_string()));
        }

        let parts: Vec<&str> = raw.split(':').collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut multi_tail = false;

        for (idx, part) in parts.iter().enumerate() {
            match *part {
                "**" => {
                    if idx != parts.len() - 1 {
                        return Err(EngineError::InvalidPattern(format!(
                            "'**' is only valid as the final segment: {raw}"
                        )));
                    }
                    multi_tail = true;
                }
                "*" => segments.push(PatternSegment::Any),
                literal => {
                    let lowered = literal.to_ascii_lowercase();
                    if !SEGMENT_REGEX.is_match(&lowered) {
                        return Err(EngineError::InvalidPattern(format!(
                            "invalid segment {literal:?} in pattern {raw:?}"
                        )));
                    }
                    segments.push(PatternSegment::Literal(lowered));
                }
            }
        }

        if segments.is_empty() && !multi_tail {
            return Err(EngineError::InvalidPattern(raw.to_string()));
        }

        Ok(Self {
            segments,
            multi_tail,
            raw: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match against a requested `(resource, action)` pair. The request is
    /// joined as `resource:action` and compared segment-wise.
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        let joined = format!("{resource}:{action}");
        let values: Vec<&str> = joined.split(':').collect();

        if self.multi_tail {
            // Fixed prefix plus at least one remaining segment.
            if values.len() <= self.segments.len() {
                return false;
            }
        } else if values.len() != self.segments.len() {
            return false;
        }

        self.segments.iter().zip(values.iter()).all(|(seg, value)| match seg {
            PatternSegment::Any => !value.is_empty(),
            PatternSegment::Literal(lit) => lit.eq_ignore_ascii_case(value),
        })
    }
}
