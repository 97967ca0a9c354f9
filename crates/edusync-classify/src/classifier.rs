//! Group classification.

use serde::{Deserialize, Serialize};

use crate::schema::{CompiledSchema, GroupRole};

/// Semantic classification of one remote group.
///
/// Derived, never fetched: produced once per group per run from the raw
/// identifier and the active schema, and recomputed from scratch on the
/// next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role")]
pub enum GroupClassification {
    /// A class section, e.g. `10a`.
    Class {
        /// Normalized base name of the group.
        display: String,
        /// Grade/level token extracted by the matching rule, e.g. `10`.
        grade: Option<String>,
    },
    /// A staff group; drives elevated role assignment.
    Teacher {
        /// Normalized base name of the group.
        display: String,
    },
    /// A project group, e.g. `p_biologie`.
    Project {
        /// Normalized base name of the group.
        display: String,
    },
    /// Matched an explicit ignore rule.
    Ignored {
        /// Normalized base name of the group.
        display: String,
    },
    /// No rule matched. Excluded from changes: unknown is a valid terminal
    /// classification, not an error.
    Unknown {
        /// Normalized base name of the group.
        display: String,
    },
}

impl GroupClassification {
    /// The group's normalized base name.
    #[must_use]
    pub fn display(&self) -> &str {
        match self {
            Self::Class { display, .. }
            | Self::Teacher { display }
            | Self::Project { display }
            | Self::Ignored { display }
            | Self::Unknown { display } => display,
        }
    }

    /// Whether no rule matched this group.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    /// Whether the group participates in synchronization at all.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        !matches!(self, Self::Ignored { .. } | Self::Unknown { .. })
    }
}

/// Classifies a raw group identifier against a compiled schema.
///
/// Pure function: no I/O, no state across calls. The identifier's last
/// slash-delimited segment is matched (lowercased) against the schema's
/// rules in declaration order; the first matching rule wins. An identifier
/// no rule matches classifies as [`GroupClassification::Unknown`].
#[must_use]
pub fn classify(raw_identifier: &str, schema: &CompiledSchema) -> GroupClassification {
    let display = base_name(raw_identifier);
    let subject = display.to_lowercase();

    for rule in &schema.rules {
        let Some(captures) = rule.regex.captures(&subject) else {
            continue;
        };

        return match rule.role {
            GroupRole::Class => {
                let grade = rule
                    .grade_capture
                    .as_deref()
                    .and_then(|name| captures.name(name))
                    .map(|m| m.as_str().to_string());
                GroupClassification::Class { display, grade }
            }
            GroupRole::Teacher => GroupClassification::Teacher { display },
            GroupRole::Project => GroupClassification::Project { display },
            GroupRole::Ignored => GroupClassification::Ignored { display },
        };
    }

    GroupClassification::Unknown { display }
}

/// Last slash-delimited segment of a group path, trimmed.
fn base_name(raw_identifier: &str) -> String {
    raw_identifier
        .rsplit('/')
        .next()
        .unwrap_or(raw_identifier)
        .trim()
        .to_string()
}
