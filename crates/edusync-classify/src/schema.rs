//! Classification schemas.
//!
//! A schema is a named, ordered list of rules. Rules are evaluated
//! top-to-bottom and the first match wins; a group no rule matches is
//! classified as unknown and thereby excluded from changes.
//!
//! Schemas are compiled once per sync run, not re-parsed per group, and a
//! schema that fails to compile must abort the run before any fetching
//! starts.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};

/// Semantic role a rule assigns to matching groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    /// A class section (becomes a container, members get enrolled).
    Class,
    /// A staff group (drives elevated role assignment, no container).
    Teacher,
    /// A project group (becomes a container).
    Project,
    /// Explicitly excluded from synchronization.
    Ignored,
}

/// How a rule's pattern source is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// A shell-style glob (`*`, `?`).
    Glob,
    /// A full regular expression; may declare named capture groups.
    #[default]
    Regex,
}

/// One classification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Pattern source, matched against the group's lowercased base name.
    pub pattern: String,
    /// Pattern flavor.
    #[serde(default)]
    pub kind: PatternKind,
    /// Role assigned on match.
    pub role: GroupRole,
    /// Name of the capture group holding the grade/level token.
    /// Only meaningful for [`GroupRole::Class`] regex rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_capture: Option<String>,
}

/// A named, ordered rule list as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingSchema {
    /// Schema name, used in logs and diagnostics.
    pub name: String,
    /// Rules in evaluation order.
    pub rules: Vec<ClassificationRule>,
}

impl NamingSchema {
    /// The built-in `standard` schema.
    ///
    /// Encodes the common directory conventions: an ignore list for
    /// technical groups, a staff group, `p_`-prefixed project groups, and
    /// class sections shaped like a grade numeral plus a section letter.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            rules: vec![
                ClassificationRule {
                    pattern: r"^(admins?|attic|examusers|testuser\d*)$".to_string(),
                    kind: PatternKind::Regex,
                    role: GroupRole::Ignored,
                    grade_capture: None,
                },
                ClassificationRule {
                    pattern: r"^(teachers|lehrer)$".to_string(),
                    kind: PatternKind::Regex,
                    role: GroupRole::Teacher,
                    grade_capture: None,
                },
                ClassificationRule {
                    pattern: r"^p_.+$".to_string(),
                    kind: PatternKind::Regex,
                    role: GroupRole::Project,
                    grade_capture: None,
                },
                ClassificationRule {
                    pattern: r"^(?P<grade>\d{1,2})(?P<section>[a-z])$".to_string(),
                    kind: PatternKind::Regex,
                    role: GroupRole::Class,
                    grade_capture: Some("grade".to_string()),
                },
            ],
        }
    }

    /// The built-in `simple` schema.
    ///
    /// Intentionally permissive, lower-fidelity variant: only
    /// `p_`-prefixed groups are recognized (as projects); everything else
    /// is unknown.
    #[must_use]
    pub fn simple() -> Self {
        Self {
            name: "simple".to_string(),
            rules: vec![ClassificationRule {
                pattern: "p_*".to_string(),
                kind: PatternKind::Glob,
                role: GroupRole::Project,
                grade_capture: None,
            }],
        }
    }

    /// Parses a user-supplied schema document.
    ///
    /// Parsing alone does not validate patterns; call [`Self::compile`]
    /// to get a usable (and fully validated) schema.
    pub fn from_json(document: &str) -> SchemaResult<Self> {
        Ok(serde_json::from_str(document)?)
    }

    /// Compiles the schema, validating every rule.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Empty`] for a rule-less schema and
    /// [`SchemaError::Pattern`] for the first pattern that fails to
    /// compile. Errors here must abort the run; falling back to a
    /// built-in schema is not permitted.
    pub fn compile(&self) -> SchemaResult<CompiledSchema> {
        if self.rules.is_empty() {
            return Err(SchemaError::Empty(self.name.clone()));
        }

        let mut compiled = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            let source = match rule.kind {
                PatternKind::Regex => rule.pattern.clone(),
                PatternKind::Glob => glob_to_regex(&rule.pattern),
            };
            let regex = Regex::new(&source).map_err(|e| SchemaError::Pattern {
                index,
                pattern: rule.pattern.clone(),
                message: e.to_string(),
            })?;

            if let Some(ref capture) = rule.grade_capture {
                let known = regex
                    .capture_names()
                    .flatten()
                    .any(|name| name == capture.as_str());
                if !known {
                    return Err(SchemaError::Pattern {
                        index,
                        pattern: rule.pattern.clone(),
                        message: format!("capture group '{capture}' is not declared"),
                    });
                }
            }

            compiled.push(CompiledRule {
                regex,
                role: rule.role,
                grade_capture: rule.grade_capture.clone(),
            });
        }

        Ok(CompiledSchema {
            name: self.name.clone(),
            rules: compiled,
        })
    }
}

/// A rule with its pattern compiled.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) regex: Regex,
    pub(crate) role: GroupRole,
    pub(crate) grade_capture: Option<String>,
}

/// A validated, ready-to-evaluate schema.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    name: String,
    pub(crate) rules: Vec<CompiledRule>,
}

impl CompiledSchema {
    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Selects the schema active for a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "document")]
pub enum SchemaSelector {
    /// Built-in `standard` schema.
    Standard,
    /// Built-in `simple` schema.
    Simple,
    /// User-supplied JSON rule list.
    Custom(String),
}

impl Default for SchemaSelector {
    fn default() -> Self {
        Self::Standard
    }
}

impl SchemaSelector {
    /// Resolves and compiles the selected schema.
    pub fn resolve(&self) -> SchemaResult<CompiledSchema> {
        match self {
            Self::Standard => NamingSchema::standard().compile(),
            Self::Simple => NamingSchema::simple().compile(),
            Self::Custom(document) => NamingSchema::from_json(document)?.compile(),
        }
    }
}

/// Translates a shell-style glob into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 4);
    out.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}
