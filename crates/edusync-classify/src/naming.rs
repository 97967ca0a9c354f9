//! Container naming.
//!
//! Derives a human-readable display name and a parent category path for
//! classified groups that become containers. Pure and deterministic:
//! formatting depends only on the classification and the options.

use serde::{Deserialize, Serialize};

use crate::classifier::GroupClassification;

/// Naming and placement options for derived containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingOptions {
    /// Prefix wrapped around class display names.
    pub class_prefix: String,
    /// Prefix wrapped around project display names.
    pub project_prefix: String,
    /// Group-name prefix stripped from project base names.
    pub project_group_prefix: String,
    /// Root category path containers are placed under.
    pub root_path: String,
    /// Whether classes are bucketed into per-grade subcategories.
    pub grade_buckets: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            class_prefix: "Klasse ".to_string(),
            project_prefix: "Projekt: ".to_string(),
            project_group_prefix: "p_".to_string(),
            root_path: "/".to_string(),
            grade_buckets: true,
        }
    }
}

/// Display name and target parent category for one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Human-readable container name.
    pub display_name: String,
    /// Parent category path the container is created under.
    pub parent_path: String,
}

/// Formats a classification into a container spec.
///
/// Class and project groups produce containers; teacher, ignored, and
/// unknown groups do not (teacher membership drives account role
/// assignment instead) and yield `None`.
#[must_use]
pub fn format_container(
    classification: &GroupClassification,
    options: &NamingOptions,
) -> Option<ContainerSpec> {
    match classification {
        GroupClassification::Class { display, grade } => {
            let token = display.to_uppercase();
            let parent_path = match (options.grade_buckets, grade) {
                (true, Some(grade)) => join_path(&join_path(&options.root_path, "Classes"), grade),
                _ => join_path(&options.root_path, "Classes"),
            };
            Some(ContainerSpec {
                display_name: format!("{}{token}", options.class_prefix),
                parent_path,
            })
        }
        GroupClassification::Project { display } => {
            let base = display
                .strip_prefix(&options.project_group_prefix)
                .unwrap_or(display);
            Some(ContainerSpec {
                display_name: format!("{}{}", options.project_prefix, title_case(base)),
                parent_path: join_path(&options.root_path, "Projects"),
            })
        }
        GroupClassification::Teacher { .. }
        | GroupClassification::Ignored { .. }
        | GroupClassification::Unknown { .. } => None,
    }
}

/// Joins a category path segment onto a base path.
fn join_path(base: &str, segment: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        format!("/{segment}")
    } else {
        format!("{trimmed}/{segment}")
    }
}

/// Capitalizes each `_`/`-`/space-separated word.
fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;

    for ch in input.chars() {
        match ch {
            '_' | ' ' => {
                out.push(' ');
                at_word_start = true;
            }
            '-' => {
                out.push('-');
                at_word_start = true;
            }
            c if at_word_start => {
                out.extend(c.to_uppercase());
                at_word_start = false;
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(display: &str, grade: Option<&str>) -> GroupClassification {
        GroupClassification::Class {
            display: display.to_string(),
            grade: grade.map(String::from),
        }
    }

    #[test]
    fn test_class_formatting() {
        let options = NamingOptions::default();
        let spec = format_container(&class("10a", Some("10")), &options).unwrap();

        assert_eq!(spec.display_name, "Klasse 10A");
        assert_eq!(spec.parent_path, "/Classes/10");
    }

    #[test]
    fn test_class_without_grade_token() {
        let options = NamingOptions::default();
        let spec = format_container(&class("5b", None), &options).unwrap();

        assert_eq!(spec.display_name, "Klasse 5B");
        assert_eq!(spec.parent_path, "/Classes");
    }

    #[test]
    fn test_class_without_grade_buckets() {
        let options = NamingOptions {
            grade_buckets: false,
            ..NamingOptions::default()
        };
        let spec = format_container(&class("10a", Some("10")), &options).unwrap();

        assert_eq!(spec.parent_path, "/Classes");
    }

    #[test]
    fn test_project_formatting() {
        let options = NamingOptions::default();
        let classification = GroupClassification::Project {
            display: "p_biologie".to_string(),
        };
        let spec = format_container(&classification, &options).unwrap();

        assert_eq!(spec.display_name, "Projekt: Biologie");
        assert_eq!(spec.parent_path, "/Projects");
    }

    #[test]
    fn test_project_multi_word_title_case() {
        let options = NamingOptions::default();
        let classification = GroupClassification::Project {
            display: "p_umwelt_ag".to_string(),
        };
        let spec = format_container(&classification, &options).unwrap();

        assert_eq!(spec.display_name, "Projekt: Umwelt Ag");
    }

    #[test]
    fn test_custom_root_path() {
        let options = NamingOptions {
            root_path: "/School".to_string(),
            ..NamingOptions::default()
        };
        let spec = format_container(&class("10a", Some("10")), &options).unwrap();

        assert_eq!(spec.parent_path, "/School/Classes/10");
    }

    #[test]
    fn test_non_container_roles_yield_none() {
        let options = NamingOptions::default();

        for classification in [
            GroupClassification::Teacher {
                display: "teachers".to_string(),
            },
            GroupClassification::Ignored {
                display: "attic".to_string(),
            },
            GroupClassification::Unknown {
                display: "staff-all".to_string(),
            },
        ] {
            assert!(format_container(&classification, &options).is_none());
        }
    }

    #[test]
    fn test_formatting_is_deterministic() {
        let options = NamingOptions::default();
        let classification = class("10a", Some("10"));

        assert_eq!(
            format_container(&classification, &options),
            format_container(&classification, &options)
        );
    }
}
