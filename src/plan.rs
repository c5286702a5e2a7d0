//! Section plans: the ordered, static list of sections for each document type.
//!
//! Plans are resolved once per request and never mutated. `order` fixes the assembly
//! order; it only doubles as generation order among dependent sections.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDescriptor {
    pub key: String,
    pub display_name: String,
    pub order: u32,
    pub independent: bool,
}

impl SectionDescriptor {
    pub fn new(key: &str, display_name: &str, order: u32, independent: bool) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            order,
            independent,
        }
    }

    /// Heading used when the section is assembled into the document
    pub fn heading(&self) -> String {
        self.display_name.to_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    document_type: String,
    sections: Vec<SectionDescriptor>,
    structure: Option<String>,
}

impl SectionPlan {
    /// Build a plan, sorting by `order` and rejecting anything that breaks the plan invariants:
    /// at least one section, unique non-empty keys, and orders exactly `1..=N`.
    pub fn new(
        document_type: impl Into<String>,
        mut sections: Vec<SectionDescriptor>,
        structure: Option<String>,
    ) -> Result<Self, GenerationError> {
        let document_type = document_type.into();
        if sections.is_empty() {
            return Err(GenerationError::InvalidPlan(format!(
                "plan '{}' must contain at least one section",
                document_type
            )));
        }

        let mut keys = HashSet::new();
        for section in &sections {
            if section.key.trim().is_empty() {
                return Err(GenerationError::InvalidPlan(format!(
                    "plan '{}' has a section with an empty key",
                    document_type
                )));
            }
            if !keys.insert(section.key.as_str()) {
                return Err(GenerationError::InvalidPlan(format!(
                    "plan '{}' repeats section key '{}'",
                    document_type, section.key
                )));
            }
        }

        sections.sort_by_key(|s| s.order);
        for (index, section) in sections.iter().enumerate() {
            let expected = index as u32 + 1;
            if section.order != expected {
                return Err(GenerationError::InvalidPlan(format!(
                    "plan '{}' orders must be contiguous from 1: expected {}, found {} ('{}')",
                    document_type, expected, section.order, section.key
                )));
            }
        }

        Ok(Self {
            document_type,
            sections,
            structure,
        })
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    /// All sections in ascending `order`
    pub fn sections(&self) -> &[SectionDescriptor] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SectionDescriptor> {
        self.sections.iter().find(|s| s.key == key)
    }

    /// Split into (independent, dependent); both halves stay in ascending `order`
    pub fn partition(&self) -> (Vec<&SectionDescriptor>, Vec<&SectionDescriptor>) {
        self.sections.iter().partition(|s| s.independent)
    }

    /// Outline handed to the single-prompt strategy
    pub fn structure_description(&self) -> String {
        match &self.structure {
            Some(structure) => structure.clone(),
            None => self
                .sections
                .iter()
                .map(|s| format!("{}. {}", s.order, s.heading()))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Section-plan lookup, keyed by document type.
pub trait PlanSource: Send + Sync {
    fn lookup(&self, document_type: &str) -> Result<Arc<SectionPlan>, GenerationError>;
}

/// Plan as written in configuration (`[plans.<document_type>]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    pub sections: Vec<SectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    pub key: String,
    pub name: String,
    pub order: u32,
    #[serde(default)]
    pub independent: bool,
}

impl PlanConfig {
    pub fn to_plan(&self, document_type: &str) -> Result<SectionPlan, GenerationError> {
        let sections = self
            .sections
            .iter()
            .map(|s| SectionDescriptor::new(&s.key, &s.name, s.order, s.independent))
            .collect();
        SectionPlan::new(document_type, sections, self.structure.clone())
    }
}

/// In-memory plan registry: built-in plans, optionally overridden from configuration.
#[derive(Debug, Clone, Default)]
pub struct PlanRegistry {
    plans: HashMap<String, Arc<SectionPlan>>,
}

impl PlanRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the built-in report plans
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for plan in builtin_plans() {
            registry.insert(plan);
        }
        registry
    }

    /// Add or replace the plan for its document type
    pub fn insert(&mut self, plan: SectionPlan) {
        self.plans
            .insert(plan.document_type().to_string(), Arc::new(plan));
    }

    /// Overlay configured plans on top of whatever is registered
    pub fn with_configured(
        mut self,
        configured: &HashMap<String, PlanConfig>,
    ) -> Result<Self, GenerationError> {
        for (document_type, plan) in configured {
            self.insert(plan.to_plan(document_type)?);
        }
        Ok(self)
    }

    /// Overlay plans from a standalone TOML file (`[<document_type>]` tables)
    pub fn with_plan_file(self, path: &Path) -> Result<Self, GenerationError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GenerationError::Config(format!("Failed to read plan file {:?}: {}", path, e))
        })?;
        let configured: HashMap<String, PlanConfig> = toml::from_str(&text).map_err(|e| {
            GenerationError::Config(format!("Failed to parse plan file {:?}: {}", path, e))
        })?;
        self.with_configured(&configured)
    }

    /// Registered document types, sorted
    pub fn document_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.plans.keys().cloned().collect();
        types.sort();
        types
    }
}

impl PlanSource for PlanRegistry {
    fn lookup(&self, document_type: &str) -> Result<Arc<SectionPlan>, GenerationError> {
        self.plans
            .get(document_type)
            .cloned()
            .ok_or_else(|| GenerationError::UnknownDocumentType(document_type.to_string()))
    }
}

fn builtin_plans() -> Vec<SectionPlan> {
    let specs: [(&str, &[(&str, &str, bool)], Option<&str>); 3] = [
        (
            "project_proposal",
            &[
                ("introduction", "Introduction", true),
                ("problem_statement", "Problem Statement", true),
                ("objectives", "Objectives", false),
                ("methodology", "Methodology", false),
                ("gantt_chart", "Gantt Chart", false),
                ("expected_outcome", "Expected Outcome", false),
                ("references", "References", false),
            ],
            None,
        ),
        (
            "main_report",
            &[
                ("abstract", "Abstract", false),
                ("acknowledgement", "Acknowledgement", true),
                ("introduction", "Introduction", true),
                ("background_study", "Background Study and Literature Review", true),
                ("system_analysis", "System Analysis and Design", false),
                ("implementation", "Implementation and Testing", false),
                ("conclusion", "Conclusion and Future Recommendations", false),
                ("references", "References", false),
            ],
            Some(
                "PRELIMINARY PAGES:\n- Abstract\n- Acknowledgement\n- Table of Contents\n\n\
                 MAIN REPORT:\n- Chapter 1: Introduction\n\
                 - Chapter 2: Background Study and Literature Review\n\
                 - Chapter 3: System Analysis and Design\n\
                 - Chapter 4: Implementation and Testing\n\
                 - Chapter 5: Conclusion and Future Recommendations\n- References",
            ),
        ),
        (
            "minor_project",
            &[
                ("introduction", "Introduction", true),
                ("literature_review", "Literature Review", true),
                ("system_analysis", "System Analysis", false),
                ("implementation", "Implementation", false),
                ("testing_and_results", "Testing and Results", false),
                ("conclusion", "Conclusion", false),
                ("references", "References", false),
            ],
            None,
        ),
    ];

    specs
        .iter()
        .filter_map(|(document_type, sections, structure)| {
            let descriptors = sections
                .iter()
                .enumerate()
                .map(|(i, (key, name, independent))| {
                    SectionDescriptor::new(key, name, i as u32 + 1, *independent)
                })
                .collect();
            SectionPlan::new(*document_type, descriptors, structure.map(str::to_string)).ok()
        })
        .collect()
}
