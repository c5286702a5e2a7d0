//! CLI presentation: text and json formatters per command.

use crate::orchestrator::StreamEvent;
use crate::pipeline::ProducedReport;
use crate::plan::{PlanRegistry, PlanSource};
use crate::store::{DocumentPage, DocumentStatus, StoredDocument};
use chrono::{TimeZone, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;

fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn status_label(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Complete => "complete",
        DocumentStatus::Partial => "partial",
    }
}

pub fn format_generation_report(report: &ProducedReport) -> String {
    let failed: Vec<&str> = report
        .per_section_status
        .iter()
        .filter(|s| !s.succeeded)
        .map(|s| s.display_name.as_str())
        .collect();
    let mut output = format!(
        "Saved document {} ({}, {} strategy)\n",
        report.document.id, report.document.document_type, report.strategy
    );
    if !failed.is_empty() {
        output.push_str(&format!("Missing sections: {}\n", failed.join(", ")));
    }
    output.push('\n');
    output.push_str(report.content());
    output
}

pub fn format_document_text(document: &StoredDocument) -> String {
    let mut output = format!(
        "{}\nType: {}  Status: {}  Created: {}\n",
        document.title,
        document.document_type,
        status_label(document.status),
        format_timestamp(document.created_at)
    );
    let failed: Vec<&str> = document
        .section_status
        .iter()
        .filter(|s| !s.succeeded)
        .map(|s| s.display_name.as_str())
        .collect();
    if !failed.is_empty() {
        output.push_str(&format!("Missing sections: {}\n", failed.join(", ")));
    }
    output.push('\n');
    output.push_str(&document.content);
    output
}

pub fn format_document_json(document: &StoredDocument) -> String {
    serde_json::to_string_pretty(document).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_document_page_text(page: &DocumentPage) -> String {
    if page.documents.is_empty() {
        return "No documents found.\n\nUse 'folio generate' to create one.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Id", "Title", "Type", "Status", "Created"]);
    for doc in &page.documents {
        table.add_row(vec![
            doc.id.clone(),
            doc.title.clone(),
            doc.document_type.clone(),
            status_label(doc.status).to_string(),
            format_timestamp(doc.created_at),
        ]);
    }
    format!(
        "{}\n\nPage {} of {} ({} document(s))",
        table,
        page.page,
        page.total_pages.max(1),
        page.total
    )
}

pub fn format_document_page_json(page: &DocumentPage) -> String {
    serde_json::to_string_pretty(page).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_plans_text(registry: &PlanRegistry) -> String {
    let mut output = String::new();
    for document_type in registry.document_types() {
        let Ok(plan) = registry.lookup(&document_type) else {
            continue;
        };
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Order", "Section", "Key", "Independent"]);
        for section in plan.sections() {
            table.add_row(vec![
                section.order.to_string(),
                section.display_name.clone(),
                section.key.clone(),
                if section.independent { "yes" } else { "no" }.to_string(),
            ]);
        }
        output.push_str(&format!("{}\n{}\n\n", document_type, table));
    }
    output.trim_end().to_string()
}

pub fn format_plans_json(registry: &PlanRegistry) -> String {
    let plans: Vec<_> = registry
        .document_types()
        .into_iter()
        .filter_map(|document_type| {
            registry.lookup(&document_type).ok().map(|plan| {
                json!({
                    "document_type": document_type,
                    "sections": plan.sections(),
                })
            })
        })
        .collect();
    serde_json::to_string_pretty(&json!({ "plans": plans })).unwrap_or_else(|_| "{}".to_string())
}

/// Renders stream events for a terminal.
///
/// Fragments of a streamed section print as they arrive under one heading; the
/// section's completion event then only closes it.
#[derive(Debug, Default)]
pub struct StreamRenderer {
    open_section: Option<String>,
}

impl StreamRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &StreamEvent) -> String {
        match event {
            StreamEvent::Fragment {
                section,
                display_name,
                fragment,
                progress,
            } => {
                if self.open_section.as_deref() == Some(section.as_str()) {
                    return fragment.clone();
                }
                self.open_section = Some(section.clone());
                format!("{}{}", section_banner(*progress, display_name), fragment)
            }
            StreamEvent::SectionCompleted {
                section,
                display_name,
                content,
                progress,
            } => {
                if self.open_section.as_deref() == Some(section.as_str()) {
                    self.open_section = None;
                    return "\n".to_string();
                }
                format!("{}{}\n", section_banner(*progress, display_name), content)
            }
            StreamEvent::SectionFailed {
                display_name,
                error,
                progress,
                ..
            } => {
                let closing = if self.open_section.take().is_some() { "\n" } else { "" };
                format!("{}\n[{:>3}%] {} failed: {}\n", closing, progress, display_name, error)
            }
            StreamEvent::Completed { document_id, .. } => match document_id {
                Some(id) => format!("\n[100%] Saved document {}\n", id),
                None => "\n[100%] Done\n".to_string(),
            },
            StreamEvent::Failed { error } => format!("\nGeneration failed: {}\n", error),
        }
    }
}

fn section_banner(progress: u8, display_name: &str) -> String {
    format!("\n[{:>3}%] {}\n\n", progress, display_name.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentSummary;

    #[test]
    fn empty_page_hints_at_generate() {
        let page = DocumentPage {
            documents: Vec::new(),
            page: 1,
            limit: 10,
            total: 0,
            total_pages: 0,
        };
        assert!(format_document_page_text(&page).contains("folio generate"));
    }

    #[test]
    fn page_lists_titles() {
        let page = DocumentPage {
            documents: vec![DocumentSummary {
                id: "0000000000000001".to_string(),
                title: "Library System".to_string(),
                document_type: "project_proposal".to_string(),
                status: DocumentStatus::Partial,
                created_at: 0,
            }],
            page: 1,
            limit: 10,
            total: 1,
            total_pages: 1,
        };
        let text = format_document_page_text(&page);
        assert!(text.contains("Library System"));
        assert!(text.contains("partial"));
        assert!(text.contains("Page 1 of 1"));
    }

    #[test]
    fn plans_text_lists_builtin_types() {
        let text = format_plans_text(&PlanRegistry::builtin());
        assert!(text.contains("project_proposal"));
        assert!(text.contains("Problem Statement"));
    }

    #[test]
    fn streamed_section_prints_heading_once() {
        let mut renderer = StreamRenderer::new();
        let fragment = |text: &str| StreamEvent::Fragment {
            section: "methodology".to_string(),
            display_name: "Methodology".to_string(),
            fragment: text.to_string(),
            progress: 50,
        };
        let mut out = renderer.render(&fragment("Method "));
        out.push_str(&renderer.render(&fragment("text.")));
        out.push_str(&renderer.render(&StreamEvent::SectionCompleted {
            section: "methodology".to_string(),
            display_name: "Methodology".to_string(),
            content: "Method text.".to_string(),
            progress: 99,
        }));
        assert_eq!(out, "\n[ 50%] METHODOLOGY\n\nMethod text.\n");
    }

    #[test]
    fn completed_event_names_document() {
        let event = StreamEvent::Completed {
            content: String::new(),
            per_section_status: Vec::new(),
            document_id: Some("abc".to_string()),
            progress: 100,
        };
        assert_eq!(
            StreamRenderer::new().render(&event),
            "\n[100%] Saved document abc\n"
        );
    }
}
