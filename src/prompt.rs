//! Prompt builders.
//!
//! Every prompt is a pure function of its inputs; nothing here talks to a backend.

use crate::plan::{SectionDescriptor, SectionPlan};
use crate::request::GenerationRequest;

/// Marker opening the prior-sections block in a section prompt
pub const CONTEXT_HEADER: &str = "PREVIOUSLY GENERATED SECTIONS (for context and continuity):";

/// Marker identifying a refinement prompt
pub const REFINEMENT_MARKER: &str = "ORIGINAL CONTENT:";

/// Marker identifying a single-prompt (whole document) request
pub const STRUCTURE_MARKER: &str = "DOCUMENT STRUCTURE:";

const PLAIN_TEXT_RULES: &str = "FORMATTING REQUIREMENTS:
- Write in PLAIN TEXT format only
- Do NOT use markdown formatting (no #, **, *, etc.)
- Use proper academic paragraph structure
- Use numbered lists where appropriate (1. 2. 3.)
- Use bullet points where appropriate (-)
- Keep headings simple and clear
- Ensure proper spacing between paragraphs";

/// Human-readable document type, e.g. `project_proposal` -> `project proposal`
fn document_kind(document_type: &str) -> String {
    document_type.replace('_', " ")
}

fn instructions_block(request: &GenerationRequest) -> String {
    match request.instructions() {
        Some(instructions) => format!("\n\nADDITIONAL INSTRUCTIONS: {}", instructions),
        None => String::new(),
    }
}

/// Render compressed prior sections as a prompt block; empty when there are none
pub fn context_block(digests: &[(String, String)]) -> String {
    if digests.is_empty() {
        return String::new();
    }
    let mut block = String::from(CONTEXT_HEADER);
    block.push('\n');
    for (key, digest) in digests {
        block.push_str(&format!("\n{}:\n{}\n", key.to_uppercase(), digest));
    }
    block.push_str(
        "\nIMPORTANT: Build upon the above context but focus on the current section requirements.",
    );
    block
}

pub fn section_prompt(
    request: &GenerationRequest,
    plan: &SectionPlan,
    section: &SectionDescriptor,
    context: &str,
) -> String {
    let kind = document_kind(plan.document_type());
    let title = &request.title;
    let context = if context.is_empty() {
        "No sections have been generated yet."
    } else {
        context
    };

    format!(
        "You are writing a specific section for a {kind} about the project: \"{title}\".

PROJECT FOCUS:
- This document is specifically about: {title}
- Make ALL content relevant to the actual project, not generic filler
- Focus on the project's features, implementation, and outcomes

DOCUMENT CONTEXT:
{context}

SECTION REQUIREMENTS:
- Write the \"{name}\" section specifically for the project: {title}
- This is section {order} of {total} in the document
- Use proper academic language and tone
- Ensure content flows logically from the earlier sections

{rules}{instructions}

Generate a well-structured {name} section about \"{title}\" in plain text format.",
        name = section.display_name,
        order = section.order,
        total = plan.len(),
        rules = PLAIN_TEXT_RULES,
        instructions = instructions_block(request),
    )
}

pub fn summary_prompt(section_key: &str, content: &str) -> String {
    format!(
        "Summarize the following {section_key} section content in 2-3 sentences, focusing on \
         key points and main ideas. Keep it concise but informative:\n\n{content}\n\nSummary:"
    )
}

pub fn refinement_prompt(
    request: &GenerationRequest,
    plan: &SectionPlan,
    section: &SectionDescriptor,
    content: &str,
) -> String {
    format!(
        "You are a professional editor refining academic content. Polish the following {name} \
         section of a {kind} about \"{title}\".

{marker}
{content}

REFINEMENT REQUIREMENTS:
- Improve clarity and flow
- Ensure proper academic tone
- Fix any grammatical errors
- Keep the content specific to the project: {title}
- Maintain the original length and scope

{rules}

Return only the refined content in plain text format without any explanations.",
        name = section.display_name,
        kind = document_kind(plan.document_type()),
        title = request.title,
        marker = REFINEMENT_MARKER,
        rules = PLAIN_TEXT_RULES,
    )
}

/// One prompt covering the whole document, used when structured generation fails
pub fn single_prompt(request: &GenerationRequest, plan: &SectionPlan) -> String {
    let req = &request.requirements;
    format!(
        "Generate a comprehensive {kind} with the title \"{title}\".

IMPORTANT: This document is specifically about the project \"{title}\". Make ALL content \
relevant to the actual project.

{marker}
{structure}

FORMATTING SPECIFICATIONS:
- Font Family: {font_family}
- Font Size: {font_size}pt for paragraphs
- Chapter Title Font Size: {header_size}pt (Bold)
- Line Height: {line_height}
- All paragraphs must be justified

Write each section heading in UPPERCASE on its own line.

{rules}{instructions}

Generate a complete, well-structured {kind} about \"{title}\" in plain text format.",
        kind = document_kind(plan.document_type()),
        title = request.title,
        marker = STRUCTURE_MARKER,
        structure = plan.structure_description(),
        font_family = req.font_family,
        font_size = req.font_size,
        header_size = req.header_size,
        line_height = req.line_height,
        rules = PLAIN_TEXT_RULES,
        instructions = instructions_block(request),
    )
}
