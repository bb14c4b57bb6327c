//! Prompt templates, one builder per call site
//!
//! Each builder returns a `(system, user)` pair. Structured answers are requested as JSON
//! objects whose shape matches the serde representation of the core types.

use deepreport_core::{PlanRequest, Section};

/// A system prompt and the user message that goes with it
pub type Prompt = (String, String);

const QUERY_FORMAT: &str = r#"Respond with JSON only, in this shape:
{"queries": [{"search_query": "..."}]}"#;

pub fn plan_queries(topic: &str, report_structure: &str, count: usize) -> Prompt {
    let system = format!(
        r#"You are an expert technical writer, helping to plan a report.

The report will be focused on the following topic:
{topic}

The report structure will follow these guidelines:
{report_structure}

Your goal is to generate {count} search queries that will help gather comprehensive information for planning the report sections.

The queries should:
1. Be related to the topic of the report
2. Help satisfy the requirements specified in the report organization

Make the queries specific enough to find high-quality, relevant sources while covering the breadth needed for the report structure.

{QUERY_FORMAT}"#
    );

    let user = "Generate search queries that will help with planning the sections of the report."
        .to_string();

    (system, user)
}

pub fn plan_sections(request: &PlanRequest<'_>) -> Prompt {
    let feedback = request
        .feedback
        .filter(|f| !f.trim().is_empty())
        .map(|f| {
            format!(
                "\nHere is feedback on the report structure from review (if any):\n{}\n",
                f
            )
        })
        .unwrap_or_default();

    let system = format!(
        r#"I want a plan for a report.

The topic of the report is:
{topic}

The report should follow this organization:
{structure}

You should reflect on this information to plan the sections of the report:
{context}
{feedback}
Now, generate the sections of the report. Each section should have the fields:
- name: Name for this section of the report.
- description: Brief overview of the main topics covered in this section.
- research: Whether to perform web research for this section of the report.
- content: The content of the section, which you will leave blank for now.

Consider which sections require web research. Introduction and conclusion will not require research because they distill information from other parts of the report.

Respond with JSON only, in this shape:
{{"sections": [{{"name": "...", "description": "...", "research": true, "content": ""}}]}}"#,
        topic = request.topic,
        structure = request.report_structure,
        context = request.context,
        feedback = feedback,
    );

    let user = "Generate the sections of the report. Every section name must be unique.".to_string();

    (system, user)
}

pub fn section_queries(topic: &str, section: &Section, count: usize) -> Prompt {
    let system = format!(
        r#"You are an expert technical writer crafting targeted web search queries that will gather comprehensive information for writing a technical report section.

Topic for this section:
{description}

The overall report is about: {topic}

When generating {count} search queries, ensure they:
1. Cover different aspects of the topic (e.g., core features, real-world applications, technical architecture)
2. Include specific technical terms related to the topic
3. Target recent information by including year markers where relevant
4. Look for comparisons or differentiators from similar technologies/approaches
5. Search for both official documentation and practical implementation examples

Your queries should be specific enough to avoid generic results and technical enough to capture detailed implementation information.

{QUERY_FORMAT}"#,
        description = section.description,
    );

    let user = format!(
        "Generate search queries for the section '{}'.",
        section.name
    );

    (system, user)
}

pub fn write_section(topic: &str, section: &Section, evidence: &str) -> Prompt {
    let previous = if section.content.trim().is_empty() {
        String::new()
    } else {
        format!(
            "\nExisting section content to revise and extend:\n{}\n",
            section.content
        )
    };

    let system = format!(
        r#"You are an expert technical writer crafting one section of a technical report.

Report topic: {topic}

Section name: {name}

Section topic: {description}
{previous}
Guidelines for writing:
1. Technical Accuracy: include specific version numbers, reference concrete metrics and cite official documentation.
2. Length and Style: strict 150-200 word limit, no marketing language, technical focus, start with your most important insight in **bold**.
3. Structure: use ## for the section title (Markdown format), at most one structural element (a focused table or a short list) and only if it helps clarify a point.
4. End with ### Sources listing each source as `- Title : URL`.

Use this source material to help write the section:
{evidence}

Write only the section, in Markdown."#,
        name = section.name,
        description = section.description,
    );

    let user = format!("Write the '{}' section.", section.name);

    (system, user)
}

pub fn grade_section(topic: &str, section: &Section, follow_up_count: usize) -> Prompt {
    let system = format!(
        r#"Review a report section relative to the specified topic.

Report topic: {topic}

Section topic: {description}

Section content:
{content}

Evaluate whether the section content adequately addresses the section topic.

If the section content does not adequately address the section topic, generate {follow_up_count} follow-up search queries to gather missing information.

Respond with JSON only, in this shape:
{{"grade": "pass" or "fail", "follow_up_queries": [{{"search_query": "..."}}]}}"#,
        description = section.description,
        content = section.content,
    );

    let user = "Grade the report section and consider follow-up questions for missing information."
        .to_string();

    (system, user)
}

pub fn write_final_section(topic: &str, section: &Section, context: &str) -> Prompt {
    let system = format!(
        r#"You are an expert technical writer crafting a section that synthesizes information from the rest of the report.

Report topic: {topic}

Section name: {name}

Section topic: {description}

Available report content:
{context}

Guidelines:
- An introduction uses # for the report title, stays within 50-100 words, and has no lists or tables or sources.
- A conclusion uses ## for the section title, stays within 100-150 words, and may hold one focused comparison table or short list.
- Use Markdown and write no word count or preamble.

Write only the section."#,
        name = section.name,
        description = section.description,
    );

    let user = "Generate a report section based on the provided sources.".to_string();

    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_sections_includes_feedback_only_when_present() {
        let request = PlanRequest {
            topic: "Rust async runtimes",
            report_structure: "Intro, body, conclusion",
            context: "Sources:",
            feedback: Some("Add a section on io_uring"),
        };
        let (system, _) = plan_sections(&request);
        assert!(system.contains("Add a section on io_uring"));
        assert!(system.contains(r#""sections""#));

        let request = PlanRequest {
            feedback: None,
            ..request
        };
        let (system, _) = plan_sections(&request);
        assert!(!system.contains("feedback on the report structure"));
    }

    #[test]
    fn test_write_section_includes_previous_draft() {
        let section = Section::new("Tokio", "The tokio runtime", true);
        let (system, _) = write_section("Rust async", &section, "Sources:");
        assert!(!system.contains("Existing section content"));

        let section = section.with_content("## Tokio\nfirst draft");
        let (system, user) = write_section("Rust async", &section, "Sources:");
        assert!(system.contains("first draft"));
        assert!(user.contains("Tokio"));
    }

    #[test]
    fn test_query_prompts_state_count() {
        let (system, _) = plan_queries("topic", "structure", 3);
        assert!(system.contains("generate 3 search queries"));

        let section = Section::new("Body", "Details", true);
        let (system, _) = section_queries("topic", &section, 4);
        assert!(system.contains("When generating 4 search queries"));
    }
}
