//! Structured-output parsing
//!
//! Models wrap JSON in prose or code fences often enough that the payload is located first
//! and parsed second.

use deepreport_core::{ErrorContext, Grade, ReportError, ReportResult, SearchQuery, Section, Verdict};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

fn span(response: &str, open: char, close: char) -> Option<&str> {
    let start = response.find(open)?;
    let end = response.rfind(close)?;
    (end > start).then(|| &response[start..=end])
}

/// Locate the outermost JSON object in a model response, falling back to an array
pub fn extract_json(response: &str) -> Option<&str> {
    span(response, '{', '}').or_else(|| span(response, '[', ']'))
}

fn parse_error(what: &str, error: serde_json::Error) -> ReportError {
    ReportError::Llm {
        message: format!("Failed to parse {} JSON: {}", what, error),
        provider: None,
        model: None,
        context: ErrorContext::new("structured_output")
            .with_operation("parse")
            .with_suggestion("Check LLM response format"),
    }
}

/// Parse the payload, preferring an object that carries `key` and falling back to an array.
///
/// Brackets in the surrounding prose must not hide the object, so the object span is tried
/// first. An object without `key` is still returned when no array parses.
fn parse_value(response: &str, what: &str, key: &str) -> ReportResult<Value> {
    let object = span(response, '{', '}').map(serde_json::from_str::<Value>);
    if let Some(Ok(value @ Value::Object(_))) = &object {
        if value.get(key).is_some() {
            return Ok(value.clone());
        }
    }

    let array = span(response, '[', ']').map(serde_json::from_str::<Value>);
    if let Some(Ok(value @ Value::Array(_))) = &array {
        return Ok(value.clone());
    }

    match (object, array) {
        (Some(Ok(value)), _) => Ok(value),
        (Some(Err(e)), _) | (None, Some(Err(e))) => Err(parse_error(what, e)),
        (None, Some(Ok(value))) => Ok(value),
        (None, None) => Err(ReportError::llm(
            format!("No JSON {} found in model response", what),
            "structured_output",
        )),
    }
}

/// A query item may be a bare string or an object
#[derive(Deserialize)]
#[serde(untagged)]
enum QueryItem {
    Text(String),
    Structured(SearchQuery),
}

impl From<QueryItem> for SearchQuery {
    fn from(item: QueryItem) -> Self {
        match item {
            QueryItem::Text(query) => SearchQuery::new(query),
            QueryItem::Structured(query) => query,
        }
    }
}

fn list_field(value: Value, field: &str) -> Value {
    match value {
        Value::Object(mut map) => map.remove(field).unwrap_or(Value::Array(Vec::new())),
        other => other,
    }
}

/// Parse `{"queries": [...]}` or a bare array of queries
pub fn parse_queries(response: &str) -> ReportResult<Vec<SearchQuery>> {
    let value = list_field(parse_value(response, "queries", "queries")?, "queries");
    let items: Vec<QueryItem> = serde_json::from_value(value)?;

    let queries: Vec<SearchQuery> = items
        .into_iter()
        .map(SearchQuery::from)
        .filter(|q| !q.query.trim().is_empty())
        .collect();

    debug!("Parsed {} search queries", queries.len());
    Ok(queries)
}

/// Parse `{"sections": [...]}` or a bare array of sections
pub fn parse_sections(response: &str) -> ReportResult<Vec<Section>> {
    let value = list_field(parse_value(response, "sections", "sections")?, "sections");
    let sections: Vec<Section> = serde_json::from_value(value)?;

    debug!("Parsed {} planned sections", sections.len());
    Ok(sections)
}

/// Parse a grade; a missing or unrecognised verdict is a [`ReportError::GradeFormat`]
pub fn parse_grade(response: &str, section_name: &str) -> ReportResult<Grade> {
    let grade_error = |message: String| ReportError::GradeFormat {
        message,
        section: section_name.to_string(),
        context: ErrorContext::new("structured_output").with_operation("parse_grade"),
    };

    let value = parse_value(response, "grade", "grade").map_err(|e| grade_error(e.to_string()))?;

    let verdict = match value
        .get("grade")
        .and_then(Value::as_str)
        .map(|v| v.trim().to_lowercase())
    {
        Some(v) if v == "pass" => Verdict::Pass,
        Some(v) if v == "fail" => Verdict::Fail,
        Some(other) => return Err(grade_error(format!("Unrecognised verdict '{}'", other))),
        None => return Err(grade_error("Grade has no verdict".to_string())),
    };

    let follow_up_queries = match value.get("follow_up_queries") {
        Some(Value::Null) | None => Vec::new(),
        Some(queries) => serde_json::from_value::<Vec<QueryItem>>(queries.clone())
            .map_err(|e| grade_error(format!("Malformed follow-up queries: {}", e)))?
            .into_iter()
            .map(SearchQuery::from)
            .collect(),
    };

    Ok(Grade {
        verdict,
        follow_up_queries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_response() {
        let response = "Here you go:\n```json\n{\"queries\": []}\n```\n";
        assert_eq!(extract_json(response), Some("{\"queries\": []}"));
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(
            extract_json("Grade [final]: {\"grade\": \"pass\"}"),
            Some("{\"grade\": \"pass\"}")
        );
    }

    #[test]
    fn test_bracketed_prose_before_object() {
        let grade = parse_grade(
            r#"Grade [final]: {"grade": "pass", "follow_up_queries": []}"#,
            "Body",
        )
        .unwrap();
        assert!(grade.is_pass());

        let sections = parse_sections(
            "Outline [v2]:\n{\"sections\": [{\"name\": \"Intro\", \"description\": \"Overview\", \"research\": false}]}",
        )
        .unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "Intro");

        let queries =
            parse_queries(r#"Queries [2 of 2]: {"queries": ["tokio scheduler", "smol"]}"#).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].query, "tokio scheduler");
    }

    #[test]
    fn test_bare_arrays_still_parse() {
        let sections = parse_sections(
            r#"Plan: [{"name": "A", "description": "a", "research": true},
                      {"name": "B", "description": "b", "research": false}]"#,
        )
        .unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].name, "B");

        let queries = parse_queries(r#"["one", {"search_query": "two"}]"#).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].query, "two");
    }

    #[test]
    fn test_parse_queries_accepts_objects_and_strings() {
        let response = r#"{"queries": [{"search_query": "tokio scheduler"}, "async-std status"]}"#;
        let queries = parse_queries(response).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].query, "tokio scheduler");
        assert_eq!(queries[1].query, "async-std status");

        let bare = r#"[{"query": "smol runtime", "rationale": "coverage"}]"#;
        let queries = parse_queries(bare).unwrap();
        assert_eq!(queries[0].rationale.as_deref(), Some("coverage"));
    }

    #[test]
    fn test_parse_sections() {
        let response = r#"{"sections": [
            {"name": "Introduction", "description": "Overview", "research": false, "content": ""},
            {"name": "Runtimes", "description": "Compare runtimes", "research": true}
        ]}"#;
        let sections = parse_sections(response).unwrap();
        assert_eq!(sections.len(), 2);
        assert!(!sections[0].requires_research);
        assert!(sections[1].requires_research);
        assert!(sections[1].content.is_empty());
    }

    #[test]
    fn test_parse_grade_pass_and_fail() {
        let grade = parse_grade(r#"{"grade": "pass", "follow_up_queries": []}"#, "Body").unwrap();
        assert!(grade.is_pass());

        let grade = parse_grade(
            r#"{"grade": "FAIL", "follow_up_queries": [{"search_query": "tokio benchmarks 2024"}]}"#,
            "Body",
        )
        .unwrap();
        assert_eq!(grade.verdict, Verdict::Fail);
        assert_eq!(grade.follow_up_queries.len(), 1);
    }

    #[test]
    fn test_grade_without_verdict_is_grade_format_error() {
        let error = parse_grade(r#"{"follow_up_queries": []}"#, "Body").unwrap_err();
        match error {
            ReportError::GradeFormat { section, .. } => assert_eq!(section, "Body"),
            other => panic!("unexpected error: {}", other),
        }

        assert!(matches!(
            parse_grade("I think it is fine", "Body"),
            Err(ReportError::GradeFormat { .. })
        ));
        assert!(matches!(
            parse_grade(r#"{"grade": "maybe"}"#, "Body"),
            Err(ReportError::GradeFormat { .. })
        ));
    }
}
