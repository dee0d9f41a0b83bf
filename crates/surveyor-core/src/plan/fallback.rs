//! Deterministic fallback plan, used when no generator is available.
//!
//! Built directly from the structured [`Topic`]; always passes
//! [`validate_plan`](super::validate_plan).

use serde_json::{Value, json};
use url::Url;

use crate::stage::StageKind;
use crate::state::Topic;

const QUERY_TEMPLATES: [&str; 5] = [
    "{topic} market analysis",
    "{topic} latest news",
    "{topic} industry trends",
    "{topic} reddit discussion",
    "{topic} instagram",
];

/// `(base url, query parameter, content type)`
const EXTRACTION_TEMPLATES: [(&str, &str, &str); 2] = [
    ("https://en.wikipedia.org/w/index.php", "search", "overview"),
    ("https://news.google.com/search", "q", "news"),
];

/// `(base url, query parameter)`
const SCREENSHOT_TEMPLATES: [(&str, &str); 2] = [
    ("https://www.google.com/search", "q"),
    ("https://www.youtube.com/results", "search_query"),
];

/// Build the fallback plan for `topic` as a raw plan value.
pub fn fallback_plan(topic: &Topic) -> Value {
    let topic = topic.as_str();

    let search_queries: Vec<String> = QUERY_TEMPLATES
        .iter()
        .map(|t| t.replace("{topic}", topic))
        .collect();

    let extraction_tasks: Vec<Value> = EXTRACTION_TEMPLATES
        .iter()
        .filter_map(|(base, param, content_type)| {
            search_url(base, param, topic).map(|url| json!({"url": url, "content_type": content_type}))
        })
        .collect();

    let screenshot_targets: Vec<String> = SCREENSHOT_TEMPLATES
        .iter()
        .filter_map(|(base, param)| search_url(base, param, topic))
        .collect();

    let team: Vec<Value> = StageKind::ALL
        .into_iter()
        .map(|kind| default_descriptor(kind, topic))
        .collect();

    json!({
        "search_queries": search_queries,
        "extraction_tasks": extraction_tasks,
        "screenshot_targets": screenshot_targets,
        "team": team,
    })
}

fn search_url(base: &str, param: &str, topic: &str) -> Option<String> {
    Url::parse_with_params(base, &[(param, topic)])
        .ok()
        .map(String::from)
}

fn default_descriptor(kind: StageKind, topic: &str) -> Value {
    let (role, goal, tools, constraints): (String, String, Vec<&str>, Vec<&str>) = match kind {
        StageKind::WebSailor => (
            format!("Senior market analyst researching {topic}"),
            format!("Find the main sources, competitors and figures about {topic}"),
            vec!["web_search"],
            vec!["Prefer sources with verifiable data"],
        ),
        StageKind::ViralContent => (
            format!("Social media trend watcher for {topic}"),
            format!("Find viral posts and discussions about {topic}"),
            vec!["social_search"],
            vec!["Only consider public content"],
        ),
        StageKind::ContentExtractor => (
            format!("Digital archivist for {topic}"),
            format!("Extract the readable text of every page found about {topic}"),
            vec!["main_content", "full_text"],
            vec!["Discard navigation and advertising"],
        ),
        StageKind::VisualEvidence => (
            format!("Investigative photographer for {topic}"),
            format!("Capture screenshots of key pages about {topic}"),
            vec!["screenshot"],
            vec!["Capture the full page when possible"],
        ),
    };
    json!({
        "agent_class": kind.as_str(),
        "role": role,
        "goal": goal,
        "tools": tools,
        "constraints": constraints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::validate_plan;

    #[test]
    fn fallback_has_one_entry_per_stage_kind_in_order() {
        let topic = Topic::new("artisanal coffee market").unwrap();
        let plan = validate_plan(&fallback_plan(&topic)).unwrap();
        let keys: Vec<&str> = plan.team().iter().map(|d| d.implementation()).collect();
        assert_eq!(
            keys,
            ["web_sailor", "viral_content", "content_extractor", "visual_evidence"]
        );
        assert!(plan.team()[0].goal().contains("artisanal coffee market"));
    }

    #[test]
    fn every_template_produces_a_location() {
        let topic = Topic::new("coffee & tea / 100%").unwrap();
        let plan = validate_plan(&fallback_plan(&topic)).unwrap();
        assert_eq!(plan.search_queries().len(), QUERY_TEMPLATES.len());
        assert_eq!(plan.extraction_tasks().len(), EXTRACTION_TEMPLATES.len());
        assert_eq!(plan.screenshot_targets().len(), SCREENSHOT_TEMPLATES.len());
        assert!(plan.screenshot_targets()[0].starts_with("https://www.google.com/search?q="));
    }

    #[test]
    fn fallback_is_deterministic() {
        let topic = Topic::new("vinyl records").unwrap();
        assert_eq!(fallback_plan(&topic), fallback_plan(&topic));
    }
}
