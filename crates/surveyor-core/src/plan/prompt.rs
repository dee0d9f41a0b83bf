//! Planning prompt construction. Pure string assembly, no I/O.

use crate::state::Topic;

/// Reference description of the plan JSON, embedded in the prompt.
const SCHEMA_REFERENCE: &str = r#"## Plan JSON Schema

```json
{
  "search_queries": ["string", "..."],
  "extraction_tasks": [
    {"url": "https://...", "content_type": "statistics | article | review | ..."}
  ],
  "screenshot_targets": ["https://...", "..."],
  "team": [
    {
      "agent_class": "web_sailor | viral_content | content_extractor | visual_evidence",
      "role": "who this stage is for this mission",
      "goal": "a specific, measurable objective",
      "tools": ["tool names the stage may use"],
      "constraints": ["rules the stage must follow"]
    }
  ]
}
```

- `search_queries` (required, non-empty): specific queries, no blank entries.
- `extraction_tasks` (optional): pages whose text should be extracted.
- `screenshot_targets` (optional): pages worth capturing as visual evidence.
- `team` (required): the ordered list of stages to run."#;

/// Rules the generated plan must follow.
const PLANNING_RULES: &str = r#"## Rules

1. Vary the search queries: market analyses, forum discussions (Reddit,
   Quora), social media content (Instagram, YouTube, TikTok), recent news and
   blog articles.
2. The team must have between 3 and 5 entries. Always include `web_sailor`,
   `content_extractor` and `visual_evidence`. Add `viral_content` when the
   topic is consumer-facing or trend-driven.
3. Every team entry needs a concrete, measurable `goal`.
4. Reply with the JSON object only, no surrounding text."#;

/// Build the prompt sent to the plan generator for `topic`.
pub fn build_planning_prompt(topic: &Topic) -> String {
    format!(
        "You are assembling a team of research stages for a market research \
         mission on the topic \"{topic}\". Produce a detailed, actionable \
         mission plan as JSON.\n\n\
         {PLANNING_RULES}\n\n\
         {SCHEMA_REFERENCE}\n\n\
         Now produce the mission plan for the topic: \"{topic}\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_topic_schema_and_rules() {
        let topic = Topic::new("artisanal coffee market").unwrap();
        let prompt = build_planning_prompt(&topic);
        assert!(prompt.contains("\"artisanal coffee market\""));
        assert!(prompt.contains("search_queries"));
        assert!(prompt.contains("agent_class"));
        assert!(prompt.contains("between 3 and 5"));
    }
}
