use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Strip an optional markdown code fence (```` ```json … ``` ````) from
/// `text`. Returns `None` for an opening fence without a closing one.
pub fn strip_code_fence(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return Some(trimmed);
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim)
}

/// Fence-strip then strictly parse a JSON object. Anything else is `None`.
pub fn parse_json_from_text(text: &str) -> Option<Value> {
    let body = strip_code_fence(text)?;
    match serde_json::from_str::<Value>(body) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

/// The decision service's answer for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TurnDecision {
    pub narrative: String,
    #[serde(alias = "scene_to_trigger", alias = "next_question")]
    pub next_scene: String,
}

impl TurnDecision {
    pub fn from_text(text: &str) -> Option<Self> {
        let value = parse_json_from_text(text)?;
        serde_json::from_value(value).ok()
    }
}

/// One beat of a told story: what to say, and optionally which scene to
/// show while saying it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoryStep {
    pub narrative: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// The decision service's answer to a story request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoryPlan {
    #[serde(rename = "story_plan")]
    pub steps: Vec<StoryStep>,
}

impl StoryPlan {
    /// `None` for anything but an object with a non-empty `story_plan`.
    pub fn from_text(text: &str) -> Option<Self> {
        let value = parse_json_from_text(text)?;
        let plan: Self = serde_json::from_value(value).ok()?;
        (!plan.steps.is_empty()).then_some(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json() {
        let v = parse_json_from_text("```json\n{\"narrative\":\"x\",\"next_scene\":\"Y\"}\n```");
        assert_eq!(v, Some(json!({"narrative": "x", "next_scene": "Y"})));
    }

    #[test]
    fn bare_fence_and_plain_json() {
        assert_eq!(
            parse_json_from_text("```\n{\"a\":1}\n```"),
            Some(json!({"a": 1}))
        );
        assert_eq!(parse_json_from_text("  {\"a\":1}  "), Some(json!({"a": 1})));
    }

    #[test]
    fn malformed_is_none() {
        for bad in [
            "",
            "not json",
            "```json\n{\"a\":1}",
            "{\"a\":1} trailing",
            "[1,2,3]",
            "Sure! ```json {\"a\":1}```",
        ] {
            assert_eq!(parse_json_from_text(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn decision_requires_both_fields() {
        let d = TurnDecision::from_text(r#"{"narrative":"Moved to the park.","next_scene":"PARK_AND_CITY"}"#)
            .unwrap();
        assert_eq!(d.next_scene, "PARK_AND_CITY");
        assert_eq!(TurnDecision::from_text(r#"{"narrative":"hi"}"#), None);
        assert_eq!(TurnDecision::from_text(r#"{"next_scene":"HOME"}"#), None);
        assert_eq!(
            TurnDecision::from_text(r#"{"narrative":"hi","next_scene":7}"#),
            None
        );
    }

    #[test]
    fn decision_accepts_variant_field_names() {
        let d = TurnDecision::from_text(r#"{"narrative":"n","scene_to_trigger":"MARKET"}"#).unwrap();
        assert_eq!(d.next_scene, "MARKET");
    }

    #[test]
    fn story_plan_steps_and_optional_location() {
        let plan = StoryPlan::from_text(
            r#"```json
{"story_plan":[{"narrative":"A kitten wakes up.","location":"AUMS_HOME"},{"narrative":"It wanders."}]}
```"#,
        )
        .unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].location.as_deref(), Some("AUMS_HOME"));
        assert_eq!(plan.steps[1].location, None);
    }

    #[test]
    fn story_plan_rejects_missing_or_empty_plan() {
        assert_eq!(StoryPlan::from_text(r#"{"narrative":"hi","next_scene":"X"}"#), None);
        assert_eq!(StoryPlan::from_text(r#"{"story_plan":[]}"#), None);
        assert_eq!(StoryPlan::from_text(r#"{"story_plan":[{"location":"X"}]}"#), None);
    }
}
