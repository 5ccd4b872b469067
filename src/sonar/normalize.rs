use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SonarError};
use crate::sonar::request::{ResponseFormat, SearchDepth};

/// Longest answer, in characters, returned to the caller untouched.
pub const CHARACTER_LIMIT: usize = 50_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Answer text and token accounting pulled out of an upstream body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub content: String,
    pub usage: Option<Usage>,
}

/// Operation-specific metadata carried next to the model and usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataExtra {
    Depth(SearchDepth),
    FocusAreas(Option<Vec<String>>),
    Constraints(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub model: String,
    pub tokens: Option<Usage>,
    #[serde(flatten)]
    pub extra: Option<MetadataExtra>,
}

#[derive(Debug, Serialize)]
struct JsonEnvelope<'a> {
    content: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Metadata>,
}

/// Pulls `choices[0].message.content` and `usage` out of `body`.
pub fn extract_answer(body: &Value) -> Result<Answer> {
    let choices = body
        .get("choices")
        .ok_or_else(|| malformed("missing 'choices'", body))?;
    let message = choices
        .get(0)
        .ok_or_else(|| malformed("'choices' is empty or not a list", body))?
        .get("message")
        .ok_or_else(|| malformed("missing 'choices[0].message'", body))?;
    let content = message
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing 'choices[0].message.content'", body))?;

    Ok(Answer {
        content: content.to_string(),
        usage: extract_usage(body),
    })
}

/// Absent sub-fields count as zero; a missing usage object yields `None`.
pub fn extract_usage(body: &Value) -> Option<Usage> {
    let usage = body.get("usage")?.as_object()?;
    let counter = |name: &str| usage.get(name).and_then(Value::as_u64).unwrap_or(0);
    Some(Usage {
        prompt_tokens: counter("prompt_tokens"),
        completion_tokens: counter("completion_tokens"),
        total_tokens: counter("total_tokens"),
    })
}

fn malformed(detail: &str, body: &Value) -> SonarError {
    SonarError::MalformedResponse(format!("{detail}\nResponse: {body}"))
}

/// Cuts `content` to `limit` characters and appends a notice when it is longer.
pub fn truncate(mut content: String, limit: usize) -> String {
    let Some((cut, _)) = content.char_indices().nth(limit) else {
        return content;
    };
    content.truncate(cut);
    let shown = group_thousands(limit);
    content.push_str(&format!(
        "\n\n---\n**⚠️ TRUNCATED:** Response exceeded {shown} characters. \
         Showing first {shown} characters. Consider:\n\
         - Using a more specific query\n\
         - Reducing max_tokens parameter\n\
         - Using 'quick' or 'standard' depth instead of 'detailed'"
    ));
    content
}

fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

pub fn render_markdown(content: &str, metadata: Option<&Metadata>, now: DateTime<Utc>) -> String {
    let Some(metadata) = metadata else {
        return content.to_string();
    };

    let mut lines = vec!["---".to_string()];
    if !metadata.model.is_empty() {
        lines.push(format!("**Model:** {}", metadata.model));
    }
    if let Some(tokens) = metadata.tokens {
        lines.push(format!(
            "**Tokens:** {} (prompt: {}, completion: {})",
            tokens.total_tokens, tokens.prompt_tokens, tokens.completion_tokens
        ));
    }
    lines.push(format!(
        "**Timestamp:** {}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.push("---\n".to_string());
    lines.push(content.to_string());
    lines.join("\n")
}

pub fn render_json(
    content: &str,
    metadata: Option<&Metadata>,
    now: DateTime<Utc>,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonEnvelope {
        content,
        timestamp: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        metadata,
    })
}

/// Turns an upstream body into the caller's envelope.
pub fn normalize(
    body: &Value,
    format: ResponseFormat,
    model: &str,
    extra: Option<MetadataExtra>,
    now: DateTime<Utc>,
) -> Result<String> {
    let answer = extract_answer(body)?;
    let content = truncate(answer.content, CHARACTER_LIMIT);
    let metadata = Metadata {
        model: model.to_string(),
        tokens: answer.usage,
        extra,
    };

    match format {
        ResponseFormat::Markdown => Ok(render_markdown(&content, Some(&metadata), now)),
        ResponseFormat::Json => Ok(render_json(&content, Some(&metadata), now)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53)
            .single()
            .expect("valid timestamp")
    }

    fn sample_body() -> Value {
        json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    /// Reads model and token counts back out of a rendered Markdown header.
    fn parse_header(rendered: &str) -> (Option<String>, Option<Usage>) {
        let mut sections = rendered.splitn(3, "---\n");
        assert_eq!(sections.next(), Some(""));
        let header = sections.next().expect("header block");

        let mut model = None;
        let mut usage = None;
        for line in header.lines() {
            if let Some(rest) = line.strip_prefix("**Model:** ") {
                model = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("**Tokens:** ") {
                let numbers: Vec<u64> = rest
                    .split(|c: char| !c.is_ascii_digit())
                    .filter(|part| !part.is_empty())
                    .map(|part| part.parse().expect("digits"))
                    .collect();
                usage = Some(Usage {
                    total_tokens: numbers[0],
                    prompt_tokens: numbers[1],
                    completion_tokens: numbers[2],
                });
            }
        }
        (model, usage)
    }

    #[test]
    fn json_mode_carries_content_and_usage() {
        let rendered = normalize(
            &sample_body(),
            ResponseFormat::Json,
            "perplexity/sonar-pro",
            Some(MetadataExtra::Depth(SearchDepth::Quick)),
            fixed_now(),
        )
        .expect("normalized");
        let value: Value = serde_json::from_str(&rendered).expect("valid json");

        assert_eq!(value["content"], "hello");
        assert_eq!(value["timestamp"], "2025-03-14T09:26:53Z");
        assert_eq!(value["metadata"]["model"], "perplexity/sonar-pro");
        assert_eq!(value["metadata"]["tokens"]["total_tokens"], 15);
        assert_eq!(value["metadata"]["tokens"]["prompt_tokens"], 10);
        assert_eq!(value["metadata"]["depth"], "quick");
    }

    #[test]
    fn json_mode_keeps_absent_extras_as_null() {
        let rendered = normalize(
            &json!({"choices": [{"message": {"content": "ok"}}]}),
            ResponseFormat::Json,
            "perplexity/sonar-reasoning-pro",
            Some(MetadataExtra::Constraints(None)),
            fixed_now(),
        )
        .expect("normalized");
        let value: Value = serde_json::from_str(&rendered).expect("valid json");
        let metadata = value["metadata"].as_object().expect("metadata object");
        assert_eq!(metadata.get("constraints"), Some(&Value::Null));
        assert_eq!(metadata.get("tokens"), Some(&Value::Null));
    }

    #[test]
    fn json_without_metadata_omits_key() {
        let rendered = render_json("plain", None, fixed_now()).expect("json");
        let value: Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(value, json!({"content": "plain", "timestamp": "2025-03-14T09:26:53Z"}));
    }

    #[test]
    fn json_keeps_non_ascii_text() {
        let rendered = render_json("café ☕", None, fixed_now()).expect("json");
        assert!(rendered.contains("café ☕"));
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = extract_answer(&json!({"usage": {"total_tokens": 3}})).expect_err("no choices");
        assert!(matches!(err, SonarError::MalformedResponse(_)));
    }

    #[test]
    fn empty_choices_and_null_content_are_malformed() {
        for body in [
            json!({"choices": []}),
            json!({"choices": [{}]}),
            json!({"choices": [{"message": {"content": null}}]}),
            json!({"choices": "nope"}),
        ] {
            assert!(extract_answer(&body).is_err(), "{body}");
        }
    }

    #[test]
    fn usage_sub_fields_default_to_zero() {
        let usage = extract_usage(&json!({"usage": {"completion_tokens": 7}}));
        assert_eq!(
            usage,
            Some(Usage {
                prompt_tokens: 0,
                completion_tokens: 7,
                total_tokens: 0,
            })
        );
        assert_eq!(extract_usage(&json!({"usage": {}})), Some(Usage::default()));
    }

    #[test]
    fn missing_usage_is_none() {
        assert_eq!(extract_usage(&json!({})), None);
        assert_eq!(extract_usage(&json!({"usage": null})), None);
    }

    #[test]
    fn truncation_boundary() {
        let exact = "x".repeat(CHARACTER_LIMIT);
        assert_eq!(truncate(exact.clone(), CHARACTER_LIMIT), exact);

        let over = "x".repeat(CHARACTER_LIMIT + 1);
        let truncated = truncate(over, CHARACTER_LIMIT);
        let (kept, notice) = truncated.split_at(CHARACTER_LIMIT);
        assert_eq!(kept, exact);
        assert_eq!(
            notice,
            "\n\n---\n**⚠️ TRUNCATED:** Response exceeded 50,000 characters. \
             Showing first 50,000 characters. Consider:\n\
             - Using a more specific query\n\
             - Reducing max_tokens parameter\n\
             - Using 'quick' or 'standard' depth instead of 'detailed'"
        );
    }

    #[test]
    fn truncation_counts_characters() {
        let content = "ü".repeat(12);
        let truncated = truncate(content, 10);
        assert!(truncated.starts_with(&"ü".repeat(10)));
        assert!(!truncated.starts_with(&"ü".repeat(11)));
        assert!(truncated.contains("exceeded 10 characters"));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(10), "10");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(50_000), "50,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn markdown_layout() {
        let metadata = Metadata {
            model: "perplexity/sonar-pro".to_string(),
            tokens: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            extra: None,
        };
        let rendered = render_markdown("Answer body", Some(&metadata), fixed_now());
        assert_eq!(
            rendered,
            "---\n\
             **Model:** perplexity/sonar-pro\n\
             **Tokens:** 15 (prompt: 10, completion: 5)\n\
             **Timestamp:** 2025-03-14 09:26:53 UTC\n\
             ---\n\n\
             Answer body"
        );
    }

    #[test]
    fn markdown_omits_absent_usage_but_renders_zero_counts() {
        let mut metadata = Metadata {
            model: "m".to_string(),
            tokens: None,
            extra: None,
        };
        let rendered = render_markdown("body", Some(&metadata), fixed_now());
        assert!(!rendered.contains("**Tokens:**"));

        metadata.tokens = Some(Usage::default());
        let rendered = render_markdown("body", Some(&metadata), fixed_now());
        assert!(rendered.contains("**Tokens:** 0 (prompt: 0, completion: 0)"));
    }

    #[test]
    fn markdown_without_metadata_is_content_only() {
        assert_eq!(render_markdown("body", None, fixed_now()), "body");
    }

    #[test]
    fn markdown_header_round_trips() {
        let usage = Usage {
            prompt_tokens: 1234,
            completion_tokens: 987,
            total_tokens: 2221,
        };
        let metadata = Metadata {
            model: "perplexity/sonar-reasoning-pro".to_string(),
            tokens: Some(usage),
            extra: Some(MetadataExtra::Constraints(Some("open source".to_string()))),
        };
        let rendered = render_markdown("---\nbody with a rule", Some(&metadata), fixed_now());
        let (model, parsed) = parse_header(&rendered);
        assert_eq!(model.as_deref(), Some("perplexity/sonar-reasoning-pro"));
        assert_eq!(parsed, Some(usage));
    }
}
