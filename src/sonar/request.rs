use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Raw tool arguments as received from the caller.
pub type Params = Map<String, Value>;

/// A rejected input field and the constraint it violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Input validation error for '{field}': {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Length bounds for a free-text field, counted in characters after trimming.
#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub name: &'static str,
    pub min: usize,
    pub max: usize,
}

/// Inclusive bounds and default for a `max_tokens` field.
#[derive(Debug, Clone, Copy)]
pub struct TokenRule {
    pub min: u32,
    pub max: u32,
    pub default: u32,
}

pub const QUERY: TextRule = TextRule { name: "query", min: 3, max: 500 };
pub const QUESTION: TextRule = TextRule { name: "question", min: 10, max: 1000 };
pub const CONTEXT: TextRule = TextRule { name: "context", min: 1, max: 500 };
pub const TOPIC: TextRule = TextRule { name: "topic", min: 10, max: 300 };
pub const PROBLEM: TextRule = TextRule { name: "problem", min: 20, max: 1000 };
pub const CONSTRAINTS: TextRule = TextRule { name: "constraints", min: 1, max: 500 };

pub const ASK_TOKENS: TokenRule = TokenRule { min: 500, max: 4000, default: 2000 };
pub const RESEARCH_TOKENS: TokenRule = TokenRule { min: 2000, max: 6000, default: 4000 };
pub const REASON_TOKENS: TokenRule = TokenRule { min: 1000, max: 5000, default: 3000 };

pub const MAX_FOCUS_AREAS: usize = 5;
pub const MIN_FOCUS_AREA_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Quick,
    Standard,
    Detailed,
}

impl SearchDepth {
    pub const VALUES: [&'static str; 3] = ["quick", "standard", "detailed"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Detailed => "detailed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "quick" => Some(Self::Quick),
            "standard" => Some(Self::Standard),
            "detailed" => Some(Self::Detailed),
            _ => None,
        }
    }

    /// Upstream token budget for a search at this depth.
    pub fn token_budget(self) -> u32 {
        match self {
            Self::Quick => 1000,
            Self::Standard => 2000,
            Self::Detailed => 4000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Markdown,
    Json,
}

impl ResponseFormat {
    pub const VALUES: [&'static str; 2] = ["markdown", "json"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "markdown" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// The four caller-facing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Search,
    Ask,
    Research,
    Reason,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Self::Search, Self::Ask, Self::Research, Self::Reason];

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Search => "sonar_search",
            Self::Ask => "sonar_ask",
            Self::Research => "sonar_research",
            Self::Reason => "sonar_reason",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.tool_name() == name)
    }

    /// Field names accepted by this operation, in schema order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Search => &["query", "depth", "response_format"],
            Self::Ask => &["question", "context", "max_tokens", "response_format"],
            Self::Research => &["topic", "focus_areas", "max_tokens", "response_format"],
            Self::Reason => &["problem", "constraints", "max_tokens", "response_format"],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub depth: SearchDepth,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
    pub context: Option<String>,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchRequest {
    pub topic: String,
    pub focus_areas: Option<Vec<String>>,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonRequest {
    pub problem: String,
    pub constraints: Option<String>,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

/// A validated tool input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Search(SearchRequest),
    Ask(AskRequest),
    Research(ResearchRequest),
    Reason(ReasonRequest),
}

impl OperationRequest {
    /// Validates raw arguments for `operation`.
    ///
    /// Unknown fields are checked first, so they fail even when every other
    /// field is valid.
    pub fn validate(operation: Operation, params: &Params) -> Result<Self, ValidationError> {
        let fields = Fields::new(params, operation.fields())?;
        let request = match operation {
            Operation::Search => Self::Search(SearchRequest {
                query: fields.required_text(QUERY)?,
                depth: fields.choice(
                    "depth",
                    SearchDepth::Standard,
                    SearchDepth::parse,
                    &SearchDepth::VALUES,
                )?,
                response_format: fields.response_format()?,
            }),
            Operation::Ask => Self::Ask(AskRequest {
                question: fields.required_text(QUESTION)?,
                context: fields.optional_text(CONTEXT)?,
                max_tokens: fields.max_tokens(ASK_TOKENS)?,
                response_format: fields.response_format()?,
            }),
            Operation::Research => Self::Research(ResearchRequest {
                topic: fields.required_text(TOPIC)?,
                focus_areas: fields.focus_areas()?,
                max_tokens: fields.max_tokens(RESEARCH_TOKENS)?,
                response_format: fields.response_format()?,
            }),
            Operation::Reason => Self::Reason(ReasonRequest {
                problem: fields.required_text(PROBLEM)?,
                constraints: fields.optional_text(CONSTRAINTS)?,
                max_tokens: fields.max_tokens(REASON_TOKENS)?,
                response_format: fields.response_format()?,
            }),
        };
        Ok(request)
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Search(_) => Operation::Search,
            Self::Ask(_) => Operation::Ask,
            Self::Research(_) => Operation::Research,
            Self::Reason(_) => Operation::Reason,
        }
    }

    pub fn response_format(&self) -> ResponseFormat {
        match self {
            Self::Search(request) => request.response_format,
            Self::Ask(request) => request.response_format,
            Self::Research(request) => request.response_format,
            Self::Reason(request) => request.response_format,
        }
    }
}

struct Fields<'a> {
    params: &'a Params,
}

impl<'a> Fields<'a> {
    fn new(params: &'a Params, allowed: &[&str]) -> Result<Self, ValidationError> {
        if let Some(unknown) = params.keys().find(|key| !allowed.contains(&key.as_str())) {
            return Err(ValidationError::new(
                unknown.as_str(),
                format!("unknown field; expected one of: {}", allowed.join(", ")),
            ));
        }
        Ok(Self { params })
    }

    /// Absent keys and explicit nulls both read as `None`.
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.params.get(name).filter(|value| !value.is_null())
    }

    fn required_text(&self, rule: TextRule) -> Result<String, ValidationError> {
        let value = self
            .get(rule.name)
            .ok_or_else(|| ValidationError::new(rule.name, "field is required"))?;
        check_text(rule, value)
    }

    fn optional_text(&self, rule: TextRule) -> Result<Option<String>, ValidationError> {
        self.get(rule.name).map(|value| check_text(rule, value)).transpose()
    }

    fn choice<T>(
        &self,
        name: &str,
        default: T,
        parse: fn(&str) -> Option<T>,
        allowed: &[&str],
    ) -> Result<T, ValidationError> {
        let Some(value) = self.params.get(name) else {
            return Ok(default);
        };
        let raw = value
            .as_str()
            .ok_or_else(|| ValidationError::new(name, "must be a string"))?;
        parse(raw).ok_or_else(|| {
            ValidationError::new(
                name,
                format!("must be one of: {} (got '{raw}')", allowed.join(", ")),
            )
        })
    }

    fn response_format(&self) -> Result<ResponseFormat, ValidationError> {
        self.choice(
            "response_format",
            ResponseFormat::Markdown,
            ResponseFormat::parse,
            &ResponseFormat::VALUES,
        )
    }

    fn max_tokens(&self, rule: TokenRule) -> Result<u32, ValidationError> {
        const NAME: &str = "max_tokens";
        let Some(value) = self.params.get(NAME) else {
            return Ok(rule.default);
        };
        let out_of_range = |got: &dyn fmt::Display| {
            ValidationError::new(
                NAME,
                format!("must be between {} and {} (got {got})", rule.min, rule.max),
            )
        };
        let number = match value {
            Value::Number(number) if number.is_i64() || number.is_u64() => number,
            _ => return Err(ValidationError::new(NAME, "must be an integer")),
        };
        let tokens = number
            .as_u64()
            .and_then(|raw| u32::try_from(raw).ok())
            .ok_or_else(|| out_of_range(number))?;
        if tokens < rule.min || tokens > rule.max {
            return Err(out_of_range(&tokens));
        }
        Ok(tokens)
    }

    fn focus_areas(&self) -> Result<Option<Vec<String>>, ValidationError> {
        const NAME: &str = "focus_areas";
        let Some(value) = self.get(NAME) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| ValidationError::new(NAME, "must be a list of strings"))?;
        if items.len() > MAX_FOCUS_AREAS {
            return Err(ValidationError::new(
                NAME,
                format!(
                    "too many focus areas: maximum {MAX_FOCUS_AREAS} allowed (got {})",
                    items.len()
                ),
            ));
        }

        let mut areas = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let field = format!("{NAME}[{index}]");
            let area = item
                .as_str()
                .ok_or_else(|| ValidationError::new(field.as_str(), "must be a string"))?
                .trim();
            if area.chars().count() < MIN_FOCUS_AREA_CHARS {
                return Err(ValidationError::new(
                    field,
                    format!(
                        "focus area too short: each must be at least {MIN_FOCUS_AREA_CHARS} characters"
                    ),
                ));
            }
            areas.push(area.to_string());
        }
        Ok(Some(areas))
    }
}

fn check_text(rule: TextRule, value: &Value) -> Result<String, ValidationError> {
    let text = value
        .as_str()
        .ok_or_else(|| ValidationError::new(rule.name, "must be a string"))?
        .trim();
    let length = text.chars().count();
    if length == 0 {
        return Err(ValidationError::new(
            rule.name,
            "must not be empty or whitespace",
        ));
    }
    if length < rule.min {
        return Err(ValidationError::new(
            rule.name,
            format!(
                "must be at least {} characters after trimming (got {length})",
                rule.min
            ),
        ));
    }
    if length > rule.max {
        return Err(ValidationError::new(
            rule.name,
            format!("must be at most {} characters (got {length})", rule.max),
        ));
    }
    Ok(text.to_string())
}
