use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::sonar::request::{
    ASK_TOKENS, CONSTRAINTS, CONTEXT, MAX_FOCUS_AREAS, MIN_FOCUS_AREA_CHARS, Operation, PROBLEM,
    QUERY, QUESTION, REASON_TOKENS, RESEARCH_TOKENS, ResponseFormat, SearchDepth, TOPIC, TextRule,
    TokenRule,
};

/// JSON schema primitive types used by tool parameters.
#[derive(Debug, Clone, Copy)]
pub enum ToolParamType {
    Integer,
    String,
    Array,
}

impl ToolParamType {
    fn as_str(self) -> &'static str {
        match self {
            ToolParamType::Integer => "integer",
            ToolParamType::String => "string",
            ToolParamType::Array => "array",
        }
    }
}

/// One parameter of a tool's input schema.
#[derive(Debug, Clone)]
pub struct ToolParam {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ToolParamType,
    pub required: bool,
    /// Extra JSON schema keywords (`minLength`, `enum`, `default`, ...).
    pub constraints: Map<String, Value>,
}

impl ToolParam {
    pub fn new(name: &'static str, kind: ToolParamType, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
            constraints: Map::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn with(mut self, keyword: &str, value: Value) -> Self {
        self.constraints.insert(keyword.to_string(), value);
        self
    }

    /// Free-text parameter bounded by `rule`.
    pub fn text(rule: TextRule, description: &'static str) -> Self {
        Self::new(rule.name, ToolParamType::String, description)
            .with("minLength", json!(rule.min))
            .with("maxLength", json!(rule.max))
    }

    pub fn one_of(self, values: &[&str], default: &str) -> Self {
        self.with("enum", json!(values)).with("default", json!(default))
    }

    pub fn tokens(rule: TokenRule, description: &'static str) -> Self {
        Self::new("max_tokens", ToolParamType::Integer, description)
            .with("minimum", json!(rule.min))
            .with("maximum", json!(rule.max))
            .with("default", json!(rule.default))
    }

    fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.kind.as_str()));
        schema.insert("description".to_string(), json!(self.description));
        schema.extend(self.constraints.clone());
        Value::Object(schema)
    }
}

/// Behaviour hints advertised with a tool.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolHints {
    pub read_only_hint: bool,
    pub destructive_hint: bool,
    pub idempotent_hint: bool,
    pub open_world_hint: bool,
}

/// Every tool reads the open web and may answer differently each time.
pub const SONAR_HINTS: ToolHints = ToolHints {
    read_only_hint: true,
    destructive_hint: false,
    idempotent_hint: false,
    open_world_hint: true,
};

/// A tool as advertised to MCP clients.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub operation: Operation,
    pub title: &'static str,
    pub description: &'static str,
    pub params: Vec<ToolParam>,
    pub hints: ToolHints,
}

impl ToolSpec {
    pub fn name(&self) -> &'static str {
        self.operation.tool_name()
    }

    /// Strict object schema: unknown properties are not allowed.
    pub fn input_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            properties.insert(param.name.to_string(), param.to_schema());
            if param.required {
                required.push(json!(param.name));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), Value::Array(required));
        schema.insert("additionalProperties".to_string(), Value::Bool(false));
        schema
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name(),
            "title": self.title,
            "description": self.description,
            "inputSchema": self.input_schema(),
            "annotations": self.hints,
        })
    }
}

fn response_format_param() -> ToolParam {
    ToolParam::new(
        "response_format",
        ToolParamType::String,
        "Output format: 'markdown' for human-readable or 'json' for machine-readable",
    )
    .one_of(&ResponseFormat::VALUES, ResponseFormat::Markdown.as_str())
}

pub fn spec(operation: Operation) -> ToolSpec {
    match operation {
        Operation::Search => ToolSpec {
            operation,
            title: "Sonar Web Search",
            description: "Search the web using Perplexity's Sonar Pro with real-time information \
                and citations. Depth controls answer length: 'quick' (~1000 tokens), \
                'standard' (~2000), 'detailed' (~4000).",
            params: vec![
                ToolParam::text(
                    QUERY,
                    "Search query in natural language: a question, topic, or keywords",
                )
                .required(),
                ToolParam::new(
                    "depth",
                    ToolParamType::String,
                    "Search depth: 'quick', 'standard' or 'detailed'",
                )
                .one_of(&SearchDepth::VALUES, SearchDepth::Standard.as_str()),
                response_format_param(),
            ],
            hints: SONAR_HINTS,
        },
        Operation::Ask => ToolSpec {
            operation,
            title: "Ask Sonar a Question",
            description: "Ask a conversational question answered with web-augmented knowledge \
                and citations. Optional context narrows the answer.",
            params: vec![
                ToolParam::text(QUESTION, "Conversational question to ask").required(),
                ToolParam::text(
                    CONTEXT,
                    "Optional context to narrow the answer, e.g. 'I'm a beginner programmer'",
                ),
                ToolParam::tokens(ASK_TOKENS, "Maximum tokens in the response"),
                response_format_param(),
            ],
            hints: SONAR_HINTS,
        },
        Operation::Research => ToolSpec {
            operation,
            title: "Deep Research with Sonar",
            description: "Conduct comprehensive multi-source research on a topic, structured \
                in sections with citations. Optional focus areas target specific aspects.",
            params: vec![
                ToolParam::text(TOPIC, "Research topic for comprehensive analysis").required(),
                ToolParam::new(
                    "focus_areas",
                    ToolParamType::Array,
                    "Specific aspects to focus on (max 5)",
                )
                .with("maxItems", json!(MAX_FOCUS_AREAS))
                .with(
                    "items",
                    json!({"type": "string", "minLength": MIN_FOCUS_AREA_CHARS}),
                ),
                ToolParam::tokens(RESEARCH_TOKENS, "Maximum tokens for the report"),
                response_format_param(),
            ],
            hints: SONAR_HINTS,
        },
        Operation::Reason => ToolSpec {
            operation,
            title: "Complex Reasoning with Sonar",
            description: "Solve a complex problem with step-by-step reasoning: analysis, \
                evaluation of approaches, tradeoffs, a recommendation and implementation notes.",
            params: vec![
                ToolParam::text(PROBLEM, "Problem or question requiring step-by-step reasoning")
                    .required(),
                ToolParam::text(
                    CONSTRAINTS,
                    "Optional constraints, e.g. 'budget under $10k', 'must be open source'",
                ),
                ToolParam::tokens(REASON_TOKENS, "Maximum tokens for the reasoning"),
                response_format_param(),
            ],
            hints: SONAR_HINTS,
        },
    }
}

/// All tools, in a stable order.
pub fn catalog() -> Vec<ToolSpec> {
    Operation::ALL.into_iter().map(spec).collect()
}
