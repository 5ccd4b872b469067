use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sonar::normalize::{self, MetadataExtra};
use crate::sonar::prompt;
use crate::sonar::provider::{ChatRequest, Upstream};
use crate::sonar::request::{Operation, OperationRequest, Params};

pub const DEFAULT_MODEL: &str = "perplexity/sonar-pro";
pub const DEFAULT_REASONING_MODEL: &str = "perplexity/sonar-reasoning-pro";

/// Model identifiers used by the operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Models {
    /// Used by search, ask and research.
    pub model: String,
    /// Used by reason.
    pub reasoning_model: String,
}

impl Default for Models {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            reasoning_model: DEFAULT_REASONING_MODEL.to_string(),
        }
    }
}

/// Everything needed to run one validated request: the upstream payload plus
/// the request it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub request: OperationRequest,
    pub chat: ChatRequest,
}

impl Plan {
    pub fn new(request: OperationRequest, models: &Models) -> Self {
        let (model, temperature, max_tokens) = match &request {
            // Search has no budget field of its own; depth decides.
            OperationRequest::Search(search) => (&models.model, 0.2, search.depth.token_budget()),
            OperationRequest::Ask(ask) => (&models.model, 0.3, ask.max_tokens),
            OperationRequest::Research(research) => (&models.model, 0.2, research.max_tokens),
            OperationRequest::Reason(reason) => (&models.reasoning_model, 0.2, reason.max_tokens),
        };
        let chat = ChatRequest {
            model: model.clone(),
            messages: vec![prompt::build(&request)],
            max_tokens,
            temperature,
        };
        Self { request, chat }
    }

    pub fn operation(&self) -> Operation {
        self.request.operation()
    }

    pub fn metadata_extra(&self) -> Option<MetadataExtra> {
        match &self.request {
            OperationRequest::Search(search) => Some(MetadataExtra::Depth(search.depth)),
            OperationRequest::Ask(_) => None,
            OperationRequest::Research(research) => {
                Some(MetadataExtra::FocusAreas(research.focus_areas.clone()))
            }
            OperationRequest::Reason(reason) => {
                Some(MetadataExtra::Constraints(reason.constraints.clone()))
            }
        }
    }
}

/// Shared pipeline behind all four tools. Holds no per-call state.
#[derive(Clone)]
pub struct Sonar {
    upstream: Arc<dyn Upstream>,
    models: Models,
}

impl Sonar {
    pub fn new(upstream: Arc<dyn Upstream>, models: Models) -> Self {
        Self { upstream, models }
    }

    /// Validates `params` and derives the upstream request without sending it.
    pub fn plan(&self, operation: Operation, params: &Params) -> Result<Plan> {
        let request = OperationRequest::validate(operation, params).inspect_err(|err| {
            warn!(tool = %operation, field = %err.field, "rejected tool input");
        })?;
        Ok(Plan::new(request, &self.models))
    }

    pub async fn call(&self, operation: Operation, params: &Params) -> Result<String> {
        let plan = self.plan(operation, params)?;
        self.execute(&plan).await
    }

    pub async fn execute(&self, plan: &Plan) -> Result<String> {
        let operation = plan.operation();
        info!(
            tool = %operation,
            model = %plan.chat.model,
            max_tokens = plan.chat.max_tokens,
            "calling upstream"
        );

        let body = self.upstream.send(&plan.chat).await.inspect_err(|err| {
            warn!(tool = %operation, error = %err, "upstream request failed");
        })?;

        let answer_len = body
            .pointer("/choices/0/message/content")
            .and_then(|content| content.as_str())
            .map(|content| content.chars().count());
        if let Some(len) = answer_len.filter(|len| *len > normalize::CHARACTER_LIMIT) {
            warn!(tool = %operation, chars = len, "truncating oversized answer");
        }
        if let Some(usage) = normalize::extract_usage(&body) {
            debug!(
                tool = %operation,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "upstream usage"
            );
        }

        normalize::normalize(
            &body,
            plan.request.response_format(),
            &plan.chat.model,
            plan.metadata_extra(),
            Utc::now(),
        )
    }
}
