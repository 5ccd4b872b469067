use std::fmt::Write;

use crate::sonar::provider::ChatMessage;
use crate::sonar::request::{
    AskRequest, OperationRequest, ReasonRequest, ResearchRequest, SearchRequest,
};

const REASON_INSTRUCTIONS: &str = "Please provide:\n\
    1. Problem analysis and key factors\n\
    2. Evaluation of different approaches\n\
    3. Tradeoffs and considerations\n\
    4. Recommendation with justification\n\
    5. Implementation considerations";

/// Renders the single user message sent upstream for `request`.
pub fn build(request: &OperationRequest) -> ChatMessage {
    let content = match request {
        OperationRequest::Search(search) => search_prompt(search),
        OperationRequest::Ask(ask) => ask_prompt(ask),
        OperationRequest::Research(research) => research_prompt(research),
        OperationRequest::Reason(reason) => reason_prompt(reason),
    };
    ChatMessage::user(content)
}

fn search_prompt(request: &SearchRequest) -> String {
    request.query.clone()
}

fn ask_prompt(request: &AskRequest) -> String {
    match &request.context {
        Some(context) => format!("Context: {context}\n\nQuestion: {}", request.question),
        None => request.question.clone(),
    }
}

fn research_prompt(request: &ResearchRequest) -> String {
    let mut prompt = format!(
        "Conduct comprehensive research on: {}\n\n\
         Provide a detailed analysis with multiple sources and citations. \
         Structure the response with clear sections and headings.\n",
        request.topic
    );

    if let Some(areas) = request.focus_areas.as_deref().filter(|areas| !areas.is_empty()) {
        prompt.push_str("\nFocus specifically on these aspects:\n");
        for (index, area) in areas.iter().enumerate() {
            // Writing into a String cannot fail.
            let _ = writeln!(prompt, "{}. {area}", index + 1);
        }
    }
    prompt
}

fn reason_prompt(request: &ReasonRequest) -> String {
    let mut prompt = format!(
        "Analyze this problem with step-by-step reasoning:\n\n{}\n\n",
        request.problem
    );
    if let Some(constraints) = &request.constraints {
        let _ = write!(prompt, "Constraints to consider:\n{constraints}\n\n");
    }
    prompt.push_str(REASON_INSTRUCTIONS);
    prompt
}
