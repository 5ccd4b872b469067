use std::io::{self, IsTerminal, Read};

use clap::Args;
use serde::Serialize;
use serde_json::Value;

use crate::commands::build_sonar;
use crate::config;
use crate::sonar::pipeline::Plan;
use crate::sonar::provider::ChatMessage;
use crate::sonar::request::{Operation, Params};

#[derive(Debug, Args, Clone)]
pub struct CallArgs {
    /// Tool to run: sonar_search, sonar_ask, sonar_research or sonar_reason.
    #[arg(value_parser = parse_tool)]
    tool: Operation,

    /// Tool parameters as a JSON object. Read from stdin when omitted.
    #[arg(long, short)]
    params: Option<String>,

    /// Validate and print the upstream request without sending it.
    #[arg(long)]
    dry_run: bool,
}

fn parse_tool(raw: &str) -> Result<Operation, String> {
    Operation::from_tool_name(raw).ok_or_else(|| {
        let known: Vec<_> = Operation::ALL.iter().map(|op| op.tool_name()).collect();
        format!("Unknown tool '{raw}'. Supported values: {}.", known.join(", "))
    })
}

#[derive(Debug, Serialize)]
struct DryRun<'a> {
    dry_run: bool,
    tool: &'static str,
    endpoint: &'a str,
    model: &'a str,
    response_format: &'static str,
    request: DryRunRequest,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Serialize)]
struct DryRunRequest {
    max_tokens: u32,
    temperature: f32,
}

pub async fn run(args: CallArgs) -> Result<(), String> {
    let params = read_params(args.params)?;
    let settings = config::load()?;
    let sonar = build_sonar(&settings.upstream)?;

    if args.dry_run {
        let plan = sonar
            .plan(args.tool, &params)
            .map_err(|err| err.to_string())?;
        return print_dry_run(&plan, &settings.upstream.endpoint);
    }

    let output = sonar
        .call(args.tool, &params)
        .await
        .map_err(|err| err.to_string())?;
    println!("{output}");
    Ok(())
}

fn read_params(inline: Option<String>) -> Result<Params, String> {
    let raw = match inline {
        Some(raw) => raw,
        None if !io::stdin().is_terminal() => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|err| format!("Failed to read parameters from stdin: {err}"))?;
            buffer
        }
        None => String::new(),
    };

    if raw.trim().is_empty() {
        return Ok(Params::new());
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(_) => Err("Tool parameters must be a JSON object.".to_string()),
        Err(err) => Err(format!("Tool parameters are not valid JSON: {err}")),
    }
}

fn print_dry_run(plan: &Plan, endpoint: &str) -> Result<(), String> {
    let report = DryRun {
        dry_run: true,
        tool: plan.operation().tool_name(),
        endpoint,
        model: &plan.chat.model,
        response_format: plan.request.response_format().as_str(),
        request: DryRunRequest {
            max_tokens: plan.chat.max_tokens,
            temperature: plan.chat.temperature,
        },
        messages: &plan.chat.messages,
    };
    let text = serde_json::to_string(&report)
        .map_err(|err| format!("Failed to encode dry-run output: {err}"))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_tool, read_params};
    use crate::sonar::request::Operation;

    #[test]
    fn tool_names_parse() {
        assert_eq!(parse_tool("sonar_reason"), Ok(Operation::Reason));
        let err = parse_tool("sonar").expect_err("unknown tool");
        assert!(err.contains("sonar_search, sonar_ask, sonar_research, sonar_reason"));
    }

    #[test]
    fn inline_params_must_be_an_object() {
        let params = read_params(Some("{\"query\": \"abc\"}".to_string())).expect("object");
        assert_eq!(params["query"], "abc");

        let err = read_params(Some("[1, 2]".to_string())).expect_err("array");
        assert!(err.contains("JSON object"));

        let err = read_params(Some("{".to_string())).expect_err("broken json");
        assert!(err.contains("not valid JSON"));

        assert!(read_params(Some("  ".to_string())).expect("blank").is_empty());
    }
}
