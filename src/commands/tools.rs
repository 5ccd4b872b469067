use serde_json::Value;

use crate::sonar::tools;

/// Prints the tool catalog as pretty JSON.
pub fn run() -> Result<(), String> {
    let catalog: Vec<Value> = tools::catalog().iter().map(|tool| tool.to_json()).collect();
    let text = serde_json::to_string_pretty(&catalog)
        .map_err(|err| format!("Failed to encode tool catalog: {err}"))?;
    println!("{text}");
    Ok(())
}
