//! Parsing of the agent's log artifact.
//!
//! The artifact holds three sections separated by a line of 80 `=` characters:
//! the task log, the planner's response, and the agent scratchpad. The second
//! and third sections start with a label which is stripped.

use std::path::Path;

use crate::core::task::AgentTrace;

/// Width of the `=` delimiter line between sections.
pub const DELIMITER_WIDTH: usize = 80;

const PLANNER_LABEL: &str = "LLMCompiler planner response:";
const SCRATCHPAD_LABEL: &str = "Agent scratchpad:";

/// Split a log artifact into its three sections.
///
/// Missing sections come back as empty strings. Text with no delimiter at all
/// is treated as a bare task log.
pub fn parse_agent_log(content: &str) -> AgentTrace {
    let delimiter = "=".repeat(DELIMITER_WIDTH);

    let task_log_end = content.find(&delimiter).unwrap_or(content.len());
    let task_log = content[..task_log_end].trim().to_string();

    let (planner_response, planner_end) =
        labelled_section(content, task_log_end, PLANNER_LABEL, &delimiter);
    let (agent_scratchpad, _) =
        labelled_section(content, planner_end, SCRATCHPAD_LABEL, &delimiter);

    AgentTrace {
        task_log,
        planner_response,
        agent_scratchpad,
    }
}

/// Read and parse the log artifact at `path`.
pub async fn read_agent_log(path: &Path) -> std::io::Result<AgentTrace> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_agent_log(&content))
}

/// Find `label` at or after `from` and return the text up to the next
/// delimiter, plus the offset where the section ended.
fn labelled_section(content: &str, from: usize, label: &str, delimiter: &str) -> (String, usize) {
    let Some(offset) = content[from..].find(label) else {
        return (String::new(), from);
    };
    let start = from + offset + label.len();
    let end = content[start..]
        .find(delimiter)
        .map(|i| start + i)
        .unwrap_or(content.len());
    (content[start..end].trim().to_string(), end)
}
