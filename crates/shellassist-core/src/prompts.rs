//! Deterministic `(system, user)` chat-message pairs for every request kind.
//! Templates ported verbatim in meaning from the `aish.prompts` prototype.

use std::sync::OnceLock;

static OS_INFO: OnceLock<String> = OnceLock::new();

/// Short OS identifier, detected once and embedded in the static system
/// prompt (see the "Module-level state" design note).
pub fn os_info() -> &'static str {
    OS_INFO.get_or_init(detect_os_info)
}

fn detect_os_info() -> String {
    if cfg!(target_os = "macos") {
        return "macOS".to_string();
    }
    if cfg!(target_os = "linux") {
        if let Ok(contents) = std::fs::read_to_string("/etc/os-release") {
            for line in contents.lines() {
                if let Some(name) = line.strip_prefix("PRETTY_NAME=") {
                    let name = name.trim_matches('"');
                    if !name.is_empty() {
                        return format!("Linux ({name})");
                    }
                }
            }
        }
        return "Linux".to_string();
    }
    std::env::consts::OS.to_string()
}

fn system_prompt_base() -> String {
    format!(
        "You are an expert shell assistant. The user is on {}.\n\
         You help with shell commands — completions, corrections, and generation.\n\
         RULES:\n\
         - Return ONLY the requested output (command, completion suffix, etc.)\n\
         - NO explanations, NO markdown, NO commentary\n\
         - If unsure, return an empty string\n\
         - Never suggest commands that would be destructive without clear user intent\n\
         - Preserve the user's command style (quoting, flag style, etc.)",
        os_info()
    )
}

pub fn autocomplete_system() -> String {
    system_prompt_base()
}

fn history_tail(history: &[String], n: usize) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    let start = history.len().saturating_sub(n);
    history[start..].join("\n")
}

pub fn autocomplete_user(
    buffer: &str,
    cwd: &str,
    history: &[String],
    shell: &str,
    exit_status: i64,
) -> String {
    format!(
        "Shell: {shell}\n\
         Working directory: {cwd}\n\
         Recent commands:\n\
         {hist}\n\
         Last exit status: {exit_status}\n\
         \n\
         The user has typed: {buffer}\n\
         Return ONLY the completion suffix — the exact text to append directly after what they typed.\n\
         Include a leading space if one is needed (e.g. to separate a command from its arguments).\n\
         Do not repeat what they already typed.\n\
         Return empty string if no useful completion exists.",
        hist = history_tail(history, 5),
    )
}

pub fn proactive_system(session_buffer: &str) -> String {
    let base = system_prompt_base();
    if session_buffer.is_empty() {
        base
    } else {
        format!("{base}\n\nRecent session:\n{session_buffer}")
    }
}

pub fn proactive_user(
    cwd: &str,
    history: &[String],
    last_command: &str,
    last_output: &str,
    shell: &str,
) -> String {
    format!(
        "Shell: {shell}\n\
         Working directory: {cwd}\n\
         Recent commands:\n\
         {hist}\n\
         \n\
         Last command: {last_command}\n\
         Its output (last 50 lines):\n\
         {last_output}\n\
         \n\
         The user's prompt is empty. Suggest the single most likely next command they would want to run.\n\
         Return ONLY the command. Return an empty string if nothing is clearly suggested.",
        hist = history_tail(history, 5),
    )
}

pub fn nl_command_user(
    prompt: &str,
    cwd: &str,
    buffer: &str,
    history: &[String],
    shell: &str,
) -> String {
    let context = if buffer.is_empty() {
        String::new()
    } else {
        format!("\nPartial command already typed: {buffer:?}")
    };
    format!(
        "Shell: {shell}\n\
         Working directory: {cwd}\n\
         Recent commands:\n\
         {hist}\n\
         {context}\n\
         User request: {prompt}\n\
         \n\
         Generate ONLY the shell command. No explanation.",
        hist = history_tail(history, 10),
    )
}

pub fn error_correction_user(
    failed_command: &str,
    exit_status: i64,
    stderr: &str,
    cwd: &str,
    shell: &str,
) -> String {
    format!(
        "Shell: {shell}\n\
         Working directory: {cwd}\n\
         \n\
         Failed command: {failed_command}\n\
         Exit status: {exit_status}\n\
         Error output:\n\
         {stderr}\n\
         \n\
         Return ONLY the corrected command. If you can't determine the fix, return an empty string."
    )
}

pub fn history_search_user(query: &str, history: &[String], shell: &str) -> String {
    format!(
        "Shell: {shell}\n\
         \n\
         User is searching their history for: {query}\n\
         \n\
         Shell history (most recent last):\n\
         {hist}\n\
         \n\
         Return a JSON array of the most relevant commands, ranked by relevance.\n\
         Format: [{{\"command\": \"...\", \"score\": 0.95}}, ...]\n\
         Return at most 10 results. Only include commands that match the user's intent.\n\
         If nothing matches, return an empty array: []",
        hist = history.join("\n"),
    )
}
