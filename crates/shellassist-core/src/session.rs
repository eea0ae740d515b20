//! Rolling per-session buffer of recent (command, output) pairs, used only
//! to give proactive suggestions session-level awareness. Never persisted.

use std::collections::VecDeque;

const MAX_ENTRIES: usize = 20;
const MAX_OUTPUT_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub command: String,
    pub output: String,
}

#[derive(Default)]
pub struct SessionBuffer {
    entries: VecDeque<SessionEntry>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_ENTRIES),
        }
    }

    /// Truncate `output` to its last [`MAX_OUTPUT_LINES`] lines, then push;
    /// evicts the oldest entry once the buffer is at capacity.
    pub fn add(&mut self, command: String, output: String) {
        let lines: Vec<&str> = output.lines().collect();
        let truncated = if lines.len() > MAX_OUTPUT_LINES {
            lines[lines.len() - MAX_OUTPUT_LINES..].join("\n")
        } else {
            output
        };
        if self.entries.len() >= MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(SessionEntry {
            command,
            output: truncated,
        });
    }

    /// Render a `[N] command\n    indented output` block per entry, oldest
    /// first, with `N` counting down from the entry count to 1 (newest
    /// entry gets the lowest index and sits at the bottom of the block).
    pub fn format_for_prompt(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let total = self.entries.len();
        let mut parts = Vec::with_capacity(total * 2);
        for (i, entry) in self.entries.iter().enumerate() {
            let idx = total - i;
            parts.push(format!("[{idx}] {}", entry.command));
            if !entry.output.trim().is_empty() {
                let indented = entry
                    .output
                    .lines()
                    .map(|line| format!("    {line}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                parts.push(indented);
            }
        }
        parts.join("\n")
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
