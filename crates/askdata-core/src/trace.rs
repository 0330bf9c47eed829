//! Append-only run trace.
//!
//! Each question's run records one [`TraceEntry`] per pipeline step:
//! step name, wall-clock timestamp, input/output summaries, and duration.
//! The trace is owned by the question's own sequential flow — no
//! cross-question synchronization exists — and is handed to the caller
//! with the report, which may persist or discard it.

use std::time::Instant;

use crate::models::TraceEntry;

#[derive(Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step. `started` is the instant the step began, used
    /// for the duration.
    pub fn record(
        &mut self,
        step: &str,
        started: Instant,
        input: impl Into<String>,
        output: impl Into<String>,
    ) {
        self.entries.push(TraceEntry {
            step: step.to_string(),
            at: chrono::Utc::now(),
            input: input.into(),
            output: output.into(),
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TraceEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_append_in_order() {
        let mut trace = Trace::new();
        let t0 = Instant::now();
        trace.record("router", t0, "question", "data_only");
        trace.record("planner", t0, "question + 0 chunks", "metric=revenue");
        let steps: Vec<&str> = trace.entries().iter().map(|e| e.step.as_str()).collect();
        assert_eq!(steps, vec!["router", "planner"]);
    }
}
