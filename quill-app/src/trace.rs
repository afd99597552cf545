//! Model-client trace output.

use quill_llm::TraceSink;

/// Forwards trace lines from the model client into the tracing pipeline,
/// one event per line.
pub struct OutputChannel;

impl TraceSink for OutputChannel {
    fn log(&self, lines: &[String]) {
        for line in lines {
            tracing::info!(target: "quill::model", "{line}");
        }
    }
}
