//! The four worker variants, each a thin [`JobProcessor`](crate::JobProcessor)
//! over the shared attempt engine and dispatch discipline.

pub mod aggregation;
pub mod extraction;
pub mod fetch;
pub mod flashcards;
pub mod summary;

pub use aggregation::AggregationWorker;
pub use extraction::ExtractionWorker;
pub use fetch::HttpTextExtractor;
pub use flashcards::FlashcardWorker;
pub use summary::SummaryWorker;

/// Prompt for summarizing one text chunk. `{feedback}` carries the previous
/// attempt's failure (empty on the first attempt), `{text}` the chunk.
pub(crate) const SUMMARY_PROMPT: &str = "\
{feedback}You are a study assistant. Write a concise, factual summary of the \
following text. Respond with the summary only, no preamble.

TEXT:
{text}";

/// Prompt for generating flashcards from one summary chunk. The output must
/// be a bare JSON list of question/answer objects.
pub(crate) const FLASHCARD_PROMPT: &str = "\
{feedback}You are a study assistant. Create flashcards covering the key facts \
in the following text. Respond with ONLY a JSON list of objects, each with a \
\"question\" and an \"answer\" field.

TEXT:
{text}";

/// Prompt merging all chunk summaries into one final summary.
pub(crate) const FINAL_SUMMARY_PROMPT: &str = "\
{feedback}You are a study assistant. The following are partial summaries of \
one document. Merge them into a single coherent summary, removing repetition. \
Respond with the merged summary only.

PARTIAL SUMMARIES:
{text}";

/// Prompt deduplicating the collected flashcards of one document.
pub(crate) const FINAL_FLASHCARD_PROMPT: &str = "\
{feedback}You are a study assistant. The following JSON list contains \
flashcards collected from one document. Remove duplicates and near-duplicates \
and keep the clearest wording. Respond with ONLY the cleaned JSON list.

FLASHCARDS:
{text}";

/// Fill a prompt template's `{feedback}` and `{text}` slots.
pub(crate) fn render_prompt(template: &str, feedback: &str, text: &str) -> String {
    // Feedback first: the corrective text is model-written-about, never a
    // template itself.
    template
        .replacen("{feedback}", feedback, 1)
        .replacen("{text}", text, 1)
}

/// Strip a Markdown code fence (``` or ```json) wrapping model output.
///
/// Models asked for bare JSON frequently fence it anyway; the content in
/// between is returned trimmed. Unfenced input passes through trimmed.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt_fills_both_slots() {
        let prompt = render_prompt("A{feedback}B{text}C", "FB", "TXT");
        assert_eq!(prompt, "AFBBTXTC");
    }

    #[test]
    fn test_render_prompt_empty_feedback_leaves_no_residue() {
        let prompt = render_prompt(SUMMARY_PROMPT, "", "the chunk");
        assert!(!prompt.contains("{feedback}"));
        assert!(!prompt.contains("{text}"));
        assert!(prompt.contains("the chunk"));
    }

    #[test]
    fn test_strip_code_fences_json_fence() {
        let raw = "```json\n[{\"question\": \"Q\", \"answer\": \"A\"}]\n```";
        assert_eq!(
            strip_code_fences(raw),
            "[{\"question\": \"Q\", \"answer\": \"A\"}]"
        );
    }

    #[test]
    fn test_strip_code_fences_plain_fence() {
        assert_eq!(strip_code_fences("```\n[1, 2]\n```"), "[1, 2]");
    }

    #[test]
    fn test_strip_code_fences_unfenced_passthrough() {
        assert_eq!(strip_code_fences("  [1, 2]\n"), "[1, 2]");
    }
}
