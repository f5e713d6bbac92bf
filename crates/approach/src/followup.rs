//! Follow-up question extraction.
//!
//! Models asked for follow-ups append them as `<<question>>` markers after
//! the answer. Non-streaming responses are split in one go with
//! [`extract_followup_questions`]; streams go through a [`FollowupSplitter`]
//! that holds back everything from the first `<<` on.

use regex::Regex;
use std::sync::LazyLock;

const MARKER: &str = "<<";

static FOLLOWUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<<([^>]+)>>").unwrap());

/// Split content into the answer before the first `<<` and the questions
/// enclosed in `<<...>>`.
pub fn extract_followup_questions(content: &str) -> (String, Vec<String>) {
    let answer = content.split(MARKER).next().unwrap_or_default().to_string();
    let questions = FOLLOWUP_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    (answer, questions)
}

/// Streaming splitter: feed deltas, get back the part safe to show.
///
/// Once a `<<` is seen, that delta's tail and all later deltas are kept
/// back; [`finish`](Self::finish) parses the withheld text into questions.
/// A `<` at the end of a delta is held until the next delta shows whether
/// it starts a marker.
#[derive(Debug, Default)]
pub struct FollowupSplitter {
    started: bool,
    pending: String,
    withheld: String,
}

impl FollowupSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether follow-up text has started.
    pub fn in_followups(&self) -> bool {
        self.started
    }

    /// Accept a delta and return the text that can be shown now.
    pub fn feed(&mut self, delta: &str) -> String {
        if self.started {
            self.withheld.push_str(delta);
            return String::new();
        }

        let mut buffer = std::mem::take(&mut self.pending);
        buffer.push_str(delta);

        if let Some(pos) = buffer.find(MARKER) {
            self.started = true;
            self.withheld.push_str(&buffer[pos..]);
            buffer.truncate(pos);
            return buffer;
        }

        if buffer.ends_with('<') {
            buffer.pop();
            self.pending.push('<');
        }
        buffer
    }

    /// Flush: returns any text still held back that turned out not to be a
    /// marker, and the parsed questions.
    pub fn finish(self) -> (String, Vec<String>) {
        let (_, questions) = extract_followup_questions(&self.withheld);
        (self.pending, questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_answer_and_questions() {
        let (answer, questions) = extract_followup_questions("Answer here.<<Q1?>><<Q2?>>");
        assert_eq!(answer, "Answer here.");
        assert_eq!(questions, vec!["Q1?", "Q2?"]);
    }

    #[test]
    fn no_markers_keeps_everything() {
        let (answer, questions) = extract_followup_questions("Just an answer [info1.txt].");
        assert_eq!(answer, "Just an answer [info1.txt].");
        assert!(questions.is_empty());
    }

    #[test]
    fn questions_split_over_lines() {
        let content = "The deductible is $500 [info1.txt].\n\n<<What about family?>>\n<<Is Overlake in-network?>>\n<<Any exclusions?>>";
        let (answer, questions) = extract_followup_questions(content);
        assert_eq!(answer, "The deductible is $500 [info1.txt].\n\n");
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[2], "Any exclusions?");
    }

    #[test]
    fn unterminated_marker_yields_no_question() {
        let (answer, questions) = extract_followup_questions("Answer<<half a question");
        assert_eq!(answer, "Answer");
        assert!(questions.is_empty());
    }

    #[test]
    fn splitter_passes_plain_text_through() {
        let mut s = FollowupSplitter::new();
        assert_eq!(s.feed("Hello "), "Hello ");
        assert_eq!(s.feed("world."), "world.");
        let (rest, questions) = s.finish();
        assert_eq!(rest, "");
        assert!(questions.is_empty());
    }

    #[test]
    fn splitter_withholds_from_marker_on() {
        let mut s = FollowupSplitter::new();
        assert_eq!(s.feed("The answer."), "The answer.");
        assert_eq!(s.feed(" Done<<Q1"), " Done");
        assert!(s.in_followups());
        assert_eq!(s.feed("?>><<Q2?>>"), "");
        let (rest, questions) = s.finish();
        assert_eq!(rest, "");
        assert_eq!(questions, vec!["Q1?", "Q2?"]);
    }

    #[test]
    fn splitter_handles_marker_split_across_deltas() {
        let mut s = FollowupSplitter::new();
        assert_eq!(s.feed("Answer <"), "Answer ");
        assert_eq!(s.feed("<Next?>>"), "");
        let (_, questions) = s.finish();
        assert_eq!(questions, vec!["Next?"]);
    }

    #[test]
    fn splitter_releases_lone_angle_bracket() {
        let mut s = FollowupSplitter::new();
        assert_eq!(s.feed("a <"), "a ");
        assert_eq!(s.feed(" b"), "< b");
        assert!(!s.in_followups());
    }

    #[test]
    fn splitter_flushes_trailing_angle_bracket() {
        let mut s = FollowupSplitter::new();
        assert_eq!(s.feed("x <"), "x ");
        let (rest, questions) = s.finish();
        assert_eq!(rest, "<");
        assert!(questions.is_empty());
    }
}
