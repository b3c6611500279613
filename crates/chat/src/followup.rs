//! Follow-up question annotations.
//!
//! Models are instructed to append suggested next questions after the
//! answer as `<<question>>` spans. The visible answer is everything before
//! the first `<<`; the questions are every `<<...>>` span, in order, with
//! duplicates kept.
//!
//! [`StreamReassembler`] applies the same split to a token stream. Marker
//! detection is per delta: a `<<` split across two deltas is not seen.

use ragchat_core::provider::StreamChunk;
use regex_lite::Regex;
use std::sync::LazyLock;

/// Start-of-annotation marker.
pub const MARKER: &str = "<<";

static FOLLOWUP_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<([^>]+)>>").expect("valid follow-up pattern"));

/// All `<<...>>` spans in `content`, left to right.
pub fn parse_followup_questions(content: &str) -> Vec<String> {
    FOLLOWUP_SPAN
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Split a complete answer into visible text and follow-up questions.
pub fn extract_followup_questions(content: &str) -> (&str, Vec<String>) {
    let visible = content.split(MARKER).next().unwrap_or_default();
    (visible, parse_followup_questions(content))
}

/// Reassembly state of one streamed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReassemblyState {
    /// Forwarding content
    #[default]
    Normal,
    /// Buffering the annotation; never returns to `Normal`
    Capturing,
}

/// Separates answer text from a trailing follow-up annotation, one delta at
/// a time.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    state: ReassemblyState,
    buffer: String,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    /// Feed one upstream delta. Returns the delta to forward, if any.
    pub fn push(&mut self, mut delta: StreamChunk) -> Option<StreamChunk> {
        match self.state {
            ReassemblyState::Capturing => {
                if let Some(content) = &delta.content {
                    self.buffer.push_str(content);
                }
                None
            }
            ReassemblyState::Normal => {
                let Some(at) = delta.content.as_deref().and_then(|c| c.find(MARKER)) else {
                    return Some(delta);
                };
                let content = delta.content.take().unwrap_or_default();
                self.buffer.push_str(&content[at..]);
                self.state = ReassemblyState::Capturing;

                let prefix = &content[..at];
                if prefix.is_empty() {
                    None
                } else {
                    delta.content = Some(prefix.to_string());
                    Some(delta)
                }
            }
        }
    }

    /// End of stream. Returns the follow-up questions, or `None` when the
    /// annotation yielded none (including an unterminated `<<`).
    pub fn finish(self) -> Option<Vec<String>> {
        if self.buffer.is_empty() {
            return None;
        }
        let questions = parse_followup_questions(&self.buffer);
        if questions.is_empty() {
            None
        } else {
            Some(questions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(deltas: &[&str]) -> (Vec<String>, Option<Vec<String>>) {
        let mut reassembler = StreamReassembler::new();
        let visible = deltas
            .iter()
            .filter_map(|d| reassembler.push(StreamChunk::text(*d)))
            .filter_map(|c| c.content)
            .collect();
        (visible, reassembler.finish())
    }

    #[test]
    fn split_visible_and_questions() {
        let (visible, questions) = extract_followup_questions("Answer text<<Q1>><<Q2>>");
        assert_eq!(visible, "Answer text");
        assert_eq!(questions, vec!["Q1", "Q2"]);
    }

    #[test]
    fn no_annotation() {
        let (visible, questions) = extract_followup_questions("Just an answer.");
        assert_eq!(visible, "Just an answer.");
        assert!(questions.is_empty());
    }

    #[test]
    fn duplicates_are_kept() {
        assert_eq!(parse_followup_questions("<<Same>><<Same>>"), vec!["Same", "Same"]);
    }

    #[test]
    fn unterminated_annotation_has_no_questions() {
        let (visible, questions) = extract_followup_questions("Answer.<<Unterminated");
        assert_eq!(visible, "Answer.");
        assert!(questions.is_empty());
    }

    #[test]
    fn stripped_text_reparses_empty() {
        let (visible, _) = extract_followup_questions("Answer<<Next?>>");
        let (again, questions) = extract_followup_questions(visible);
        assert_eq!(again, visible);
        assert!(questions.is_empty());
    }

    #[test]
    fn stream_splits_marker_delta() {
        let (visible, questions) = run(&["Hello ", "world<<Next", " Q>><<Another Q>>"]);
        assert_eq!(visible, vec!["Hello ", "world"]);
        assert_eq!(questions, Some(vec!["Next Q".to_string(), "Another Q".to_string()]));
    }

    #[test]
    fn marker_at_delta_start_emits_nothing() {
        let (visible, questions) = run(&["Answer.", "<<Q1>>"]);
        assert_eq!(visible, vec!["Answer."]);
        assert_eq!(questions, Some(vec!["Q1".to_string()]));
    }

    #[test]
    fn unterminated_stream_emits_no_followups() {
        let (visible, questions) = run(&["Answer.<<Unterminated"]);
        assert_eq!(visible, vec!["Answer."]);
        assert_eq!(questions, None);
    }

    #[test]
    fn everything_after_marker_is_swallowed() {
        let (visible, _) = run(&["A<<Q1>>", " trailing prose", " more"]);
        assert_eq!(visible, vec!["A"]);
    }

    #[test]
    fn split_marker_is_not_detected() {
        let (visible, questions) = run(&["Answer <", "<Q>>"]);
        assert_eq!(visible, vec!["Answer <", "<Q>>"]);
        assert_eq!(questions, None);
    }

    #[test]
    fn contentless_deltas_pass_through_in_normal_state() {
        let mut reassembler = StreamReassembler::new();
        let finish = StreamChunk {
            finish_reason: Some("stop".into()),
            ..StreamChunk::default()
        };
        assert_eq!(reassembler.push(finish.clone()), Some(finish));
        assert_eq!(reassembler.state(), ReassemblyState::Normal);
    }

    #[test]
    fn capturing_swallows_finish_delta() {
        let mut reassembler = StreamReassembler::new();
        reassembler.push(StreamChunk::text("<<Q>>"));
        assert_eq!(reassembler.state(), ReassemblyState::Capturing);
        let finish = StreamChunk {
            finish_reason: Some("stop".into()),
            ..StreamChunk::default()
        };
        assert_eq!(reassembler.push(finish), None);
    }

    #[test]
    fn streaming_matches_complete_response() {
        let text = "The plan covers dental.<<What about vision?>><<Is there a deductible?>>";
        let (_, expected) = extract_followup_questions(text);

        let first = text.find(MARKER).unwrap();

        for size in 1..=text.len() {
            // A chunking that splits the opening marker is the known
            // per-delta limitation.
            if first / size != (first + 1) / size {
                continue;
            }
            let deltas: Vec<&str> = text
                .as_bytes()
                .chunks(size)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect();
            let (visible, questions) = run(&deltas);
            assert_eq!(visible.concat(), "The plan covers dental.", "chunk size {size}");
            assert_eq!(questions.unwrap_or_default(), expected, "chunk size {size}");
        }
    }
}
