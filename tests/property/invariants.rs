//! Property tests for the pure text heuristics.

use proptest::prelude::*;
use quill::sanitize::strip_thinking;
use quill::segment::segment_text;

fn line_strategy() -> impl Strategy<Value = String> {
    let fixed = prop::sample::select(vec![
        "plain prose line".to_string(),
        "Thinking: meta commentary".to_string(),
        "思考：先想一想".to_string(),
        "```thinking".to_string(),
        "```".to_string(),
        "<think>".to_string(),
        "</think>".to_string(),
        String::new(),
        "- bullet note".to_string(),
        "> quoted line".to_string(),
        "**Analysis**".to_string(),
        "1. numbered line".to_string(),
    ]);
    prop_oneof![fixed, "[a-z ]{0,20}"]
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(line_strategy(), 0..12).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(text in text_strategy()) {
        let once = strip_thinking(&text);
        let twice = strip_thinking(&once);
        prop_assert_eq!(&once, &twice);
    }

    #[test]
    fn sanitize_is_deterministic(text in text_strategy()) {
        prop_assert_eq!(strip_thinking(&text), strip_thinking(&text));
    }

    #[test]
    fn sanitize_output_has_no_outer_whitespace(text in text_strategy()) {
        let output = strip_thinking(&text);
        prop_assert_eq!(output.trim(), output.as_str());
    }

    #[test]
    fn segment_indices_are_dense_from_one(text in text_strategy()) {
        let segments = segment_text(&text);
        for (position, segment) in segments.iter().enumerate() {
            prop_assert_eq!(segment.index, position as u32 + 1);
        }
    }

    #[test]
    fn segment_is_deterministic(text in text_strategy()) {
        let first = segment_text(&text);
        let second = segment_text(&text);
        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert_eq!(&a.text, &b.text);
        }
    }

    #[test]
    fn segment_without_markers_is_whole_trimmed_input(text in "[a-z \n]{0,80}") {
        let segments = segment_text(&text);
        if text.trim().is_empty() {
            prop_assert!(segments.is_empty());
        } else {
            prop_assert_eq!(segments.len(), 1);
            prop_assert_eq!(segments[0].text.as_str(), text.trim());
        }
    }

    #[test]
    fn resegmenting_digit_free_segments_is_stable(text in text_strategy()) {
        // A segment without ASCII digits cannot contain a numbering marker,
        // so re-segmenting it must return it unchanged.
        for segment in segment_text(&text) {
            if segment.text.bytes().any(|byte| byte.is_ascii_digit()) {
                continue;
            }
            let again = segment_text(&segment.text);
            prop_assert_eq!(again.len(), 1);
            prop_assert_eq!(again[0].text.as_str(), segment.text.as_str());
        }
    }
}
