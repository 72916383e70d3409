//! Reasoning-Trace Sanitization
//!
//! Removes provider-injected reasoning/chain-of-thought content from
//! generated text, leaving only user-facing output. Six ordered passes, each
//! operating on the previous pass's output. The passes are best-effort
//! heuristics, not a formal parser; no claim of zero false positives or
//! false negatives is made.
//!
//! Known limitation: the preamble scrub (pass 4) permanently exits preamble
//! mode at the first line that looks like real content, so reasoning text
//! appearing later in the body is not removed by that pass. This behavior is
//! intentional and must not be changed without explicit product direction.

use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced code block whose opening fence is tagged with a reasoning keyword.
static FENCED_REASONING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?si)```[ \t]*(?:think(?:ing)?|thoughts?|analysis|reasoning)\b[^\n]*.*?(?:```|\z)")
        .expect("fenced reasoning regex")
});

/// Paired markup block using the reasoning keyword set, attributes tolerated
/// in the opening tag, greedy across lines.
static TAGGED_REASONING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?si)<\s*(?:think(?:ing)?|thoughts?|analysis|reasoning)\b[^>]*>.*</\s*(?:think(?:ing)?|thoughts?|analysis|reasoning)\s*>",
    )
    .expect("tagged reasoning regex")
});

/// Leading paragraph opened by an optional bullet marker, a reasoning keyword
/// (English or CJK equivalent) and punctuation; consumed up to the first
/// blank-line gap or end of text.
static LEADING_REASONING_PARAGRAPH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?si)\A\s*(?:[-*•]\s*)?(?:think(?:ing)?|thoughts?|analysis|reasoning|思考|推理|分析)\s*[:：.,，。!！?？\-—].*?(?:\n\s*\n|\z)",
    )
    .expect("leading reasoning paragraph regex")
});

/// Bullet or numbered line shape used by meta-commentary preambles.
static PREAMBLE_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|[0-9]{1,3}[.)、．）])\s+").expect("preamble bullet regex"));

/// A reasoning keyword anywhere in a line.
static REASONING_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:think(?:ing)?|thoughts?|analysis|reasoning)\b|思考|推理|分析")
        .expect("reasoning keyword regex")
});

/// A line that is entirely a reasoning-keyword label, optionally wrapped in
/// emphasis or bracket characters.
static STANDALONE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t]*[\[(（【<*_~#]*[ \t]*(?:think(?:ing)?|thoughts?|analysis|reasoning|思考|推理|分析)[ \t]*[\])）】>*_~:：.…]*[ \t]*$",
    )
    .expect("standalone label regex")
});

/// Three or more consecutive blank lines.
static EXCESS_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){3,}").expect("blank line regex"));

/// Strip embedded reasoning traces from provider output.
///
/// Pure and deterministic; empty input yields empty output. Applying the
/// function twice yields the same result as applying it once.
pub fn strip_thinking(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let pass1 = FENCED_REASONING.replace_all(text, "");
    let pass2 = TAGGED_REASONING.replace_all(&pass1, "");
    let pass3 = LEADING_REASONING_PARAGRAPH.replacen(&pass2, 1, "");
    let pass4 = scrub_preamble(&pass3);
    let pass5 = STANDALONE_LABEL.replace_all(&pass4, "");
    let pass6 = EXCESS_BLANK_LINES.replace_all(&pass5, "\n\n");
    pass6.trim().to_string()
}

/// Line-oriented preamble scrub.
///
/// Starting in preamble mode, drops block-quote lines, blank lines, lines
/// shaped like bullet/numbered meta-commentary, and lines containing a
/// reasoning keyword. The first line matching none of these exits preamble
/// mode permanently; every subsequent line is kept unconditionally.
fn scrub_preamble(text: &str) -> String {
    let mut preamble = true;
    let mut kept: Vec<&str> = Vec::new();
    for line in text.lines() {
        if preamble {
            let trimmed = line.trim_start();
            let drop = line.trim().is_empty()
                || trimmed.starts_with('>')
                || PREAMBLE_BULLET.is_match(line)
                || REASONING_KEYWORD.is_match(line);
            if drop {
                continue;
            }
            preamble = false;
        }
        kept.push(line);
    }
    kept.join("\n")
}
