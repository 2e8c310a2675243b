//! # Intent Classifier (C2)
//!
//! Rule-based classification: a fixed keyword table maps each
//! [`TaskIntent`](crate::models::TaskIntent) to a list of trigger words.
//! `system_prompt + prompt`, concatenated and lower-cased, is scanned for
//! case-insensitive, word-boundary matches against every keyword; the
//! intent with the most matches wins.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::TaskIntent;

/// `(intent, score, confidence)` returned by `classify_with_confidence`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: TaskIntent,
    pub confidence: f64,
}

fn intent_patterns() -> &'static HashMap<TaskIntent, Vec<&'static str>> {
    static PATTERNS: OnceLock<HashMap<TaskIntent, Vec<&'static str>>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        use TaskIntent::*;
        HashMap::from([
            (
                CodeImplementation,
                vec!["implement", "write code", "create function", "build a", "write a function", "develop"],
            ),
            (
                CodeReview,
                vec!["review this code", "code review", "check this code", "feedback on my code"],
            ),
            (
                CodeDebugging,
                vec!["debug", "fix this bug", "error in my code", "not working", "exception", "stack trace"],
            ),
            (
                CodeDocumentation,
                vec!["document this code", "add docstrings", "code comments", "api documentation"],
            ),
            (Research, vec!["research", "find information", "investigate", "look into", "literature review"]),
            (Analysis, vec!["analyze", "analysis of", "examine", "evaluate", "assess"]),
            (Synthesis, vec!["synthesize", "combine", "merge insights", "bring together"]),
            (Documentation, vec!["write documentation", "user guide", "readme", "manual"]),
            (CreativeWriting, vec!["write a story", "poem", "creative writing", "fiction", "narrative"]),
            (TechnicalWriting, vec!["technical writing", "white paper", "spec document", "technical report"]),
            (ProblemSolving, vec!["solve this problem", "how do i solve", "figure out", "troubleshoot"]),
            (Planning, vec!["plan", "roadmap", "schedule", "strategy for", "outline steps"]),
            (DecisionSupport, vec!["should i", "which option", "help me decide", "pros and cons"]),
            (ImageGeneration, vec!["generate an image", "create a picture", "draw", "illustration of"]),
            (VisionAnalysis, vec!["what's in this image", "describe this picture", "analyze this photo"]),
            (QuestionAnswering, vec!["what is", "who is", "when did", "where is", "why does"]),
            (Summarization, vec!["summarize", "tl;dr", "give me a summary", "shorten this"]),
            (Translation, vec!["translate", "translation of", "in spanish", "in french"]),
        ])
    })
}

/// One word-boundary regex per keyword, compiled once. Kept one regex per
/// keyword (rather than a single per-intent alternation) so a keyword that
/// appears more than once in the text still contributes at most once to its
/// intent's score.
fn compiled_patterns() -> &'static HashMap<TaskIntent, Vec<Regex>> {
    static COMPILED: OnceLock<HashMap<TaskIntent, Vec<Regex>>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        intent_patterns()
            .iter()
            .map(|(intent, keywords)| {
                let patterns = keywords
                    .iter()
                    .map(|kw| {
                        let pattern = format!(r"\b{}\b", regex::escape(kw));
                        Regex::new(&pattern)
                            .unwrap_or_else(|e| panic!("invalid intent pattern for {intent:?}: {e}"))
                    })
                    .collect();
                (*intent, patterns)
            })
            .collect()
    })
}

/// Case-insensitive, word-boundary keyword scan against every intent's
/// trigger list; returns, per intent, how many distinct keywords matched at
/// least once (a repeated keyword still counts once).
fn score_intents(text: &str) -> HashMap<TaskIntent, u32> {
    let lowered = text.to_lowercase();
    let mut scores = HashMap::new();
    for (intent, patterns) in compiled_patterns() {
        let count = patterns.iter().filter(|p| p.is_match(&lowered)).count() as u32;
        if count > 0 {
            scores.insert(*intent, count);
        }
    }
    scores
}

/// Classify a single prompt, returning only the winning intent.
pub fn classify(system_prompt: Option<&str>, prompt: &str) -> TaskIntent {
    classify_with_confidence(system_prompt, prompt).intent
}

/// Classify a prompt and report a confidence derived from how dominant the
/// winning intent's score is relative to the rest.
///
/// `confidence = best_score / sum_of_scores`; boosted 1.2x (capped at 1.0)
/// when the winner's score is more than double the runner-up's.
pub fn classify_with_confidence(system_prompt: Option<&str>, prompt: &str) -> Classification {
    let combined = format!("{} {}", system_prompt.unwrap_or(""), prompt);
    let scores = score_intents(&combined);

    if scores.is_empty() {
        return Classification {
            intent: TaskIntent::Unknown,
            confidence: 0.0,
        };
    }

    let total: u32 = scores.values().sum();
    let mut ranked: Vec<(TaskIntent, u32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| intent_rank(a.0).cmp(&intent_rank(b.0))));

    let (best_intent, best_score) = ranked[0];
    let second_best = ranked.get(1).map(|(_, s)| *s).unwrap_or(0);

    let mut confidence = best_score as f64 / total as f64;
    if best_score as f64 > 2.0 * second_best as f64 {
        confidence = (confidence * 1.2).min(1.0);
    }

    Classification {
        intent: best_intent,
        confidence,
    }
}

/// Applies `classify_with_confidence` to each prompt independently; batch
/// classification is required to be equivalent to classifying one at a time.
pub fn batch_classify(prompts: &[(Option<&str>, &str)]) -> Vec<Classification> {
    prompts
        .iter()
        .map(|(system, prompt)| classify_with_confidence(*system, prompt))
        .collect()
}

/// Stable ordering among ties, defined by declaration order of the enum.
fn intent_rank(intent: TaskIntent) -> u8 {
    use TaskIntent::*;
    match intent {
        CodeImplementation => 0,
        CodeReview => 1,
        CodeDebugging => 2,
        CodeDocumentation => 3,
        Research => 4,
        Analysis => 5,
        Synthesis => 6,
        Documentation => 7,
        CreativeWriting => 8,
        TechnicalWriting => 9,
        ProblemSolving => 10,
        Planning => 11,
        DecisionSupport => 12,
        ImageGeneration => 13,
        VisionAnalysis => 14,
        QuestionAnswering => 15,
        Summarization => 16,
        Translation => 17,
        Unknown => 18,
    }
}
