// SPDX-FileCopyrightText: 2026 Cascade Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query/answer alignment scoring.
//!
//! Measures how well an answer addresses its originating query. The base
//! signal is stopword-filtered keyword overlap; specialized detectors run
//! first, in priority order, for answer shapes where lexical overlap is the
//! wrong measure (multiple choice, classification, long-context extraction,
//! function calls, roleplay). The first matching detector wins; plain
//! overlap is the fallback.
//!
//! Overlap is monotonic: strictly more shared salient terms between query
//! and answer can never lower the score, all else equal.

use strum::Display;

/// Which detector produced an alignment score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AlignmentKind {
    Greeting,
    MultipleChoice,
    Classification,
    ContextExtraction,
    FunctionCall,
    Roleplay,
    Overlap,
}

/// An alignment score in `[0, 1]` with the detector that produced it.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentOutcome {
    pub kind: AlignmentKind,
    pub score: f32,
}

/// Common English stopwords excluded from salient term extraction.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "then", "else", "for",
    "nor", "so", "yet", "of", "in", "on", "at", "to", "from", "by",
    "with", "about", "into", "over", "after", "is", "are", "was", "were",
    "be", "been", "being", "have", "has", "had", "do", "does", "did",
    "will", "would", "could", "should", "can", "may", "might", "shall",
    "this", "that", "these", "those", "it", "its", "they", "them",
    "their", "what", "which", "who", "whom", "how", "when", "where",
    "why", "you", "your", "yours", "i", "me", "my", "we", "us", "our",
    "he", "him", "his", "she", "her", "not", "no", "please", "tell",
];

/// Greeting patterns scored leniently.
const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "good morning",
    "good evening", "good afternoon", "bye", "goodbye", "how are you",
];

/// Markers indicating the query expects a structured function/tool call.
const FUNCTION_CALL_MARKERS: &[&str] = &[
    "function call", "tool call", "as json", "in json", "return json",
    "respond with json", "json object",
];

/// Markers indicating a roleplay or persona-adoption query.
const ROLEPLAY_MARKERS: &[&str] = &["pretend you are", "act as", "roleplay", "you are a"];

/// Minimum query length, in words, for the long-context extraction detector
/// to trigger without an explicit context marker.
const LONG_CONTEXT_WORDS: usize = 150;

/// Scores query/answer alignment via shape detectors and keyword overlap.
#[derive(Debug, Default, Clone)]
pub struct AlignmentScorer;

impl AlignmentScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score how well `answer` addresses `query`.
    pub fn score(&self, query: &str, answer: &str) -> AlignmentOutcome {
        let query_lower = query.trim().to_lowercase();
        let answer_lower = answer.trim().to_lowercase();

        if let Some(outcome) = detect_greeting(&query_lower, &answer_lower) {
            return outcome;
        }
        if let Some(outcome) = detect_multiple_choice(&query_lower, &answer_lower) {
            return outcome;
        }
        if let Some(outcome) = detect_classification(&query_lower, &answer_lower) {
            return outcome;
        }
        if let Some(outcome) = detect_context_extraction(&query_lower, &answer_lower) {
            return outcome;
        }
        if let Some(outcome) = detect_function_call(&query_lower, answer) {
            return outcome;
        }
        if let Some(outcome) = detect_roleplay(&query_lower, &answer_lower) {
            return outcome;
        }

        AlignmentOutcome {
            kind: AlignmentKind::Overlap,
            score: overlap_fraction(&query_lower, &answer_lower),
        }
    }
}

/// Extract lowercase salient terms: stopword-filtered words of 3+ characters,
/// deduplicated in order of first appearance.
pub fn salient_terms(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let word = word.to_lowercase();
        if word.len() < 3 || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Fraction of the query's salient terms that appear in the answer.
///
/// Neutral 0.5 when the query has no salient terms at all.
fn overlap_fraction(query: &str, answer: &str) -> f32 {
    let query_terms = salient_terms(query);
    if query_terms.is_empty() {
        return 0.5;
    }
    let answer_terms = salient_terms(answer);
    let shared = query_terms
        .iter()
        .filter(|t| answer_terms.contains(t))
        .count();
    shared as f32 / query_terms.len() as f32
}

/// Greeting-style queries: any non-empty reply addresses them.
fn detect_greeting(query: &str, answer: &str) -> Option<AlignmentOutcome> {
    let is_greeting = GREETINGS.contains(&query)
        || (query.split_whitespace().count() <= 3
            && GREETINGS.iter().any(|g| query.starts_with(g)));
    if !is_greeting {
        return None;
    }
    let score = if answer.is_empty() { 0.3 } else { 0.9 };
    Some(AlignmentOutcome {
        kind: AlignmentKind::Greeting,
        score,
    })
}

/// Multiple-choice queries: the answer must select one of the offered options.
fn detect_multiple_choice(query: &str, answer: &str) -> Option<AlignmentOutcome> {
    let options = extract_options(query);
    if options.len() < 2 {
        return None;
    }

    let selects = options.iter().any(|(letter, body)| {
        (!body.is_empty() && answer.contains(body.as_str()))
            || answer == letter.to_string().as_str()
            || answer.contains(&format!("option {letter}"))
            || answer.contains(&format!("answer is {letter}"))
            || answer.starts_with(&format!("{letter})"))
            || answer.starts_with(&format!("{letter}."))
    });

    Some(AlignmentOutcome {
        kind: AlignmentKind::MultipleChoice,
        score: if selects { 0.9 } else { 0.2 },
    })
}

/// Parse lettered options like `a) red` or `b. blue` from query lines.
fn extract_options(query: &str) -> Vec<(char, String)> {
    let mut options = Vec::new();
    for line in query.lines() {
        let t = line.trim();
        let mut chars = t.chars();
        let (Some(letter), Some(marker)) = (chars.next(), chars.next()) else {
            continue;
        };
        if letter.is_ascii_lowercase()
            && ('a'..='f').contains(&letter)
            && (marker == ')' || marker == '.')
        {
            let body = chars.as_str().trim().trim_end_matches('?').to_string();
            options.push((letter, body));
        }
    }
    options
}

/// Classification queries: the answer must name one of the expected
/// categories listed in the query.
fn detect_classification(query: &str, answer: &str) -> Option<AlignmentOutcome> {
    if !(query.contains("classify") || query.contains("categorize")) {
        return None;
    }
    let categories = extract_categories(query);
    if categories.is_empty() {
        // No extractable category list; let the overlap fallback handle it.
        return None;
    }
    let names_one = categories.iter().any(|c| answer.contains(c.as_str()));
    Some(AlignmentOutcome {
        kind: AlignmentKind::Classification,
        score: if names_one { 0.9 } else { 0.2 },
    })
}

/// Pull the candidate category list out of a classification query: the
/// segment after `as` or `into`, split on commas and `or`.
fn extract_categories(query: &str) -> Vec<String> {
    let Some((_, segment)) = query
        .split_once(" as ")
        .or_else(|| query.split_once(" into "))
    else {
        return Vec::new();
    };

    let categories: Vec<String> = segment
        .split([',', ':'])
        .flat_map(|part| part.split(" or "))
        .map(|c| {
            c.trim()
                .trim_end_matches(['.', '?', '!'])
                .trim_matches('"')
                .to_string()
        })
        .filter(|c| !c.is_empty() && c.split_whitespace().count() <= 3)
        .collect();

    categories
}

/// Long-context extraction queries: the answer should be grounded in the
/// supplied context, not lexically overlap the question itself.
fn detect_context_extraction(query: &str, answer: &str) -> Option<AlignmentOutcome> {
    let context = if let Some((_, ctx)) = query.split_once("context:") {
        ctx
    } else if query.split_whitespace().count() > LONG_CONTEXT_WORDS {
        query
    } else {
        return None;
    };

    let context_terms = salient_terms(context);
    let answer_terms = salient_terms(answer);
    if answer_terms.is_empty() {
        return Some(AlignmentOutcome {
            kind: AlignmentKind::ContextExtraction,
            score: 0.0,
        });
    }
    let grounded = answer_terms
        .iter()
        .filter(|t| context_terms.contains(t))
        .count();
    Some(AlignmentOutcome {
        kind: AlignmentKind::ContextExtraction,
        score: grounded as f32 / answer_terms.len() as f32,
    })
}

/// Function-call queries: structural validity of the emitted JSON matters,
/// not lexical overlap. Fenced code blocks are unwrapped before parsing.
fn detect_function_call(query: &str, answer: &str) -> Option<AlignmentOutcome> {
    if !FUNCTION_CALL_MARKERS.iter().any(|m| query.contains(m)) {
        return None;
    }

    let body = strip_code_fence(answer.trim());
    let valid = serde_json::from_str::<serde_json::Value>(body)
        .map(|v| v.is_object() || v.is_array())
        .unwrap_or(false);

    Some(AlignmentOutcome {
        kind: AlignmentKind::FunctionCall,
        score: if valid { 0.95 } else { 0.1 },
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .trim_end_matches('`')
        .trim_end_matches('\n')
}

/// Roleplay queries: the persona reply legitimately diverges from the query
/// text, so overlap expectations relax toward a generous baseline.
fn detect_roleplay(query: &str, answer: &str) -> Option<AlignmentOutcome> {
    if !ROLEPLAY_MARKERS.iter().any(|m| query.contains(m)) {
        return None;
    }
    let score = 0.4 + 0.6 * overlap_fraction(query, answer);
    Some(AlignmentOutcome {
        kind: AlignmentKind::Roleplay,
        score: score.min(1.0),
    })
}
