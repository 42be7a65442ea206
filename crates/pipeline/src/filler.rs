//! Picks a short filler phrase to mask perceptual latency while the first
//! real sentence is still being synthesized (§4.6).

use rand::seq::SliceRandom;

const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "howdy", "sup", "yo", "thanks", "thank", "bye", "goodbye", "ok", "okay",
    "cool",
];

/// A transcript of at most four words that includes a known greeting
/// token needs no filler — the reply itself will be fast enough.
pub fn is_short_greeting(transcript: &str) -> bool {
    let words: Vec<&str> = transcript.split_whitespace().collect();
    words.len() <= 4
        && words
            .iter()
            .any(|w| GREETING_WORDS.contains(&w.to_lowercase().trim_matches(|c: char| ".,!?".contains(c))))
}

/// Selects a filler phrase keyed on the first word of the transcript.
pub fn pick_filler(transcript: &str) -> String {
    let mut rng = rand::thread_rng();
    let first = transcript
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();
    let first = first.trim_matches(|c: char| ".,!?".contains(c));

    let options: &[&str] = match first {
        "what" | "who" | "which" | "where" | "when" => &[
            "Let me think about that.",
            "Good question.",
            "Let me look into that.",
            "Hmm, let me think.",
        ],
        "how" => &[
            "Good question, let me think.",
            "Let me think through that.",
            "Hmm, let me work through that.",
        ],
        "why" => &[
            "Let me think about that.",
            "Good question, let me think.",
            "Hmm, let me consider that.",
        ],
        "can" | "could" | "would" | "please" => &[
            "Sure thing.",
            "Of course.",
            "Sure, one moment.",
            "Absolutely.",
            "Happy to help.",
        ],
        "explain" | "describe" | "summarize" | "list" | "give" => &[
            "Sure, let me explain.",
            "Let me put that together for you.",
            "Sure, let me break that down.",
        ],
        _ => &[
            "Let me think about that.",
            "Sure, one moment.",
            "Hmm, let me think.",
            "Let me consider that.",
        ],
    };

    options.choose(&mut rng).unwrap_or(&options[0]).to_string()
}

/// Fixed filler used when retrieval against a document is in progress.
pub const DOCUMENT_FILLER: &str = "Let me check the document for you.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_greeting_is_detected() {
        assert!(is_short_greeting("hi there"));
        assert!(is_short_greeting("ok thanks"));
        assert!(!is_short_greeting("what is the time right now"));
    }

    #[test]
    fn picks_a_non_empty_filler_for_question_words() {
        let filler = pick_filler("What time is it");
        assert!(!filler.is_empty());
    }

    #[test]
    fn falls_back_to_neutral_filler_for_unknown_openers() {
        let filler = pick_filler("zzz unknown opener");
        assert!(!filler.is_empty());
    }
}
