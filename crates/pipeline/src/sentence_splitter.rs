//! Splits a growing token buffer into sentences as soon as a boundary
//! marker appears, so synthesis can start before the full reply is done
//! streaming (§4.5).

const BOUNDARIES: [&str; 4] = [". ", "! ", "? ", "\n"];

/// Pulls complete sentences out of `buf`, returning them in order and
/// leaving the trailing partial sentence (if any) in place.
///
/// Only the first boundary marker found (in priority order) is used for
/// a given call, mirroring the reference behavior of splitting on one
/// delimiter kind at a time rather than mixing them within a single pass.
pub fn extract_sentences(buf: &mut String) -> Vec<String> {
    for boundary in BOUNDARIES {
        if !buf.contains(boundary) {
            continue;
        }
        let mut parts: Vec<&str> = buf.split(boundary).collect();
        let remainder = parts.pop().unwrap_or_default().to_string();
        let sentences: Vec<String> = parts
            .into_iter()
            .map(|p| format!("{p}{boundary}"))
            .filter(|s| !s.trim().is_empty())
            .collect();
        *buf = remainder;
        return sentences;
    }
    Vec::new()
}

/// Flushes whatever remains in `buf` at end-of-stream as a final sentence,
/// unless it's whitespace only.
pub fn flush_remainder(buf: &mut String) -> Option<String> {
    let remainder = std::mem::take(buf);
    if remainder.trim().is_empty() {
        None
    } else {
        Some(remainder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_available_boundary() {
        let mut buf = "Hello there. How are".to_string();
        let sentences = extract_sentences(&mut buf);
        assert_eq!(sentences, vec!["Hello there. "]);
        assert_eq!(buf, "How are");
    }

    #[test]
    fn whitespace_only_segments_are_not_emitted() {
        let mut buf = ".   . Real sentence.".to_string();
        let sentences = extract_sentences(&mut buf);
        assert_eq!(sentences, vec!["Real sentence."]);
    }

    #[test]
    fn no_boundary_yields_nothing_and_leaves_buffer_untouched() {
        let mut buf = "still thinking".to_string();
        let sentences = extract_sentences(&mut buf);
        assert!(sentences.is_empty());
        assert_eq!(buf, "still thinking");
    }

    #[test]
    fn flush_remainder_emits_trailing_partial_sentence() {
        let mut buf = "trailing thought".to_string();
        assert_eq!(flush_remainder(&mut buf), Some("trailing thought".to_string()));
        assert_eq!(buf, "");
    }

    #[test]
    fn flush_remainder_skips_whitespace_only_tail() {
        let mut buf = "   ".to_string();
        assert_eq!(flush_remainder(&mut buf), None);
    }

    #[test]
    fn newline_boundary_is_honored() {
        let mut buf = "line one\nline two".to_string();
        let sentences = extract_sentences(&mut buf);
        assert_eq!(sentences, vec!["line one\n"]);
        assert_eq!(buf, "line two");
    }
}
