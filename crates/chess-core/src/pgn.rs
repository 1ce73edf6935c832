//! Move-record parsing: lightweight regex-based extraction.
//!
//! Imported games carry their move record as PGN-style movetext (with or
//! without tag headers). Replay only needs the SAN tokens in play order.

use regex::Regex;

/// Extract SAN moves from movetext (after removing headers, comments,
/// variations). Move numbers, result markers and NAGs never match.
pub fn extract_moves(movetext: &str) -> Vec<String> {
    // Remove headers
    let header_re = Regex::new(r"\[[^\]]*\]").unwrap();
    let no_headers = header_re.replace_all(movetext, "");

    // Remove comments
    let comment_re = Regex::new(r"\{[^}]*\}").unwrap();
    let no_comments = comment_re.replace_all(&no_headers, "");

    // Remove variations
    let variation_re = Regex::new(r"\([^)]*\)").unwrap();
    let no_variations = variation_re.replace_all(&no_comments, "");

    // Extract moves
    let move_re =
        Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O").unwrap();

    move_re
        .find_iter(&no_variations)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_moves_plain() {
        let moves = extract_moves("1. e4 e5 2. Nf3 Nc6 3. Bb5 a6");
        assert_eq!(moves, vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6"]);
    }

    #[test]
    fn test_extract_moves_with_headers_and_result() {
        let pgn = r#"[White "Player1"]
[Black "Player2"]
[Result "1-0"]

1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0"#;

        let moves = extract_moves(pgn);
        assert_eq!(
            moves,
            vec!["e4", "e5", "Qh5", "Nc6", "Bc4", "Nf6", "Qxf7#"]
        );
    }

    #[test]
    fn test_extract_moves_strips_comments_and_variations() {
        let moves = extract_moves("1. e4 {best by test} e5 (1... c5 2. Nf3) 2. Nf3");
        assert_eq!(moves, vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_extract_moves_castling_and_promotion() {
        let moves = extract_moves("12. O-O-O exd1=Q+ 13. O-O");
        assert_eq!(moves, vec!["O-O-O", "exd1=Q+", "O-O"]);
    }
}
