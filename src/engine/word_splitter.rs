//! Word segmentation
//!
//! Turns a lyric line into the token stream the layout packs into rows:
//! 1. Verbatim words that contain spaces are re-split with timing interpolated
//!    by character position
//! 2. Lines without word timing are segmented per script: every CJK code point
//!    is its own token, Latin runs break at whitespace
//! 3. Whitespace runs collapse into a single zero-duration space token
//!
//! ## Example
//!
//! Input: `["Life", " is", " a", " sugar so", "甜"]`
//! Output: `["Life", " ", "is", " ", "a", " ", "sugar", " ", "so", "甜"]`

use super::types::LyricLine;

/// Segment of a line prior to layout
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Timing came from the lyric source
    pub is_verbatim: bool,
}

impl Token {
    fn space(at: f64, is_verbatim: bool) -> Self {
        Self {
            text: " ".to_string(),
            start_time: at,
            end_time: at,
            is_verbatim,
        }
    }

    pub fn is_space(&self) -> bool {
        !self.text.is_empty() && self.text.trim().is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Check if a character is CJK
pub fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |  // CJK Unified Ideographs
        '\u{3400}'..='\u{4DBF}' |  // CJK Extension A
        '\u{20000}'..='\u{2A6DF}' | // CJK Extension B
        '\u{F900}'..='\u{FAFF}' |  // CJK Compatibility Ideographs
        '\u{3000}'..='\u{303F}' |  // CJK Symbols and Punctuation
        '\u{3040}'..='\u{309F}' |  // Hiragana
        '\u{30A0}'..='\u{30FF}' |  // Katakana
        '\u{AC00}'..='\u{D7AF}' |  // Hangul Syllables
        '\u{FF00}'..='\u{FFEF}'    // Fullwidth forms
    )
}

/// Whether any code point of `text` is CJK
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk_char)
}

/// Segment a whole line
///
/// Empty text yields a single empty token so every line owns at least one word.
pub fn segment_line(line: &LyricLine) -> Vec<Token> {
    let tokens = match line.words.as_deref() {
        Some(words) if !words.is_empty() => resplit_words(
            words
                .iter()
                .map(|w| (w.text.as_str(), w.start_time, w.end_time)),
        ),
        _ => segment_plain(&line.text, line.time),
    };

    if tokens.is_empty() {
        vec![Token {
            text: String::new(),
            start_time: line.time,
            end_time: line.time,
            is_verbatim: false,
        }]
    } else {
        tokens
    }
}

/// Re-split verbatim words that contain spaces
///
/// Sub-word timing is interpolated by the number of non-space characters
/// preceding it. CJK runs inside a verbatim word are kept together since the
/// source already chose their timing granularity.
pub fn resplit_words<'a>(words: impl IntoIterator<Item = (&'a str, f64, f64)>) -> Vec<Token> {
    let mut result: Vec<Token> = Vec::new();

    for (text, start, end) in words {
        let real_length = text.chars().filter(|c| !c.is_whitespace()).count();
        let parts: Vec<&str> = text.split_whitespace().collect();
        let duration = (end - start).max(0.0);

        if parts.is_empty() {
            if !text.is_empty() {
                push_space(&mut result, start, true);
            }
            continue;
        }

        if text.starts_with(char::is_whitespace) {
            push_space(&mut result, start, true);
        }

        let mut char_pos = 0usize;
        for (i, part) in parts.iter().enumerate() {
            let len = part.chars().count();
            let (part_start, part_end) = if parts.len() == 1 {
                (start, end)
            } else {
                let at = |pos: usize| start + duration * pos as f64 / real_length.max(1) as f64;
                (at(char_pos), at(char_pos + len))
            };
            result.push(Token {
                text: part.to_string(),
                start_time: part_start,
                end_time: part_end,
                is_verbatim: true,
            });
            char_pos += len;

            if i + 1 < parts.len() {
                push_space(&mut result, part_end, true);
            }
        }

        if text.ends_with(char::is_whitespace) {
            push_space(&mut result, end, true);
        }
    }

    result
}

/// Segment untimed text per script
pub fn segment_plain(text: &str, at: f64) -> Vec<Token> {
    let mut result: Vec<Token> = Vec::new();
    let mut current = String::new();
    // Latin-like text only breaks at whitespace
    let per_char = contains_cjk(text);

    let flush = |current: &mut String, result: &mut Vec<Token>| {
        if !current.is_empty() {
            result.push(Token {
                text: std::mem::take(current),
                start_time: at,
                end_time: at,
                is_verbatim: false,
            });
        }
    };

    for c in text.chars() {
        if c.is_whitespace() {
            flush(&mut current, &mut result);
            push_space(&mut result, at, false);
        } else if per_char && is_cjk_char(c) {
            flush(&mut current, &mut result);
            result.push(Token {
                text: c.to_string(),
                start_time: at,
                end_time: at,
                is_verbatim: false,
            });
        } else {
            current.push(c);
        }
    }
    flush(&mut current, &mut result);

    result
}

/// Split a token after `chars` characters, sharing timing proportionally
pub fn split_token(token: &Token, chars: usize) -> (Token, Token) {
    let total = token.char_count().max(1);
    let byte_idx = token
        .text
        .char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(token.text.len());
    let mid = token.start_time + (token.end_time - token.start_time) * chars as f64 / total as f64;

    (
        Token {
            text: token.text[..byte_idx].to_string(),
            start_time: token.start_time,
            end_time: mid,
            is_verbatim: token.is_verbatim,
        },
        Token {
            text: token.text[byte_idx..].to_string(),
            start_time: mid,
            end_time: token.end_time,
            is_verbatim: token.is_verbatim,
        },
    )
}

/// Collapse consecutive whitespace into one space token
fn push_space(result: &mut Vec<Token>, at: f64, is_verbatim: bool) {
    if result.last().is_some_and(Token::is_space) {
        return;
    }
    result.push(Token::space(at, is_verbatim));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::LyricWord;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_resplit_words() {
        let tokens = resplit_words([("Hello", 0.0, 0.5), (" world test", 0.5, 1.5)]);
        assert_eq!(texts(&tokens), ["Hello", " ", "world", " ", "test"]);

        // "world" has 5 of 9 real characters
        let world = &tokens[2];
        assert!((world.start_time - 0.5).abs() < 1e-9);
        assert!((world.end_time - (0.5 + 5.0 / 9.0)).abs() < 1e-9);
        assert!((tokens[4].end_time - 1.5).abs() < 1e-9);
        assert!(tokens.iter().all(|t| t.is_verbatim));
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        let tokens = resplit_words([("a ", 0.0, 1.0), ("  ", 1.0, 1.0), (" b", 1.0, 2.0)]);
        assert_eq!(texts(&tokens), ["a", " ", "b"]);
    }

    #[test]
    fn test_plain_latin_and_cjk() {
        let tokens = segment_plain("hello  你好 world", 3.0);
        assert_eq!(texts(&tokens), ["hello", " ", "你", "好", " ", "world"]);
        assert!(tokens.iter().all(|t| !t.is_verbatim && t.start_time == 3.0));
    }

    #[test]
    fn test_mixed_script_word_breaks_at_cjk() {
        let tokens = segment_plain("abc漢def", 0.0);
        assert_eq!(texts(&tokens), ["abc", "漢", "def"]);
    }

    #[test]
    fn test_empty_line_yields_single_empty_token() {
        let line = LyricLine::new(1.0, "");
        let tokens = segment_line(&line);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].text.is_empty());
    }

    #[test]
    fn test_segment_line_prefers_word_timing() {
        let line = LyricLine::with_words(
            2.0,
            vec![LyricWord::new("Life ", 2.0, 2.4), LyricWord::new("is", 2.4, 3.0)],
        );
        let tokens = segment_line(&line);
        assert_eq!(texts(&tokens), ["Life", " ", "is"]);
        assert_eq!(tokens[2].start_time, 2.4);
    }

    #[test]
    fn test_split_token_shares_timing() {
        let token = Token {
            text: "abcd".into(),
            start_time: 1.0,
            end_time: 2.0,
            is_verbatim: true,
        };
        let (head, tail) = split_token(&token, 1);
        assert_eq!(head.text, "a");
        assert_eq!(tail.text, "bcd");
        assert_eq!(head.end_time, 1.25);
        assert_eq!(tail.start_time, 1.25);
        assert_eq!(tail.end_time, 2.0);
    }

    #[test]
    fn test_is_cjk() {
        assert!(is_cjk_char('中'));
        assert!(is_cjk_char('か'));
        assert!(is_cjk_char('한'));
        assert!(!is_cjk_char('a'));
        assert!(contains_cjk("abc中"));
        assert!(!contains_cjk("abc"));
    }
}
