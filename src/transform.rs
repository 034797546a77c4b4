//! Text transform applied to every request.
//!
//! The default pipeline reverses the input by characters (never by bytes,
//! so multi-byte sequences survive), lowercases the result and then
//! title-cases each whitespace-delimited word.
//!
//! ```text
//! "hello world" -> "dlrow olleh" -> "Dlrow Olleh"
//! ```

/// A text-to-text rewrite applied to the data read from a connection.
pub trait Transform: Send + Sync {
    fn apply(&self, input: &str) -> String;
}

/// Reverse, lowercase, then title-case.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseTitle;

impl Transform for ReverseTitle {
    fn apply(&self, input: &str) -> String {
        transform(input)
    }
}

/// Leaves the input untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, input: &str) -> String {
        input.to_string()
    }
}

/// The default pipeline as a free function.
pub fn transform(input: &str) -> String {
    title_case(&reverse_chars(input).to_lowercase())
}

/// Reverse the character order of `input`.
pub fn reverse_chars(input: &str) -> String {
    let mut chars: Vec<char> = input.chars().collect();
    reverse_in_place(&mut chars);
    chars.into_iter().collect()
}

/// Two-pointer swap from both ends toward the middle.
fn reverse_in_place(chars: &mut [char]) {
    if chars.len() < 2 {
        return;
    }
    let (mut i, mut j) = (0, chars.len() - 1);
    while i < j {
        chars.swap(i, j);
        i += 1;
        j -= 1;
    }
}

/// Title-case each word and lowercase everything else.
///
/// A word is a run of letters and digits. Combining marks stay inside the
/// word they follow, and so do apostrophes or periods when they sit between
/// letters (`"don't"`, `"e.g"`). Any other character ends the word, so
/// `"well-known"` becomes `"Well-Known"`. A leading digit starts the word
/// without being cased, so `"1st"` stays `"1st"`.
pub fn title_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_word = false;

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                in_word = true;
                push_titlecase(&mut out, c);
            }
        } else if in_word && (is_combining_mark(c) || joins_word(c, chars.get(i + 1))) {
            out.push(c);
        } else {
            in_word = false;
            out.extend(c.to_lowercase());
        }
    }

    out
}

/// Mid-word punctuation, only when the next character continues the word.
fn joins_word(c: char, next: Option<&char>) -> bool {
    matches!(c, '\'' | '\u{2019}' | '.' | '\u{B7}') && next.is_some_and(|n| n.is_alphabetic())
}

fn is_combining_mark(c: char) -> bool {
    matches!(
        c,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}'
    )
}

/// Push the title-case form of `c`.
///
/// Digraph letters have their own title-case form (`ǆ` -> `ǅ`). Letters
/// that uppercase to several characters keep only the first one upper
/// (`ß` -> `Ss`).
fn push_titlecase(out: &mut String, c: char) {
    let digraph = match c {
        '\u{01C4}'..='\u{01C6}' => Some('\u{01C5}'),
        '\u{01C7}'..='\u{01C9}' => Some('\u{01C8}'),
        '\u{01CA}'..='\u{01CC}' => Some('\u{01CB}'),
        '\u{01F1}'..='\u{01F3}' => Some('\u{01F2}'),
        _ => None,
    };
    if let Some(title) = digraph {
        out.push(title);
        return;
    }

    let mut upper = c.to_uppercase();
    if let Some(first) = upper.next() {
        out.push(first);
    }
    for rest in upper {
        out.extend(rest.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hello_world() {
        assert_eq!(reverse_chars("hello world"), "dlrow olleh");
        assert_eq!(transform("hello world"), "Dlrow Olleh");
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(reverse_chars(""), "");
        assert_eq!(reverse_chars("a"), "a");
        assert_eq!(transform(""), "");
        assert_eq!(transform("a"), "A");
    }

    #[test]
    fn test_odd_length_keeps_middle() {
        assert_eq!(reverse_chars("abcde"), "edcba");
        assert_eq!(reverse_chars("ab"), "ba");
    }

    #[test]
    fn test_multibyte_reversal() {
        assert_eq!(reverse_chars("привет"), "тевирп");
        assert_eq!(reverse_chars("añb€"), "€bña");
        assert_eq!(
            transform("Романов Денис Игоревич"),
            "Чивероги Синед Вонамор"
        );
    }

    #[test]
    fn test_casing_ignores_input_case() {
        assert_eq!(transform("HELLO WORLD"), "Dlrow Olleh");
        assert_eq!(transform("hElLo WoRlD"), "Dlrow Olleh");
    }

    #[test]
    fn test_title_case_rules() {
        assert_eq!(title_case("foo bar"), "Foo Bar");
        assert_eq!(title_case("  foo\tbar\nbaz "), "  Foo\tBar\nBaz ");
        assert_eq!(title_case("(hello)"), "(Hello)");
        assert_eq!(title_case("1st place"), "1st Place");
        assert_eq!(title_case("don't"), "Don't");
        assert_eq!(title_case("'tis"), "'Tis");
    }

    #[test]
    fn test_punctuation_starts_new_word() {
        assert_eq!(transform("nwonk-llew"), "Well-Known");
        assert_eq!(title_case("well-known"), "Well-Known");
        assert_eq!(title_case("foo_bar a/b x--y"), "Foo_Bar A/B X--Y");
        assert_eq!(title_case("e.g. next"), "E.g. Next");
        assert_eq!(title_case("end. next"), "End. Next");
    }

    #[test]
    fn test_titlecase_mapping() {
        assert_eq!(title_case("\u{01C6}ungla"), "\u{01C5}ungla");
        assert_eq!(title_case("\u{01C9}ubljana"), "\u{01C8}ubljana");
        assert_eq!(title_case("\u{00DF}tra\u{00DF}e"), "Sstra\u{00DF}e");
        assert_eq!(transform("\u{01C4}"), "\u{01C5}");
    }

    #[test]
    fn test_combining_mark_stays_in_word() {
        assert_eq!(title_case("e\u{301}te\u{301}"), "E\u{301}te\u{301}");
    }

    #[test]
    fn test_transform_trait_objects() {
        let transforms: [&dyn Transform; 2] = [&ReverseTitle, &Identity];
        assert_eq!(transforms[0].apply("abc def"), "Fed Cba");
        assert_eq!(transforms[1].apply("abc def"), "abc def");
    }

    proptest! {
        #[test]
        fn reversal_is_an_involution(input in "[ -~]{0,1024}") {
            prop_assert_eq!(reverse_chars(&reverse_chars(&input)), input);
        }

        #[test]
        fn ascii_transform_preserves_length(input in "[ -~]{0,1024}") {
            prop_assert_eq!(transform(&input).len(), input.len());
        }
    }
}
