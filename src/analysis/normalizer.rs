/// Characters that act as word boundaries when building keys.
pub const DELIMITERS: [char; 6] = ['?', '!', '.', ';', ',', '*'];

pub fn is_delimiter(c: char) -> bool {
    DELIMITERS.contains(&c)
}

/// Canonical form used for index keys, substring matching and dedup hashing.
///
/// Delimiters and spaces collapse into a single space, every other character
/// passes through, and the result is trimmed and lowercased. Applying it twice
/// gives the same string as applying it once.
pub fn normalize(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_was_space = false;

    for c in input.chars() {
        if c == ' ' || is_delimiter(c) {
            if !last_was_space {
                buf.push(' ');
                last_was_space = true;
            }
        } else {
            buf.push(c);
            last_was_space = false;
        }
    }

    buf.trim().to_lowercase()
}

/// Length of the normalized text in characters.
pub fn normalized_len(input: &str) -> usize {
    normalize(input).chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_case_collapse() {
        assert_eq!(normalize("Hello, World!!"), "hello world");
        assert_eq!(normalize("Hello, World!!"), normalize("hello world"));
    }

    #[test]
    fn leading_and_trailing_delimiters_are_trimmed() {
        assert_eq!(normalize("...Wait; what?"), "wait what");
        assert_eq!(normalize("  *stars*  "), "stars");
        assert_eq!(normalize("?!.;,*"), "");
    }

    #[test]
    fn runs_of_spaces_collapse() {
        assert_eq!(normalize("to  be ,  or"), "to be or");
    }

    #[test]
    fn other_characters_pass_through() {
        assert_eq!(normalize("Don't-Stop: NOW"), "don't-stop: now");
        assert_eq!(normalize("Ünïcödé Ärger"), "ünïcödé ärger");
    }

    #[test]
    fn tabs_and_newlines_are_kept() {
        assert_eq!(normalize("Line\t\tone\nTwo"), "line\t\tone\ntwo");
        assert_eq!(normalize("a \t b"), "a \t b");
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            "The unexamined life is not worth living.",
            "  a \t b ,, c!!",
            "Mr. Smith, Jr.; esq*",
            "",
            "ALL CAPS?!",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {:?}", s);
        }
    }

    #[test]
    fn length_counts_characters() {
        assert_eq!(normalized_len("Éé, ÀÀ!"), 5);
    }
}
