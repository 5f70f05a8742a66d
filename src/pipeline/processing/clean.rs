use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z ]").expect("static pattern"));

/// Lower-case `text`, then delete every character outside `[a-zA-Z ]`.
///
/// Digits, punctuation, tabs and accented letters are removed, so the output
/// only ever holds `a-z` and spaces.
pub fn clean_headline(text: &str) -> String {
    NON_ALPHA.replace_all(&text.to_lowercase(), "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clean(s: &str) -> bool {
        s.chars().all(|c| c.is_ascii_lowercase() || c == ' ')
    }

    #[test]
    fn test_strips_digits_and_punctuation() {
        assert_eq!(clean_headline("Stocks Rally 5%!"), "stocks rally ");
    }

    #[test]
    fn test_removes_accents_and_whitespace_other_than_space() {
        assert_eq!(clean_headline("Café\tÖl\nAB"), "caflab");
        assert_eq!(clean_headline("Nokia's Q3 — EUR 1.2bn"), "nokias q  eur bn");
    }

    #[test]
    fn test_output_alphabet_and_idempotence() {
        let samples = [
            "",
            "   ",
            "ALL CAPS HEADLINE",
            "Operating profit rose to EUR 13.1 mn from EUR 8.7 mn",
            "Ünïcödé ßtraße İstanbul",
            "tabs\tand\r\nnewlines",
            "emoji 📈 up",
            "$$$ 100% ### ~~~",
        ];
        for s in samples {
            let once = clean_headline(s);
            assert!(is_clean(&once), "{once:?} from {s:?}");
            assert_eq!(clean_headline(&once), once);
        }
    }
}
