//! Static language lookup: names and codes → ISO 639-1 codes.
//!
//! Structured OCR asks the model for the languages it sees. Models answer
//! with whatever spelling comes to mind ("English", "en", "ENGLISH",
//! "Modern Greek"), so every answer goes through [`resolve_language`] and
//! leaves as a two-letter ISO 639-1 code. Anything not in the table is a
//! validation error, never a guess.

/// `(code, English name)` for every supported language.
const LANGUAGES: &[(&str, &str)] = &[
    ("af", "Afrikaans"),
    ("am", "Amharic"),
    ("ar", "Arabic"),
    ("az", "Azerbaijani"),
    ("be", "Belarusian"),
    ("bg", "Bulgarian"),
    ("bn", "Bengali"),
    ("bs", "Bosnian"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("cy", "Welsh"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("eo", "Esperanto"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("eu", "Basque"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("ga", "Irish"),
    ("gl", "Galician"),
    ("gu", "Gujarati"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hr", "Croatian"),
    ("hu", "Hungarian"),
    ("hy", "Armenian"),
    ("id", "Indonesian"),
    ("is", "Icelandic"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ka", "Georgian"),
    ("kk", "Kazakh"),
    ("km", "Khmer"),
    ("kn", "Kannada"),
    ("ko", "Korean"),
    ("la", "Latin"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("mk", "Macedonian"),
    ("ml", "Malayalam"),
    ("mn", "Mongolian"),
    ("mr", "Marathi"),
    ("ms", "Malay"),
    ("mt", "Maltese"),
    ("my", "Burmese"),
    ("ne", "Nepali"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pa", "Punjabi"),
    ("pl", "Polish"),
    ("ps", "Pashto"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sq", "Albanian"),
    ("sr", "Serbian"),
    ("sv", "Swedish"),
    ("sw", "Swahili"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tl", "Tagalog"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("uz", "Uzbek"),
    ("vi", "Vietnamese"),
    ("yi", "Yiddish"),
    ("zh", "Chinese"),
    ("zu", "Zulu"),
];

/// Alternative names models commonly use.
const ALIASES: &[(&str, &str)] = &[
    ("modern greek", "el"),
    ("farsi", "fa"),
    ("filipino", "tl"),
    ("mandarin", "zh"),
    ("cantonese", "zh"),
    ("simplified chinese", "zh"),
    ("traditional chinese", "zh"),
    ("norwegian bokmal", "no"),
    ("norwegian bokmål", "no"),
    ("flemish", "nl"),
    ("castilian", "es"),
    ("moldavian", "ro"),
    ("panjabi", "pa"),
];

/// Resolve a language name or code to its ISO 639-1 code.
///
/// Matching is case-insensitive and treats `_` and `-` in names as spaces,
/// so `"ENGLISH"`, `"english"`, `"en"` and `"EN"` all give `"en"`. Region
/// suffixes on codes (`"en-US"`, `"pt_BR"`) are dropped.
pub fn resolve_language(input: &str) -> Option<&'static str> {
    let normalised = input.trim().replace(['_', '-'], " ").to_lowercase();
    if normalised.is_empty() {
        return None;
    }

    if let Some(code) = lookup_code(&normalised) {
        return Some(code);
    }
    // "en us" / "pt br" → primary subtag
    if let Some((primary, _region)) = normalised.split_once(' ') {
        if primary.len() == 2 {
            if let Some(code) = lookup_code(primary) {
                return Some(code);
            }
        }
    }

    LANGUAGES
        .iter()
        .find(|(_, name)| name.to_lowercase() == normalised)
        .map(|(code, _)| *code)
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == normalised)
                .map(|(_, code)| *code)
        })
}

/// English name for a code, if known.
pub fn language_name(code: &str) -> Option<&'static str> {
    let code = code.trim().to_lowercase();
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

fn lookup_code(candidate: &str) -> Option<&'static str> {
    if candidate.len() != 2 {
        return None;
    }
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == candidate)
        .map(|(c, _)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(resolve_language("English"), Some("en"));
        assert_eq!(resolve_language("FRENCH"), Some("fr"));
        assert_eq!(resolve_language("  german "), Some("de"));
    }

    #[test]
    fn codes_pass_through() {
        assert_eq!(resolve_language("es"), Some("es"));
        assert_eq!(resolve_language("JA"), Some("ja"));
    }

    #[test]
    fn region_suffix_is_dropped() {
        assert_eq!(resolve_language("en-US"), Some("en"));
        assert_eq!(resolve_language("pt_BR"), Some("pt"));
    }

    #[test]
    fn aliases_and_enum_style_names() {
        assert_eq!(resolve_language("Modern Greek"), Some("el"));
        assert_eq!(resolve_language("MODERN_GREEK"), Some("el"));
        assert_eq!(resolve_language("Mandarin"), Some("zh"));
    }

    #[test]
    fn unknown_is_none() {
        assert_eq!(resolve_language("Klingon"), None);
        assert_eq!(resolve_language(""), None);
        assert_eq!(resolve_language("xx"), None);
    }

    #[test]
    fn name_lookup() {
        assert_eq!(language_name("en"), Some("English"));
        assert_eq!(language_name("zz"), None);
    }

    #[test]
    fn table_codes_are_unique_and_lowercase() {
        let mut codes: Vec<&str> = LANGUAGES.iter().map(|(c, _)| *c).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), LANGUAGES.len());
        assert!(codes.iter().all(|c| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_lowercase())));
        for (_, code) in ALIASES {
            assert!(language_name(code).is_some(), "alias points at unknown code {code}");
        }
    }
}
