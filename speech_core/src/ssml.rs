/// Locale used when the voice name carries none.
const FALLBACK_LOCALE: &str = "ru-RU";

/// Strip everything the synthesizer should not see: only Latin and Russian
/// letters, ASCII digits, `, . ? !` and whitespace are kept.
pub fn sanitize_for_speech(text: &str) -> String {
    text.chars()
        .filter(|c| is_speakable(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_speakable(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ('а'..='я').contains(&c)
        || ('А'..='Я').contains(&c)
        || matches!(c, ',' | '.' | '?' | '!')
        || c.is_whitespace()
}

/// Locale prefix of an Azure voice name, e.g. `ru-RU` for `ru-RU-DmitryNeural`.
pub fn voice_locale(voice: &str) -> String {
    let mut segments = voice.split('-');
    match (segments.next(), segments.next()) {
        (Some(lang), Some(region))
            if lang.len() == 2
                && lang.chars().all(|c| c.is_ascii_lowercase())
                && region.len() == 2
                && region.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            format!("{lang}-{region}")
        }
        _ => FALLBACK_LOCALE.to_string(),
    }
}

/// Wrap already sanitized text in an SSML document for `voice`.
pub fn build_ssml(voice: &str, text: &str) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        voice_locale(voice),
        escape_xml(voice),
        escape_xml(text)
    )
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
