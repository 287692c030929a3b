// utils.rs - Small helpers shared by the services and handlers
use chrono::Utc;
use rand::Rng;

use crate::models::generation::DEFAULT_LANGUAGE;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate an opaque public identifier: `<unix millis>-<7 base36 chars>`
pub fn generate_unique_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..7)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Lowercased, trimmed narration language; blank or absent means the default
pub fn normalize_language(language: Option<&str>) -> String {
    match language.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_lowercase(),
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

pub fn is_default_language(language: &str) -> bool {
    language.trim().eq_ignore_ascii_case(DEFAULT_LANGUAGE)
}

/// Treat blank override strings as absent
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// First `max_chars` characters of `text`, with "..." appended
pub fn preview(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}
