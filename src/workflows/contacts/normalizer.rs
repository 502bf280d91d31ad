use crate::workflows::onboarding::domain::is_valid_email;

/// Strip invisible characters and collapse runs of whitespace.
pub(crate) fn clean_text(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn clean_name(value: Option<&str>) -> Option<String> {
    value.map(clean_text).filter(|name| !name.is_empty())
}

/// Lowercased address, or the reason it cannot be used.
pub(crate) fn normalize_email(value: Option<&str>) -> Result<String, EmailProblem> {
    let email = value.map(clean_text).unwrap_or_default();
    if email.is_empty() {
        return Err(EmailProblem::Missing);
    }
    if !is_valid_email(&email) {
        return Err(EmailProblem::Malformed);
    }
    Ok(email.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EmailProblem {
    Missing,
    Malformed,
}

/// Digits only, keeping a leading `+`.
pub(crate) fn normalize_phone(value: Option<&str>) -> Option<String> {
    let raw = value?.trim();
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    if raw.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}
