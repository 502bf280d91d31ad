const WORD_MATCH_RATIO: f64 = 0.7;
const WORD_SIMILARITY: f64 = 0.8;

/// Compare a declared name with the registry's version of it.
pub fn names_match(declared: &str, registered: &str) -> bool {
    let first = normalize(declared);
    let second = normalize(registered);

    if first.is_empty() || second.is_empty() {
        return first == second;
    }

    if first == second {
        return true;
    }

    if first.contains(second.as_str()) || second.contains(first.as_str()) {
        return true;
    }

    let first_words: Vec<&str> = significant_words(&first);
    let second_words: Vec<&str> = significant_words(&second);
    let total = first_words.len().max(second_words.len());
    if total == 0 {
        return false;
    }

    let matched = first_words
        .iter()
        .filter(|word| {
            second_words
                .iter()
                .any(|other| **word == *other || similarity(word, other) > WORD_SIMILARITY)
        })
        .count();

    matched as f64 / total as f64 >= WORD_MATCH_RATIO
}

/// Uppercase, strip Spanish diacritics, keep only letters and single spaces.
pub(crate) fn normalize(value: &str) -> String {
    let folded: String = value
        .chars()
        .flat_map(char::to_uppercase)
        .map(fold_diacritic)
        .filter(|c| c.is_ascii_uppercase() || c.is_whitespace())
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_diacritic(c: char) -> char {
    match c {
        'Á' | 'À' | 'Ä' | 'Â' => 'A',
        'É' | 'È' | 'Ë' | 'Ê' => 'E',
        'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
        'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
        'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
        'Ñ' => 'N',
        other => other,
    }
}

fn significant_words(value: &str) -> Vec<&str> {
    value
        .split_whitespace()
        .filter(|word| word.chars().count() > 2)
        .collect()
}

/// `1 - distance / max_len` on characters.
pub(crate) fn similarity(first: &str, second: &str) -> f64 {
    let longest = first.chars().count().max(second.chars().count());
    if longest == 0 {
        return 1.0;
    }

    1.0 - levenshtein(first, second) as f64 / longest as f64
}

fn levenshtein(first: &str, second: &str) -> usize {
    let first: Vec<char> = first.chars().collect();
    let second: Vec<char> = second.chars().collect();

    let mut previous: Vec<usize> = (0..=second.len()).collect();
    let mut current = vec![0; second.len() + 1];

    for (i, a) in first.iter().enumerate() {
        current[0] = i + 1;
        for (j, b) in second.iter().enumerate() {
            let substitution = previous[j] + usize::from(a != b);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[second.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_ignores_accents_and_case() {
        assert!(names_match("José Ñúñez", "JOSE NUNEZ"));
        assert!(names_match("  maría   elena ", "MARIA ELENA"));
    }

    #[test]
    fn compound_names_match_by_containment() {
        assert!(names_match("Juan", "JUAN CARLOS"));
        assert!(names_match("Rodriguez Gonzalez", "RODRIGUEZ"));
    }

    #[test]
    fn typos_match_by_word_similarity() {
        assert!(names_match("Fernandes Ruiz", "FERNANDEZ RUIZ"));
        assert!(!names_match("Pedro Perez", "ANA TORRES"));
    }

    #[test]
    fn short_words_are_ignored_in_the_ratio() {
        assert!(!names_match("de la", "DEL MAR"));
    }

    #[test]
    fn empty_names_only_match_each_other() {
        assert!(names_match("", ""));
        assert!(!names_match("", "MARIA"));
        assert!(!names_match("12", "MARIA"));
    }

    #[test]
    fn levenshtein_similarity_is_normalized() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert!((similarity("GONZALEZ", "GONSALEZ") - 0.875).abs() < 1e-9);
        assert_eq!(similarity("", ""), 1.0);
    }
}
