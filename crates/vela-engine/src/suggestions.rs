//! Fuzzy "did you mean" suggestions for unknown definition and property names

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Suggestion with its distance to the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub distance: usize,
}

/// Find closest matches from a list of candidates, best first
pub fn find_closest_matches<S: AsRef<str>>(
    input: &str,
    candidates: &[S],
    max_results: usize,
) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .filter_map(|candidate| {
            let candidate = candidate.as_ref();
            let distance = strsim::levenshtein(input, candidate);
            (distance > 0 && distance <= MAX_SUGGESTION_DISTANCE).then(|| Suggestion {
                text: candidate.to_string(),
                distance,
            })
        })
        .collect();

    suggestions.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.text.cmp(&b.text)));
    suggestions.truncate(max_results);
    suggestions
}

/// Suggest a definition name for an unknown type
pub fn suggest_definition<S: AsRef<str>>(name: &str, available: &[S]) -> Option<String> {
    let matches = find_closest_matches(name, available, 3);
    if !matches.is_empty() {
        let names: Vec<String> = matches.iter().map(|s| format!("`{}`", s.text)).collect();
        return Some(format!("Did you mean {}?", names.join(" or ")));
    }

    if available.is_empty() {
        Some("no definitions are available; pass them with -d or drop --offline".to_string())
    } else {
        let mut names: Vec<&str> = available.iter().map(AsRef::as_ref).collect();
        names.sort_unstable();
        Some(format!("Available: {}", names.join(", ")))
    }
}

/// Suggest a declared parameter for an unsupported property
pub fn suggest_parameter<S: AsRef<str>>(name: &str, parameters: &[S]) -> Option<String> {
    find_closest_matches(name, parameters, 1)
        .into_iter()
        .next()
        .map(|s| format!("Did you mean `{}`?", s.text))
}
