use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structurally invalid definition; raised synchronously from `define`.
    MalformedSpec { class: String, detail: String },
    /// A definition needs a type the loader is not allowed to fetch.
    UnresolvedDependency { class: String, dependency: String },
    /// An unresolved class was accessed while the loader is disabled.
    LoaderDisabled { name: String },
    /// No registered type under this name (or any synonym of it).
    UnknownClass { name: String },
    /// Member invoked on a type that does not declare or inherit it.
    NoSuchMember { class: String, member: String },
    /// Parent/super dispatch found no resolvable ancestor implementation.
    NoAncestorImplementation { class: String, member: String },
    /// Parent/super dispatch used outside an executing tagged member.
    OutsideMemberCall { operation: String },
    /// A compilation-unit fetch failed; terminal for that unit.
    DependencyFetch { path: String, requester: String },
    /// A blocking fetch was requested but the source suspended instead.
    SyncFetchPending { path: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedSpec { class, detail } => {
                write!(f, "Malformed definition of '{}': {}", class, detail)
            }
            Self::UnresolvedDependency { class, dependency } => {
                write!(
                    f,
                    "'{}' depends on '{}', which is not defined and cannot be fetched while the loader is disabled",
                    class, dependency
                )
            }
            Self::LoaderDisabled { name } => {
                write!(
                    f,
                    "'{}' is not defined and the loader is disabled; enable the loader or define it first",
                    name
                )
            }
            Self::UnknownClass { name } => {
                write!(f, "Unknown class: '{}'", name)
            }
            Self::NoSuchMember { class, member } => {
                write!(f, "'{}' has no member '{}'", class, member)
            }
            Self::NoAncestorImplementation { class, member } => {
                write!(
                    f,
                    "No ancestor implementation of '{}' reachable from '{}'",
                    member, class
                )
            }
            Self::OutsideMemberCall { operation } => {
                write!(f, "'{}' called outside an executing member", operation)
            }
            Self::DependencyFetch { path, requester } => {
                write!(
                    f,
                    "Failed to fetch compilation unit '{}' required by '{}'",
                    path, requester
                )
            }
            Self::SyncFetchPending { path } => {
                write!(
                    f,
                    "Blocking fetch of '{}' suspended; the unit source cannot deliver it synchronously",
                    path
                )
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreError {
    pub kind: ErrorKind,
    pub suggestions: Vec<String>,
}

impl CoreError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    /// Unknown-class error with "did you mean" hints drawn from `candidates`.
    pub fn unknown_class(name: &str, candidates: &[String]) -> Self {
        let mut error = Self::new(ErrorKind::UnknownClass {
            name: name.to_string(),
        });
        for similar in find_similar_names(name, candidates, 3).into_iter().take(3) {
            error = error.with_suggestion(format!("Did you mean '{}'?", similar));
        }
        error
    }

    pub fn malformed(class: &str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedSpec {
            class: class.to_string(),
            detail: detail.into(),
        })
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for suggestion in &self.suggestions {
            write!(f, "\n  hint: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for CoreError {}

/// Levenshtein distance for "did you mean" suggestions.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0; b_len + 1]; a_len + 1];

    for i in 0..=a_len {
        matrix[i][0] = i;
    }
    for j in 0..=b_len {
        matrix[0][j] = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}

/// Candidate names within `max_distance` of `target`, closest first.
pub fn find_similar_names(target: &str, candidates: &[String], max_distance: usize) -> Vec<String> {
    let mut results: Vec<(String, usize)> = candidates
        .iter()
        .map(|c| (c.clone(), levenshtein_distance(target, c)))
        .filter(|(_, dist)| *dist <= max_distance && *dist > 0)
        .collect();

    results.sort_by_key(|(_, dist)| *dist);
    results.into_iter().map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("Button", "Button"), 0);
        assert_eq!(levenshtein_distance("Button", "Buton"), 1);
        assert_eq!(levenshtein_distance("", "abc"), 3);
    }

    #[test]
    fn test_unknown_class_suggestions() {
        let candidates = vec![
            "Ui.Button".to_string(),
            "Ui.Panel".to_string(),
            "Data.Store".to_string(),
        ];
        let error = CoreError::unknown_class("Ui.Buton", &candidates);
        assert_eq!(error.suggestions.len(), 1);
        assert!(error.suggestions[0].contains("Ui.Button"));
    }

    #[test]
    fn test_display_names_the_missing_dependency() {
        let error = CoreError::new(ErrorKind::UnresolvedDependency {
            class: "Ui.Panel".to_string(),
            dependency: "Ui.Container".to_string(),
        });
        let text = error.to_string();
        assert!(text.contains("Ui.Panel"));
        assert!(text.contains("Ui.Container"));
    }
}
