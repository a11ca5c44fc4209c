use crate::instance::Instance;

/// Lookup failures. Every one of them is a wiring/configuration mistake,
/// not a transient condition, so nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no registered instance matches `{query}`")]
    NotFound { query: &'static str },

    #[error(
        "ambiguous lookup for `{query}`: {} instances match ({})",
        .matches.len(),
        describe(.matches)
    )]
    Ambiguous {
        query: &'static str,
        matches: Vec<Instance>,
    },

    #[error("type name `{name}` is not known to the type catalog")]
    Unresolved { name: String },

    #[error("type name `{name}` is declared by {claimants} distinct types")]
    DuplicateName { name: String, claimants: usize },

    #[error("instance of `{found}` matched `{query}` but cannot be viewed as it")]
    TypeMismatch {
        query: &'static str,
        found: &'static str,
    },
}

impl RegistryError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }

    #[must_use]
    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, Self::DuplicateName { .. })
    }

    /// Conflicting instances of an `Ambiguous` failure; empty otherwise.
    #[must_use]
    pub fn matches(&self) -> &[Instance] {
        match self {
            Self::Ambiguous { matches, .. } => matches,
            _ => &[],
        }
    }

    /// Short label for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Ambiguous { .. } => "ambiguous",
            Self::Unresolved { .. } => "unresolved",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::TypeMismatch { .. } => "type_mismatch",
        }
    }
}

fn describe(matches: &[Instance]) -> String {
    let mut names: Vec<&str> = matches.iter().map(Instance::type_name).collect();
    names.sort_unstable();
    names.join(", ")
}
