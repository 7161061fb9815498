//! Composable predicates classifying which failures are retryable.

use std::sync::Arc;

/// The type-erased error shape classification operates on.
pub type ClassifiedError = dyn std::error::Error + Send + Sync + 'static;

/// Matches one concrete error type.
///
/// Captures a monomorphized downcast check at construction so a set of
/// matchers can test a type-erased error without knowing the types
/// involved.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTypeMatcher {
    name: &'static str,
    matches: fn(&ClassifiedError) -> bool,
}

impl ErrorTypeMatcher {
    /// Creates a matcher for the error type `E`.
    #[must_use]
    pub fn of<E: std::error::Error + Send + Sync + 'static>() -> Self {
        Self {
            name: std::any::type_name::<E>(),
            matches: |err| err.downcast_ref::<E>().is_some(),
        }
    }

    /// The name of the matched type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Tests whether `err` is an instance of the matched type.
    #[must_use]
    pub fn matches(&self, err: &ClassifiedError) -> bool {
        (self.matches)(err)
    }
}

/// A typed predicate over one error type.
///
/// The error is narrowed to `E` first; narrowing failure means no match.
#[derive(Clone)]
pub struct ErrorPredicate {
    type_name: &'static str,
    predicate: Arc<dyn Fn(&ClassifiedError) -> bool + Send + Sync>,
}

impl ErrorPredicate {
    /// Creates a predicate applied to errors of type `E`.
    #[must_use]
    pub fn of<E, P>(predicate: P) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<E>(),
            predicate: Arc::new(move |err| err.downcast_ref::<E>().is_some_and(&predicate)),
        }
    }

    /// The name of the narrowed type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Evaluates the predicate against a type-erased error.
    #[must_use]
    pub fn evaluate(&self, err: &ClassifiedError) -> bool {
        (self.predicate)(err)
    }
}

impl std::fmt::Debug for ErrorPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorPredicate")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Classifies whether a failure should be considered for retry.
///
/// Immutable after construction; a retry policy holds exactly one filter.
#[derive(Debug, Clone, Default)]
pub enum ErrorFilter {
    /// Every failure matches.
    #[default]
    All,
    /// Failures match unless they are an instance of a listed type.
    Except(Vec<ErrorTypeMatcher>),
    /// Only instances of a listed type match.
    Selected(Vec<ErrorTypeMatcher>),
    /// A typed predicate decides.
    Predicate(ErrorPredicate),
}

impl ErrorFilter {
    /// Creates the match-everything filter.
    #[must_use]
    pub fn all() -> Self {
        Self::All
    }

    /// Creates a filter excluding the given types.
    #[must_use]
    pub fn except(types: Vec<ErrorTypeMatcher>) -> Self {
        Self::Except(types)
    }

    /// Creates a filter selecting only the given types.
    #[must_use]
    pub fn selected(types: Vec<ErrorTypeMatcher>) -> Self {
        Self::Selected(types)
    }

    /// Creates a filter from a typed predicate over `E`.
    #[must_use]
    pub fn predicate<E, P>(predicate: P) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(ErrorPredicate::of(predicate))
    }

    /// Tests whether `err` matches this filter.
    #[must_use]
    pub fn matches(&self, err: &ClassifiedError) -> bool {
        match self {
            Self::All => true,
            Self::Except(types) => !types.iter().any(|t| t.matches(err)),
            Self::Selected(types) => types.iter().any(|t| t.matches(err)),
            Self::Predicate(predicate) => predicate.evaluate(err),
        }
    }

    /// A short description for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Except(types) => {
                let names: Vec<_> = types.iter().map(ErrorTypeMatcher::name).collect();
                format!("except({})", names.join(", "))
            }
            Self::Selected(types) => {
                let names: Vec<_> = types.iter().map(ErrorTypeMatcher::name).collect();
                format!("selected({})", names.join(", "))
            }
            Self::Predicate(predicate) => format!("predicate({})", predicate.type_name()),
        }
    }
}
