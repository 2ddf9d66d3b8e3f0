use serde::{Deserialize, Serialize};

/// Validation policy knobs. The split between errors and warnings is fixed
/// by the rule engine; these flags only switch individual rules on or off.
///
/// Defaults follow the strictest operating procedure in use: term mismatch
/// is a blocking error, teacher mismatch stays a warning. Institutions with
/// looser rules turn the flags off instead of patching the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrosslistPolicy {
    /// Parent course shells must not be published yet.
    pub require_parent_unpublished: bool,
    /// Warn when a published parent already has enrolled students.
    pub forbid_parent_with_students: bool,
    /// Parent and child must sit in the same enrollment term.
    pub require_same_term: bool,
    /// Warn when parent and child live under different sub-organizations.
    pub require_same_subaccount: bool,
}

impl Default for CrosslistPolicy {
    fn default() -> Self {
        Self {
            require_parent_unpublished: true,
            forbid_parent_with_students: true,
            require_same_term: true,
            require_same_subaccount: true,
        }
    }
}
