//! Operation registry: the generation/processing policy sets.
//!
//! An [`OperationPolicy`] is an immutable value. Registering an operation
//! returns a new policy, so a policy handed to a [`SafetyGate`](crate::SafetyGate)
//! can never change underneath it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};

/// Operations that create new media and must go through the Kamui backend.
pub const GENERATION_OPERATIONS: &[&str] = &[
    "generate_image",
    "generate_video",
    "generate_music",
    "generate_3d_model",
    "generate_speech",
    "image_to_video",
    "image_to_3d",
    "text_to_speech",
];

/// Post-generation operations that may use any backend.
pub const PROCESSING_OPERATIONS: &[&str] = &[
    "create_3d_scene",
    "process_3d_model",
    "combine_assets",
    "render_scene",
    "optimize_model",
    "create_animation",
    "compose_scene",
];

/// Classification of an operation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Must route through the mandated backend.
    Generation,
    /// May use any backend.
    Processing,
    /// Not registered in either set.
    Unknown,
}

impl OperationKind {
    /// Returns the string identifier for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Generation => "generation",
            OperationKind::Processing => "processing",
            OperationKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pair of disjoint operation sets.
///
/// Registration is idempotent within a set. Registering a name that already
/// belongs to the *other* set is rejected with
/// [`PolicyError::OperationConflict`]; the sets are never silently merged.
/// There is no removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPolicy {
    generation: BTreeSet<String>,
    processing: BTreeSet<String>,
}

impl OperationPolicy {
    /// Creates a policy with both sets empty.
    pub fn empty() -> Self {
        Self {
            generation: BTreeSet::new(),
            processing: BTreeSet::new(),
        }
    }

    /// Creates the standard policy with the built-in operation sets.
    pub fn standard() -> Self {
        Self {
            generation: GENERATION_OPERATIONS.iter().map(|s| s.to_string()).collect(),
            processing: PROCESSING_OPERATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Classifies an operation identifier.
    pub fn classify(&self, name: &str) -> OperationKind {
        if self.generation.contains(name) {
            OperationKind::Generation
        } else if self.processing.contains(name) {
            OperationKind::Processing
        } else {
            OperationKind::Unknown
        }
    }

    /// Returns a new policy with `name` added to the generation set.
    pub fn with_generation(&self, name: impl Into<String>) -> PolicyResult<Self> {
        self.register(name.into(), OperationKind::Generation)
    }

    /// Returns a new policy with `name` added to the processing set.
    pub fn with_processing(&self, name: impl Into<String>) -> PolicyResult<Self> {
        self.register(name.into(), OperationKind::Processing)
    }

    // `kind` is Generation or Processing.
    fn register(&self, name: String, kind: OperationKind) -> PolicyResult<Self> {
        if name.trim().is_empty() {
            return Err(PolicyError::EmptyOperationName);
        }

        let existing = self.classify(&name);
        if existing != OperationKind::Unknown && existing != kind {
            return Err(PolicyError::OperationConflict { name, existing });
        }

        let mut next = self.clone();
        let set = if kind == OperationKind::Generation {
            &mut next.generation
        } else {
            &mut next.processing
        };
        set.insert(name);
        Ok(next)
    }

    /// Generation-required operations, sorted.
    pub fn generation_operations(&self) -> impl Iterator<Item = &str> {
        self.generation.iter().map(String::as_str)
    }

    /// Processing-allowed operations, sorted.
    pub fn processing_operations(&self) -> impl Iterator<Item = &str> {
        self.processing.iter().map(String::as_str)
    }

    /// Total number of registered operations.
    pub fn len(&self) -> usize {
        self.generation.len() + self.processing.len()
    }

    /// Returns true if neither set has any operation.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_classification() {
        let policy = OperationPolicy::standard();
        assert_eq!(policy.classify("generate_image"), OperationKind::Generation);
        assert_eq!(policy.classify("image_to_video"), OperationKind::Generation);
        assert_eq!(policy.classify("create_3d_scene"), OperationKind::Processing);
        assert_eq!(policy.classify("render_scene"), OperationKind::Processing);
        assert_eq!(policy.classify("paint_fence"), OperationKind::Unknown);
        assert_eq!(policy.classify(""), OperationKind::Unknown);
    }

    #[test]
    fn test_standard_sets_are_disjoint() {
        let policy = OperationPolicy::standard();
        for name in policy.generation_operations() {
            assert!(!policy.processing.contains(name), "{name} in both sets");
        }
        assert_eq!(
            policy.len(),
            GENERATION_OPERATIONS.len() + PROCESSING_OPERATIONS.len()
        );
    }

    #[test]
    fn test_registration_returns_new_policy() {
        let base = OperationPolicy::standard();
        let extended = base.with_generation("generate_texture").unwrap();

        assert_eq!(base.classify("generate_texture"), OperationKind::Unknown);
        assert_eq!(
            extended.classify("generate_texture"),
            OperationKind::Generation
        );
    }

    #[test]
    fn test_registration_is_idempotent() {
        let base = OperationPolicy::empty();
        let once = base.with_processing("upscale").unwrap();
        let twice = once.with_processing("upscale").unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[test]
    fn test_conflicting_registration_is_rejected() {
        let policy = OperationPolicy::standard();

        let err = policy.with_processing("generate_image").unwrap_err();
        match err {
            PolicyError::OperationConflict { name, existing } => {
                assert_eq!(name, "generate_image");
                assert_eq!(existing, OperationKind::Generation);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(policy.with_generation("render_scene").is_err());
        assert_eq!(policy.classify("generate_image"), OperationKind::Generation);
    }

    #[test]
    fn test_registering_into_one_set_excludes_the_other() {
        let policy = OperationPolicy::empty()
            .with_generation("make_thing")
            .unwrap();
        assert_ne!(policy.classify("make_thing"), OperationKind::Processing);

        let policy = OperationPolicy::empty().with_processing("tweak").unwrap();
        assert_ne!(policy.classify("tweak"), OperationKind::Generation);
    }

    #[test]
    fn test_empty_name_rejected() {
        let policy = OperationPolicy::empty();
        assert!(matches!(
            policy.with_generation("  "),
            Err(PolicyError::EmptyOperationName)
        ));
    }

    #[test]
    fn test_operations_are_listed_sorted() {
        let policy = OperationPolicy::standard();
        let generation: Vec<&str> = policy.generation_operations().collect();
        let mut sorted = generation.clone();
        sorted.sort_unstable();
        assert_eq!(generation, sorted);
        assert_eq!(generation.first(), Some(&"generate_3d_model"));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&OperationKind::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
