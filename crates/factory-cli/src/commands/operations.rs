//! Operation listing.

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use factory_policy::OperationPolicy;
use serde::Serialize;

/// Operation names grouped by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationListing {
    /// Operations that must go through the Kamui backend.
    pub generation: Vec<String>,
    /// Operations that may use any backend.
    pub processing: Vec<String>,
}

impl OperationListing {
    /// Collects both groups from `policy`, sorted.
    pub fn from_policy(policy: &OperationPolicy) -> Self {
        Self {
            generation: policy.generation_operations().map(str::to_string).collect(),
            processing: policy.processing_operations().map(str::to_string).collect(),
        }
    }
}

/// Run the list-operations command
pub fn run(json: bool) -> Result<ExitCode> {
    let listing = OperationListing::from_policy(&OperationPolicy::standard());

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", "Generation operations (Kamui backend required):".bold());
    for name in &listing.generation {
        println!("  {} {}", "*".red(), name);
    }
    println!();
    println!("{}", "Processing operations (any backend):".bold());
    for name in &listing.processing {
        println!("  {} {}", "*".green(), name);
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_from_standard_policy() {
        let listing = OperationListing::from_policy(&OperationPolicy::standard());
        assert!(listing.generation.contains(&"generate_image".to_string()));
        assert!(listing.processing.contains(&"compose_scene".to_string()));

        let mut sorted = listing.generation.clone();
        sorted.sort();
        assert_eq!(listing.generation, sorted);
    }

    #[test]
    fn test_listing_serializes_both_groups() {
        let policy = OperationPolicy::empty()
            .with_generation("generate_image")
            .unwrap()
            .with_processing("render_scene")
            .unwrap();
        let json = serde_json::to_value(OperationListing::from_policy(&policy)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "generation": ["generate_image"],
                "processing": ["render_scene"],
            })
        );
    }
}
