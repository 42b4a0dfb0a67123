//! `grok profiles` — list, show and validate processing profiles.

use std::path::Path;

use grok_core::profile::validate_profile_source;
use grok_core::{FileProfileRepository, ProfileRepository};

use super::{print_json, truncate};

pub fn list(repository: &FileProfileRepository) -> Result<(), String> {
    let profiles = repository.list_profiles();
    println!("{} profile(s) in '{}'", profiles.len(), repository.dir().display());
    println!();
    println!("┌──────────────────────┬──────────────────────────────┬───────┬──────────┐");
    println!("│ ID                   │ Name                         │ Steps │ Source   │");
    println!("├──────────────────────┼──────────────────────────────┼───────┼──────────┤");
    for profile in &profiles {
        println!(
            "│ {:<20} │ {:<28} │ {:>5} │ {:<8} │",
            truncate(&profile.profile_id, 20),
            truncate(&profile.name, 28),
            profile.steps,
            truncate(profile.source.as_deref().unwrap_or("-"), 8)
        );
    }
    println!("└──────────────────────┴──────────────────────────────┴───────┴──────────┘");
    Ok(())
}

pub fn show(repository: &FileProfileRepository, profile_id: &str) -> Result<(), String> {
    let details = repository.get_details(profile_id).map_err(|e| e.to_string())?;
    print_json(&details);
    Ok(())
}

/// Every problem in the profile file; empty when it is valid.
pub fn problems(file: &Path) -> Result<Vec<String>, String> {
    let source = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read '{}': {}", file.display(), e))?;
    Ok(validate_profile_source(&source, file)
        .iter()
        .map(ToString::to_string)
        .collect())
}

pub fn validate(file: &Path) -> Result<(), String> {
    let problems = problems(file)?;
    if problems.is_empty() {
        println!("✅ Profile '{}' is valid", file.display());
        return Ok(());
    }

    println!("❌ Profile '{}' has {} problem(s):", file.display(), problems.len());
    for problem in &problems {
        println!("   - {}", problem);
    }
    Err(format!("{} validation problem(s)", problems.len()))
}
