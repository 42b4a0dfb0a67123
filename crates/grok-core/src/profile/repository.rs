//! Profile storage.
//!
//! `FileProfileRepository` serves profiles from a directory of
//! `<profile_id>.json` / `.yaml` / `.yml` files, backed by an in-memory cache
//! that is seeded with the built-in profiles. Every profile is validated
//! before it enters the cache, so anything handed to the executor has already
//! passed load-time validation.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, ValidationError};
use crate::models::profile::{OutputFormat, ProcessingProfile, ProfileMetadata, ProviderKind};
use crate::profile::builtin::builtin_profiles;
use crate::profile::validation::{
    collect_problems, dependency_graph, execution_order_ids, is_valid_profile_id,
    validate_profile,
};

const PROFILE_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Read access to profiles, as needed by the engine.
pub trait ProfileRepository: Send + Sync {
    fn load_profile(&self, profile_id: &str) -> Result<ProcessingProfile, RepositoryError>;

    fn list_profiles(&self) -> Vec<ProfileSummary>;
}

/// One row of a profile listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub profile_id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub steps: usize,
    pub tags: BTreeSet<String>,
    pub estimated_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<&ProcessingProfile> for ProfileSummary {
    fn from(profile: &ProcessingProfile) -> Self {
        Self {
            profile_id: profile.profile_id.clone(),
            name: profile.name.clone(),
            description: profile.description.clone(),
            version: profile.version.clone(),
            steps: profile.steps.len(),
            tags: profile.tags.clone(),
            estimated_tokens: profile.estimated_tokens,
            source: profile.metadata.source.clone(),
            updated_at: profile.metadata.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDetails {
    pub step_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub output_format: OutputFormat,
    pub required: bool,
    pub pass_to_next: bool,
    pub include_in_output: bool,
    /// Placeholder references plus explicit dependencies
    pub depends_on: Vec<String>,
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f64,
}

/// Full description of a profile, including its resolved execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDetails {
    pub profile_id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub steps: Vec<StepDetails>,
    pub tags: BTreeSet<String>,
    pub use_cases: Vec<String>,
    pub estimated_tokens: u32,
    pub metadata: ProfileMetadata,
    pub execution_order: Vec<String>,
}

impl ProfileDetails {
    pub fn from_profile(profile: &ProcessingProfile) -> Result<Self, ValidationError> {
        let graph = dependency_graph(profile)?;
        let execution_order = execution_order_ids(profile)?;

        let steps = profile
            .steps
            .iter()
            .zip(graph)
            .map(|(step, deps)| StepDetails {
                step_id: step.step_id.clone(),
                name: step.name.clone(),
                description: step.description.clone(),
                output_format: step.output_format,
                required: step.required,
                pass_to_next: step.pass_to_next,
                include_in_output: step.includes_in_output(),
                depends_on: deps.depends_on,
                provider: step.model_config.provider,
                model: step.model_config.model.clone(),
                temperature: step.model_config.temperature,
            })
            .collect();

        Ok(Self {
            profile_id: profile.profile_id.clone(),
            name: profile.name.clone(),
            description: profile.description.clone(),
            version: profile.version.clone(),
            steps,
            tags: profile.tags.clone(),
            use_cases: profile.use_cases.clone(),
            estimated_tokens: profile.estimated_tokens,
            metadata: profile.metadata.clone(),
            execution_order,
        })
    }
}

/// Parse and validate profile text without storing it.
///
/// Returns every problem found; an empty list means the profile is valid.
pub fn validate_profile_source(source: &str, path: &Path) -> Vec<ValidationError> {
    match ProcessingProfile::from_source(source, path) {
        Ok(profile) => collect_problems(&profile),
        Err(err) => vec![err],
    }
}

// ─── File repository ──────────────────────────────────────────────────────

pub struct FileProfileRepository {
    dir: PathBuf,
    cache: RwLock<HashMap<String, ProcessingProfile>>,
}

impl FileProfileRepository {
    /// Repository over `dir`, pre-loaded with the built-in profiles.
    ///
    /// The directory is created lazily on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let mut cache = HashMap::new();
        for profile in builtin_profiles() {
            match validate_profile(&profile) {
                Ok(()) => {
                    tracing::debug!("[ProfileRepository] Loaded built-in profile {}", profile.profile_id);
                    cache.insert(profile.profile_id.clone(), profile);
                }
                Err(e) => {
                    tracing::error!(
                        "[ProfileRepository] Built-in profile {} is invalid: {}",
                        profile.profile_id,
                        e
                    );
                }
            }
        }
        Self {
            dir: dir.into(),
            cache: RwLock::new(cache),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Re-read a profile from disk, bypassing the cache.
    ///
    /// Falls back to the built-in definition when no file exists.
    pub fn reload_profile(&self, profile_id: &str) -> Result<ProcessingProfile, RepositoryError> {
        if !is_valid_profile_id(profile_id) {
            return Err(RepositoryError::ProfileNotFound(profile_id.to_string()));
        }
        let profile = match self.find_file(profile_id) {
            Some(path) => read_profile_file(&path)?,
            None => builtin_profiles()
                .into_iter()
                .find(|p| p.profile_id == profile_id)
                .ok_or_else(|| RepositoryError::ProfileNotFound(profile_id.to_string()))?,
        };
        self.cache_insert(profile.clone());
        tracing::info!("[ProfileRepository] Reloaded profile {}", profile_id);
        Ok(profile)
    }

    /// Validate and write `profile` as `<profile_id>.json`.
    pub fn save_profile(
        &self,
        profile: &ProcessingProfile,
        overwrite: bool,
    ) -> Result<PathBuf, RepositoryError> {
        validate_profile(profile)?;

        let path = self.dir.join(format!("{}.json", profile.profile_id));
        if path.exists() && !overwrite {
            return Err(RepositoryError::AlreadyExists(profile.profile_id.clone()));
        }

        let mut stored = profile.clone();
        stored.metadata.source = Some("user".to_string());
        stored.metadata.updated_at = Some(chrono::Utc::now().to_rfc3339());

        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, json)?;

        self.cache_insert(stored);
        tracing::info!("[ProfileRepository] Saved profile {} to {}", profile.profile_id, path.display());
        Ok(path)
    }

    /// Remove a profile's file and cache entry.
    pub fn delete_profile(&self, profile_id: &str) -> Result<(), RepositoryError> {
        if !is_valid_profile_id(profile_id) {
            return Err(RepositoryError::ProfileNotFound(profile_id.to_string()));
        }
        let cached = self
            .cache
            .write()
            .ok()
            .and_then(|mut cache| cache.remove(profile_id))
            .is_some();

        let mut removed_file = false;
        while let Some(path) = self.find_file(profile_id) {
            std::fs::remove_file(&path)?;
            removed_file = true;
        }

        if !cached && !removed_file {
            return Err(RepositoryError::ProfileNotFound(profile_id.to_string()));
        }
        tracing::info!("[ProfileRepository] Deleted profile {}", profile_id);
        Ok(())
    }

    pub fn get_details(&self, profile_id: &str) -> Result<ProfileDetails, RepositoryError> {
        let profile = self.load_profile(profile_id)?;
        Ok(ProfileDetails::from_profile(&profile)?)
    }

    fn find_file(&self, profile_id: &str) -> Option<PathBuf> {
        PROFILE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", profile_id, ext)))
            .find(|p| p.is_file())
    }

    fn cache_get(&self, profile_id: &str) -> Option<ProcessingProfile> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(profile_id).cloned())
    }

    fn cache_insert(&self, profile: ProcessingProfile) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(profile.profile_id.clone(), profile);
        }
    }

    fn profile_files(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| PROFILE_EXTENSIONS.contains(&e))
            })
            .collect();
        files.sort();
        files
    }
}

impl ProfileRepository for FileProfileRepository {
    fn load_profile(&self, profile_id: &str) -> Result<ProcessingProfile, RepositoryError> {
        if let Some(profile) = self.cache_get(profile_id) {
            return Ok(profile);
        }
        if !is_valid_profile_id(profile_id) {
            return Err(RepositoryError::ProfileNotFound(profile_id.to_string()));
        }
        let path = self
            .find_file(profile_id)
            .ok_or_else(|| RepositoryError::ProfileNotFound(profile_id.to_string()))?;

        let profile = read_profile_file(&path)?;
        self.cache_insert(profile.clone());
        tracing::info!("[ProfileRepository] Loaded profile {} from {}", profile_id, path.display());
        Ok(profile)
    }

    fn list_profiles(&self) -> Vec<ProfileSummary> {
        let mut by_id: HashMap<String, ProfileSummary> = self
            .cache
            .read()
            .map(|cache| {
                cache
                    .values()
                    .map(|p| (p.profile_id.clone(), ProfileSummary::from(p)))
                    .collect()
            })
            .unwrap_or_default();

        for path in self.profile_files() {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if by_id.contains_key(stem) {
                continue;
            }
            match read_profile_file(&path) {
                Ok(profile) => {
                    by_id.insert(profile.profile_id.clone(), ProfileSummary::from(&profile));
                }
                Err(e) => {
                    tracing::warn!("[ProfileRepository] Skipping {}: {}", path.display(), e);
                }
            }
        }

        let mut summaries: Vec<ProfileSummary> = by_id.into_values().collect();
        summaries.sort_by(|a, b| a.profile_id.cmp(&b.profile_id));
        summaries
    }
}

/// Parse, stamp and validate one profile file.
fn read_profile_file(path: &Path) -> Result<ProcessingProfile, RepositoryError> {
    let source = std::fs::read_to_string(path)?;
    let mut profile = ProcessingProfile::from_source(&source, path)?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if profile.profile_id != stem {
        return Err(ValidationError::field(
            "profile_id",
            format!("'{}' does not match file name '{}'", profile.profile_id, stem),
        )
        .into());
    }

    profile.metadata.source = Some("file".to_string());
    if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
        let modified: chrono::DateTime<chrono::Utc> = modified.into();
        profile.metadata.updated_at = Some(modified.to_rfc3339());
    }

    validate_profile(&profile)?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOM_YAML: &str = r#"
profile_id: standup
name: "Daily Standup"
description: "Blockers and owners from a standup"
steps:
  - step_id: blockers
    name: "Blockers"
    prompt_template: "List blockers in {transcript}"
  - step_id: owners
    name: "Owners"
    prompt_template: "Owners for {blockers} given {transcript}"
    output_format: text
"#;

    fn repo() -> (tempfile::TempDir, FileProfileRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileProfileRepository::new(dir.path());
        (dir, repo)
    }

    #[test]
    fn test_builtins_available_without_files() {
        let (_dir, repo) = repo();
        let profile = repo.load_profile("business_meeting").unwrap();
        assert_eq!(profile.steps.len(), 2);

        let ids: Vec<String> = repo.list_profiles().into_iter().map(|s| s.profile_id).collect();
        assert_eq!(ids, vec!["business_meeting", "personal_notes", "project_planning"]);
    }

    #[test]
    fn test_load_yaml_file_and_stamp_metadata() {
        let (dir, repo) = repo();
        std::fs::write(dir.path().join("standup.yaml"), CUSTOM_YAML).unwrap();

        let profile = repo.load_profile("standup").unwrap();
        assert_eq!(profile.metadata.source.as_deref(), Some("file"));
        assert!(profile.metadata.updated_at.is_some());
        assert!(repo.list_profiles().iter().any(|s| s.profile_id == "standup"));
    }

    #[test]
    fn test_missing_profile_is_not_found() {
        let (_dir, repo) = repo();
        assert!(matches!(
            repo.load_profile("nope"),
            Err(RepositoryError::ProfileNotFound(_))
        ));
        assert!(matches!(
            repo.load_profile("../etc/passwd"),
            Err(RepositoryError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let (dir, repo) = repo();
        let bad = CUSTOM_YAML.replace("{blockers}", "{ghost}");
        std::fs::write(dir.path().join("standup.yaml"), bad).unwrap();
        assert!(matches!(
            repo.load_profile("standup"),
            Err(RepositoryError::Invalid(ValidationError::UndefinedReference { .. }))
        ));
        // Invalid files are skipped when listing.
        assert_eq!(repo.list_profiles().len(), 3);
    }

    #[test]
    fn test_save_reload_delete() {
        let (dir, repo) = repo();
        let profile = ProcessingProfile::from_yaml(CUSTOM_YAML).unwrap();

        let path = repo.save_profile(&profile, false).unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(matches!(
            repo.save_profile(&profile, false),
            Err(RepositoryError::AlreadyExists(_))
        ));
        assert!(repo.save_profile(&profile, true).is_ok());

        let reloaded = repo.reload_profile("standup").unwrap();
        assert_eq!(reloaded.metadata.source.as_deref(), Some("file"));

        repo.delete_profile("standup").unwrap();
        assert!(!path.exists());
        assert!(matches!(
            repo.load_profile("standup"),
            Err(RepositoryError::ProfileNotFound(_))
        ));
        assert!(matches!(
            repo.delete_profile("standup"),
            Err(RepositoryError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_details_report_execution_order() {
        let (_dir, repo) = repo();
        let details = repo.get_details("project_planning").unwrap();
        assert_eq!(
            details.execution_order,
            vec!["extract_requirements", "analyze_timeline", "assess_risks"]
        );
        assert_eq!(
            details.steps[2].depends_on,
            vec!["extract_requirements", "analyze_timeline"]
        );
    }

    #[test]
    fn test_validate_profile_source_reports_all_problems() {
        let path = Path::new("x.json");
        assert!(matches!(
            validate_profile_source("{", path).as_slice(),
            [ValidationError::Parse(_)]
        ));

        let source = serde_json::json!({
            "profile_id": "BAD",
            "name": "",
            "description": "d",
            "steps": [{"step_id": "s", "name": "S", "prompt_template": "no placeholder here"}]
        })
        .to_string();
        assert_eq!(validate_profile_source(&source, path).len(), 3);
    }
}
