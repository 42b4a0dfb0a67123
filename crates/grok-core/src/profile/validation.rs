//! Load-time profile validation and step ordering.
//!
//! Edges of the step graph point from a dependency to its dependent. They
//! come from two places:
//!
//! ```text
//!   prompt_template: "... {extract_entities} ..."   ──► extract_entities → this step
//!   dependencies:    [extract_entities]             ──► extract_entities → this step
//! ```
//!
//! Execution order is a topological order of that graph. Among steps that are
//! ready at the same time, the one declared first runs first, so a profile
//! whose declared order is already valid runs exactly in declared order.

use std::collections::HashSet;

use regex::Regex;

use crate::error::ValidationError;
use crate::interpolation::extract_variables;
use crate::models::profile::{ModelConfig, ProcessingProfile, ProcessingStep};
use crate::sanitize;

/// Reserved variable name supplied by the executor.
pub const TRANSCRIPT_VAR: &str = "transcript";

pub const MAX_STEPS: usize = 10;
pub const MAX_STEP_ID_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MIN_TEMPLATE_LEN: usize = 10;

lazy_static::lazy_static! {
    static ref PROFILE_ID: Option<Regex> = Regex::new(r"^[a-z0-9_]+$").ok();
    static ref STEP_ID: Option<Regex> = Regex::new(r"^[a-z][a-z0-9_]*$").ok();
    static ref VERSION: Option<Regex> = Regex::new(r"^\d+\.\d+\.\d+$").ok();
}

fn matches(re: &Option<Regex>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

/// Whether `id` is a well-formed profile id (also safe as a file stem).
pub fn is_valid_profile_id(id: &str) -> bool {
    matches(&PROFILE_ID, id)
}

/// Dependencies of one step, in first-mention order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDependencies {
    pub step_id: String,
    /// Steps whose output is interpolated into the prompt
    pub references: Vec<String>,
    /// All predecessors: references plus explicit `dependencies`
    pub depends_on: Vec<String>,
}

/// Validate a profile, stopping at the first problem.
pub fn validate_profile(profile: &ProcessingProfile) -> Result<(), ValidationError> {
    match collect_problems(profile).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Every problem found in `profile`. Empty means valid.
///
/// Graph checks only run once the field checks pass.
pub fn collect_problems(profile: &ProcessingProfile) -> Vec<ValidationError> {
    let mut problems = Vec::new();
    check_fields(profile, &mut problems);
    if !problems.is_empty() {
        return problems;
    }
    if let Err(err) = execution_order(profile) {
        problems.push(err);
    }
    problems
}

// ─── Field checks ─────────────────────────────────────────────────────────

fn check_fields(profile: &ProcessingProfile, problems: &mut Vec<ValidationError>) {
    if !matches(&PROFILE_ID, &profile.profile_id) {
        problems.push(ValidationError::field(
            "profile_id",
            "must match ^[a-z0-9_]+$",
        ));
    }
    check_len("name", &profile.name, MAX_NAME_LEN, problems);
    check_len("description", &profile.description, MAX_DESCRIPTION_LEN, problems);
    if !matches(&VERSION, &profile.version) {
        problems.push(ValidationError::field(
            "version",
            format!("'{}' is not MAJOR.MINOR.PATCH", profile.version),
        ));
    }
    if profile.steps.is_empty() || profile.steps.len() > MAX_STEPS {
        problems.push(ValidationError::field(
            "steps",
            format!("must contain 1 to {} steps, found {}", MAX_STEPS, profile.steps.len()),
        ));
    }
    if !(100..=50_000).contains(&profile.estimated_tokens) {
        problems.push(ValidationError::field(
            "estimated_tokens",
            "must be between 100 and 50000",
        ));
    }

    let mut seen = HashSet::new();
    for step in &profile.steps {
        if !seen.insert(step.step_id.as_str()) {
            problems.push(ValidationError::DuplicateStepId(step.step_id.clone()));
        }
        check_step(step, problems);
    }
}

fn check_step(step: &ProcessingStep, problems: &mut Vec<ValidationError>) {
    let prefix = format!("steps.{}", step.step_id);

    if step.step_id.len() > MAX_STEP_ID_LEN || !matches(&STEP_ID, &step.step_id) {
        problems.push(ValidationError::field(
            format!("{}.step_id", prefix),
            format!("must match ^[a-z][a-z0-9_]*$ and be at most {} chars", MAX_STEP_ID_LEN),
        ));
    } else if step.step_id == TRANSCRIPT_VAR {
        problems.push(ValidationError::field(
            format!("{}.step_id", prefix),
            "'transcript' is reserved",
        ));
    }
    check_len(&format!("{}.name", prefix), &step.name, MAX_NAME_LEN, problems);

    if step.prompt_template.chars().count() < MIN_TEMPLATE_LEN {
        problems.push(ValidationError::InvalidTemplate {
            step_id: step.step_id.clone(),
            reason: format!("must be at least {} characters", MIN_TEMPLATE_LEN),
        });
    } else if let Err(reason) = sanitize::check_template(&step.prompt_template) {
        problems.push(ValidationError::InvalidTemplate {
            step_id: step.step_id.clone(),
            reason,
        });
    }

    check_model_config(&prefix, &step.model_config, problems);
}

/// Range checks for a step's model configuration.
pub fn check_model_config(prefix: &str, config: &ModelConfig, problems: &mut Vec<ValidationError>) {
    if config.model.trim().is_empty() {
        problems.push(ValidationError::field(
            format!("{}.model_config.model", prefix),
            "must not be empty",
        ));
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        problems.push(ValidationError::field(
            format!("{}.model_config.temperature", prefix),
            "must be between 0 and 2",
        ));
    }
    if !(100..=50_000).contains(&config.max_tokens) {
        problems.push(ValidationError::field(
            format!("{}.model_config.max_tokens", prefix),
            "must be between 100 and 50000",
        ));
    }
    if !(5..=300).contains(&config.timeout_seconds) {
        problems.push(ValidationError::field(
            format!("{}.model_config.timeout_seconds", prefix),
            "must be between 5 and 300",
        ));
    }
}

fn check_len(field: &str, value: &str, max: usize, problems: &mut Vec<ValidationError>) {
    let len = value.chars().count();
    if len == 0 || len > max {
        problems.push(ValidationError::field(
            field,
            format!("must be 1 to {} characters", max),
        ));
    }
}

// ─── Dependency graph ─────────────────────────────────────────────────────

/// Build the dependency list of every step, in declaration order.
///
/// Fails on references to undeclared steps or to steps that do not pass
/// their output on.
pub fn dependency_graph(profile: &ProcessingProfile) -> Result<Vec<StepDependencies>, ValidationError> {
    let mut graph = Vec::with_capacity(profile.steps.len());

    for step in &profile.steps {
        let mut references = Vec::new();
        for name in extract_variables(&step.prompt_template) {
            if name == TRANSCRIPT_VAR {
                continue;
            }
            let target = profile
                .get_step(&name)
                .ok_or_else(|| ValidationError::UndefinedReference {
                    step_id: step.step_id.clone(),
                    reference: name.clone(),
                })?;
            if !target.pass_to_next && target.step_id != step.step_id {
                return Err(ValidationError::UnavailableReference {
                    step_id: step.step_id.clone(),
                    reference: name,
                });
            }
            references.push(name);
        }

        let mut depends_on = references.clone();
        for dep in &step.dependencies {
            if profile.get_step(dep).is_none() {
                return Err(ValidationError::UndefinedReference {
                    step_id: step.step_id.clone(),
                    reference: dep.clone(),
                });
            }
            if !depends_on.contains(dep) {
                depends_on.push(dep.clone());
            }
        }

        graph.push(StepDependencies {
            step_id: step.step_id.clone(),
            references,
            depends_on,
        });
    }
    Ok(graph)
}

/// Indices into `profile.steps` in execution order.
///
/// Kahn's algorithm, always taking the earliest-declared ready step.
pub fn execution_order(profile: &ProcessingProfile) -> Result<Vec<usize>, ValidationError> {
    let graph = dependency_graph(profile)?;
    let n = graph.len();
    let index_of = |id: &str| graph.iter().position(|g| g.step_id == id);

    let mut remaining: Vec<usize> = graph.iter().map(|g| g.depends_on.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, node) in graph.iter().enumerate() {
        for dep in &node.depends_on {
            if let Some(d) = index_of(dep) {
                dependents[d].push(i);
            }
        }
    }

    let mut done = vec![false; n];
    let mut order = Vec::with_capacity(n);
    while order.len() < n {
        let next = (0..n).find(|&i| !done[i] && remaining[i] == 0);
        let Some(i) = next else {
            return Err(ValidationError::CircularDependency {
                cycle: find_cycle(&graph, &done),
            });
        };
        done[i] = true;
        order.push(i);
        for &dependent in &dependents[i] {
            remaining[dependent] -= 1;
        }
    }
    Ok(order)
}

/// Step ids in execution order.
pub fn execution_order_ids(profile: &ProcessingProfile) -> Result<Vec<String>, ValidationError> {
    Ok(execution_order(profile)?
        .into_iter()
        .map(|i| profile.steps[i].step_id.clone())
        .collect())
}

/// Walk unresolved edges from the first stuck step until a step repeats.
fn find_cycle(graph: &[StepDependencies], done: &[bool]) -> Vec<String> {
    let Some(start) = (0..graph.len()).find(|&i| !done[i]) else {
        return Vec::new();
    };
    let mut path: Vec<usize> = vec![start];
    let mut current = start;
    loop {
        let next = graph[current]
            .depends_on
            .iter()
            .filter_map(|dep| graph.iter().position(|g| &g.step_id == dep))
            .find(|&d| !done[d]);
        let Some(next) = next else {
            break;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle: Vec<String> = path[pos..]
                .iter()
                .map(|&i| graph[i].step_id.clone())
                .collect();
            cycle.push(graph[next].step_id.clone());
            return cycle;
        }
        path.push(next);
        current = next;
    }
    path.into_iter().map(|i| graph[i].step_id.clone()).collect()
}
