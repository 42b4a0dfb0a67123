//! `grok run` — run a profile against a transcript.

use grok_core::{AnalysisRequest, Engine, ErrorResponse, GlobalOverrides, ProfileResult, Settings};

use crate::cli::RunArgs;

use super::print_json;

/// Run the profile and print the result; failures come back as an `ErrorResponse`.
pub async fn run(settings: &Settings, args: &RunArgs) -> Result<(), ErrorResponse> {
    let engine = Engine::from_settings(settings);
    let result = execute(&engine, args).await?;
    print_json(&result);
    Ok(())
}

pub async fn execute(engine: &Engine, args: &RunArgs) -> Result<ProfileResult, ErrorResponse> {
    let transcript = read_transcript(args).map_err(invalid_request)?;
    let overrides = build_overrides(args).map_err(invalid_request)?;

    let request = AnalysisRequest::new(&args.profile, transcript).with_overrides(overrides);
    tracing::info!(
        "[Run] Profile {} ({} transcript chars)",
        request.profile_id,
        request.transcript.chars().count()
    );

    engine.run(&request).await.map_err(|e| e.to_response())
}

/// Transcript from `--text` or `--transcript-file`.
pub fn read_transcript(args: &RunArgs) -> Result<String, String> {
    match (&args.text, &args.transcript_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read transcript '{}': {}", path.display(), e)),
        (None, None) => Err("either --text or --transcript-file is required".to_string()),
    }
}

/// Overrides from `--overrides <file>`, with individual flags layered on top.
pub fn build_overrides(args: &RunArgs) -> Result<GlobalOverrides, String> {
    let mut overrides = match &args.overrides {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read overrides '{}': {}", path.display(), e))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("invalid overrides '{}': {}", path.display(), e))?
        }
        None => GlobalOverrides::default(),
    };

    if args.force_provider.is_some() {
        overrides.force_provider = args.force_provider;
    }
    if let Some(ref model) = args.force_model {
        overrides.force_model = Some(model.clone());
    }
    if args.temperature.is_some() {
        overrides.global_temperature = args.temperature;
    }
    if args.max_tokens.is_some() {
        overrides.global_max_tokens = args.max_tokens;
    }
    Ok(overrides)
}

fn invalid_request(message: String) -> ErrorResponse {
    ErrorResponse {
        error: message,
        kind: "invalid_request".to_string(),
        step_id: None,
        recoverable: false,
    }
}
