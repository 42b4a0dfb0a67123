//! `grok providers` — provider health.

use grok_core::Engine;

use super::print_json;

pub async fn status(engine: &Engine) -> Result<(), String> {
    let status = engine.provider_status().await;
    let available = status.values().filter(|h| h.available).count();
    tracing::info!("[Providers] {}/{} available", available, status.len());
    print_json(&status);
    Ok(())
}
