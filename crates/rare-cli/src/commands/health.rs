//! Health and info commands - backend status

use anyhow::{bail, Result};
use rare_client::{ErrorCategory, RareClient};

use crate::output::{EndpointRow, OutputContext, OutputFormat};

/// Check that the backend is up and report its device
pub async fn health(client: &RareClient, ctx: &OutputContext) -> Result<()> {
    let health = match client.health().await {
        Ok(health) => health,
        Err(e) if e.category() == ErrorCategory::Connection => {
            tracing::debug!(error = %e, "health check failed");
            bail!("Backend not connected. Please start the backend server.");
        }
        Err(e) => {
            tracing::debug!(error = %e, "health check rejected");
            bail!("Backend responded with error: {}", e);
        }
    };

    ctx.success(&format!("Backend connected ({})", health.device));
    ctx.print_json(&health);

    if ctx.format == OutputFormat::Json {
        return Ok(());
    }

    if let Some(models) = health.models_loaded.as_ref().filter(|m| !m.all()) {
        ctx.warn(&format!(
            "Not all models are loaded (clip={} blip={} stable_diffusion={})",
            models.clip, models.blip, models.stable_diffusion
        ));
    }

    let models = health
        .models_loaded
        .as_ref()
        .map(|m| {
            format!(
                "clip={} blip={} stable_diffusion={}",
                m.clip, m.blip, m.stable_diffusion
            )
        })
        .unwrap_or_else(|| "-".to_string());

    let pairs = vec![
        ("Status", health.status.unwrap_or_else(|| "-".to_string())),
        ("Device", health.device),
        ("Models", models),
        (
            "References",
            health
                .reference_count
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
    ];

    ctx.print_kv(&pairs);
    Ok(())
}

/// Show the service banner and its endpoints
pub async fn info(client: &RareClient, ctx: &OutputContext) -> Result<()> {
    let info = client.api_info().await?;

    if ctx.format == OutputFormat::Json {
        ctx.print_json(&info);
        return Ok(());
    }

    ctx.info(&format!(
        "{} {}",
        info.message,
        info.version.as_deref().unwrap_or_default()
    ));

    let rows: Vec<EndpointRow> = info.endpoints.iter().map(|e| endpoint_row(e)).collect();
    ctx.print(&rows);
    Ok(())
}

/// Split `"/path - METHOD: text"` into its path and description
fn endpoint_row(entry: &str) -> EndpointRow {
    match entry.split_once(" - ") {
        Some((endpoint, description)) => EndpointRow {
            endpoint: endpoint.trim().to_string(),
            description: description.trim().to_string(),
        },
        None => EndpointRow {
            endpoint: entry.trim().to_string(),
            description: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_row() {
        let row = endpoint_row("/classify - POST: Classify an image as Rare Event or Normal");
        assert_eq!(row.endpoint, "/classify");
        assert_eq!(row.description, "POST: Classify an image as Rare Event or Normal");

        let bare = endpoint_row("/health");
        assert_eq!(bare.endpoint, "/health");
        assert!(bare.description.is_empty());
    }
}
