//! Generate command - synthesize an image from a caption

use std::path::Path;

use anyhow::{Context, Result};
use rare_client::{DataUri, RareClient};

use crate::output::OutputContext;

/// Generate a synthetic image and optionally save it
pub async fn generate(
    client: &RareClient,
    caption: &str,
    save: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let pb = ctx.spinner("Generating image (this can take a while)...");
    let result = client.generate(caption).await;
    pb.finish_and_clear();
    let result = result?;

    ctx.success(&format!("Generated: \"{}\"", result.caption));

    let image = DataUri::parse(&result.image).context("Backend returned an unusable image")?;
    ctx.info(&format!(
        "Image: {} ({} bytes)",
        image.media_type,
        image.data.len()
    ));

    if let Some(path) = save {
        let written = image
            .save(path)
            .await
            .with_context(|| format!("Failed to save image to {}", path.display()))?;
        ctx.success(&format!("Saved generated image to {}", written.display()));
    }

    ctx.print_json(&result);
    Ok(())
}
