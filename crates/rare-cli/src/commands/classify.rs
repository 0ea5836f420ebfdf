//! Classify and describe commands - analyze a single image

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use rare_client::{ClassifyResponse, ImageFile, RareClient};

use crate::output::{OutputContext, OutputFormat, SimilarityRow};

async fn load_image(path: &Path) -> Result<ImageFile> {
    ImageFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))
}

/// Classify an image as a rare event or normal
pub async fn classify(client: &RareClient, path: &Path, ctx: &OutputContext) -> Result<()> {
    let image = load_image(path).await?;

    let pb = ctx.spinner("Classifying...");
    let result = client.classify(&image).await;
    pb.finish_and_clear();
    let result = result?;

    if ctx.format == OutputFormat::Json {
        ctx.print_json(&result);
        return Ok(());
    }

    print_label(&result, ctx);
    if !result.all_similarities.is_empty() {
        ctx.print(&similarity_rows(&result));
    }
    Ok(())
}

fn print_label(result: &ClassifyResponse, ctx: &OutputContext) {
    if ctx.format == OutputFormat::Csv {
        ctx.print_kv(&[
            ("Label", result.label.clone()),
            ("Confidence", result.confidence()),
        ]);
        return;
    }

    let label = if result.is_rare_event() {
        result.label.red().bold()
    } else {
        result.label.green().bold()
    };
    println!("{}: {}", "Label".bold(), label);
    println!("{}: {}", "Confidence".bold(), result.confidence());
}

fn similarity_rows(result: &ClassifyResponse) -> Vec<SimilarityRow> {
    result
        .all_similarities
        .iter()
        .enumerate()
        .map(|(i, s)| SimilarityRow {
            reference: i + 1,
            similarity: format!("{:.4}", s),
        })
        .collect()
}

/// Generate a description for an image
pub async fn describe(client: &RareClient, path: &Path, ctx: &OutputContext) -> Result<()> {
    let image = load_image(path).await?;

    let pb = ctx.spinner("Describing...");
    let result = client.describe(&image).await;
    pb.finish_and_clear();
    let result = result?;

    match ctx.format {
        OutputFormat::Json => ctx.print_json(&result),
        _ => ctx.print_kv(&[("Description", result.description)]),
    }
    Ok(())
}
