//! Upload command - send the captioned reference images

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rare_client::{ImageFile, RareClient, Reference, ReferenceSet, REFERENCE_SLOTS};
use serde::Deserialize;

use crate::output::OutputContext;

/// Reference manifest file
///
/// ```toml
/// [[reference]]
/// image = "refs/fire.jpg"
/// caption = "A dangerous fire spreading"
/// ```
///
/// Relative image paths are resolved against the manifest's directory.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(rename = "reference", default)]
    pub references: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestEntry {
    pub image: PathBuf,
    #[serde(default)]
    pub caption: String,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let mut manifest: Manifest = toml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for entry in &mut manifest.references {
            if entry.image.is_relative() {
                entry.image = base.join(&entry.image);
            }
        }
        Ok(manifest)
    }
}

/// Pair image paths with captions, from flags or a manifest
fn collect_pairs(
    images: &[PathBuf],
    captions: &[String],
    manifest: Option<&Path>,
) -> Result<Vec<(PathBuf, String)>> {
    if let Some(path) = manifest {
        if !images.is_empty() || !captions.is_empty() {
            bail!("Use either --manifest or --image/--caption, not both");
        }
        let manifest = Manifest::load(path)?;
        return Ok(manifest
            .references
            .into_iter()
            .map(|e| (e.image, e.caption))
            .collect());
    }

    if images.len() > REFERENCE_SLOTS {
        bail!(
            "Expected {} reference images, got {}",
            REFERENCE_SLOTS,
            images.len()
        );
    }
    if captions.len() != images.len() {
        bail!(
            "Each --image needs a matching --caption (got {} images, {} captions)",
            images.len(),
            captions.len()
        );
    }

    Ok(images.iter().cloned().zip(captions.iter().cloned()).collect())
}

/// Build the reference set, reading each image from disk
pub async fn load_reference_set(pairs: Vec<(PathBuf, String)>) -> Result<ReferenceSet> {
    if pairs.len() > REFERENCE_SLOTS {
        bail!(
            "Expected {} reference images, got {}",
            REFERENCE_SLOTS,
            pairs.len()
        );
    }

    let mut references = Vec::with_capacity(pairs.len());
    for (path, caption) in pairs {
        let image = ImageFile::from_path(&path)
            .await
            .with_context(|| format!("Failed to read reference image: {}", path.display()))?;
        references.push(Reference { image, caption });
    }
    let set = ReferenceSet::from_references(references)?;

    // Surface missing images/captions before anything is sent
    set.validate()?;
    Ok(set)
}

/// Upload reference images with captions
pub async fn upload(
    client: &RareClient,
    images: &[PathBuf],
    captions: &[String],
    manifest: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let pairs = collect_pairs(images, captions, manifest)?;
    let set = load_reference_set(pairs).await?;

    let pb = ctx.spinner("Uploading reference images...");
    let result = client.upload_references(&set).await;
    pb.finish_and_clear();
    let response = result?;

    ctx.success(&response.message);
    ctx.print_json(&response);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use axum::http::StatusCode;
    use rare_client::testing::{mock_png, MockBackend, TestServer};
    use rare_client::RareClientError;

    #[test]
    fn test_manifest_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.toml");
        std::fs::write(
            &path,
            r#"
[[reference]]
image = "fire.jpg"
caption = "A dangerous fire spreading"

[[reference]]
image = "/abs/flood.jpg"
caption = "Severe flooding in the area"
"#,
        )
        .unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.references.len(), 2);
        assert_eq!(manifest.references[0].image, dir.path().join("fire.jpg"));
        assert_eq!(manifest.references[1].image, PathBuf::from("/abs/flood.jpg"));
    }

    #[test]
    fn test_collect_pairs_rejects_mixed_sources() {
        let images = vec![PathBuf::from("a.png")];
        assert!(collect_pairs(&images, &[], Some(Path::new("refs.toml"))).is_err());
    }

    #[test]
    fn test_collect_pairs_zips_flags_in_order() {
        let images = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let captions = vec!["first".to_string(), "second".to_string()];
        let pairs = collect_pairs(&images, &captions, None).unwrap();
        assert_eq!(pairs[0], (PathBuf::from("a.png"), "first".to_string()));
        assert_eq!(pairs[1], (PathBuf::from("b.png"), "second".to_string()));
    }

    #[test]
    fn test_collect_pairs_rejects_caption_count_mismatch() {
        let images = vec![PathBuf::from("a.png")];
        let captions = vec!["first".to_string(), "extra".to_string()];
        let err = collect_pairs(&images, &captions, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Each --image needs a matching --caption (got 1 images, 2 captions)"
        );

        let captions: Vec<String> = Vec::new();
        assert!(collect_pairs(&images, &captions, None).is_err());
    }

    #[tokio::test]
    async fn test_load_reference_set_requires_four() {
        let dir = tempfile::tempdir().unwrap();
        let mut pairs = Vec::new();
        for i in 1..=3 {
            let path = dir.path().join(format!("ref{}.png", i));
            std::fs::write(&path, [1u8, 2, 3]).unwrap();
            pairs.push((path, format!("caption {}", i)));
        }

        let err = load_reference_set(pairs.clone()).await.unwrap_err();
        assert_eq!(err.to_string(), "Please upload all 4 reference images");

        let path = dir.path().join("ref4.png");
        std::fs::write(&path, [4u8]).unwrap();
        pairs.push((path, "caption 4".to_string()));
        let set = load_reference_set(pairs).await.unwrap();
        assert_eq!(set.image_count(), 4);
    }

    #[tokio::test]
    async fn test_upload_from_manifest_against_mock() {
        let dir = tempfile::tempdir().unwrap();
        let captions = [
            "A dangerous fire spreading",
            "Severe flooding in the area",
            "Powerful storm with lightning",
            "Volcanic eruption with lava",
        ];
        let mut manifest = String::new();
        for (i, caption) in captions.iter().enumerate() {
            let name = format!("ref{}.png", i + 1);
            std::fs::write(dir.path().join(&name), mock_png()).unwrap();
            manifest.push_str(&format!(
                "[[reference]]\nimage = \"{}\"\ncaption = \"{}\"\n\n",
                name, caption
            ));
        }
        let path = dir.path().join("refs.toml");
        std::fs::write(&path, manifest).unwrap();

        let mock = MockBackend::new();
        let server = TestServer::mock(&mock).await.unwrap();
        let ctx = OutputContext::new(OutputFormat::Json, true, true);

        upload(&server.client, &[], &[], Some(&path), &ctx)
            .await
            .unwrap();

        let stored = mock.references();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0].file_name, "ref1.png");
        assert_eq!(stored[3].caption, "Volcanic eruption with lava");
    }

    #[tokio::test]
    async fn test_upload_reports_backend_detail() {
        let dir = tempfile::tempdir().unwrap();
        let mut images = Vec::new();
        let mut captions = Vec::new();
        for i in 1..=4 {
            let path = dir.path().join(format!("ref{}.png", i));
            std::fs::write(&path, mock_png()).unwrap();
            images.push(path);
            captions.push(format!("caption {}", i));
        }

        let mock = MockBackend::new();
        mock.fail_endpoint(
            "/upload_references",
            StatusCode::INTERNAL_SERVER_ERROR,
            "disk full",
        );
        let server = TestServer::mock(&mock).await.unwrap();
        let ctx = OutputContext::new(OutputFormat::Json, true, true);

        let err = upload(&server.client, &images, &captions, None, &ctx)
            .await
            .unwrap_err();
        let client_err = err.downcast_ref::<RareClientError>().unwrap();
        assert_eq!(
            crate::commands::failure_message(client_err, "upload references"),
            "Error: disk full"
        );
    }
}
