//! Smoke command - end-to-end check of a running backend
//!
//! Walks every endpoint in dependency order using synthetic solid-colour
//! images: health, upload, classify, describe, generate. Checks whose
//! prerequisite failed are skipped and count as not passed.

use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Result};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use rare_client::{DataUri, ImageFile, RareClient, ReferenceSet};

use crate::commands::failure_message;
use crate::output::{CheckRow, OutputContext};

const IMAGE_SIZE: u32 = 224;

/// Reference fixtures: file name, colour, caption
const REFERENCES: [(&str, [u8; 3], &str); 4] = [
    ("fire.png", [255, 0, 0], "A dangerous fire spreading"),
    ("flood.png", [0, 0, 255], "Severe flooding in the area"),
    ("storm.png", [128, 128, 128], "Powerful storm with lightning"),
    ("volcano.png", [255, 165, 0], "Volcanic eruption with lava"),
];

const CLASSIFY_COLOR: [u8; 3] = [128, 0, 128];
const DESCRIBE_COLOR: [u8; 3] = [0, 128, 0];
const GENERATE_CAPTION: &str = "A rare purple lightning storm over mountains";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

impl CheckStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckOutcome {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Pass,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Fail,
            detail: detail.into(),
        }
    }

    fn skip(name: &'static str, reason: &str) -> Self {
        Self {
            name,
            status: CheckStatus::Skip,
            detail: reason.to_string(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}

/// Encode a solid-colour PNG
pub fn solid_png(rgb: [u8; 3]) -> Result<Vec<u8>> {
    let img = RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb(rgb));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn fixture(name: &str, rgb: [u8; 3]) -> Result<ImageFile> {
    Ok(ImageFile::from_bytes(name, solid_png(rgb)?))
}

/// Run every check against the backend and collect the outcomes
pub async fn run_checks(client: &RareClient, save_dir: Option<&Path>) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::new();

    let health = match client.health().await {
        Ok(h) => CheckOutcome::pass("health", format!("device: {}", h.device)),
        Err(e) => CheckOutcome::fail("health", failure_message(&e, "reach the backend")),
    };
    let healthy = health.passed();
    outcomes.push(health);

    if !healthy {
        for name in ["upload", "classify", "describe", "generate"] {
            outcomes.push(CheckOutcome::skip(name, "backend not available"));
        }
        return outcomes;
    }

    let upload = check_upload(client).await;
    let uploaded = upload.passed();
    outcomes.push(upload);

    if uploaded {
        outcomes.push(check_classify(client).await);
        outcomes.push(check_describe(client).await);
    } else {
        outcomes.push(CheckOutcome::skip("classify", "no references uploaded"));
        outcomes.push(CheckOutcome::skip("describe", "no references uploaded"));
    }

    outcomes.push(check_generate(client, save_dir).await);
    outcomes
}

async fn check_upload(client: &RareClient) -> CheckOutcome {
    let mut set = ReferenceSet::new();
    for (i, (name, rgb, caption)) in REFERENCES.iter().enumerate() {
        let image = match fixture(name, *rgb) {
            Ok(image) => image,
            Err(e) => return CheckOutcome::fail("upload", e.to_string()),
        };
        if let Err(e) = set.set(i + 1, image, *caption) {
            return CheckOutcome::fail("upload", e.to_string());
        }
    }

    match client.upload_references(&set).await {
        Ok(r) => CheckOutcome::pass("upload", r.message),
        Err(e) => CheckOutcome::fail("upload", failure_message(&e, "upload references")),
    }
}

async fn check_classify(client: &RareClient) -> CheckOutcome {
    let image = match fixture("test_classify.png", CLASSIFY_COLOR) {
        Ok(image) => image,
        Err(e) => return CheckOutcome::fail("classify", e.to_string()),
    };

    match client.classify(&image).await {
        Ok(r) => CheckOutcome::pass("classify", format!("{} ({})", r.label, r.confidence())),
        Err(e) => CheckOutcome::fail("classify", failure_message(&e, "classify image")),
    }
}

async fn check_describe(client: &RareClient) -> CheckOutcome {
    let image = match fixture("test_describe.png", DESCRIBE_COLOR) {
        Ok(image) => image,
        Err(e) => return CheckOutcome::fail("describe", e.to_string()),
    };

    match client.describe(&image).await {
        Ok(r) => CheckOutcome::pass("describe", r.description),
        Err(e) => CheckOutcome::fail("describe", failure_message(&e, "describe image")),
    }
}

async fn check_generate(client: &RareClient, save_dir: Option<&Path>) -> CheckOutcome {
    let result = match client.generate(GENERATE_CAPTION).await {
        Ok(r) => r,
        Err(e) => return CheckOutcome::fail("generate", failure_message(&e, "generate image")),
    };

    let uri = match DataUri::parse(&result.image) {
        Ok(uri) => uri,
        Err(e) => return CheckOutcome::fail("generate", e.to_string()),
    };

    let dims = match image::load_from_memory(&uri.data) {
        Ok(img) => format!("{}x{}", img.width(), img.height()),
        Err(e) => return CheckOutcome::fail("generate", format!("undecodable image: {}", e)),
    };

    let mut detail = format!("{} image for \"{}\"", dims, result.caption);
    if let Some(dir) = save_dir {
        match uri.save(dir.join("generated_test")).await {
            Ok(path) => detail.push_str(&format!(", saved to {}", path.display())),
            Err(e) => return CheckOutcome::fail("generate", format!("could not save: {}", e)),
        }
    }
    CheckOutcome::pass("generate", detail)
}

/// Run the smoke test and print a summary
pub async fn smoke(client: &RareClient, save_dir: Option<&Path>, ctx: &OutputContext) -> Result<()> {
    ctx.info(&format!("Running smoke test against {}", client.base_url()));

    let pb = ctx.spinner("Running checks...");
    let outcomes = run_checks(client, save_dir).await;
    pb.finish_and_clear();

    let rows: Vec<CheckRow> = outcomes
        .iter()
        .map(|o| CheckRow {
            check: o.name.to_string(),
            result: o.status.as_str().to_string(),
            detail: o.detail.clone(),
        })
        .collect();
    ctx.print(&rows);

    let passed = outcomes.iter().filter(|o| o.passed()).count();
    let total = outcomes.len();
    if passed == total {
        ctx.success(&format!("Total: {}/{} checks passed", passed, total));
        Ok(())
    } else {
        bail!("Total: {}/{} checks passed", passed, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use rare_client::testing::{unreachable_base_url, MockBackend, TestServer};

    #[test]
    fn test_solid_png_decodes() {
        let png = solid_png([255, 0, 0]).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (IMAGE_SIZE, IMAGE_SIZE));
        assert_eq!(img.get_pixel(10, 10).0, [255, 0, 0]);
    }

    #[tokio::test]
    async fn test_all_checks_pass_against_mock() {
        let mock = MockBackend::new();
        let server = TestServer::mock(&mock).await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let outcomes = run_checks(&server.client, Some(dir.path())).await;
        let names: Vec<&str> = outcomes.iter().map(|o| o.name).collect();
        assert_eq!(
            names,
            vec!["health", "upload", "classify", "describe", "generate"]
        );
        assert!(outcomes.iter().all(CheckOutcome::passed), "{outcomes:?}");
        assert!(dir.path().join("generated_test.png").exists());

        let stored = mock.references();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[2].caption, "Powerful storm with lightning");
    }

    #[tokio::test]
    async fn test_unreachable_backend_skips_rest() {
        let client = RareClient::new(&unreachable_base_url().unwrap()).unwrap();

        let outcomes = run_checks(&client, None).await;
        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes[0].status, CheckStatus::Fail);
        assert!(outcomes[0].detail.contains("Make sure the backend is running"));
        assert!(outcomes[1..].iter().all(|o| o.status == CheckStatus::Skip));
    }

    #[tokio::test]
    async fn test_failed_upload_skips_classify_and_describe() {
        let mock = MockBackend::new();
        mock.fail_endpoint(
            "/upload_references",
            StatusCode::INTERNAL_SERVER_ERROR,
            "cannot identify image file",
        );
        let server = TestServer::mock(&mock).await.unwrap();

        let outcomes = run_checks(&server.client, None).await;
        assert_eq!(outcomes[1].status, CheckStatus::Fail);
        assert_eq!(outcomes[1].detail, "Error: cannot identify image file");
        assert_eq!(outcomes[2].status, CheckStatus::Skip);
        assert_eq!(outcomes[3].status, CheckStatus::Skip);
        assert_eq!(outcomes[4].status, CheckStatus::Pass);
        assert_eq!(mock.hits("/classify"), 0);
    }

    #[tokio::test]
    async fn test_undecodable_generated_image_fails() {
        use axum::routing::post;
        use axum::Json;

        let router = axum::Router::new().route(
            "/generate",
            post(|| async {
                Json(serde_json::json!({
                    "image": "data:image/png;base64,AAAA",
                    "caption": GENERATE_CAPTION
                }))
            }),
        );
        let server = TestServer::start(router).await.unwrap();

        let outcome = check_generate(&server.client, None).await;
        assert_eq!(outcome.status, CheckStatus::Fail);
        assert!(outcome.detail.starts_with("undecodable image"));
    }
}
