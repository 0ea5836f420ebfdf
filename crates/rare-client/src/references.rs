//! Reference image set uploaded before classification
//!
//! The backend classifies by similarity against a fixed set of captioned
//! reference images. The set has [`REFERENCE_SLOTS`] numbered slots (1-based),
//! all of which must hold an image and a non-empty caption before upload.

use reqwest::multipart::Form;

use crate::error::{RareClientError, Result};
use crate::image::ImageFile;

/// Number of reference images the backend expects
pub const REFERENCE_SLOTS: usize = 4;

/// One captioned reference image
#[derive(Debug, Clone)]
pub struct Reference {
    pub image: ImageFile,
    pub caption: String,
}

/// Slot-indexed reference images and captions
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    images: [Option<ImageFile>; REFERENCE_SLOTS],
    captions: [String; REFERENCE_SLOTS],
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from references in slot order.
    ///
    /// More than [`REFERENCE_SLOTS`] references is an error; fewer leaves the
    /// remaining slots empty, which [`validate`](Self::validate) rejects.
    pub fn from_references(references: impl IntoIterator<Item = Reference>) -> Result<Self> {
        let mut set = Self::new();
        for (i, reference) in references.into_iter().enumerate() {
            set.set(i + 1, reference.image, reference.caption)?;
        }
        Ok(set)
    }

    /// Fill a slot with an image and caption
    pub fn set(&mut self, slot: usize, image: ImageFile, caption: impl Into<String>) -> Result<()> {
        let idx = Self::index(slot)?;
        self.images[idx] = Some(image);
        self.captions[idx] = caption.into();
        Ok(())
    }

    /// Replace only the image in a slot
    pub fn set_image(&mut self, slot: usize, image: ImageFile) -> Result<()> {
        let idx = Self::index(slot)?;
        self.images[idx] = Some(image);
        Ok(())
    }

    /// Replace only the caption in a slot
    pub fn set_caption(&mut self, slot: usize, caption: impl Into<String>) -> Result<()> {
        let idx = Self::index(slot)?;
        self.captions[idx] = caption.into();
        Ok(())
    }

    /// Number of slots that currently hold an image
    pub fn image_count(&self) -> usize {
        self.images.iter().filter(|i| i.is_some()).count()
    }

    /// Check that every slot has an image and a non-blank caption.
    ///
    /// Missing images are reported before missing captions, matching the
    /// order in which a user fills the form.
    pub fn validate(&self) -> Result<Vec<Reference>> {
        if self.images.iter().any(Option::is_none) {
            return Err(RareClientError::invalid_input(format!(
                "Please upload all {} reference images",
                REFERENCE_SLOTS
            )));
        }

        let mut references = Vec::with_capacity(REFERENCE_SLOTS);
        for (i, (image, caption)) in self.images.iter().zip(&self.captions).enumerate() {
            let caption = caption.trim();
            if caption.is_empty() {
                return Err(RareClientError::invalid_input(format!(
                    "Please enter caption for reference image {}",
                    i + 1
                )));
            }
            if let Some(image) = image {
                references.push(Reference {
                    image: image.clone(),
                    caption: caption.to_string(),
                });
            }
        }

        Ok(references)
    }

    /// Validate and build the `/upload_references` form.
    ///
    /// All `files` parts come first in slot order, followed by all `captions`.
    pub(crate) fn to_form(&self) -> Result<Form> {
        let references = self.validate()?;

        let mut form = Form::new();
        for reference in &references {
            form = form.part("files", reference.image.to_part()?);
        }
        for reference in references {
            form = form.text("captions", reference.caption);
        }
        Ok(form)
    }

    fn index(slot: usize) -> Result<usize> {
        if (1..=REFERENCE_SLOTS).contains(&slot) {
            Ok(slot - 1)
        } else {
            Err(RareClientError::invalid_input(format!(
                "Reference slot must be between 1 and {}, got {}",
                REFERENCE_SLOTS, slot
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str) -> ImageFile {
        ImageFile::from_bytes(name, vec![0u8; 4])
    }

    fn full_set() -> ReferenceSet {
        let mut set = ReferenceSet::new();
        for (slot, caption) in ["Fire", "Flood", "Storm", "Volcano"].iter().enumerate() {
            set.set(slot + 1, image(&format!("ref{}.png", slot + 1)), *caption)
                .unwrap();
        }
        set
    }

    #[test]
    fn test_full_set_validates() {
        let refs = full_set().validate().unwrap();
        assert_eq!(refs.len(), REFERENCE_SLOTS);
        assert_eq!(refs[0].caption, "Fire");
        assert_eq!(refs[3].image.file_name, "ref4.png");
    }

    #[test]
    fn test_missing_image_rejected() {
        let mut set = ReferenceSet::new();
        set.set(1, image("a.png"), "a").unwrap();
        set.set(2, image("b.png"), "b").unwrap();
        set.set(4, image("d.png"), "d").unwrap();

        let err = set.validate().unwrap_err();
        assert_eq!(err.to_string(), "Please upload all 4 reference images");
        assert_eq!(set.image_count(), 3);
    }

    #[test]
    fn test_blank_caption_reports_slot() {
        let mut set = full_set();
        set.set_caption(3, "   ").unwrap();

        let err = set.validate().unwrap_err();
        assert_eq!(err.to_string(), "Please enter caption for reference image 3");
    }

    #[test]
    fn test_missing_image_reported_before_caption() {
        let mut set = ReferenceSet::new();
        set.set_image(1, image("a.png")).unwrap();
        let err = set.validate().unwrap_err();
        assert_eq!(err.to_string(), "Please upload all 4 reference images");
    }

    #[test]
    fn test_captions_are_trimmed() {
        let mut set = full_set();
        set.set_caption(2, "  Severe flooding  ").unwrap();
        let refs = set.validate().unwrap();
        assert_eq!(refs[1].caption, "Severe flooding");
    }

    #[test]
    fn test_slot_bounds() {
        let mut set = ReferenceSet::new();
        assert!(set.set(0, image("a.png"), "a").is_err());
        assert!(set.set(5, image("a.png"), "a").is_err());
        assert!(set.set(4, image("a.png"), "a").is_ok());
    }

    #[test]
    fn test_from_references_too_many() {
        let refs = (0..5).map(|i| Reference {
            image: image(&format!("{}.png", i)),
            caption: format!("caption {}", i),
        });
        assert!(ReferenceSet::from_references(refs).is_err());
    }

    #[test]
    fn test_to_form_requires_valid_set() {
        assert!(ReferenceSet::new().to_form().is_err());
        assert!(full_set().to_form().is_ok());
    }
}
