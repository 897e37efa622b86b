//! Submission builder.
//!
//! Accumulates a product title and image references into a draft that can
//! be dispatched once it is ready. Purely local state; nothing here calls
//! the analyzer.

use crate::error::{OrchestratorError, Result};
use crate::models::{ImageRef, ProductSubmission};
use tracing::debug;

/// Owns the draft submission for one domain context.
#[derive(Debug, Clone)]
pub struct SubmissionBuilder {
    draft: ProductSubmission,
}

impl SubmissionBuilder {
    /// Start an empty draft for a domain.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            draft: ProductSubmission::empty(domain),
        }
    }

    /// Read-only view of the current draft.
    pub fn submission(&self) -> &ProductSubmission {
        &self.draft
    }

    pub fn domain(&self) -> &str {
        &self.draft.domain
    }

    /// Store the trimmed title. An empty title is allowed but blocks readiness.
    pub fn set_title(&mut self, text: &str) {
        self.draft.title = text.trim().to_string();
    }

    /// Append images in the given order. Duplicates are kept.
    pub fn add_images<I>(&mut self, refs: I)
    where
        I: IntoIterator<Item = ImageRef>,
    {
        let before = self.draft.images.len();
        self.draft.images.extend(refs);
        debug!(
            "Added {} image(s) to {} draft",
            self.draft.images.len() - before,
            self.draft.domain
        );
    }

    /// Remove the image at `index`, shifting later images left.
    pub fn remove_image_at(&mut self, index: usize) -> Result<ImageRef> {
        let len = self.draft.images.len();
        if index >= len {
            return Err(OrchestratorError::IndexOutOfRange { index, len });
        }
        Ok(self.draft.images.remove(index))
    }

    pub fn is_ready(&self) -> bool {
        self.draft.is_ready()
    }

    /// Clear title and images, keeping the domain.
    pub fn reset(&mut self) {
        self.draft.title.clear();
        self.draft.images.clear();
    }

    /// Clear the draft and move it to another domain.
    pub fn reset_for_domain(&mut self, domain: impl Into<String>) {
        self.draft = ProductSubmission::empty(domain);
    }
}
