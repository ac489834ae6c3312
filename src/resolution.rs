//! Solution payload validation for the resolve transition.
//!
//! The recorder never uploads anything: an after-image must already exist in the
//! asset store and arrives here as an [`AssetRef`]. The written payload is immutable;
//! a new one only replaces it through re-open followed by a fresh resolve.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{EngineError, EngineResult};
use crate::models::{ActorId, AssetRef, Resolution};
use crate::storage;

pub const MAX_SOLUTION_CHARS: usize = 4000;
pub const MAX_LINK_CHARS: usize = 2048;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SolutionInput {
    pub description: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub after_image: Option<AssetRef>,
}

impl SolutionInput {
    pub fn new(description: impl Into<String>) -> Self {
        Self { description: description.into(), ..Self::default() }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_after_image(mut self, image: AssetRef) -> Self {
        self.after_image = Some(image);
        self
    }
}

/// Solution input that passed validation but is not yet attributed to anyone.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedSolution {
    description: String,
    link: Option<String>,
    after_image: Option<AssetRef>,
}

impl CheckedSolution {
    pub fn stamp(self, resolved_by: &ActorId) -> Resolution {
        Resolution {
            description: self.description,
            link: self.link,
            after_image: self.after_image,
            resolved_by: resolved_by.clone(),
            resolved_at: Utc::now(),
        }
    }
}

pub fn check(input: SolutionInput) -> EngineResult<CheckedSolution> {
    let description = input.description.trim();
    if description.is_empty() {
        return Err(EngineError::Validation("solution description is required".into()));
    }
    if description.chars().count() > MAX_SOLUTION_CHARS {
        return Err(EngineError::Validation(format!(
            "solution description exceeds {MAX_SOLUTION_CHARS} characters"
        )));
    }
    let link = input.link.as_deref().map(str::trim).filter(|l| !l.is_empty());
    if let Some(l) = link {
        validate_link(l)?;
    }
    let after_image = input.after_image.filter(|r| !r.as_str().trim().is_empty());
    if after_image.as_ref().is_some_and(|r| !storage::is_valid_ref(r)) {
        return Err(EngineError::Validation("after image is not a stored asset reference".into()));
    }
    Ok(CheckedSolution { description: description.to_string(), link: link.map(str::to_string), after_image })
}

fn validate_link(link: &str) -> EngineResult<()> {
    if link.len() > MAX_LINK_CHARS {
        return Err(EngineError::Validation("solution link is too long".into()));
    }
    let rest = link
        .strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"))
        .ok_or_else(|| EngineError::Validation("solution link must be an http(s) URL".into()))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || link.chars().any(char::is_whitespace) {
        return Err(EngineError::Validation("solution link must be an http(s) URL".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by() -> ActorId { ActorId::new("owner") }

    fn record(input: SolutionInput) -> EngineResult<Resolution> {
        check(input).map(|c| c.stamp(&by()))
    }

    #[test]
    fn trims_description_and_drops_blank_link() {
        let r = record(SolutionInput::new("  Fixed pothole ").with_link("   ")).unwrap();
        assert_eq!(r.description, "Fixed pothole");
        assert!(r.link.is_none());
        assert_eq!(r.resolved_by, by());
    }

    #[test]
    fn rejects_blank_description() {
        let err = record(SolutionInput::new(" \n\t")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn link_must_be_http() {
        assert!(record(SolutionInput::new("ok").with_link("https://city.gov/works/12")).is_ok());
        assert!(record(SolutionInput::new("ok").with_link("ftp://x")).is_err());
        assert!(record(SolutionInput::new("ok").with_link("https://")).is_err());
        assert!(record(SolutionInput::new("ok").with_link("http://a b")).is_err());
    }

    #[test]
    fn keeps_after_image_reference() {
        let digest = AssetRef("0f".repeat(32));
        let r = record(SolutionInput::new("done").with_after_image(digest.clone())).unwrap();
        assert_eq!(r.after_image, Some(digest));
    }

    #[test]
    fn after_image_must_be_a_content_digest() {
        let upper = "AB".repeat(32);
        let long = "0f".repeat(33);
        for bad in ["abc123", "../etc/passwd", upper.as_str(), long.as_str()] {
            let err = record(SolutionInput::new("done").with_after_image(AssetRef(bad.to_string()))).unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{bad}");
        }
        // blank means no image
        assert!(record(SolutionInput::new("done").with_after_image(AssetRef(" ".into()))).unwrap().after_image.is_none());
    }

    #[test]
    fn stamp_attributes_the_checked_payload() {
        let checked = check(SolutionInput::new("Patched")).unwrap();
        let r = checked.stamp(&ActorId::new("mod"));
        assert_eq!(r.resolved_by.as_str(), "mod");
        assert_eq!(r.description, "Patched");
    }
}
