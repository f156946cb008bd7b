//! Reconciliation outcomes.

use std::fmt;

use pinwheel_core::types::{ImageRef, ResourceRef};
use serde::Serialize;

/// How a publish event reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Already filtered by the caller (the REST publish endpoint).
    Direct,
    /// Raw event-bus notification; subject to the branch guard.
    Bus,
}

/// Why an event terminated without changing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Disabled,
    BranchMismatch,
    NoDeployment,
    DirtyPatchDisabled,
    NoResource,
    ImageUnchanged,
    NoTemplate,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::BranchMismatch => "branch-mismatch",
            SkipReason::NoDeployment => "no-deployment",
            SkipReason::DirtyPatchDisabled => "dirty-patch-disabled",
            SkipReason::NoResource => "no-resource",
            SkipReason::ImageUnchanged => "image-unchanged",
            SkipReason::NoTemplate => "no-template",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handling one publish event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Skipped(SkipReason),
    Patched(ResourceRef),
    VersionCreated(ImageRef),
}

impl Outcome {
    /// Metrics label for the outcome kind.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Skipped(_) => "skipped",
            Outcome::Patched(_) => "patched",
            Outcome::VersionCreated(_) => "version_created",
        }
    }

    /// Skip reason, or an empty string for applied actions.
    pub fn reason(&self) -> &'static str {
        match self {
            Outcome::Skipped(reason) => reason.as_str(),
            _ => "",
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            Outcome::Patched(resource) => write!(f, "patched {resource}"),
            Outcome::VersionCreated(image) => {
                write!(f, "version {} created as image {}", image.version, image.id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_labels_match_serde() {
        for reason in [
            SkipReason::Disabled,
            SkipReason::BranchMismatch,
            SkipReason::NoDeployment,
            SkipReason::DirtyPatchDisabled,
            SkipReason::NoResource,
            SkipReason::ImageUnchanged,
            SkipReason::NoTemplate,
        ] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json, reason.as_str());
        }
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::Skipped(SkipReason::NoDeployment)).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "skipped", "detail": "no-deployment" }));

        let patched = Outcome::Patched(ResourceRef {
            name: "foo".to_string(),
            namespace: "ns".to_string(),
            cluster: "c1".to_string(),
        });
        let json = serde_json::to_value(&patched).unwrap();
        assert_eq!(json["outcome"], "patched");
        assert_eq!(json["detail"]["cluster"], "c1");
        assert_eq!(patched.to_string(), "patched c1:ns/foo");
    }

    #[test]
    fn labels_and_reasons() {
        let skipped = Outcome::Skipped(SkipReason::ImageUnchanged);
        assert_eq!(skipped.label(), "skipped");
        assert_eq!(skipped.reason(), "image-unchanged");
        assert!(skipped.is_skipped());

        let created = Outcome::VersionCreated(ImageRef {
            id: "img".to_string(),
            image: "a@sha256:ff".to_string(),
            version: 4,
        });
        assert_eq!(created.label(), "version_created");
        assert_eq!(created.reason(), "");
        assert!(!created.is_skipped());
    }
}
