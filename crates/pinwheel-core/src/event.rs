//! Publish notices and the resolved events the reconciler consumes.
//!
//! A [`PublishNotice`] is what producers send: the REST publish endpoint and
//! the event bus both deliver partially filled notices. Producer defaults are
//! applied here, at the boundary, so the reconciler only ever sees a fully
//! resolved [`PackagePublishedEvent`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Identity;

/// Registry assumed when a notice does not name one.
pub const DEFAULT_REGISTRY: &str = "docker.io";

const MIN_FIELD_LEN: usize = 3;
const MAX_FIELD_LEN: usize = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {field} must be 3-255 characters, got {len}")]
    FieldLength { field: &'static str, len: usize },
}

/// Raw publish notification as delivered by a producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishNotice {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub branch: String,
    pub version: Option<String>,
    pub sha256: Option<String>,
    pub url: Option<String>,
    pub repository: Option<String>,
    pub registry: Option<String>,
}

/// A fully resolved publish event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagePublishedEvent {
    pub name: String,
    pub namespace: String,
    pub branch: String,
    /// Semantic version or digest string.
    pub version: String,
    /// Content digest, if the producer supplied one.
    pub sha256: Option<String>,
    /// `registry/repository:tag` as published.
    pub url: String,
    pub repository: String,
    pub registry: String,
}

impl PublishNotice {
    /// Apply producer defaults and validate.
    ///
    /// - `registry` defaults to `docker.io`
    /// - `repository` defaults to `{namespace}/{name}`
    /// - `url` defaults to `{registry}/{repository}:{branch}`
    /// - `version` defaults to the content digest
    pub fn into_event(self) -> Result<PackagePublishedEvent, EventError> {
        check_field("name", &self.name)?;
        check_field("namespace", &self.namespace)?;
        check_field("branch", &self.branch)?;

        let registry = non_empty(self.registry).unwrap_or_else(|| DEFAULT_REGISTRY.to_string());
        let repository = non_empty(self.repository)
            .unwrap_or_else(|| format!("{}/{}", self.namespace, self.name));
        let url = non_empty(self.url)
            .unwrap_or_else(|| format!("{registry}/{repository}:{}", self.branch));
        let sha256 = non_empty(self.sha256);
        let version = non_empty(self.version)
            .or_else(|| sha256.clone())
            .ok_or(EventError::MissingField("version"))?;

        Ok(PackagePublishedEvent {
            name: self.name,
            namespace: self.namespace,
            branch: self.branch,
            version,
            sha256,
            url,
            repository,
            registry,
        })
    }
}

impl PackagePublishedEvent {
    pub fn identity(&self) -> Identity {
        Identity::new(&self.name, &self.namespace, &self.branch)
    }

    /// The mutable tag suffix (`:{branch}`) producers publish under.
    pub fn branch_tag(&self) -> String {
        format!(":{}", self.branch)
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), EventError> {
    if value.is_empty() {
        return Err(EventError::MissingField(field));
    }
    let len = value.chars().count();
    if !(MIN_FIELD_LEN..=MAX_FIELD_LEN).contains(&len) {
        return Err(EventError::FieldLength { field, len });
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
