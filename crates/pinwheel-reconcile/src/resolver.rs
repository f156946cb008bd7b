//! Image reference resolution.
//!
//! Publishers push under a floating `:{branch}` tag. Deployments must never
//! point at that tag, so the resolver swaps it for the content digest.

use pinwheel_core::PackagePublishedEvent;

use crate::error::{ReconcileError, ReconcileResult};

const DIGEST_PREFIX: &str = "sha256:";

/// Map a publish event to a digest-pinned reference.
///
/// `ghcr.io/ns/foo:main` with digest `abc123` becomes
/// `ghcr.io/ns/foo@sha256:abc123`. Fails with `MalformedReference` if the
/// url lacks the trailing branch tag or the event carries no usable digest.
pub fn resolve(event: &PackagePublishedEvent) -> ReconcileResult<String> {
    let digest = digest_of(event)?;
    let tag = event.branch_tag();
    let base = event
        .url
        .strip_suffix(tag.as_str())
        .filter(|base| !base.is_empty())
        .ok_or_else(|| malformed(event, format!("expected trailing `{tag}` tag")))?;
    Ok(format!("{base}@{DIGEST_PREFIX}{digest}"))
}

/// The bare hex digest: `sha256` if present, else a `sha256:`-prefixed version.
fn digest_of(event: &PackagePublishedEvent) -> ReconcileResult<&str> {
    let digest = match event.sha256.as_deref() {
        Some(sha) => sha.strip_prefix(DIGEST_PREFIX).unwrap_or(sha),
        None => event
            .version
            .strip_prefix(DIGEST_PREFIX)
            .ok_or_else(|| malformed(event, "no content digest".to_string()))?,
    };
    if digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(malformed(event, format!("digest {digest:?} is not hex")));
    }
    Ok(digest)
}

fn malformed(event: &PackagePublishedEvent, reason: String) -> ReconcileError {
    ReconcileError::MalformedReference {
        url: event.url.clone(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(url: &str, sha256: Option<&str>, version: &str) -> PackagePublishedEvent {
        PackagePublishedEvent {
            name: "foo".to_string(),
            namespace: "ns".to_string(),
            branch: "main".to_string(),
            version: version.to_string(),
            sha256: sha256.map(str::to_string),
            url: url.to_string(),
            repository: "ns/foo".to_string(),
            registry: "ghcr.io".to_string(),
        }
    }

    #[test]
    fn pins_branch_tag_to_digest() {
        let e = event("ghcr.io/ns/foo:main", Some("abc123"), "1.0.0");
        assert_eq!(resolve(&e).unwrap(), "ghcr.io/ns/foo@sha256:abc123");
    }

    #[test]
    fn accepts_prefixed_digest() {
        let e = event("ghcr.io/ns/foo:main", Some("sha256:abc123"), "1.0.0");
        assert_eq!(resolve(&e).unwrap(), "ghcr.io/ns/foo@sha256:abc123");
    }

    #[test]
    fn falls_back_to_digest_bearing_version() {
        let e = event("ghcr.io/ns/foo:main", None, "sha256:deadbeef");
        assert_eq!(resolve(&e).unwrap(), "ghcr.io/ns/foo@sha256:deadbeef");
    }

    #[test]
    fn rejects_missing_branch_tag() {
        let e = event("ghcr.io/ns/foo:v1.0.0", Some("abc123"), "1.0.0");
        let err = resolve(&e).unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedReference { .. }));
    }

    #[test]
    fn rejects_branch_tag_not_trailing() {
        let e = event("ghcr.io/ns/foo:main-sig", Some("abc123"), "1.0.0");
        assert!(resolve(&e).is_err());
    }

    #[test]
    fn rejects_bare_tag() {
        let e = event(":main", Some("abc123"), "1.0.0");
        assert!(resolve(&e).is_err());
    }

    #[test]
    fn rejects_missing_digest() {
        let e = event("ghcr.io/ns/foo:main", None, "1.0.0");
        let err = resolve(&e).unwrap_err();
        assert!(err.to_string().contains("no content digest"));
    }

    #[test]
    fn rejects_non_hex_digest() {
        let e = event("ghcr.io/ns/foo:main", Some("not-a-digest"), "1.0.0");
        assert!(resolve(&e).is_err());
    }

    #[test]
    fn output_never_ends_in_branch_tag() {
        for url in [
            "docker.io/ns/foo:main",
            "localhost:5000/foo:main",
            "registry.example.com/a/b/c:main",
        ] {
            let pinned = resolve(&event(url, Some("0f0f"), "1")).unwrap();
            assert!(!pinned.ends_with(":main"), "{pinned}");
            assert!(pinned.ends_with("@sha256:0f0f"), "{pinned}");
        }
    }

    #[test]
    fn deterministic() {
        let e = event("ghcr.io/ns/foo:main", Some("abc123"), "1.0.0");
        assert_eq!(resolve(&e).unwrap(), resolve(&e).unwrap());
    }
}
