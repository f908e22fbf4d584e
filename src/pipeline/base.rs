//! Base image selection
//!
//! A base reference is accepted only when it names one exact environment:
//! either an `@sha256:` digest or a tag that starts with a full
//! `MAJOR.MINOR.PATCH` release.

use crate::error::{SlipwayError, SlipwayResult};
use serde::Serialize;

/// Tags that move over time and can never pin a build
const FLOATING_TAGS: &[&str] = &[
    "latest", "stable", "edge", "rolling", "lts", "current", "nightly", "slim", "alpine",
];

/// A validated, pinned base image reference
#[derive(Debug, Clone, Serialize)]
pub struct BaseImage {
    /// Reference as written, e.g. `python:3.12.7-slim-bookworm`
    pub reference: String,

    /// Repository part, e.g. `python`
    pub repository: String,

    /// Tag, if any
    pub tag: Option<String>,

    /// Content digest, if any (`sha256:...`)
    pub digest: Option<String>,

    /// Runtime release parsed from the tag
    pub version: Option<String>,
}

impl BaseImage {
    /// Validate and split a base image reference
    pub fn pinned(reference: &str) -> SlipwayResult<Self> {
        let reference = reference.trim();
        let not_pinned = |reason: &str| SlipwayError::BaseNotPinned {
            image: reference.to_string(),
            reason: reason.to_string(),
        };

        if reference.is_empty() {
            return Err(not_pinned("empty reference"));
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(not_pinned("reference contains whitespace"));
        }

        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                if !is_sha256_digest(digest) {
                    return Err(not_pinned("digest must be sha256:<64 hex characters>"));
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // The tag separator is the last ':' after the last '/', so that
        // registry ports (`localhost:5000/python`) are not taken for tags.
        let slash = name.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (repository, tag) = match name[slash..].rfind(':') {
            Some(colon) => {
                let colon = slash + colon;
                (&name[..colon], Some(name[colon + 1..].to_string()))
            }
            None => (name, None),
        };

        if repository.is_empty() {
            return Err(not_pinned("missing repository"));
        }

        let version = match (&tag, &digest) {
            (Some(tag), _) => match release_of(tag) {
                Some(version) => Some(version),
                // A digest pins the content even when the tag floats
                None if digest.is_some() => None,
                None if FLOATING_TAGS.contains(&tag.to_ascii_lowercase().as_str()) => {
                    return Err(not_pinned("floating tag"));
                }
                None => {
                    return Err(not_pinned(
                        "tag must start with a MAJOR.MINOR.PATCH release",
                    ));
                }
            },
            (None, Some(_)) => None,
            (None, None) => return Err(not_pinned("no tag or digest (implies latest)")),
        };

        Ok(Self {
            reference: reference.to_string(),
            repository: repository.to_string(),
            tag,
            digest,
            version,
        })
    }
}

fn is_sha256_digest(digest: &str) -> bool {
    digest
        .strip_prefix("sha256:")
        .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Leading `MAJOR.MINOR.PATCH` of a tag such as `3.12.7-slim`
fn release_of(tag: &str) -> Option<String> {
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    let end = tag
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(tag.len());
    let parts: Vec<&str> = tag[..end].split('.').collect();
    if parts.len() < 3 {
        return None;
    }
    let release = parts[..3].join(".");
    semver::Version::parse(&release).ok()?;
    Some(release)
}
