//! Native toolchain provisioning

use crate::error::{SlipwayError, SlipwayResult};
use crate::pipeline::instruction::Instruction;

/// Package index files removed in the same step that installs packages
pub const PACKAGE_INDEX_DIR: &str = "/var/lib/apt/lists";

/// Validated OS packages for building native extensions
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    packages: Vec<String>,
}

impl Toolchain {
    /// Validate package names such as `libssl-dev` or `gcc=4:12.2.0-3`
    pub fn new(packages: &[String]) -> SlipwayResult<Self> {
        for package in packages {
            if !is_valid_package(package) {
                return Err(SlipwayError::InvalidPackage {
                    package: package.clone(),
                });
            }
        }
        Ok(Self {
            packages: packages.to_vec(),
        })
    }

    /// Package names in configured order
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Instructions for this layer.
    ///
    /// Index refresh, install and index cleanup share one RUN so the
    /// index never lands in a committed layer.
    pub fn instructions(&self) -> Vec<Instruction> {
        if self.packages.is_empty() {
            return Vec::new();
        }
        vec![Instruction::Run(format!(
            "apt-get update && apt-get install -y --no-install-recommends {} && apt-get clean && rm -rf {}/*",
            self.packages.join(" "),
            PACKAGE_INDEX_DIR
        ))]
    }
}

fn is_valid_package(spec: &str) -> bool {
    let (name, version) = match spec.split_once('=') {
        Some((name, version)) => (name, Some(version)),
        None => (spec, None),
    };

    let name_ok = name.len() >= 2
        && name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));

    let version_ok = version.map_or(true, |v| {
        !v.is_empty()
            && v.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | ':' | '-'))
    });

    name_ok && version_ok
}
