//! Requirement line parsing

use crate::manifest::version::{is_satisfiable, Constraint};
use std::fmt;

/// One `name[extras] specifiers ; marker` line of a manifest
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Package name as written
    pub name: String,

    /// Requested extras, e.g. `standard` in `uvicorn[standard]`
    pub extras: Vec<String>,

    /// Version specifiers, all of which must hold
    pub constraints: Vec<Constraint>,

    /// Environment marker after `;`, kept verbatim
    pub marker: Option<String>,

    /// 1-based line number in the manifest
    pub line: usize,
}

impl Requirement {
    /// Parse a logical requirement line (comments already stripped)
    pub fn parse(text: &str, line: usize) -> Result<Self, String> {
        let (spec, marker) = match text.split_once(';') {
            Some((spec, marker)) => {
                let marker = marker.trim();
                if marker.is_empty() {
                    return Err("empty environment marker".to_string());
                }
                (spec.trim(), Some(marker.to_string()))
            }
            None => (text.trim(), None),
        };

        if spec.contains(" @ ") || spec.contains("://") {
            return Err("direct URL references are not supported".to_string());
        }

        let name_end = spec
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(spec.len());
        let name = &spec[..name_end];
        if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(format!("invalid package name in '{}'", spec));
        }

        let mut rest = spec[name_end..].trim_start();
        let mut extras = Vec::new();
        if let Some(after) = rest.strip_prefix('[') {
            let close = after
                .find(']')
                .ok_or_else(|| format!("unclosed extras in '{}'", spec))?;
            extras = after[..close]
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            rest = after[close + 1..].trim_start();
        }

        // PEP 508 also allows the specifier list in parentheses
        let rest = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(rest)
            .trim();

        let constraints = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',')
                .map(Constraint::parse)
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            name: name.to_string(),
            extras,
            constraints,
            marker,
            line,
        })
    }

    /// Name normalized the way package indexes compare names
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Whether the requirement carries an exact `==` or `===` pin
    pub fn is_pinned(&self) -> bool {
        self.constraints.iter().any(Constraint::is_exact)
    }

    /// Whether some version can satisfy every specifier
    pub fn is_satisfiable(&self) -> bool {
        is_satisfiable(&self.constraints)
    }

    /// Specifiers joined for display, e.g. `>=2.0, <3`
    pub fn constraint_list(&self) -> String {
        self.constraints
            .iter()
            .map(Constraint::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        let constraints: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", constraints.join(","))?;
        if let Some(ref marker) = self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

/// Lowercase and collapse runs of `-`, `_`, `.` into a single `-`
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}
