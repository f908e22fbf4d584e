//! Release versions and constraint satisfiability
//!
//! Only the release segment (`1.4.2`) takes part in comparisons. Versions
//! with epochs, pre/post/dev or local parts are kept verbatim and make the
//! static check step aside, leaving the verdict to the installer.

use std::cmp::Ordering;
use std::fmt;

/// A requirement version such as `2.31.0`
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    release: Vec<u64>,
    plain: bool,
}

impl Version {
    /// Parse a version string. Returns `None` if it has no numeric release.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let digits_end = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(raw.len());
        let head = raw[..digits_end].trim_end_matches('.');
        if head.is_empty() {
            return None;
        }

        let release = head
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            raw: raw.to_string(),
            plain: head.len() == raw.len(),
            release,
        })
    }

    /// Release segment, e.g. `[1, 4, 2]`
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Whether the version is a bare release with no suffix
    pub fn is_plain(&self) -> bool {
        self.plain
    }

    /// The smallest release above every version sharing `self`'s prefix
    /// with the last segment dropped: `1.4.2` gives `1.5`, `2.2` gives `3`.
    pub fn compatible_ceiling(&self) -> Option<Version> {
        if self.release.len() < 2 {
            return None;
        }
        let mut release = self.release[..self.release.len() - 1].to_vec();
        if let Some(last) = release.last_mut() {
            *last += 1;
        }
        Some(Self::from_release(release))
    }

    /// The smallest release above every version starting with `self`:
    /// `1.2` gives `1.3`.
    pub fn prefix_ceiling(&self) -> Version {
        let mut release = self.release.clone();
        if let Some(last) = release.last_mut() {
            *last += 1;
        }
        Self::from_release(release)
    }

    /// Whether `self` starts with the release of `prefix`
    pub fn has_prefix(&self, prefix: &Version) -> bool {
        prefix
            .release
            .iter()
            .enumerate()
            .all(|(i, seg)| self.release.get(i).copied().unwrap_or(0) == *seg)
    }

    fn from_release(release: Vec<u64>) -> Self {
        let raw = release
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        Self {
            raw,
            release,
            plain: true,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Compare release segments, padding the shorter one with zeros
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        (0..len)
            .map(|i| {
                let a = self.release.get(i).copied().unwrap_or(0);
                let b = other.release.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Comparison operator of a version specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `==`
    Eq,
    /// `===`
    Arbitrary,
    /// `!=`
    Ne,
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `<`
    Lt,
    /// `~=`
    Compatible,
}

impl Op {
    /// Operators in longest-first order for prefix matching
    const ALL: [(&'static str, Op); 8] = [
        ("===", Op::Arbitrary),
        ("==", Op::Eq),
        ("!=", Op::Ne),
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("~=", Op::Compatible),
        (">", Op::Gt),
        ("<", Op::Lt),
    ];

    fn symbol(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Arbitrary => "===",
            Op::Ne => "!=",
            Op::Ge => ">=",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Lt => "<",
            Op::Compatible => "~=",
        }
    }
}

/// One version specifier, e.g. `>=2.0` or `==1.4.*`
#[derive(Debug, Clone)]
pub struct Constraint {
    pub op: Op,
    pub version: String,
    /// Trailing `.*` on `==` / `!=`
    pub wildcard: bool,
}

impl Constraint {
    /// Parse a single specifier such as `>= 1.2`
    pub fn parse(spec: &str) -> Result<Self, String> {
        let spec = spec.trim();
        let (op, rest) = Op::ALL
            .iter()
            .find_map(|(sym, op)| spec.strip_prefix(sym).map(|rest| (*op, rest.trim())))
            .ok_or_else(|| format!("missing comparison operator in '{}'", spec))?;

        if rest.is_empty() {
            return Err(format!("missing version after '{}'", op.symbol()));
        }

        let (version, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) if matches!(op, Op::Eq | Op::Ne) => (prefix, true),
            Some(_) => {
                return Err(format!("wildcard not allowed with '{}'", op.symbol()));
            }
            None => (rest, false),
        };

        if op != Op::Arbitrary && Version::parse(version).is_none() {
            return Err(format!("invalid version '{}'", version));
        }
        if op == Op::Compatible
            && Version::parse(version).map_or(0, |v| v.release().len()) < 2
        {
            return Err(format!("'~={}' needs at least two release segments", version));
        }

        Ok(Self {
            op,
            version: version.to_string(),
            wildcard,
        })
    }

    /// Whether this is an exact `==`/`===` pin
    pub fn is_exact(&self) -> bool {
        matches!(self.op, Op::Eq | Op::Arbitrary) && !self.wildcard
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.symbol(), self.version)?;
        if self.wildcard {
            write!(f, ".*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Bound {
    version: Version,
    inclusive: bool,
}

/// Check whether some release can satisfy every constraint at once.
///
/// Returns `true` when satisfiable or when the set contains versions this
/// check does not model.
pub fn is_satisfiable(constraints: &[Constraint]) -> bool {
    let mut lower: Option<Bound> = None;
    let mut upper: Option<Bound> = None;
    let mut pins: Vec<Version> = Vec::new();
    let mut arbitrary: Vec<&str> = Vec::new();
    let mut excluded: Vec<Version> = Vec::new();
    let mut excluded_prefixes: Vec<Version> = Vec::new();

    for constraint in constraints {
        if constraint.op == Op::Arbitrary {
            arbitrary.push(constraint.version.as_str());
            continue;
        }
        let Some(version) = Version::parse(&constraint.version) else {
            return true;
        };
        if !version.is_plain() {
            return true;
        }

        match (constraint.op, constraint.wildcard) {
            (Op::Eq, false) => pins.push(version),
            (Op::Eq, true) => {
                let ceiling = version.prefix_ceiling();
                raise_lower(&mut lower, version, true);
                lower_upper(&mut upper, ceiling, false);
            }
            (Op::Ne, false) => excluded.push(version),
            (Op::Ne, true) => excluded_prefixes.push(version),
            (Op::Ge, _) => raise_lower(&mut lower, version, true),
            (Op::Gt, _) => raise_lower(&mut lower, version, false),
            (Op::Le, _) => lower_upper(&mut upper, version, true),
            (Op::Lt, _) => lower_upper(&mut upper, version, false),
            (Op::Compatible, _) => {
                if let Some(ceiling) = version.compatible_ceiling() {
                    lower_upper(&mut upper, ceiling, false);
                }
                raise_lower(&mut lower, version, true);
            }
            (Op::Arbitrary, _) => unreachable!("handled above"),
        }
    }

    if arbitrary.windows(2).any(|w| w[0] != w[1]) {
        return false;
    }
    if let Some(first) = arbitrary.first() {
        match Version::parse(first) {
            Some(v) if v.is_plain() => pins.push(v),
            _ => return true,
        }
    }

    if let Some(first) = pins.first().cloned() {
        if pins.iter().any(|p| *p != first) {
            return false;
        }
        return admits(&first, &lower, &upper)
            && !excluded.contains(&first)
            && !excluded_prefixes.iter().any(|p| first.has_prefix(p));
    }

    match (&lower, &upper) {
        (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
            Ordering::Greater => false,
            Ordering::Equal => {
                lo.inclusive
                    && hi.inclusive
                    && !excluded.contains(&lo.version)
                    && !excluded_prefixes.iter().any(|p| lo.version.has_prefix(p))
            }
            Ordering::Less => true,
        },
        _ => true,
    }
}

fn admits(version: &Version, lower: &Option<Bound>, upper: &Option<Bound>) -> bool {
    let above = lower.as_ref().map_or(true, |b| match version.cmp(&b.version) {
        Ordering::Greater => true,
        Ordering::Equal => b.inclusive,
        Ordering::Less => false,
    });
    let below = upper.as_ref().map_or(true, |b| match version.cmp(&b.version) {
        Ordering::Less => true,
        Ordering::Equal => b.inclusive,
        Ordering::Greater => false,
    });
    above && below
}

fn raise_lower(lower: &mut Option<Bound>, version: Version, inclusive: bool) {
    let replace = match lower {
        None => true,
        Some(current) => match version.cmp(&current.version) {
            Ordering::Greater => true,
            Ordering::Equal => current.inclusive && !inclusive,
            Ordering::Less => false,
        },
    };
    if replace {
        *lower = Some(Bound { version, inclusive });
    }
}

fn lower_upper(upper: &mut Option<Bound>, version: Version, inclusive: bool) {
    let replace = match upper {
        None => true,
        Some(current) => match version.cmp(&current.version) {
            Ordering::Less => true,
            Ordering::Equal => current.inclusive && !inclusive,
            Ordering::Greater => false,
        },
    };
    if replace {
        *upper = Some(Bound { version, inclusive });
    }
}
