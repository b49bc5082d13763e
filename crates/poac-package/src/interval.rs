//! Version interval expressions.
//!
//! The grammar accepts `latest`, an exact version (`=1.2.3` or bare `1.2.3`),
//! and comparator bounds joined by `and` (`>=1.2.0 and <2.0.0`).

use semver::Version;
use std::fmt;
use thiserror::Error;

/// Interval parsing errors
#[derive(Debug, Error)]
pub enum IntervalError {
    #[error("invalid version in interval: {0}")]
    BadVersion(#[from] semver::Error),

    #[error("invalid interval expression '{0}'")]
    BadExpression(String),
}

/// A comparison operator in a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }
}

/// One comparator, e.g. `>=1.2.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub op: Op,
    pub version: Version,
}

impl Bound {
    pub fn contains(&self, version: &Version) -> bool {
        match self.op {
            Op::Lt => *version < self.version,
            Op::Le => *version <= self.version,
            Op::Gt => *version > self.version,
            Op::Ge => *version >= self.version,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

/// A version constraint expression. Intervals are immutable values compared
/// by structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interval {
    /// The newest version the candidate provider offers. Expanded to an
    /// exact version before constraint solving.
    Latest,
    Exact(Version),
    Bounds(Vec<Bound>),
}

impl Interval {
    /// Parse an interval expression.
    pub fn parse(input: &str) -> Result<Self, IntervalError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IntervalError::BadExpression(input.to_string()));
        }
        if input == "latest" {
            return Ok(Interval::Latest);
        }
        if input.contains('<') || input.contains('>') {
            let mut bounds = Vec::new();
            for token in input.split(" and ") {
                bounds.push(parse_bound(token.trim(), input)?);
            }
            return Ok(Interval::Bounds(bounds));
        }
        let version = input.strip_prefix('=').unwrap_or(input).trim();
        Ok(Interval::Exact(Version::parse(version)?))
    }

    /// Test membership. `Latest` admits every concrete version; it is given
    /// meaning by expansion against the candidate set before solving.
    pub fn contains(&self, version: &Version) -> bool {
        match self {
            Interval::Latest => true,
            Interval::Exact(v) => version == v,
            Interval::Bounds(bounds) => bounds.iter().all(|b| b.contains(version)),
        }
    }

    /// The interval a `latest` dependency is pinned to once resolved:
    /// `>=<version> and <(major+1).0.0`.
    pub fn pin(version: &Version) -> Self {
        Interval::Bounds(vec![
            Bound {
                op: Op::Ge,
                version: version.clone(),
            },
            Bound {
                op: Op::Lt,
                version: Version::new(version.major + 1, 0, 0),
            },
        ])
    }
}

fn parse_bound(token: &str, whole: &str) -> Result<Bound, IntervalError> {
    // Two-character operators first.
    let (op, rest) = if let Some(rest) = token.strip_prefix(">=") {
        (Op::Ge, rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (Op::Le, rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (Op::Gt, rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (Op::Lt, rest)
    } else {
        return Err(IntervalError::BadExpression(whole.to_string()));
    };
    Ok(Bound {
        op,
        version: Version::parse(rest.trim())?,
    })
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Latest => f.write_str("latest"),
            Interval::Exact(v) => write!(f, "={v}"),
            Interval::Bounds(bounds) => {
                for (i, bound) in bounds.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    write!(f, "{bound}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_latest() {
        assert_eq!(Interval::parse("latest").unwrap(), Interval::Latest);
    }

    #[test]
    fn test_parse_exact() {
        assert_eq!(Interval::parse("=1.66.0").unwrap(), Interval::Exact(v("1.66.0")));
        assert_eq!(Interval::parse("1.66.0").unwrap(), Interval::Exact(v("1.66.0")));
    }

    #[test]
    fn test_parse_range() {
        let interval = Interval::parse(">=1.2.0 and <2.0.0").unwrap();
        assert!(interval.contains(&v("1.2.0")));
        assert!(interval.contains(&v("1.99.0")));
        assert!(!interval.contains(&v("2.0.0")));
        assert!(!interval.contains(&v("1.1.9")));
    }

    #[test]
    fn test_parse_single_comparator() {
        let interval = Interval::parse("<=1.5.0").unwrap();
        assert!(interval.contains(&v("1.5.0")));
        assert!(!interval.contains(&v("1.5.1")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Interval::parse("").is_err());
        assert!(Interval::parse("~1.2.3").is_err());
        assert!(Interval::parse(">=1.2.0 and banana").is_err());
        assert!(Interval::parse("one.two.three").is_err());
    }

    #[test]
    fn test_exact_matches_prerelease() {
        let interval = Interval::parse("=1.0.0-beta.1").unwrap();
        assert!(interval.contains(&v("1.0.0-beta.1")));
        assert!(!interval.contains(&v("1.0.0")));
    }

    #[test]
    fn test_pin() {
        let pinned = Interval::pin(&v("1.71.0"));
        assert_eq!(pinned.to_string(), ">=1.71.0 and <2.0.0");
        assert!(pinned.contains(&v("1.71.0")));
        assert!(pinned.contains(&v("1.99.9")));
        assert!(!pinned.contains(&v("2.0.0")));
    }

    #[test]
    fn test_render_parse_round_trip() {
        let intervals = vec![
            Interval::Latest,
            Interval::Exact(v("1.2.3")),
            Interval::Exact(v("1.0.0-rc.2")),
            Interval::pin(&v("0.4.2")),
            Interval::parse(">1.0.0 and <=2.5.0").unwrap(),
        ];
        for interval in intervals {
            assert_eq!(Interval::parse(&interval.to_string()).unwrap(), interval);
        }
    }
}
