//! Dotted part addresses (`"1"`, `"1.2"`, `"2.1.3"`).

use std::cmp::Ordering;
use std::fmt;

/// Address of the part at 1-based `index` below `prefix`.
///
/// An empty prefix yields the bare index.
pub fn identifier(prefix: Option<&str>, index: u32) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}.{index}"),
        _ => index.to_string(),
    }
}

/// A parsed address, ordered numerically component by component
/// (`"1.10"` sorts after `"1.9"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartAddress(Vec<u32>);

impl PartAddress {
    /// Parse a dotted address; `None` if any component is not a number.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return Some(Self(Vec::new()));
        }
        s.split('.')
            .map(|c| c.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Number of components (0 for the empty root prefix).
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Address of the `index`-th child below this one.
    pub fn child(&self, index: u32) -> Self {
        let mut components = self.0.clone();
        components.push(index);
        Self(components)
    }
}

impl Ord for PartAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PartAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PartAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
            first = false;
        }
        Ok(())
    }
}
