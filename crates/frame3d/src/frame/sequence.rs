use std::fmt;

/// Identifier captured by a load request at issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic load counter. Only the most recently issued generation is current;
/// completions carrying anything older have been superseded.
#[derive(Debug, Default)]
pub struct LoadSequence {
    latest: u64,
}

impl LoadSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> Generation {
        self.latest += 1;
        Generation(self.latest)
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.latest
    }

    /// Supersedes every in-flight request without issuing a new one.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }

    pub fn latest(&self) -> Generation {
        Generation(self.latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_issue_supersedes_older() {
        let mut seq = LoadSequence::new();
        let a = seq.issue();
        let b = seq.issue();
        assert!(a < b);
        assert!(!seq.is_current(a));
        assert!(seq.is_current(b));
    }

    #[test]
    fn invalidate_discards_everything_in_flight() {
        let mut seq = LoadSequence::new();
        let a = seq.issue();
        seq.invalidate();
        assert!(!seq.is_current(a));
        let b = seq.issue();
        assert!(seq.is_current(b));
        assert_eq!(b.get(), 3);
    }
}
