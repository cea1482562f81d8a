//! Line diff between an expected and a received sequence.
//!
//! Rendered in the familiar `- Expected / + Received` layout. Uses a
//! longest-common-subsequence table, which is fine for listing-sized input.

use std::fmt;

/// One line of a [`SequenceDiff`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// Present in both sequences
    Same(String),
    /// Only in the expected sequence
    Expected(String),
    /// Only in the received sequence
    Received(String),
}

/// Difference between two sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceDiff {
    /// Diff lines in output order
    pub lines: Vec<DiffLine>,
}

impl SequenceDiff {
    /// Whether both sequences were identical
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.lines.iter().all(|l| matches!(l, DiffLine::Same(_)))
    }

    /// Number of expected-only lines
    #[must_use]
    pub fn removed(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Expected(_)))
            .count()
    }

    /// Number of received-only lines
    #[must_use]
    pub fn added(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Received(_)))
            .count()
    }
}

impl fmt::Display for SequenceDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- Expected  - {}", self.removed())?;
        writeln!(f, "+ Received  + {}", self.added())?;
        writeln!(f)?;
        for line in &self.lines {
            match line {
                DiffLine::Same(v) => writeln!(f, "  {v}")?,
                DiffLine::Expected(v) => writeln!(f, "- {v}")?,
                DiffLine::Received(v) => writeln!(f, "+ {v}")?,
            }
        }
        Ok(())
    }
}

/// Diff two sequences by their display form
#[must_use]
pub fn diff_sequences<T: fmt::Display>(expected: &[T], received: &[T]) -> SequenceDiff {
    let left: Vec<String> = expected.iter().map(ToString::to_string).collect();
    let right: Vec<String> = received.iter().map(ToString::to_string).collect();
    let (n, m) = (left.len(), right.len());

    // lcs[i][j] = LCS length of left[i..] and right[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if left[i] == right[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if left[i] == right[j] {
            lines.push(DiffLine::Same(left[i].clone()));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            lines.push(DiffLine::Expected(left[i].clone()));
            i += 1;
        } else {
            lines.push(DiffLine::Received(right[j].clone()));
            j += 1;
        }
    }
    lines.extend(left[i..].iter().cloned().map(DiffLine::Expected));
    lines.extend(right[j..].iter().cloned().map(DiffLine::Received));

    SequenceDiff { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        let diff = diff_sequences(&[1, 2, 3], &[1, 2, 3]);
        assert!(diff.is_identical());
        assert_eq!(diff.added(), 0);
        assert_eq!(diff.removed(), 0);
    }

    #[test]
    fn test_swapped_pair() {
        let diff = diff_sequences(&[3, 5, 10], &[5, 3, 10]);
        assert!(!diff.is_identical());
        assert_eq!(diff.added(), 1);
        assert_eq!(diff.removed(), 1);
        assert_eq!(diff.lines.last(), Some(&DiffLine::Same("10".to_string())));
    }

    #[test]
    fn test_rendering() {
        let diff = diff_sequences(&["a", "b"], &["b", "a"]);
        let text = diff.to_string();
        assert!(text.starts_with("- Expected  - 1\n+ Received  + 1\n\n"));
        assert!(text.contains("- a\n"));
        assert!(text.contains("  b\n"));
        assert!(text.contains("+ a\n"));
    }

    #[test]
    fn test_empty_sides() {
        let diff = diff_sequences::<i32>(&[], &[1, 2]);
        assert_eq!(diff.added(), 2);
        let diff = diff_sequences::<i32>(&[1], &[]);
        assert_eq!(diff.removed(), 1);
    }
}
