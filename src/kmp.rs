//! Knuth-Morris-Pratt over semantic type-tag sequences. Rule templates are
//! short, so the precomputed border table lives with the rule and gets reused
//! across every sentence.

use crate::node::NodeKind;

#[derive(Debug, Clone)]
pub struct Kmp {
    pub pattern: Vec<NodeKind>,
    /// Border table: `border[i]` is the length of the longest proper prefix
    /// of `pattern[..=i]` that is also a suffix of it.
    pub border: Vec<usize>,
}

impl Kmp {
    pub fn new(pattern: &[NodeKind]) -> Kmp {
        let mut border = vec![0usize; pattern.len()];
        let mut j = 0usize;
        for i in 1..pattern.len() {
            while j > 0 && pattern[i] != pattern[j] {
                j = border[j - 1];
            }
            if pattern[i] == pattern[j] {
                j += 1;
            }
            border[i] = j;
        }
        Kmp { pattern: pattern.to_vec(), border }
    }

    /// Start indices of every occurrence of the pattern in `text`, including
    /// overlapping ones. Empty pattern, empty text, or a pattern longer than
    /// the text all yield no matches.
    pub fn matches(&self, text: &[NodeKind]) -> Vec<usize> {
        let (m, n) = (self.pattern.len(), text.len());
        let mut ret = Vec::new();
        if m > n || m == 0 || n == 0 {
            return ret;
        }
        let mut j = 0usize;
        for (i, tag) in text.iter().enumerate() {
            while j > 0 && *tag != self.pattern[j] {
                j = self.border[j - 1];
            }
            if *tag == self.pattern[j] {
                j += 1;
            }
            if j == m {
                ret.push(i + 1 - j);
                j = self.border[j - 1];
            }
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind::{Column, Operator, Unknown, Value};

    #[test]
    fn border_table_for_repeated_tag() {
        let k = Kmp::new(&[Column, Column]);
        assert_eq!(k.border, vec![0, 1]);
    }

    #[test]
    fn single_match_at_start() {
        let k = Kmp::new(&[Column, Operator]);
        assert_eq!(k.matches(&[Column, Operator, Unknown]), vec![0]);
    }

    #[test]
    fn overlapping_matches_are_all_reported() {
        let k = Kmp::new(&[Column, Column]);
        let text = [Column, Column, Unknown, Column, Column, Column];
        assert_eq!(k.matches(&text), vec![0, 3, 4]);
    }

    #[test]
    fn every_occurrence_of_a_single_tag() {
        let k = Kmp::new(&[Value]);
        let text = [Value, Column, Unknown, Value, Value];
        assert_eq!(k.matches(&text), vec![0, 3, 4]);
    }

    #[test]
    fn degenerate_inputs_match_nothing() {
        assert!(Kmp::new(&[]).matches(&[Column]).is_empty());
        assert!(Kmp::new(&[Column]).matches(&[]).is_empty());
        assert!(Kmp::new(&[Column, Column]).matches(&[Column]).is_empty());
    }
}
