//! Merge rules keyed by id pair.

use rustc_hash::FxHashMap;

use super::vocab::{ArtifactKind, TokenId, VocabError};

/// Merge priority. Lower merges earlier.
pub type Rank = u32;

/// One line of the merge table: `left right merged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeTriple {
    pub left: TokenId,
    pub right: TokenId,
    pub merged: TokenId,
}

/// What an adjacent pair turns into, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    pub rank: Rank,
    pub merged: TokenId,
}

/// `(left, right) → (rank, merged)` lookup.
///
/// Pairs that are absent have infinite rank and never merge.
#[derive(Debug, Clone, Default)]
pub struct MergeRankTable {
    rules: FxHashMap<(TokenId, TokenId), MergeRule>,
    order: Vec<MergeTriple>,
}

impl MergeRankTable {
    /// Build from triples in rank order.
    pub fn from_triples(triples: Vec<MergeTriple>) -> Result<Self, VocabError> {
        let mut rules = FxHashMap::default();
        rules.reserve(triples.len());

        for (idx, triple) in triples.iter().enumerate() {
            let rank = Rank::try_from(idx).map_err(|_| VocabError::ArtifactMalformed {
                kind: ArtifactKind::Merges,
                line: idx + 1,
                reason: "too many merge rules".to_string(),
            })?;
            let rule = MergeRule {
                rank,
                merged: triple.merged,
            };
            if let Some(previous) = rules.insert((triple.left, triple.right), rule) {
                return Err(VocabError::ArtifactMalformed {
                    kind: ArtifactKind::Merges,
                    line: idx + 1,
                    reason: format!(
                        "rule {idx} re-ranks pair ({}, {}) already at rank {}",
                        triple.left, triple.right, previous.rank
                    ),
                });
            }
        }

        Ok(Self {
            rules,
            order: triples,
        })
    }

    #[inline]
    pub fn rule(&self, left: TokenId, right: TokenId) -> Option<MergeRule> {
        self.rules.get(&(left, right)).copied()
    }

    #[inline]
    pub fn rank_of(&self, left: TokenId, right: TokenId) -> Option<Rank> {
        self.rule(left, right).map(|r| r.rank)
    }

    #[inline]
    pub fn merged_of(&self, left: TokenId, right: TokenId) -> Option<TokenId> {
        self.rule(left, right).map(|r| r.merged)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Rules in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &MergeTriple> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(left: TokenId, right: TokenId, merged: TokenId) -> MergeTriple {
        MergeTriple {
            left,
            right,
            merged,
        }
    }

    #[test]
    fn test_rank_is_rule_index() {
        let table =
            MergeRankTable::from_triples(vec![triple(1, 2, 5), triple(5, 3, 4)]).unwrap();
        assert_eq!(table.rank_of(1, 2), Some(0));
        assert_eq!(table.rank_of(5, 3), Some(1));
        assert_eq!(table.merged_of(5, 3), Some(4));
        assert_eq!(table.rank_of(2, 1), None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.iter().map(|t| t.merged).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[test]
    fn test_duplicate_pair_is_rejected() {
        let err = MergeRankTable::from_triples(vec![triple(1, 2, 5), triple(1, 2, 6)])
            .unwrap_err();
        assert!(matches!(
            err,
            VocabError::ArtifactMalformed { kind: ArtifactKind::Merges, line: 2, .. }
        ));
    }
}
