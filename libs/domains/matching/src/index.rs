//! Exact brute-force nearest-neighbor index
//!
//! Vectors are kept in one contiguous buffer in insertion order. A search
//! compares the query against every row under squared L2 distance and sorts
//! the hits ascending; the sort is stable, so exact ties keep insertion order.

use crate::error::{MatchError, MatchResult};
use crate::models::{Embedding, Neighbor};

/// Sum of squared per-component differences
///
/// Accumulates in `f64` so long vectors do not lose precision; the result is
/// symmetric in its arguments. Slices must have equal length.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    squared_l2_wide(a, b) as f32
}

/// Full-precision distance; rankings compare these before narrowing
fn squared_l2_wide(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum()
}

/// Flat (brute-force) L2 index, rebuilt per request
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimension: usize,
    ids: Vec<String>,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index over `pairs`
    ///
    /// An empty input yields an empty index; searching it fails with
    /// [`MatchError::EmptyIndex`]. Every vector must share the first vector's
    /// dimension.
    pub fn build<I>(pairs: I) -> MatchResult<Self>
    where
        I: IntoIterator<Item = (String, Embedding)>,
    {
        let mut index = FlatIndex::default();

        for (user_id, embedding) in pairs {
            if index.ids.is_empty() {
                index.dimension = embedding.dimension();
            } else if embedding.dimension() != index.dimension {
                return Err(MatchError::DimensionMismatch {
                    expected: index.dimension,
                    actual: embedding.dimension(),
                });
            }
            index.data.extend_from_slice(embedding.values());
            index.ids.push(user_id);
        }

        tracing::debug!(
            size = index.ids.len(),
            dimension = index.dimension,
            "Built flat index"
        );

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Dimension of the indexed vectors, `None` when empty
    pub fn dimension(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.dimension)
    }

    fn rows(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.data.chunks_exact(self.dimension))
    }

    fn check_query(&self, query: &[f32]) -> MatchResult<()> {
        if self.is_empty() {
            return Err(MatchError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        Ok(())
    }

    /// The `k` closest vectors to `query`, ascending by distance
    pub fn search(&self, query: &[f32], k: usize) -> MatchResult<Vec<Neighbor>> {
        self.check_query(query)?;
        if k == 0 {
            return Ok(vec![]);
        }

        let mut hits: Vec<(usize, f64)> = self
            .rows()
            .enumerate()
            .map(|(pos, (_, row))| (pos, squared_l2_wide(query, row)))
            .collect();

        hits.sort_by(|(_, a), (_, b)| a.total_cmp(b));
        hits.truncate(k);

        tracing::debug!(size = self.len(), k, hits = hits.len(), "Searched flat index");

        Ok(hits
            .into_iter()
            .map(|(pos, distance)| Neighbor {
                user_id: self.ids[pos].clone(),
                distance: distance as f32,
            })
            .collect())
    }

    /// Single nearest neighbor; the first encountered wins an exact tie
    pub fn nearest(&self, query: &[f32]) -> MatchResult<Neighbor> {
        self.check_query(query)?;

        let mut best: Option<(&str, f64)> = None;
        for (user_id, row) in self.rows() {
            let distance = squared_l2_wide(query, row);
            if best.is_none_or(|(_, current)| distance < current) {
                best = Some((user_id, distance));
            }
        }

        best.map(|(user_id, distance)| Neighbor {
            user_id: user_id.to_string(),
            distance: distance as f32,
        })
        .ok_or(MatchError::EmptyIndex)
    }
}
