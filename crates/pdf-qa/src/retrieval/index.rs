//! Exact L2 nearest-neighbour index

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::{Error, Result};

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row of the matching vector, in insertion order
    pub position: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// Flat index comparing the query against every stored row
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimensions: usize,
    vectors: Array2<f32>,
}

impl FlatL2Index {
    /// Create an empty index for vectors of width `dimensions`
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Array2::zeros((0, dimensions)),
        }
    }

    /// Vector width
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors. Either all of them are added or none.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(Error::index(format!(
                "Dimension mismatch: index holds {}-dimensional vectors, got {}",
                self.dimensions,
                bad.len()
            )));
        }

        // Widths are checked above, so no push can fail part way through
        for vector in vectors {
            self.vectors
                .push_row(ArrayView1::from(vector.as_slice()))
                .map_err(|e| Error::index(format!("Failed to append vector: {}", e)))?;
        }

        Ok(())
    }

    /// The `k` nearest rows to `query`, nearest first. Equal distances keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimensions {
            return Err(Error::index(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query = ArrayView1::from(query);
        let diff = &self.vectors - &query;
        let distances = diff.mapv(|x| x * x).sum_axis(Axis(1));

        let mut neighbors: Vec<Neighbor> = distances
            .iter()
            .enumerate()
            .map(|(position, &distance)| Neighbor { position, distance })
            .collect();

        // sort_by is stable, which keeps ties in insertion order
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);

        Ok(neighbors)
    }
}
