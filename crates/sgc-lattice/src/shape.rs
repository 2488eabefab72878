use serde::{Deserialize, Serialize};
use sgc_core::{ErrorInfo, SgcError};

/// Periodic lattice geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LatticeShape {
    /// Ring of `length` sites.
    Chain {
        /// Number of sites.
        length: usize,
    },
    /// `width x height` square lattice with periodic boundaries.
    Square {
        /// Sites along x.
        width: usize,
        /// Sites along y.
        height: usize,
    },
}

impl LatticeShape {
    /// Number of sites.
    pub fn sites(&self) -> usize {
        match *self {
            LatticeShape::Chain { length } => length,
            LatticeShape::Square { width, height } => width * height,
        }
    }

    /// Rejects lattices too small to have distinct neighbours in every direction.
    pub fn validate(&self) -> Result<(), SgcError> {
        let ok = match *self {
            LatticeShape::Chain { length } => length >= 3,
            LatticeShape::Square { width, height } => width >= 3 && height >= 3,
        };
        if ok {
            Ok(())
        } else {
            Err(SgcError::Configuration(
                ErrorInfo::new("lattice-too-small", "periodic lattices need at least 3 sites per axis")
                    .with_context("shape", format!("{self:?}")),
            ))
        }
    }

    /// Unique nearest-neighbour bonds `(i, j)`.
    pub fn bonds(&self) -> Vec<(usize, usize)> {
        match *self {
            LatticeShape::Chain { length } => (0..length).map(|i| (i, (i + 1) % length)).collect(),
            LatticeShape::Square { width, height } => {
                let mut bonds = Vec::with_capacity(2 * width * height);
                for y in 0..height {
                    for x in 0..width {
                        let site = y * width + x;
                        bonds.push((site, y * width + (x + 1) % width));
                        bonds.push((site, ((y + 1) % height) * width + x));
                    }
                }
                bonds
            }
        }
    }

    /// Neighbour lists derived from [`LatticeShape::bonds`].
    pub fn neighbours(&self) -> Vec<Vec<usize>> {
        let mut lists = vec![Vec::new(); self.sites()];
        for (i, j) in self.bonds() {
            lists[i].push(j);
            lists[j].push(i);
        }
        lists
    }
}
