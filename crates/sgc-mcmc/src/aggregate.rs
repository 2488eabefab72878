use std::sync::mpsc::{self, Receiver, Sender};

use sgc_core::{ErrorInfo, SgcError};
use tracing::debug;

use crate::observables::AccumulatorSnapshot;

/// Collective averaging of accumulator state across cooperating workers.
///
/// `all_reduce_mean` blocks until every worker of the group has contributed;
/// all workers then hold the same averaged sums.
pub trait StatisticsReducer: Send {
    /// Number of workers in the group.
    fn workers(&self) -> usize;

    /// Rank of this worker; rank 0 performs the reduction.
    fn rank(&self) -> usize;

    /// Averages `snapshot` field by field with every other worker's.
    fn all_reduce_mean(
        &mut self,
        snapshot: AccumulatorSnapshot,
    ) -> Result<AccumulatorSnapshot, SgcError>;
}

/// Single-worker reducer; returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalReducer;

impl StatisticsReducer for LocalReducer {
    fn workers(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn all_reduce_mean(
        &mut self,
        snapshot: AccumulatorSnapshot,
    ) -> Result<AccumulatorSnapshot, SgcError> {
        Ok(snapshot)
    }
}

enum Role {
    Root {
        gather: Receiver<(usize, AccumulatorSnapshot)>,
        broadcast: Vec<Sender<AccumulatorSnapshot>>,
    },
    Worker {
        to_root: Sender<(usize, AccumulatorSnapshot)>,
        from_root: Receiver<AccumulatorSnapshot>,
    },
}

/// Channel backed reducer: gather to rank 0, average, broadcast.
pub struct ChannelReducer {
    rank: usize,
    workers: usize,
    role: Role,
}

impl ChannelReducer {
    /// Creates a connected group of `workers` reducers, ordered by rank.
    pub fn group(workers: usize) -> Result<Vec<ChannelReducer>, SgcError> {
        if workers == 0 {
            return Err(SgcError::configuration(
                "reducer-workers",
                "a reducer group needs at least one worker",
            ));
        }
        let (to_root, gather) = mpsc::channel();
        let mut broadcast = Vec::with_capacity(workers - 1);
        let mut members = Vec::with_capacity(workers);
        for rank in 1..workers {
            let (tx, rx) = mpsc::channel();
            broadcast.push(tx);
            members.push(ChannelReducer {
                rank,
                workers,
                role: Role::Worker {
                    to_root: to_root.clone(),
                    from_root: rx,
                },
            });
        }
        members.insert(
            0,
            ChannelReducer {
                rank: 0,
                workers,
                role: Role::Root { gather, broadcast },
            },
        );
        Ok(members)
    }
}

impl StatisticsReducer for ChannelReducer {
    fn workers(&self) -> usize {
        self.workers
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn all_reduce_mean(
        &mut self,
        snapshot: AccumulatorSnapshot,
    ) -> Result<AccumulatorSnapshot, SgcError> {
        match &self.role {
            Role::Root { gather, broadcast } => {
                let mut parts = Vec::with_capacity(self.workers);
                parts.push((0, snapshot));
                for _ in 1..self.workers {
                    let part = gather.recv().map_err(|_| disconnected(self.rank))?;
                    parts.push(part);
                }
                // Fixed summation order keeps the mean reproducible.
                parts.sort_by_key(|(rank, _)| *rank);
                let snapshots: Vec<AccumulatorSnapshot> =
                    parts.into_iter().map(|(_, snapshot)| snapshot).collect();
                let mean = mean_snapshot(&snapshots)?;
                for tx in broadcast {
                    tx.send(mean.clone()).map_err(|_| disconnected(self.rank))?;
                }
                debug!(workers = self.workers, count = mean.count, "statistics reduced");
                Ok(mean)
            }
            Role::Worker { to_root, from_root } => {
                to_root
                    .send((self.rank, snapshot))
                    .map_err(|_| disconnected(self.rank))?;
                from_root.recv().map_err(|_| disconnected(self.rank))
            }
        }
    }
}

/// Field-wise mean of snapshots sharing one shape.
pub fn mean_snapshot(parts: &[AccumulatorSnapshot]) -> Result<AccumulatorSnapshot, SgcError> {
    let first = parts.first().ok_or_else(|| {
        SgcError::configuration("reducer-empty", "no snapshots to average")
    })?;
    let width = first.singlets.len();
    let mut total = AccumulatorSnapshot {
        count: 0.0,
        energy: 0.0,
        energy_sq: 0.0,
        singlets: vec![0.0; width],
        singlets_sq: vec![0.0; width],
    };
    for (rank, part) in parts.iter().enumerate() {
        if part.singlets.len() != width || part.singlets_sq.len() != width {
            return Err(SgcError::Configuration(
                ErrorInfo::new("reducer-shape", "workers track different singlets")
                    .with_context("rank", rank.to_string())
                    .with_context("expected", width.to_string())
                    .with_context("actual", part.singlets.len().to_string()),
            ));
        }
        total.count += part.count;
        total.energy += part.energy;
        total.energy_sq += part.energy_sq;
        for (sum, value) in total.singlets.iter_mut().zip(&part.singlets) {
            *sum += value;
        }
        for (sum, value) in total.singlets_sq.iter_mut().zip(&part.singlets_sq) {
            *sum += value;
        }
    }
    let n = parts.len() as f64;
    total.count /= n;
    total.energy /= n;
    total.energy_sq /= n;
    total.singlets.iter_mut().for_each(|v| *v /= n);
    total.singlets_sq.iter_mut().for_each(|v| *v /= n);
    Ok(total)
}

fn disconnected(rank: usize) -> SgcError {
    SgcError::Usage(
        ErrorInfo::new("reducer-disconnected", "a worker left the reduction group")
            .with_context("rank", rank.to_string()),
    )
}
