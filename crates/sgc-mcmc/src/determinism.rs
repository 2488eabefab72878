use sgc_core::{derive_substream_seed, RngHandle};

const EXCHANGE_STREAM: u64 = 0xA5A5_A5A5_A5A5_A5A5;

/// RNG handle for the replica at ladder position `rung`.
pub fn replica_rng(master_seed: u64, rung: usize) -> RngHandle {
    RngHandle::substream(master_seed, rung as u64)
}

/// Seed of the RNG drawing pairings and swap decisions for one exchange cycle.
pub fn exchange_seed(master_seed: u64, cycle: usize) -> u64 {
    derive_substream_seed(master_seed ^ EXCHANGE_STREAM, cycle as u64)
}

/// RNG handle for exchange cycle `cycle`.
pub fn exchange_rng(master_seed: u64, cycle: usize) -> RngHandle {
    RngHandle::from_seed(exchange_seed(master_seed, cycle))
}
