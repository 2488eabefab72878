use sgc_core::{beta, Configuration, ErrorInfo, RngHandle, SgcError, SiteChange, SpeciesId};

/// Proposes single-site species swaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveProposer;

impl MoveProposer {
    /// Picks a site uniformly and a different species uniformly.
    pub fn propose(
        &self,
        config: &Configuration,
        rng: &mut RngHandle,
    ) -> Result<SiteChange, SgcError> {
        if config.is_empty() {
            return Err(SgcError::configuration(
                "empty-configuration",
                "cannot propose a move on a lattice without sites",
            ));
        }
        let species = config.alphabet().len();
        if species < 2 {
            return Err(SgcError::Configuration(
                ErrorInfo::new("alphabet-size", "species swaps need two species")
                    .with_context("len", species.to_string()),
            ));
        }
        let site = rng.index(config.len());
        let old = config.species(site);
        // Draw from the alphabet with the current occupant removed.
        let mut pick = rng.index(species - 1);
        if pick >= old.index() {
            pick += 1;
        }
        Ok(SiteChange {
            site,
            old,
            new: SpeciesId::from_raw(pick as u16),
        })
    }
}

/// Metropolis probability `min(1, exp(-dE / kB T))`.
pub fn metropolis_probability(delta_energy: f64, temperature: f64) -> f64 {
    if delta_energy <= 0.0 {
        return 1.0;
    }
    (-delta_energy * beta(temperature)).exp()
}

/// Metropolis decision for an energy change at `temperature`.
///
/// Downhill moves are accepted without consuming a random number.
pub fn accept(delta_energy: f64, temperature: f64, rng: &mut RngHandle) -> bool {
    if delta_energy <= 0.0 {
        return true;
    }
    rng.uniform() < metropolis_probability(delta_energy, temperature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgc_core::Alphabet;

    #[test]
    fn proposals_never_keep_the_occupant() {
        let alphabet = Alphabet::new(&["Al", "Mg", "Si"]).unwrap();
        let config = Configuration::from_symbols(alphabet, &["Al", "Mg", "Si", "Al"]).unwrap();
        let mut rng = RngHandle::from_seed(5);
        let mut hits = [0usize; 3];
        for _ in 0..3000 {
            let change = MoveProposer.propose(&config, &mut rng).unwrap();
            assert_ne!(change.old, change.new);
            assert_eq!(config.species(change.site), change.old);
            hits[change.new.index()] += 1;
        }
        assert!(hits.iter().all(|&h| h > 0));
    }

    #[test]
    fn downhill_moves_always_accepted() {
        let mut rng = RngHandle::from_seed(1);
        assert!(accept(-1.0, 300.0, &mut rng));
        assert!(accept(0.0, 300.0, &mut rng));
        assert_eq!(metropolis_probability(-0.5, 10.0), 1.0);
        assert!(metropolis_probability(1.0, 100.0) < 1e-20);
    }
}
