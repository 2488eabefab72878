use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, SgcError};

/// Index of a species within an [`Alphabet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeciesId(u16);

impl SpeciesId {
    /// Creates an identifier from its raw index.
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    pub fn as_raw(&self) -> u16 {
        self.0
    }

    /// Returns the index as `usize` for slice lookups.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "species#{}", self.0)
    }
}

/// Ordered set of species symbols allowed on the lattice.
///
/// The first symbol is the reference species; singlets are tracked for the
/// remaining ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alphabet {
    symbols: Vec<String>,
}

impl Alphabet {
    /// Builds an alphabet from unique symbols. At least two are required.
    pub fn new<S: AsRef<str>>(symbols: &[S]) -> Result<Self, SgcError> {
        if symbols.len() < 2 {
            return Err(SgcError::Configuration(
                ErrorInfo::new("alphabet-size", "alphabet needs at least two species")
                    .with_context("len", symbols.len().to_string()),
            ));
        }
        if symbols.len() > u16::MAX as usize {
            return Err(SgcError::configuration(
                "alphabet-size",
                "alphabet exceeds the supported number of species",
            ));
        }
        let mut seen = BTreeSet::new();
        for symbol in symbols {
            if !seen.insert(symbol.as_ref()) {
                return Err(SgcError::Configuration(
                    ErrorInfo::new("alphabet-duplicate", "species symbols must be unique")
                        .with_context("symbol", symbol.as_ref()),
                ));
            }
        }
        Ok(Self {
            symbols: symbols.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    /// Number of species.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false; an alphabet has at least two species.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in alphabet order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Resolves a symbol to its identifier.
    pub fn id_of(&self, symbol: &str) -> Result<SpeciesId, SgcError> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|idx| SpeciesId(idx as u16))
            .ok_or_else(|| {
                SgcError::Configuration(
                    ErrorInfo::new("unknown-species", "symbol is not part of the alphabet")
                        .with_context("symbol", symbol)
                        .with_hint(format!("declared species: {}", self.symbols.join(","))),
                )
            })
    }

    /// Returns the symbol of an identifier, if it belongs to the alphabet.
    pub fn symbol(&self, id: SpeciesId) -> Option<&str> {
        self.symbols.get(id.index()).map(String::as_str)
    }

    /// Returns true if the identifier is within the alphabet.
    pub fn contains(&self, id: SpeciesId) -> bool {
        id.index() < self.symbols.len()
    }
}

/// Single-site species change descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteChange {
    /// Lattice site index.
    pub site: usize,
    /// Species currently occupying the site.
    pub old: SpeciesId,
    /// Proposed replacement species.
    pub new: SpeciesId,
}

/// Species labels for every lattice site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    alphabet: Alphabet,
    sites: Vec<SpeciesId>,
}

impl Configuration {
    /// Creates a configuration with every site occupied by `fill`.
    pub fn uniform(alphabet: Alphabet, sites: usize, fill: SpeciesId) -> Result<Self, SgcError> {
        if !alphabet.contains(fill) {
            return Err(out_of_alphabet(fill, &alphabet));
        }
        Ok(Self {
            alphabet,
            sites: vec![fill; sites],
        })
    }

    /// Creates a configuration from per-site symbols.
    pub fn from_symbols<S: AsRef<str>>(alphabet: Alphabet, symbols: &[S]) -> Result<Self, SgcError> {
        let sites = symbols
            .iter()
            .map(|symbol| alphabet.id_of(symbol.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alphabet, sites })
    }

    /// Creates a configuration from raw identifiers, validating each one.
    pub fn from_ids(alphabet: Alphabet, sites: Vec<SpeciesId>) -> Result<Self, SgcError> {
        if let Some(bad) = sites.iter().find(|id| !alphabet.contains(**id)) {
            return Err(out_of_alphabet(*bad, &alphabet));
        }
        Ok(Self { alphabet, sites })
    }

    /// Alphabet the configuration is drawn from.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Number of lattice sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Returns true for a configuration without sites.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Species at `site`. Panics when `site` is out of bounds.
    pub fn species(&self, site: usize) -> SpeciesId {
        self.sites[site]
    }

    /// Read-only view of all site labels.
    pub fn sites(&self) -> &[SpeciesId] {
        &self.sites
    }

    /// Applies a site change after checking it against the current state.
    pub fn apply(&mut self, change: &SiteChange) -> Result<(), SgcError> {
        if change.site >= self.sites.len() {
            return Err(SgcError::Configuration(
                ErrorInfo::new("site-out-of-range", "site index exceeds lattice size")
                    .with_context("site", change.site.to_string())
                    .with_context("len", self.sites.len().to_string()),
            ));
        }
        if !self.alphabet.contains(change.new) {
            return Err(out_of_alphabet(change.new, &self.alphabet));
        }
        if self.sites[change.site] != change.old {
            return Err(SgcError::Usage(
                ErrorInfo::new("stale-change", "site no longer holds the expected species")
                    .with_context("site", change.site.to_string()),
            ));
        }
        self.sites[change.site] = change.new;
        Ok(())
    }

    /// Per-species occupation counts in alphabet order.
    pub fn composition(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.alphabet.len()];
        for id in &self.sites {
            counts[id.index()] += 1;
        }
        counts
    }

    /// Per-site symbols, mostly useful for artefacts and logs.
    pub fn symbols(&self) -> Vec<&str> {
        self.sites
            .iter()
            .map(|id| self.alphabet.symbol(*id).unwrap_or("?"))
            .collect()
    }
}

fn out_of_alphabet(id: SpeciesId, alphabet: &Alphabet) -> SgcError {
    SgcError::Configuration(
        ErrorInfo::new("unknown-species", "species index is outside the declared alphabet")
            .with_context("species", id.as_raw().to_string())
            .with_context("alphabet_len", alphabet.len().to_string()),
    )
}
