//! Element vocabularies mapping species symbols to dense indices.

use std::collections::{BTreeSet, HashMap};

use crate::error::Error;
use crate::model::structure::Structure;

/// Species recognized by default, in order of increasing atomic number.
pub const DEFAULT_ELEMENT_TYPES: [&str; 89] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Ac", "Th", "Pa", "U", "Np", "Pu",
];

/// An ordered, fixed set of element symbols.
///
/// The position of a symbol is the species index stored on graph nodes and
/// fed to embedding layers, so the same vocabulary must be used when building
/// graphs and when evaluating a trained model. It is passed explicitly to
/// every converter rather than living in global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementVocabulary {
    symbols: Vec<String>,
    index: HashMap<String, usize>,
}

impl ElementVocabulary {
    /// Builds a vocabulary from an ordered list of symbols.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] if the list is empty or contains a
    /// duplicate symbol.
    pub fn new<I, S>(symbols: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
        if symbols.is_empty() {
            return Err(Error::InvalidStructure(
                "element vocabulary must contain at least one symbol".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if index.insert(symbol.clone(), i).is_some() {
                return Err(Error::InvalidStructure(format!(
                    "duplicate symbol '{}' in element vocabulary",
                    symbol
                )));
            }
        }

        Ok(Self { symbols, index })
    }

    /// Collects the species present across a dataset.
    ///
    /// The result is the union of all symbols, ordered by atomic number, so
    /// that two datasets with the same species produce identical indices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownElement`] if a symbol is not one of
    /// [`DEFAULT_ELEMENT_TYPES`], or [`Error::InvalidStructure`] if no
    /// structure contains any site.
    pub fn from_structures<'a, I>(structures: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a Structure>,
    {
        let mut present = BTreeSet::new();
        for structure in structures {
            for site in &structure.sites {
                let z = DEFAULT_ELEMENT_TYPES
                    .iter()
                    .position(|s| *s == site.species)
                    .ok_or_else(|| Error::unknown_element(&site.species))?;
                present.insert(z);
            }
        }
        Self::new(present.into_iter().map(|z| DEFAULT_ELEMENT_TYPES[z]))
    }

    /// Returns the species index of `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownElement`] if the symbol is not in the vocabulary.
    pub fn index_of(&self, symbol: &str) -> Result<usize, Error> {
        self.index
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::unknown_element(symbol))
    }

    /// Returns the symbol stored at `index`, if any.
    pub fn symbol(&self, index: usize) -> Option<&str> {
        self.symbols.get(index).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

impl Default for ElementVocabulary {
    fn default() -> Self {
        let symbols: Vec<String> = DEFAULT_ELEMENT_TYPES.iter().map(|s| s.to_string()).collect();
        let index = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        Self { symbols, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::structure::{Lattice, Structure};

    #[test]
    fn default_vocabulary_is_ordered_by_atomic_number() {
        let vocab = ElementVocabulary::default();
        assert_eq!(vocab.len(), 89);
        assert_eq!(vocab.index_of("H").unwrap(), 0);
        assert_eq!(vocab.index_of("Mo").unwrap(), 41);
        assert_eq!(vocab.symbol(88), Some("Pu"));
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let vocab = ElementVocabulary::new(["C", "O"]).unwrap();
        let err = vocab.index_of("N").unwrap_err();
        assert!(matches!(err, Error::UnknownElement { symbol } if symbol == "N"));
    }

    #[test]
    fn duplicate_and_empty_vocabularies_are_rejected() {
        assert!(ElementVocabulary::new(["C", "C"]).is_err());
        assert!(ElementVocabulary::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn from_structures_sorts_by_atomic_number() {
        let crystal = Structure::periodic(
            Lattice::cubic(4.0),
            ["S", "Mo"],
            [[0.0, 0.0, 0.0], [2.0, 2.0, 2.0]],
        )
        .unwrap();
        let molecule = Structure::molecule(["O", "C", "O"], [[0.0; 3], [1.2, 0.0, 0.0], [2.4, 0.0, 0.0]])
            .unwrap();

        let vocab = ElementVocabulary::from_structures([&crystal, &molecule]).unwrap();
        assert_eq!(vocab.symbols(), &["C", "O", "S", "Mo"]);
    }

    #[test]
    fn from_structures_rejects_unknown_species() {
        let molecule = Structure::molecule(["Og"], [[0.0; 3]]).unwrap();
        let err = ElementVocabulary::from_structures([&molecule]).unwrap_err();
        assert!(matches!(err, Error::UnknownElement { .. }));
    }
}
