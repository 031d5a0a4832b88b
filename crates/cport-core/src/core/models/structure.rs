use phf::{Map, phf_map};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[rustfmt::skip]
static ONE_LETTER_CODES: Map<&'static str, char> = phf_map! {
    "ALA" => 'A', "ARG" => 'R', "ASN" => 'N', "ASP" => 'D', "CYS" => 'C',
    "GLN" => 'Q', "GLU" => 'E', "GLY" => 'G', "HIS" => 'H', "ILE" => 'I',
    "LEU" => 'L', "LYS" => 'K', "MET" => 'M', "PHE" => 'F', "PRO" => 'P',
    "SER" => 'S', "THR" => 'T', "TRP" => 'W', "TYR" => 'Y', "VAL" => 'V',
    // Common variants
    "HSE" => 'H', "HSD" => 'H', "HSP" => 'H', "HID" => 'H', "HIE" => 'H', "HIP" => 'H',
    "CYX" => 'C', "MSE" => 'M', "SEC" => 'U', "PYL" => 'O',
};

/// Solvent exposure class of a residue as reported by the external surface tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Exposure {
    Exposed,
    Buried,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResidueInfo {
    pub number: isize,       // Residue sequence number from the structure file
    pub name: String,        // Three-letter residue name (e.g., "ALA")
    pub exposure: Exposure,  // Surface class, `Unknown` when the tool gave no value
}

impl ResidueInfo {
    pub fn one_letter_code(&self) -> char {
        ONE_LETTER_CODES
            .get(self.name.trim().to_ascii_uppercase().as_str())
            .copied()
            .unwrap_or('X')
    }
}

/// Sparse, symmetric table of inter-residue distances in Angstroms.
///
/// Pairs that are not stored are either not computed or too far apart to matter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceTable {
    pairs: HashMap<(isize, isize), f64>,
}

impl DistanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: isize, b: isize) -> (isize, isize) {
        (a.min(b), a.max(b))
    }

    /// Inserts a pair, keeping the shorter distance when the pair is already present.
    pub fn insert(&mut self, a: isize, b: isize, distance: f64) {
        if a == b {
            return;
        }
        self.pairs
            .entry(Self::key(a, b))
            .and_modify(|d| *d = d.min(distance))
            .or_insert(distance);
    }

    pub fn get(&self, a: isize, b: isize) -> Option<f64> {
        self.pairs.get(&Self::key(a, b)).copied()
    }

    pub fn within(&self, a: isize, b: isize, radius: f64) -> bool {
        self.get(a, b).is_some_and(|d| d <= radius)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<(isize, isize, f64)> for DistanceTable {
    fn from_iter<T: IntoIterator<Item = (isize, isize, f64)>>(iter: T) -> Self {
        let mut table = DistanceTable::new();
        for (a, b, d) in iter {
            table.insert(a, b, d);
        }
        table
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("Chain '{0}' contains no residues")]
    EmptyChain(char),
    #[error("Residue {residue} appears more than once in chain '{chain_id}'")]
    DuplicateResidue { chain_id: char, residue: isize },
}

/// Immutable description of the target chain shared read-only by every stage of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureContext {
    structure_id: String,
    pdb_code: Option<String>,
    chain_id: char,
    residues: Vec<ResidueInfo>,
    index: HashMap<isize, usize>,
    distances: DistanceTable,
    source: Arc<str>,
}

impl StructureContext {
    pub fn builder(structure_id: impl Into<String>, chain_id: char) -> StructureContextBuilder {
        StructureContextBuilder::new(structure_id, chain_id)
    }

    /// Name used for output files (file stem or PDB code).
    pub fn structure_id(&self) -> &str {
        &self.structure_id
    }

    /// Four-letter RCSB code, when the structure came from the PDB archive.
    pub fn pdb_code(&self) -> Option<&str> {
        self.pdb_code.as_deref()
    }

    pub fn chain_id(&self) -> char {
        self.chain_id
    }

    pub fn residues(&self) -> &[ResidueInfo] {
        &self.residues
    }

    pub fn residue_numbers(&self) -> impl Iterator<Item = isize> + '_ {
        self.residues.iter().map(|r| r.number)
    }

    pub fn contains(&self, residue: isize) -> bool {
        self.index.contains_key(&residue)
    }

    pub fn residue(&self, residue: isize) -> Option<&ResidueInfo> {
        self.index.get(&residue).map(|&i| &self.residues[i])
    }

    pub fn exposure(&self, residue: isize) -> Exposure {
        self.residue(residue)
            .map_or(Exposure::Unknown, |r| r.exposure)
    }

    pub fn distances(&self) -> &DistanceTable {
        &self.distances
    }

    /// Raw text of the input structure file.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// One-letter sequence of the chain, `X` for unrecognized residue names.
    pub fn sequence(&self) -> String {
        self.residues.iter().map(ResidueInfo::one_letter_code).collect()
    }

    pub fn to_fasta(&self) -> String {
        format!(
            ">{}_{}\n{}\n",
            self.structure_id,
            self.chain_id,
            self.sequence()
        )
    }
}

pub struct StructureContextBuilder {
    structure_id: String,
    pdb_code: Option<String>,
    chain_id: char,
    residues: Vec<(isize, String)>,
    exposures: HashMap<isize, Exposure>,
    distances: DistanceTable,
    source: String,
}

impl StructureContextBuilder {
    pub fn new(structure_id: impl Into<String>, chain_id: char) -> Self {
        Self {
            structure_id: structure_id.into(),
            pdb_code: None,
            chain_id,
            residues: Vec::new(),
            exposures: HashMap::new(),
            distances: DistanceTable::new(),
            source: String::new(),
        }
    }

    pub fn pdb_code(mut self, code: impl Into<String>) -> Self {
        self.pdb_code = Some(code.into());
        self
    }

    pub fn residue(mut self, number: isize, name: &str) -> Self {
        self.residues.push((number, name.to_string()));
        self
    }

    pub fn residues<I, S>(mut self, residues: I) -> Self
    where
        I: IntoIterator<Item = (isize, S)>,
        S: Into<String>,
    {
        self.residues
            .extend(residues.into_iter().map(|(n, name)| (n, name.into())));
        self
    }

    pub fn exposure(mut self, number: isize, exposure: Exposure) -> Self {
        self.exposures.insert(number, exposure);
        self
    }

    pub fn exposures(mut self, exposures: HashMap<isize, Exposure>) -> Self {
        self.exposures.extend(exposures);
        self
    }

    pub fn distances(mut self, distances: DistanceTable) -> Self {
        self.distances = distances;
        self
    }

    pub fn source(mut self, text: impl Into<String>) -> Self {
        self.source = text.into();
        self
    }

    pub fn build(self) -> Result<StructureContext, StructureError> {
        if self.residues.is_empty() {
            return Err(StructureError::EmptyChain(self.chain_id));
        }

        let mut index = HashMap::with_capacity(self.residues.len());
        let mut residues = Vec::with_capacity(self.residues.len());
        for (number, name) in self.residues {
            if index.insert(number, residues.len()).is_some() {
                return Err(StructureError::DuplicateResidue {
                    chain_id: self.chain_id,
                    residue: number,
                });
            }
            let exposure = self.exposures.get(&number).copied().unwrap_or_default();
            residues.push(ResidueInfo {
                number,
                name,
                exposure,
            });
        }

        Ok(StructureContext {
            structure_id: self.structure_id,
            pdb_code: self.pdb_code,
            chain_id: self.chain_id,
            residues,
            index,
            distances: self.distances,
            source: Arc::from(self.source),
        })
    }
}
