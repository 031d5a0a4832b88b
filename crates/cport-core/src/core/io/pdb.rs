use crate::core::models::consensus::{Classification, ConsensusAnnotation};
use nalgebra::Point3;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;
use thiserror::Error;

const B_FACTOR_COLUMNS: std::ops::Range<usize> = 60..66;

/// Non-standard amino acids that structure files record as `HETATM` although they are part
/// of the polymer chain.
const MODIFIED_AMINO_ACIDS: [&str; 3] = ["MSE", "SEC", "PYL"];

fn is_modified_amino_acid(residue_name: &str) -> bool {
    MODIFIED_AMINO_ACIDS.contains(&residue_name.trim())
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error("Chain '{chain_id}' not found (available chains: {available})")]
    ChainNotFound { chain_id: char, available: String },
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end).unwrap_or("").trim()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdbAtom {
    pub serial: usize,
    pub name: String,
    pub residue_name: String,
    pub chain_id: char,
    pub residue_number: isize,
    pub position: Point3<f64>,
    pub b_factor: Option<f64>,
    pub is_hetero: bool,
}

impl PdbAtom {
    pub fn is_hydrogen(&self) -> bool {
        let first = self
            .name
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .chars()
            .next();
        matches!(first, Some('H') | Some('D'))
    }

    /// `ATOM` records plus `HETATM` records of modified amino acids.
    pub fn is_polymer(&self) -> bool {
        !self.is_hetero || is_modified_amino_acid(&self.residue_name)
    }
}

/// Atom records of the first model of a PDB file, with the raw text kept for rewriting.
#[derive(Debug, Clone, PartialEq)]
pub struct PdbStructure {
    atoms: Vec<PdbAtom>,
    text: String,
}

impl PdbStructure {
    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, PdbError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(text)
    }

    pub fn parse(text: impl Into<String>) -> Result<Self, PdbError> {
        let text = text.into();
        let mut atoms = Vec::new();

        for (line_num, line) in text.lines().enumerate() {
            let line_num = line_num + 1;
            let record_type = slice_and_trim(line, 0, 6);
            match record_type {
                "ATOM" | "HETATM" => atoms.push(parse_atom(line, line_num, record_type)?),
                "ENDMDL" | "END" => break,
                _ => {}
            }
        }

        if atoms.is_empty() {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        Ok(Self { atoms, text })
    }

    pub fn atoms(&self) -> &[PdbAtom] {
        &self.atoms
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chain_ids(&self) -> Vec<char> {
        let mut chains: Vec<char> = Vec::new();
        for atom in &self.atoms {
            if !chains.contains(&atom.chain_id) {
                chains.push(atom.chain_id);
            }
        }
        chains
    }

    /// Polymer residues of a chain in file order.
    pub fn chain_residues(&self, chain_id: char) -> Result<Vec<(isize, String)>, PdbError> {
        let mut seen = HashSet::new();
        let mut residues: Vec<(isize, String)> = Vec::new();
        for atom in self
            .atoms
            .iter()
            .filter(|a| a.chain_id == chain_id && a.is_polymer())
        {
            if seen.insert(atom.residue_number) {
                residues.push((atom.residue_number, atom.residue_name.clone()));
            }
        }
        if residues.is_empty() {
            let available: String = self
                .chain_ids()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(PdbError::ChainNotFound {
                chain_id,
                available,
            });
        }
        Ok(residues)
    }

    /// Heavy-atom coordinates of each polymer residue of a chain.
    pub fn heavy_atoms_by_residue(&self, chain_id: char) -> BTreeMap<isize, Vec<Point3<f64>>> {
        let mut map: BTreeMap<isize, Vec<Point3<f64>>> = BTreeMap::new();
        for atom in self
            .atoms
            .iter()
            .filter(|a| a.chain_id == chain_id && a.is_polymer() && !a.is_hydrogen())
        {
            map.entry(atom.residue_number)
                .or_default()
                .push(atom.position);
        }
        map
    }

    /// Highest B-factor over each polymer residue's atoms.
    pub fn residue_b_factors(&self, chain_id: char) -> BTreeMap<isize, Option<f64>> {
        let mut map: BTreeMap<isize, Option<f64>> = BTreeMap::new();
        for atom in self
            .atoms
            .iter()
            .filter(|a| a.chain_id == chain_id && a.is_polymer())
        {
            let entry = map.entry(atom.residue_number).or_insert(None);
            if let Some(b) = atom.b_factor {
                *entry = Some(entry.map_or(b, |current| current.max(b)));
            }
        }
        map
    }
}

fn parse_atom(line: &str, line_num: usize, record_type: &str) -> Result<PdbAtom, PdbError> {
    if line.len() < 54 {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::LineTooShort,
        });
    }

    let serial_str = slice_and_trim(line, 6, 11);
    let res_seq_str = slice_and_trim(line, 22, 26);
    let x_str = slice_and_trim(line, 30, 38);
    let y_str = slice_and_trim(line, 38, 46);
    let z_str = slice_and_trim(line, 46, 54);
    let b_str = slice_and_trim(line, B_FACTOR_COLUMNS.start, B_FACTOR_COLUMNS.end);

    let int = |value: &str, columns: &str| -> Result<isize, PdbError> {
        value.parse().map_err(|_| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::InvalidInt {
                columns: columns.into(),
                value: value.into(),
            },
        })
    };
    let float = |value: &str, columns: &str| -> Result<f64, PdbError> {
        value.parse().map_err(|_| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::InvalidFloat {
                columns: columns.into(),
                value: value.into(),
            },
        })
    };

    // Serial numbers overflow into hybrid-36 in very large files; keep 0 when unreadable.
    let serial = serial_str.parse().unwrap_or(0);
    let residue_number = int(res_seq_str, "23-26")?;
    let position = Point3::new(float(x_str, "31-38")?, float(y_str, "39-46")?, float(z_str, "47-54")?);
    let b_factor = if b_str.is_empty() {
        None
    } else {
        Some(float(b_str, "61-66")?)
    };

    Ok(PdbAtom {
        serial,
        name: slice_and_trim(line, 12, 16).to_string(),
        residue_name: slice_and_trim(line, 17, 20).to_string(),
        chain_id: line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' '),
        residue_number,
        position,
        b_factor,
        is_hetero: record_type == "HETATM",
    })
}

/// Rewrites the B-factor field of every polymer record of `chain_id` with the residue's
/// consensus value. Every other byte of the input is preserved, including line endings.
pub fn annotate(text: &str, chain_id: char, annotation: &ConsensusAnnotation) -> String {
    let mut output = String::with_capacity(text.len());
    for raw in text.split_inclusive('\n') {
        let (line, ending) = split_line_ending(raw);
        match annotated_line(line, chain_id, annotation) {
            Some(rewritten) => output.push_str(&rewritten),
            None => output.push_str(line),
        }
        output.push_str(ending);
    }
    output
}

fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(stripped) = raw.strip_suffix("\r\n") {
        (stripped, "\r\n")
    } else if let Some(stripped) = raw.strip_suffix('\n') {
        (stripped, "\n")
    } else {
        (raw, "")
    }
}

fn annotated_line(line: &str, chain_id: char, annotation: &ConsensusAnnotation) -> Option<String> {
    if !line.is_ascii() || line.len() < 26 {
        return None;
    }
    let polymer = line.starts_with("ATOM")
        || (line.starts_with("HETATM") && is_modified_amino_acid(&line[17..20]));
    if !polymer {
        return None;
    }
    if line[21..22].chars().next() != Some(chain_id) {
        return None;
    }
    let residue: isize = line[22..26].trim().parse().ok()?;
    let class = annotation.get(residue).unwrap_or(Classification::Neutral);
    Some(replace_b_factor(line, class.b_factor()))
}

fn replace_b_factor(line: &str, value: f64) -> String {
    let field = format!("{:>6.2}", value);
    let width = B_FACTOR_COLUMNS.end - B_FACTOR_COLUMNS.start;
    let field = &field[field.len().saturating_sub(width)..];

    let mut padded = line.to_string();
    if padded.len() < B_FACTOR_COLUMNS.end {
        padded.push_str(&" ".repeat(B_FACTOR_COLUMNS.end - padded.len()));
    }
    format!(
        "{}{}{}",
        &padded[..B_FACTOR_COLUMNS.start],
        field,
        &padded[B_FACTOR_COLUMNS.end..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const SAMPLE: &str = "\
HEADER    TEST STRUCTURE
ATOM      1  N   ALA A  10      11.104   6.134  -6.504  1.00 12.00           N
ATOM      2  CA  ALA A  10      11.639   6.071  -5.147  1.00 13.50           C
ATOM      3  H   ALA A  10      10.500   6.000  -6.800  1.00  9.00           H
ATOM      4  N   GLY A  11      12.000   7.000  -4.000  1.00 30.00           N
ATOM      5  N   SER B   1       1.000   1.000   1.000  1.00  5.00           N
HETATM    6  O   HOH A 101       0.000   0.000   0.000  1.00 40.00           O
END
";

    fn annotation(entries: &[(isize, Classification)]) -> ConsensusAnnotation {
        ConsensusAnnotation::new(
            entries.iter().copied().collect(),
            BTreeMap::new(),
            BTreeSet::new(),
        )
    }

    #[test]
    fn parse_reads_atoms_and_chains() {
        let pdb = PdbStructure::parse(SAMPLE).unwrap();
        assert_eq!(pdb.atoms().len(), 6);
        assert_eq!(pdb.chain_ids(), vec!['A', 'B']);
        assert_eq!(
            pdb.chain_residues('A').unwrap(),
            vec![(10, "ALA".to_string()), (11, "GLY".to_string())]
        );
        assert!(pdb.atoms()[5].is_hetero);
        assert!(pdb.atoms()[2].is_hydrogen());
    }

    #[test]
    fn chain_residues_fails_for_missing_chain() {
        let pdb = PdbStructure::parse(SAMPLE).unwrap();
        let err = pdb.chain_residues('Z').unwrap_err();
        assert!(matches!(err, PdbError::ChainNotFound { chain_id: 'Z', .. }));
    }

    #[test]
    fn heavy_atoms_skip_hydrogens_and_hetero_records() {
        let pdb = PdbStructure::parse(SAMPLE).unwrap();
        let heavy = pdb.heavy_atoms_by_residue('A');
        assert_eq!(heavy[&10].len(), 2);
        assert_eq!(heavy[&11].len(), 1);
        assert!(!heavy.contains_key(&101));
    }

    #[test]
    fn residue_b_factors_take_the_maximum() {
        let pdb = PdbStructure::parse(SAMPLE).unwrap();
        let b = pdb.residue_b_factors('A');
        assert_eq!(b[&10], Some(13.5));
        assert_eq!(b[&11], Some(30.0));
    }

    #[test]
    fn parse_rejects_bad_coordinates_and_empty_files() {
        let bad = "ATOM      1  N   ALA A  10      11.1x4   6.134  -6.504  1.00 12.00           N\n";
        assert!(matches!(
            PdbStructure::parse(bad),
            Err(PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::InvalidFloat { .. }
            })
        ));
        assert!(matches!(
            PdbStructure::parse("HEADER ONLY\n"),
            Err(PdbError::MissingRecord(_))
        ));
    }

    #[test]
    fn annotate_rewrites_only_the_b_factor_field() {
        let ann = annotation(&[
            (10, Classification::Active),
            (11, Classification::Passive),
        ]);
        let out = annotate(SAMPLE, 'A', &ann);
        let in_lines: Vec<&str> = SAMPLE.lines().collect();
        let out_lines: Vec<&str> = out.lines().collect();
        assert_eq!(in_lines.len(), out_lines.len());

        for (before, after) in in_lines.iter().zip(&out_lines) {
            assert_eq!(before.len(), after.len());
            if before.starts_with("ATOM") && &before[21..22] == "A" {
                assert_eq!(&before[..60], &after[..60]);
                assert_eq!(&before[66..], &after[66..]);
            } else {
                assert_eq!(before, after);
            }
        }
        assert_eq!(&out_lines[1][60..66], " 50.00");
        assert_eq!(&out_lines[2][60..66], " 50.00");
        assert_eq!(&out_lines[4][60..66], "100.00");
        assert_eq!(&out_lines[5][60..66], "  5.00");
    }

    #[test]
    fn annotate_marks_unlisted_residues_neutral_and_keeps_line_endings() {
        let text = "ATOM      4  N   GLY A  11      12.000   7.000  -4.000  1.00 30.00           N\r\nEND";
        let out = annotate(text, 'A', &annotation(&[]));
        assert_eq!(
            out,
            "ATOM      4  N   GLY A  11      12.000   7.000  -4.000  1.00  0.00           N\r\nEND"
        );
    }

    #[test]
    fn modified_amino_acids_count_as_chain_residues() {
        let text = "\
ATOM      1  N   ALA A  10      11.104   6.134  -6.504  1.00 12.00           N
HETATM    2  N   MSE A  11      12.000   7.000  -4.000  1.00 30.00           N
HETATM    3 SE   MSE A  11      12.500   7.500  -4.500  1.00 35.00          SE
HETATM    4  O   HOH A 101       0.000   0.000   0.000  1.00 40.00           O
END
";
        let pdb = PdbStructure::parse(text).unwrap();
        assert_eq!(
            pdb.chain_residues('A').unwrap(),
            vec![(10, "ALA".to_string()), (11, "MSE".to_string())]
        );
        assert_eq!(pdb.heavy_atoms_by_residue('A')[&11].len(), 2);
        assert_eq!(pdb.residue_b_factors('A')[&11], Some(35.0));

        let out = annotate(text, 'A', &annotation(&[(11, Classification::Passive)]));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(&lines[1][60..66], "100.00");
        assert_eq!(&lines[2][60..66], "100.00");
        assert_eq!(lines[3], text.lines().nth(3).unwrap());
    }

    #[test]
    fn annotate_pads_short_atom_lines() {
        let text = "ATOM      4  N   GLY A  11      12.000   7.000  -4.000\n";
        let out = annotate(text, 'A', &annotation(&[(11, Classification::Active)]));
        assert_eq!(
            out,
            "ATOM      4  N   GLY A  11      12.000   7.000  -4.000       50.00\n"
        );
    }
}
