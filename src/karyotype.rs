//! Contig → baseline ploidy table, loaded via `serde_json` into a typed map.
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Karyotype(HashMap<String, u8>);

impl Karyotype {
    pub fn from_json(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("could not open karyotype file {path}"))?;
        let reader = BufReader::new(file);
        let ploidies: HashMap<String, u8> = serde_json::from_reader(reader).with_context(|| format!("could not parse karyotype JSON {path}"))?;
        Ok(Self(ploidies))
    }

    pub fn get_ploidy(&self, contig: &str) -> Option<u8> {
        match self.0.get(contig) {
            Some(&p) => Some(p),
            None => {
                debug!("contig '{contig}' was not present in the karyotype");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_ploidy_from_json() -> Result<()> {
        let mut path = std::env::temp_dir();
        path.push("bulksim_test_karyotype.json");
        let mut file = File::create(&path)?;
        write!(file, r#"{{"chr1": 2, "chrX": 1}}"#)?;

        let karyotype = Karyotype::from_json(path.to_str().unwrap())?;
        assert_eq!(karyotype.get_ploidy("chr1"), Some(2));
        assert_eq!(karyotype.get_ploidy("chrX"), Some(1));
        assert_eq!(karyotype.get_ploidy("chrY"), None);
        Ok(())
    }
}
