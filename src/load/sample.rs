// src/load/sample.rs
use anyhow::{anyhow, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};
use tracing::debug;

/// Which data lines survive sampling.
#[derive(Debug, Clone)]
pub enum RowSelection {
    /// Keep each line with probability `density`, drawing from one RNG seeded once
    /// for the whole file list.
    Density { density: f64, seed: u64 },
    /// Keep lines whose second field (SERIALNO) is in the set.
    Serials(HashSet<String>),
}

/// Concatenate the CSV files into one CSV text: the header of the first file,
/// then the selected data lines of every file, with spaces stripped.
pub fn sample_files(paths: &[PathBuf], selection: &RowSelection) -> Result<String> {
    let mut rng = match selection {
        RowSelection::Density { seed, .. } => Some(StdRng::seed_from_u64(*seed)),
        RowSelection::Serials(_) => None,
    };
    let mut out = String::new();
    let mut first = true;

    for path in paths {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let header = lines
            .next()
            .ok_or_else(|| anyhow!("{} is empty", path.display()))?
            .with_context(|| format!("reading header of {}", path.display()))?;
        if first {
            out.push_str(&header);
            out.push('\n');
            first = false;
        }

        let mut kept = 0usize;
        for line in lines {
            let line = line.with_context(|| format!("reading {}", path.display()))?;
            if line.is_empty() {
                continue;
            }
            let keep = match (selection, rng.as_mut()) {
                (RowSelection::Density { density, .. }, Some(rng)) => rng.gen::<f64>() < *density,
                (RowSelection::Serials(serials), _) => line
                    .split(',')
                    .nth(1)
                    .map(|s| serials.contains(s))
                    .unwrap_or(false),
                _ => false,
            };
            if keep {
                out.extend(line.chars().filter(|c| *c != ' '));
                out.push('\n');
                kept += 1;
            }
        }
        debug!(path = %path.display(), kept, "sampled");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, body).unwrap();
        p
    }

    fn big_file(dir: &std::path::Path, name: &str, prefix: &str, n: usize) -> PathBuf {
        let mut body = String::from("RT,SERIALNO,AGEP\n");
        for i in 0..n {
            body.push_str(&format!("P,{}{:05},{}\n", prefix, i, i % 90));
        }
        write(dir, name, &body)
    }

    #[test]
    fn test_density_one_keeps_everything_with_single_header() -> Result<()> {
        let dir = tempdir()?;
        let a = write(dir.path(), "a.csv", "RT,SERIALNO,AGEP\nP, 2018HU1 ,30\n");
        let b = write(dir.path(), "b.csv", "RT,SERIALNO,AGEP\nP,2018HU2,40\nP,2018HU3,50\n");

        let text = sample_files(&[a, b], &RowSelection::Density { density: 1.0, seed: 0 })?;

        assert_eq!(
            text,
            "RT,SERIALNO,AGEP\nP,2018HU1,30\nP,2018HU2,40\nP,2018HU3,50\n"
        );
        Ok(())
    }

    #[test]
    fn test_density_zero_keeps_only_header() -> Result<()> {
        let dir = tempdir()?;
        let a = big_file(dir.path(), "a.csv", "A", 100);
        let text = sample_files(&[a], &RowSelection::Density { density: 0.0, seed: 7 })?;
        assert_eq!(text, "RT,SERIALNO,AGEP\n");
        Ok(())
    }

    #[test]
    fn test_same_seed_same_sample() -> Result<()> {
        let dir = tempdir()?;
        let a = big_file(dir.path(), "a.csv", "A", 1000);
        let sel = RowSelection::Density { density: 0.3, seed: 42 };

        let first = sample_files(&[a.clone()], &sel)?;
        let second = sample_files(&[a.clone()], &sel)?;
        let other = sample_files(&[a], &RowSelection::Density { density: 0.3, seed: 43 })?;

        assert_eq!(first, second);
        assert_ne!(first, other);
        let rows = first.lines().count() - 1;
        assert!(rows > 200 && rows < 400, "unexpected sample size {}", rows);
        Ok(())
    }

    #[test]
    fn test_serial_filter_ignores_density() -> Result<()> {
        let dir = tempdir()?;
        let a = write(
            dir.path(),
            "h.csv",
            "RT,SERIALNO,NP\nH,2018HU1,1\nH,2018HU2,2\nH,2018HU3,3\n",
        );
        let serials: HashSet<String> = ["2018HU3", "2018HU1"].iter().map(|s| s.to_string()).collect();

        let text = sample_files(&[a], &RowSelection::Serials(serials))?;

        assert_eq!(text, "RT,SERIALNO,NP\nH,2018HU1,1\nH,2018HU3,3\n");
        Ok(())
    }

    #[test]
    fn test_empty_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let a = write(dir.path(), "empty.csv", "");
        assert!(sample_files(&[a], &RowSelection::Density { density: 1.0, seed: 0 }).is_err());
        Ok(())
    }
}
