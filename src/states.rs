// src/states.rs

use anyhow::{anyhow, Result};

/// A region with its own PUMS archive: one of the 50 states, DC or Puerto Rico.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State {
    /// Upper-case postal abbreviation, e.g. "CA".
    pub code: &'static str,
    /// Two-digit FIPS code used in `psam_*` file names, e.g. "06".
    pub fips: &'static str,
}

impl State {
    /// Lower-case postal code as it appears in archive names (`csv_hca.zip`).
    pub fn lower(&self) -> String {
        self.code.to_ascii_lowercase()
    }
}

/// Every region, ordered alphabetically by postal code.
pub static STATES: &[State] = &[
    State { code: "AK", fips: "02" },
    State { code: "AL", fips: "01" },
    State { code: "AR", fips: "05" },
    State { code: "AZ", fips: "04" },
    State { code: "CA", fips: "06" },
    State { code: "CO", fips: "08" },
    State { code: "CT", fips: "09" },
    State { code: "DC", fips: "11" },
    State { code: "DE", fips: "10" },
    State { code: "FL", fips: "12" },
    State { code: "GA", fips: "13" },
    State { code: "HI", fips: "15" },
    State { code: "IA", fips: "19" },
    State { code: "ID", fips: "16" },
    State { code: "IL", fips: "17" },
    State { code: "IN", fips: "18" },
    State { code: "KS", fips: "20" },
    State { code: "KY", fips: "21" },
    State { code: "LA", fips: "22" },
    State { code: "MA", fips: "25" },
    State { code: "MD", fips: "24" },
    State { code: "ME", fips: "23" },
    State { code: "MI", fips: "26" },
    State { code: "MN", fips: "27" },
    State { code: "MO", fips: "29" },
    State { code: "MS", fips: "28" },
    State { code: "MT", fips: "30" },
    State { code: "NC", fips: "37" },
    State { code: "ND", fips: "38" },
    State { code: "NE", fips: "31" },
    State { code: "NH", fips: "33" },
    State { code: "NJ", fips: "34" },
    State { code: "NM", fips: "35" },
    State { code: "NV", fips: "32" },
    State { code: "NY", fips: "36" },
    State { code: "OH", fips: "39" },
    State { code: "OK", fips: "40" },
    State { code: "OR", fips: "41" },
    State { code: "PA", fips: "42" },
    State { code: "PR", fips: "72" },
    State { code: "RI", fips: "44" },
    State { code: "SC", fips: "45" },
    State { code: "SD", fips: "46" },
    State { code: "TN", fips: "47" },
    State { code: "TX", fips: "48" },
    State { code: "UT", fips: "49" },
    State { code: "VA", fips: "51" },
    State { code: "VT", fips: "50" },
    State { code: "WA", fips: "53" },
    State { code: "WI", fips: "55" },
    State { code: "WV", fips: "54" },
    State { code: "WY", fips: "56" },
];

/// Case-insensitive lookup of a postal code.
pub fn lookup(code: &str) -> Result<&'static State> {
    let wanted = code.trim();
    STATES
        .iter()
        .find(|s| s.code.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| {
            let valid: Vec<&str> = STATES.iter().map(|s| s.code).collect();
            anyhow!(
                "\"{}\" is an invalid state. Please select one of the following: {}",
                code,
                valid.join(", ")
            )
        })
}

/// Resolve a list of codes, or every region when `codes` is empty.
/// Order follows `codes`; duplicates are kept as given.
pub fn resolve<S: AsRef<str>>(codes: &[S]) -> Result<Vec<&'static State>> {
    if codes.is_empty() {
        return Ok(STATES.iter().collect());
    }
    codes.iter().map(|c| lookup(c.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_is_sorted_and_unique() {
        let codes: Vec<&str> = STATES.iter().map(|s| s.code).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);

        let unique: HashSet<&str> = codes.iter().copied().collect();
        assert_eq!(unique.len(), STATES.len());
        let fips: HashSet<&str> = STATES.iter().map(|s| s.fips).collect();
        assert_eq!(fips.len(), STATES.len());
        assert_eq!(STATES.len(), 52);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let ca = lookup("ca").unwrap();
        assert_eq!(ca.code, "CA");
        assert_eq!(ca.fips, "06");
        assert_eq!(lookup(" Pr ").unwrap().fips, "72");
        assert_eq!(ca.lower(), "ca");
    }

    #[test]
    fn test_unknown_code_lists_valid_ones() {
        let err = lookup("XX").unwrap_err().to_string();
        assert!(err.contains("\"XX\" is an invalid state"));
        assert!(err.contains("WY"));
    }

    #[test]
    fn test_resolve_defaults_to_every_region() {
        let all = resolve::<&str>(&[]).unwrap();
        assert_eq!(all.len(), STATES.len());
        assert_eq!(all[0].code, "AK");

        let some = resolve(&["ny", "AL"]).unwrap();
        assert_eq!(
            some.iter().map(|s| s.code).collect::<Vec<_>>(),
            vec!["NY", "AL"]
        );
        assert!(resolve(&["ny", "zz"]).is_err());
    }
}
