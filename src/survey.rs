// src/survey.rs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Earliest release the CSV layout is supported for.
pub const MIN_YEAR: u16 = 2014;
/// From this release on, state files are named by FIPS code (`psam_p06.csv`).
pub const FIPS_NAMING_YEAR: u16 = 2017;

/// Sampling period of a PUMS release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1-Year")]
    OneYear,
    #[serde(rename = "5-Year")]
    FiveYear,
}

impl Horizon {
    pub fn years(self) -> u16 {
        match self {
            Horizon::OneYear => 1,
            Horizon::FiveYear => 5,
        }
    }

    /// Path / URL segment, `1-Year` or `5-Year`.
    pub fn as_str(self) -> &'static str {
        match self {
            Horizon::OneYear => "1-Year",
            Horizon::FiveYear => "5-Year",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "1-year" => Ok(Horizon::OneYear),
            "5" | "5-year" => Ok(Horizon::FiveYear),
            other => Err(format!(
                "horizon must be either \"1-Year\" or \"5-Year\" (got \"{}\")",
                other
            )),
        }
    }
}

/// Record type within a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Survey {
    Person,
    Household,
}

impl Survey {
    /// File-name prefix letter.
    pub fn code(self) -> char {
        match self {
            Survey::Person => 'p',
            Survey::Household => 'h',
        }
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Survey::Person => f.write_str("person"),
            Survey::Household => f.write_str("household"),
        }
    }
}

impl FromStr for Survey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "person" | "p" => Ok(Survey::Person),
            "household" | "h" => Ok(Survey::Household),
            other => Err(format!(
                "survey must be either \"person\" or \"household\" (got \"{}\")",
                other
            )),
        }
    }
}

pub fn check_year(year: u16) -> Result<()> {
    if year < MIN_YEAR {
        bail!("Year must be >= {} (got {})", MIN_YEAR, year);
    }
    Ok(())
}

/// `{root}/{year}/{horizon}-Year`, the one directory a release lives in.
pub fn data_dir(root: impl AsRef<Path>, year: u16, horizon: Horizon) -> PathBuf {
    root.as_ref().join(year.to_string()).join(horizon.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_parses_short_and_long_forms() {
        assert_eq!("1".parse::<Horizon>().unwrap(), Horizon::OneYear);
        assert_eq!("5-Year".parse::<Horizon>().unwrap(), Horizon::FiveYear);
        assert_eq!("5-year".parse::<Horizon>().unwrap(), Horizon::FiveYear);
        assert!("3".parse::<Horizon>().is_err());
        assert_eq!(Horizon::FiveYear.years(), 5);
    }

    #[test]
    fn test_data_dir_layout() {
        assert_eq!(
            data_dir("", 2018, Horizon::OneYear),
            PathBuf::from("2018/1-Year")
        );
        assert_eq!(
            data_dir("/data", 2019, Horizon::FiveYear),
            PathBuf::from("/data/2019/5-Year")
        );
    }

    #[test]
    fn test_year_floor() {
        assert!(check_year(2013).is_err());
        assert!(check_year(2014).is_ok());
    }

    #[test]
    fn test_survey_codes() {
        assert_eq!(Survey::Person.code(), 'p');
        assert_eq!("household".parse::<Survey>().unwrap(), Survey::Household);
        assert!("family".parse::<Survey>().is_err());
    }
}
