// src/fetch/urls.rs
use anyhow::{Context, Result};
use url::Url;

use crate::states::State;
use crate::survey::{Horizon, Survey};

pub const ACS_BASE_URL: &str = "https://www2.census.gov/programs-surveys/acs/data/pums/";
pub const DATA_DICT_BASE_URL: &str =
    "https://www2.census.gov/programs-surveys/acs/tech_docs/pums/data_dict/";

/// Parse a base URL, making sure it ends in `/` so `join` appends instead of replacing.
pub fn parse_base(base: &str) -> Result<Url> {
    let mut s = base.trim().to_string();
    if !s.ends_with('/') {
        s.push('/');
    }
    Url::parse(&s).with_context(|| format!("parsing base URL {}", base))
}

/// `{base}/{year}/{horizon}-Year/`
pub fn release_url(base: &Url, year: u16, horizon: Horizon) -> Result<Url> {
    base.join(&format!("{}/{}/", year, horizon))
        .with_context(|| format!("joining {}/{} onto {}", year, horizon, base))
}

/// `csv_h{state}.zip` / `csv_p{state}.zip`
pub fn state_archive_name(survey: Survey, state: &State) -> String {
    format!("csv_{}{}.zip", survey.code(), state.lower())
}

/// `csv_pus.zip` / `csv_hus.zip`
pub fn nationwide_archive_name(survey: Survey) -> String {
    format!("csv_{}us.zip", survey.code())
}

pub fn archive_url(release: &Url, archive_name: &str) -> Result<Url> {
    release
        .join(archive_name)
        .with_context(|| format!("joining {} onto {}", archive_name, release))
}

/// Data dictionary for a release. 5-Year dictionaries are named by their span.
pub fn definitions_url(base: &Url, year: u16, horizon: Horizon) -> Result<Url> {
    let span = match horizon {
        Horizon::OneYear => year.to_string(),
        Horizon::FiveYear => format!("{}-{}", year - 4, year),
    };
    archive_url(base, &format!("PUMS_Data_Dictionary_{}.csv", span))
}

/// Last path segment of `url`, used as the on-disk file name.
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states;

    #[test]
    fn test_release_and_archive_urls() -> Result<()> {
        let base = parse_base(ACS_BASE_URL)?;
        let release = release_url(&base, 2018, Horizon::OneYear)?;
        assert_eq!(
            release.as_str(),
            "https://www2.census.gov/programs-surveys/acs/data/pums/2018/1-Year/"
        );

        let ak = states::lookup("AK")?;
        let name = state_archive_name(Survey::Household, ak);
        assert_eq!(name, "csv_hak.zip");
        assert_eq!(
            archive_url(&release, &name)?.as_str(),
            "https://www2.census.gov/programs-surveys/acs/data/pums/2018/1-Year/csv_hak.zip"
        );
        assert_eq!(nationwide_archive_name(Survey::Person), "csv_pus.zip");
        assert_eq!(nationwide_archive_name(Survey::Household), "csv_hus.zip");
        Ok(())
    }

    #[test]
    fn test_base_without_trailing_slash_still_appends() -> Result<()> {
        let base = parse_base("http://127.0.0.1:9000/pums")?;
        let release = release_url(&base, 2021, Horizon::FiveYear)?;
        assert_eq!(release.as_str(), "http://127.0.0.1:9000/pums/2021/5-Year/");
        Ok(())
    }

    #[test]
    fn test_dictionary_urls() -> Result<()> {
        let base = parse_base(DATA_DICT_BASE_URL)?;
        assert_eq!(
            definitions_url(&base, 2018, Horizon::OneYear)?.as_str(),
            "https://www2.census.gov/programs-surveys/acs/tech_docs/pums/data_dict/PUMS_Data_Dictionary_2018.csv"
        );
        assert!(definitions_url(&base, 2018, Horizon::FiveYear)?
            .as_str()
            .ends_with("/PUMS_Data_Dictionary_2014-2018.csv"));
        Ok(())
    }

    #[test]
    fn test_file_name_from_url() {
        let u = Url::parse("https://example.com/a/b/csv_pus.zip").unwrap();
        assert_eq!(file_name(&u), Some("csv_pus.zip"));
        let dir = Url::parse("https://example.com/a/").unwrap();
        assert_eq!(file_name(&dir), None);
    }
}
