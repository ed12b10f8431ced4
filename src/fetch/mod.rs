// src/fetch/mod.rs

/// Census URL layout for PUMS releases and data dictionaries.
pub mod urls;
/// Downloading archives and other files to disk.
pub mod zips;

#[cfg(test)]
pub(crate) mod test_server;
