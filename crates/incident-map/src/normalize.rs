//! Country name reconciliation between the incident table and the polygon source
//!
//! The incident table and the polygon source spell some countries differently
//! ("Tanzania" vs "United Republic of Tanzania"). A normalizer turns a raw
//! incident-table name into a key that is compared, byte for byte, against
//! polygon admin names.
//!
//! Matching is exact. A name that is not recognized passes through unchanged
//! and simply fails to join; a wrong match would attribute incidents to the
//! wrong country, which is worse than a miss.

use crate::{MapError, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Maps a raw country name to the canonical join key
pub trait CountryNameNormalizer {
    fn normalize<'a>(&self, raw: &'a str) -> Cow<'a, str>;
}

/// Identity normalizer: the raw name is the key
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactNormalizer;

impl CountryNameNormalizer for ExactNormalizer {
    fn normalize<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(raw)
    }
}

/// Explicit alias table (raw name → admin name)
///
/// Keys are compared exactly, so "tanzania" and "Tanzania" are different
/// aliases. Names absent from the table pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct AliasNormalizer {
    aliases: BTreeMap<String, String>,
}

impl AliasNormalizer {
    /// Create new empty alias table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create alias table with the built-in incident-table → Natural Earth spellings
    pub fn with_natural_earth_defaults() -> Self {
        let mut normalizer = Self::new();
        normalizer.load_natural_earth_defaults();
        normalizer
    }

    /// Spellings that differ between common incident datasets and Natural Earth `ADMIN`
    fn load_natural_earth_defaults(&mut self) {
        self.add_alias("United States", "United States of America");
        self.add_alias("USA", "United States of America");
        self.add_alias("Tanzania", "United Republic of Tanzania");
        self.add_alias("Serbia", "Republic of Serbia");
        self.add_alias("Côte d'Ivoire", "Ivory Coast");
        self.add_alias("Cote d'Ivoire", "Ivory Coast");
        self.add_alias("Republic of Congo", "Republic of the Congo");
        self.add_alias("DR Congo", "Democratic Republic of the Congo");
        self.add_alias("DRC", "Democratic Republic of the Congo");
        self.add_alias("Occupied Palestinian Territories", "Palestine");
        self.add_alias("Palestinian Territories", "Palestine");
        self.add_alias("Timor-Leste", "East Timor");
        self.add_alias("Eswatini", "eSwatini");
        self.add_alias("Swaziland", "eSwatini");
        self.add_alias("Bahamas", "The Bahamas");
        self.add_alias("Burma", "Myanmar");
        self.add_alias("Syrian Arab Republic", "Syria");
    }

    fn add_alias(&mut self, alias: &str, admin_name: &str) {
        self.aliases.insert(alias.to_string(), admin_name.to_string());
    }

    /// Add an alias, rejecting empty targets
    pub fn with_alias(mut self, alias: impl Into<String>, admin_name: impl Into<String>) -> Result<Self> {
        let alias = alias.into();
        let admin_name = admin_name.into();
        if admin_name.trim().is_empty() {
            return Err(MapError::InvalidAlias { alias });
        }
        self.aliases.insert(alias, admin_name);
        Ok(self)
    }

    /// Build from a map, rejecting empty targets
    pub fn from_map(aliases: BTreeMap<String, String>) -> Result<Self> {
        if let Some((alias, _)) = aliases.iter().find(|(_, target)| target.trim().is_empty()) {
            return Err(MapError::InvalidAlias {
                alias: alias.clone(),
            });
        }
        Ok(Self { aliases })
    }

    /// Load an alias table from a JSON object file (`{"raw name": "Admin Name"}`)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading country aliases from {:?}", path);

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let aliases: BTreeMap<String, String> = serde_json::from_reader(reader)?;
        let normalizer = Self::from_map(aliases)?;

        info!("Loaded {} country aliases", normalizer.len());
        Ok(normalizer)
    }

    /// Merge another table into this one; entries in `other` win
    pub fn extend(&mut self, other: AliasNormalizer) {
        self.aliases.extend(other.aliases);
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl CountryNameNormalizer for AliasNormalizer {
    fn normalize<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        match self.aliases.get(raw) {
            Some(admin_name) => Cow::Owned(admin_name.clone()),
            None => Cow::Borrowed(raw),
        }
    }
}
