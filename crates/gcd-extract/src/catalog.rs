//! Lookup tables resolving integer codes to display strings

use anyhow::Result;
use rustc_hash::FxHashMap;

use crate::schema::SchemaProfile;
use crate::source::GcdSource;

pub type CodeMap = FxHashMap<i64, String>;

/// One of the four code tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Country,
    Language,
    PublicationType,
    StoryType,
}

impl Lookup {
    fn table(self) -> &'static str {
        match self {
            Self::Country => "stddata_country",
            Self::Language => "stddata_language",
            Self::PublicationType => "gcd_series_publication_type",
            Self::StoryType => "gcd_story_type",
        }
    }

    fn value_column(self) -> &'static str {
        match self {
            Self::Country | Self::Language => "code",
            Self::PublicationType | Self::StoryType => "name",
        }
    }
}

/// Immutable code → string mappings, loaded once per run
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    countries: CodeMap,
    languages: CodeMap,
    publication_types: CodeMap,
    story_types: CodeMap,
}

impl MetadataCatalog {
    pub fn new(
        countries: CodeMap,
        languages: CodeMap,
        publication_types: CodeMap,
        story_types: CodeMap,
    ) -> Self {
        Self {
            countries,
            languages,
            publication_types,
            story_types,
        }
    }

    /// Load every lookup table. Any failure is fatal for the run.
    ///
    /// The publication-type table is skipped (left empty) for dumps that
    /// predate it.
    pub fn load(source: &GcdSource, profile: &SchemaProfile) -> Result<Self> {
        let countries = source.lookup_table(Lookup::Country.table(), Lookup::Country.value_column())?;
        let languages =
            source.lookup_table(Lookup::Language.table(), Lookup::Language.value_column())?;
        let publication_types = if profile.publication_type {
            source.lookup_table(
                Lookup::PublicationType.table(),
                Lookup::PublicationType.value_column(),
            )?
        } else {
            CodeMap::default()
        };
        let story_types =
            source.lookup_table(Lookup::StoryType.table(), Lookup::StoryType.value_column())?;

        log::info!(
            "Loaded catalog: {} countries, {} languages, {} publication types, {} story types",
            countries.len(),
            languages.len(),
            publication_types.len(),
            story_types.len()
        );
        Ok(Self::new(countries, languages, publication_types, story_types))
    }

    pub fn resolve(&self, lookup: Lookup, code: i64) -> Option<&str> {
        let map = match lookup {
            Lookup::Country => &self.countries,
            Lookup::Language => &self.languages,
            Lookup::PublicationType => &self.publication_types,
            Lookup::StoryType => &self.story_types,
        };
        map.get(&code).map(String::as_str)
    }
}
