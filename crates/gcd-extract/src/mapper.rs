//! Row → Document mapping.
//!
//! Every attribute read goes through [`settle`]: a failed column access is
//! logged and replaced by the attribute's default (or left out), so one bad
//! column never costs the whole row. Only the required ids (`issue_id`,
//! `series_id`) and the story gate can fail a row.

use crate::catalog::{Lookup, MetadataCatalog};
use crate::credit::{CreditIndex, Role};
use crate::document::{Document, Value};
use crate::schema::SchemaProfile;
use crate::snapshot::{canonical_date, epoch_date, Snapshot, UNSET_DATE};
use crate::source::{SourceError, SourceRow};

/// `story_credit_source` when credits came from the credit table
pub const CREDIT_SOURCE_TABLE: &str = "gcd_story_credit";
/// `story_credit_source` when credits came from the legacy story columns
pub const CREDIT_SOURCE_STORY: &str = "gcd_story";

/// Default for numeric attributes that must always be present
const UNSET: i64 = -1;

/// Legacy free-text credit columns on `gcd_story`
const LEGACY_CREDIT_COLUMNS: [&str; 6] = [
    "story_script",
    "story_pencils",
    "story_inks",
    "story_colors",
    "story_letters",
    "story_editing",
];

/// Resolve one fetched value: errors are logged and fall back to `default`.
pub fn settle<T>(column: &str, fetched: Result<Option<T>, SourceError>, default: Option<T>) -> Option<T> {
    match fetched {
        Ok(Some(value)) => Some(value),
        Ok(None) => default,
        Err(e) => {
            log::warn!("{column}: {e}");
            default
        }
    }
}

/// Split a `;`-delimited list, trimming each entry and dropping empty ones.
pub fn split_multi(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Maps source rows to documents; cheap to construct, borrows its lookups
pub struct RowMapper<'a> {
    catalog: &'a MetadataCatalog,
    credits: &'a CreditIndex,
    profile: SchemaProfile,
    unixtime: i64,
}

impl<'a> RowMapper<'a> {
    pub fn new(
        catalog: &'a MetadataCatalog,
        credits: &'a CreditIndex,
        profile: SchemaProfile,
        snapshot: &Snapshot,
    ) -> Self {
        Self {
            catalog,
            credits,
            profile,
            unixtime: snapshot.unixtime(),
        }
    }

    /// Build the document for one row.
    ///
    /// Errors only when a required column cannot be read; the caller drops
    /// the row.
    pub fn map_row<R: SourceRow + ?Sized>(&self, row: &R) -> Result<Document, SourceError> {
        let mut doc = Document::new();
        doc.set_int("unixtime", self.unixtime);

        let mut x = Extract { row, doc: &mut doc };
        self.issue(&mut x)?;
        self.series(&mut x)?;
        self.publisher(&mut x);
        self.indicia_publisher(&mut x);
        self.brand(&mut x);
        if let Some(story_id) = row.int("story_id")? {
            self.story(&mut x, story_id);
        }
        Ok(doc)
    }

    fn issue<R: SourceRow + ?Sized>(&self, x: &mut Extract<'_, R>) -> Result<(), SourceError> {
        x.required("issue_id", "issue_id")?;
        x.text("issue_number_raw", "issue_number_raw");
        // many issue numbers are not numeric ("1/2", "Annual"); skipped quietly
        if let Ok(Some(number)) = x.row.text("issue_number_raw") {
            if let Ok(n) = number.trim().parse::<i32>() {
                x.doc.set_int("issue_number", i64::from(n));
            }
        }
        x.date("pubdateraw", "publication_date");
        x.text("price", "price_raw");
        x.multi("price", "price");
        x.int_or_unset("page_count", "page_count");
        x.text("indicia_frequency", "indicia_frequency");
        x.text("isbn", "isbn");
        x.text("variant_name", "variant_name");
        x.int("variant_of_issue_id", "variant_of_issue_id");
        x.text("barcode", "barcode");
        x.text("title", "title");
        x.date("onsaledateraw", "on_sale_date");
        x.text("rating", "rating");
        if self.profile.volume_not_printed {
            x.int("volume_not_printed", "volume_not_printed");
        }
        x.multi("editing", "editing");
        x.text("notes", "notes");
        x.epoch_or_unset("created", "created");
        x.epoch_or_unset("modified", "modified");
        Ok(())
    }

    fn series<R: SourceRow + ?Sized>(&self, x: &mut Extract<'_, R>) -> Result<(), SourceError> {
        x.required("series_id", "series_id")?;
        x.text("series_name", "series_name");
        x.int_or_unset("series_year_began", "series_year_began");
        x.int_or_unset("series_year_ended", "series_year_ended");
        x.int("series_is_current", "series_is_current");
        x.lookup(self.catalog, Lookup::Country, "scountryid", "series_country_code");
        x.lookup(self.catalog, Lookup::Language, "slangid", "series_language_code");
        x.int("series_has_gallery", "series_has_gallery");
        x.int("series_is_comics_publication", "series_is_comics_publication");
        x.text("series_color", "series_color");
        x.text("series_dimensions", "series_dimensions");
        x.text("series_paper_stock", "series_paper_stock");
        x.multi("series_binding", "series_binding");
        x.text("series_publishing_format", "series_publishing_format");
        if self.profile.publication_type {
            x.lookup(self.catalog, Lookup::PublicationType, "spubtypeid", "series_publication_type");
        }
        if self.profile.series_is_singleton {
            x.int("series_is_singleton", "series_is_singleton");
        }
        x.epoch_or_unset("series_created", "series_created");
        x.epoch_or_unset("series_modified", "series_modified");
        Ok(())
    }

    fn publisher<R: SourceRow + ?Sized>(&self, x: &mut Extract<'_, R>) {
        x.int("publisher_id", "publisher_id");
        x.text("publisher_name", "publisher_name");
        x.lookup(self.catalog, Lookup::Country, "pubcountryid", "publisher_country_code");
        x.text("publisher_url", "publisher_url");
        x.epoch_or_unset("publisher_created", "publisher_created");
        x.epoch_or_unset("publisher_modified", "publisher_modified");
    }

    fn indicia_publisher<R: SourceRow + ?Sized>(&self, x: &mut Extract<'_, R>) {
        x.int("indicia_publisher_id", "indicia_publisher_id");
        x.text("indicia_publisher_name", "indicia_publisher_name");
        x.lookup(self.catalog, Lookup::Country, "indpubcountryid", "indicia_publisher_country_code");
        x.int("indicia_publisher_parent_id", "indicia_publisher_parent_id");
        x.int_or_unset("indicia_publisher_year_began", "indicia_publisher_year_began");
        x.int_or_unset("indicia_publisher_year_ended", "indicia_publisher_year_ended");
        x.int("indicia_publisher_is_surrogate", "indicia_publisher_is_surrogate");
        x.text("indicia_publisher_url", "indicia_publisher_url");
        x.epoch_or_unset("indicia_publisher_created", "indicia_publisher_created");
        x.epoch_or_unset("indicia_publisher_modified", "indicia_publisher_modified");
    }

    fn brand<R: SourceRow + ?Sized>(&self, x: &mut Extract<'_, R>) {
        x.int("brand_id", "brand_id");
        x.text("brand_name", "brand_name");
        x.text("brand_url", "brand_url");
        x.epoch_or_unset("brand_created", "brand_created");
        x.epoch_or_unset("brand_modified", "brand_modified");
    }

    fn story<R: SourceRow + ?Sized>(&self, x: &mut Extract<'_, R>, story_id: i64) {
        x.doc.set_int("story_id", story_id);
        x.text("story_title", "story_title");
        x.text("story_feature", "story_feature");
        x.int_or_unset("story_sequence_number", "story_sequence_number");
        x.int_or_unset("story_page_count", "story_page_count");

        match self.credits.get(story_id) {
            Some(credits) => {
                for role in Role::ALL {
                    let names = credits.role_names(role);
                    if !names.is_empty() {
                        x.doc.set(role.field(), Value::TextList(names.to_vec()));
                        x.doc
                            .set(role.creator_id_field(), Value::IntList(credits.role_ids(role).to_vec()));
                    }
                }
                x.doc.set_text("story_credit_source", CREDIT_SOURCE_TABLE);
            }
            None => {
                for column in LEGACY_CREDIT_COLUMNS {
                    x.multi(column, column);
                }
                x.doc.set_text("story_credit_source", CREDIT_SOURCE_STORY);
            }
        }

        x.multi("story_genre", "story_genre");
        x.multi("story_characters", "story_characters");
        x.lookup(self.catalog, Lookup::StoryType, "strtypeid", "story_type");
        x.text("story_job_number", "story_job_number");
        if self.profile.story_first_line {
            x.text("story_first_line", "story_first_line");
        }
        x.epoch_or_unset("story_created", "story_created");
        x.epoch_or_unset("story_modified", "story_modified");
    }
}

/// One row being read into one document
struct Extract<'d, R: ?Sized> {
    row: &'d R,
    doc: &'d mut Document,
}

impl<R: SourceRow + ?Sized> Extract<'_, R> {
    fn required(&mut self, column: &str, attr: &'static str) -> Result<(), SourceError> {
        let value = self
            .row
            .int(column)?
            .ok_or_else(|| SourceError::Null(column.to_string()))?;
        self.doc.set_int(attr, value);
        Ok(())
    }

    fn int(&mut self, column: &str, attr: &'static str) {
        if let Some(v) = settle(column, self.row.int(column), None) {
            self.doc.set_int(attr, v);
        }
    }

    fn int_or_unset(&mut self, column: &str, attr: &'static str) {
        let v = settle(column, self.row.int(column), Some(UNSET)).unwrap_or(UNSET);
        self.doc.set_int(attr, v);
    }

    fn text(&mut self, column: &str, attr: &'static str) {
        if let Some(v) = settle(column, self.row.text(column), None) {
            self.doc.set_text(attr, v);
        }
    }

    /// Present but blank values give an empty list, NULL gives nothing.
    fn multi(&mut self, column: &str, attr: &'static str) {
        if let Some(raw) = settle(column, self.row.text(column), None) {
            self.doc.set(attr, Value::TextList(split_multi(&raw)));
        }
    }

    fn lookup(&mut self, catalog: &MetadataCatalog, table: Lookup, column: &str, attr: &'static str) {
        let resolved = settle(column, self.row.int(column), None)
            .and_then(|code| catalog.resolve(table, code));
        if let Some(s) = resolved {
            self.doc.set_text(attr, s);
        }
    }

    fn date(&mut self, column: &str, attr: &'static str) {
        let v = settle(column, self.row.text(column), None)
            .map_or(UNSET_DATE, |raw| canonical_date(&raw));
        self.doc.set_int(attr, v);
    }

    fn epoch_or_unset(&mut self, column: &str, attr: &'static str) {
        let v = settle(column, self.row.int(column), None)
            .and_then(epoch_date)
            .unwrap_or(UNSET_DATE);
        self.doc.set_int(attr, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CodeMap;
    use crate::credit::CreditRow;
    use crate::document::field_spec;
    use crate::source::fake::FakeRow;
    use duckdb::types::Value as SqlValue;

    fn snapshot() -> Snapshot {
        Snapshot::parse("2021-03-05").unwrap()
    }

    fn catalog() -> MetadataCatalog {
        let codes = |pairs: &[(i64, &str)]| -> CodeMap {
            pairs.iter().map(|&(k, v)| (k, v.to_string())).collect()
        };
        MetadataCatalog::new(
            codes(&[(225, "us"), (36, "ca")]),
            codes(&[(25, "en")]),
            codes(&[(1, "magazine")]),
            codes(&[(19, "comic story")]),
        )
    }

    fn issue_row() -> FakeRow {
        FakeRow::new()
            .with_int("issue_id", 1001)
            .with_int("series_id", 55)
            .with_text("issue_number_raw", "12")
            .with_text("pubdateraw", "1962-08-00")
            .with_text("price", "0.12 USD; 0.15 CAD")
            .with("page_count", SqlValue::Double(36.0))
            .with_int("scountryid", 225)
            .with_int("slangid", 999)
            .with_int("series_is_singleton", 0)
            .with_int("created", 1_614_924_000)
            .with_int("modified", 0)
            .with_null("story_id")
    }

    #[test]
    fn split_multi_trims_and_drops_empty() {
        assert_eq!(split_multi("A ; B;C"), vec!["A", "B", "C"]);
        assert_eq!(split_multi("Jane Doe;John Roe"), vec!["Jane Doe", "John Roe"]);
        assert!(split_multi("").is_empty());
        assert!(split_multi(" ; ").is_empty());
        assert_eq!(split_multi("A;;B"), vec!["A", "B"]);
    }

    #[test]
    fn settle_logs_and_defaults() {
        assert_eq!(settle("c", Ok(Some(3)), Some(-1)), Some(3));
        assert_eq!(settle::<i64>("c", Ok(None), Some(-1)), Some(-1));
        assert_eq!(settle::<i64>("c", Ok(None), None), None);
        let failed = Err(SourceError::MissingColumn("c".into()));
        assert_eq!(settle::<i64>("c", failed, Some(-1)), Some(-1));
    }

    #[test]
    fn maps_issue_level_attributes() {
        let catalog = catalog();
        let credits = CreditIndex::empty();
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());
        let doc = mapper.map_row(&issue_row()).unwrap();

        assert_eq!(doc.int("unixtime"), Some(1_614_924_000));
        assert_eq!(doc.int("issue_id"), Some(1001));
        assert_eq!(doc.int("series_id"), Some(55));
        assert_eq!(doc.int("issue_number"), Some(12));
        assert_eq!(doc.text("issue_number_raw"), Some("12"));
        assert_eq!(doc.int("publication_date"), Some(19620800));
        assert_eq!(doc.text("price_raw"), Some("0.12 USD; 0.15 CAD"));
        assert_eq!(doc.texts("price").unwrap(), ["0.12 USD", "0.15 CAD"]);
        assert_eq!(doc.int("page_count"), Some(36));
        assert_eq!(doc.text("series_country_code"), Some("us"));
        // unmapped language code
        assert!(!doc.contains("series_language_code"));
        assert_eq!(doc.int("series_is_singleton"), Some(0));
        assert_eq!(doc.int("created"), Some(20210305));
        assert_eq!(doc.int("modified"), Some(-1));
    }

    #[test]
    fn missing_optional_columns_take_defaults() {
        let catalog = catalog();
        let credits = CreditIndex::empty();
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());
        let row = FakeRow::new()
            .with_int("issue_id", 1)
            .with_int("series_id", 2)
            .with_null("story_id");
        let doc = mapper.map_row(&row).unwrap();

        for attr in [
            "page_count",
            "series_year_began",
            "series_year_ended",
            "indicia_publisher_year_began",
            "indicia_publisher_year_ended",
            "publication_date",
            "on_sale_date",
            "created",
            "series_modified",
            "indicia_publisher_created",
            "brand_created",
            "brand_modified",
        ] {
            assert_eq!(doc.int(attr), Some(-1), "{attr}");
        }
        for attr in ["title", "issue_number", "price", "story_id"] {
            assert!(!doc.contains(attr), "{attr}");
        }
    }

    #[test]
    fn non_numeric_issue_number_is_skipped() {
        let catalog = catalog();
        let credits = CreditIndex::empty();
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());
        let doc = mapper
            .map_row(&issue_row().with_text("issue_number_raw", "Annual 1"))
            .unwrap();
        assert_eq!(doc.text("issue_number_raw"), Some("Annual 1"));
        assert!(!doc.contains("issue_number"));
    }

    #[test]
    fn bad_date_and_mistyped_column() {
        let catalog = catalog();
        let credits = CreditIndex::empty();
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());
        let row = issue_row()
            .with_text("pubdateraw", "not-a-date")
            .with_text("series_year_began", "nineteen sixty");
        let doc = mapper.map_row(&row).unwrap();
        assert_eq!(doc.int("publication_date"), Some(-1));
        assert_eq!(doc.int("series_year_began"), Some(-1));
    }

    #[test]
    fn required_ids_fail_the_row() {
        let catalog = catalog();
        let credits = CreditIndex::empty();
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());

        let null_series = issue_row().with_null("series_id");
        assert!(matches!(mapper.map_row(&null_series), Err(SourceError::Null(_))));

        let bad_issue = issue_row().with_text("issue_id", "abc");
        assert!(matches!(
            mapper.map_row(&bad_issue),
            Err(SourceError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn disabled_flags_skip_extraction() {
        let catalog = catalog();
        let credits = CreditIndex::empty();
        let profile = SchemaProfile {
            series_is_singleton: false,
            publication_type: false,
            volume_not_printed: false,
            story_first_line: false,
            story_credit: true,
        };
        let mapper = RowMapper::new(&catalog, &credits, profile, &snapshot());
        let row = FakeRow::new()
            .with_int("issue_id", 1)
            .with_int("series_id", 2)
            .with_int("story_id", 3)
            .with_int("series_is_singleton", 1)
            .with_int("spubtypeid", 1)
            .with_int("volume_not_printed", 1)
            .with_text("story_first_line", "It was a dark and stormy night");
        let doc = mapper.map_row(&row).unwrap();
        for attr in [
            "series_is_singleton",
            "series_publication_type",
            "volume_not_printed",
            "story_first_line",
        ] {
            assert!(!doc.contains(attr), "{attr}");
        }
    }

    #[test]
    fn story_credits_from_index() {
        let catalog = catalog();
        let credits = CreditIndex::build(vec![
            CreditRow { story_id: 7, credit_type: 1, creator_id: 10, name: "Stan Lee".into() },
            CreditRow { story_id: 7, credit_type: 7, creator_id: 20, name: "Jack Kirby".into() },
        ]);
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());
        let row = issue_row()
            .with_int("story_id", 7)
            .with_text("story_script", "Somebody Else")
            .with_int("strtypeid", 19);
        let doc = mapper.map_row(&row).unwrap();

        assert_eq!(doc.text("story_credit_source"), Some(CREDIT_SOURCE_TABLE));
        assert_eq!(doc.texts("story_script").unwrap(), ["Stan Lee"]);
        assert_eq!(doc.ints("story_script_creator_id").unwrap(), [10]);
        assert_eq!(doc.texts("story_pencils").unwrap(), ["Jack Kirby"]);
        assert_eq!(doc.texts("story_inks").unwrap(), ["Jack Kirby"]);
        assert_eq!(doc.ints("story_inks_creator_id").unwrap(), [20]);
        assert!(!doc.contains("story_colors"));
        assert!(!doc.contains("story_colors_creator_id"));
        assert_eq!(doc.text("story_type"), Some("comic story"));
        assert_eq!(doc.int("story_sequence_number"), Some(-1));
    }

    #[test]
    fn story_credits_fall_back_to_legacy_columns() {
        let catalog = catalog();
        let credits = CreditIndex::empty();
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());
        let row = issue_row()
            .with_int("story_id", 8)
            .with_text("story_script", "Jane Doe;John Roe")
            .with_text("story_pencils", "")
            .with_text("story_inks", " ; ")
            .with_text("story_genre", "superhero; humor");
        let doc = mapper.map_row(&row).unwrap();

        assert_eq!(doc.text("story_credit_source"), Some(CREDIT_SOURCE_STORY));
        assert_eq!(doc.texts("story_script").unwrap(), ["Jane Doe", "John Roe"]);
        assert_eq!(doc.texts("story_pencils"), Some(&[][..]));
        assert_eq!(doc.texts("story_inks"), Some(&[][..]));
        assert!(!doc.contains("story_colors"));
        assert!(!doc.contains("story_script_creator_id"));
        assert_eq!(doc.texts("story_genre").unwrap(), ["superhero", "humor"]);
    }

    #[test]
    fn null_story_skips_story_block() {
        let catalog = catalog();
        let credits = CreditIndex::empty();
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());
        let doc = mapper
            .map_row(&issue_row().with_text("story_title", "ignored"))
            .unwrap();
        assert!(!doc.contains("story_title"));
        assert!(!doc.contains("story_credit_source"));
    }

    #[test]
    fn every_emitted_attribute_is_catalogued() {
        let catalog = catalog();
        let credits = CreditIndex::build(vec![CreditRow {
            story_id: 7,
            credit_type: 13,
            creator_id: 1,
            name: "Everyone".into(),
        }]);
        let mapper = RowMapper::new(&catalog, &credits, SchemaProfile::default(), &snapshot());
        let doc = mapper
            .map_row(&issue_row().with_int("story_id", 7).with_text("story_title", "t"))
            .unwrap();
        for (name, _) in doc.iter() {
            assert!(field_spec(name).is_some(), "{name}");
        }
    }
}
