//! Output documents and the field catalog both sinks derive their schema from

use rustc_hash::FxHashMap;

/// One attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
    TextList(Vec<String>),
    IntList(Vec<i64>),
}

/// Storage kind of a catalog field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 64-bit ids and timestamps
    Long,
    /// 32-bit counts, years and `YYYYMMDD` dates
    Int,
    /// 0/1 integer; boolean `value == 1` in columnar output
    Flag,
    Text,
    TextList,
    LongList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Present on every document
    pub required: bool,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind, required: false }
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind, required: true }
}

use FieldKind::{Flag, Int, Long, LongList, Text, TextList};

/// Every attribute a document can carry, in output column order
#[rustfmt::skip]
pub const FIELDS: &[FieldSpec] = &[
    required("unixtime", Long),
    required("issue_id", Long),
    field("issue_number_raw", Text),
    field("issue_number", Int),
    field("publication_date", Int),
    field("price_raw", Text),
    field("price", TextList),
    field("page_count", Int),
    field("indicia_frequency", Text),
    field("isbn", Text),
    field("variant_name", Text),
    field("variant_of_issue_id", Long),
    field("barcode", Text),
    field("title", Text),
    field("on_sale_date", Int),
    field("rating", Text),
    field("volume_not_printed", Flag),
    field("editing", TextList),
    field("notes", Text),
    field("created", Int),
    field("modified", Int),
    required("series_id", Long),
    field("series_name", Text),
    field("series_year_began", Int),
    field("series_year_ended", Int),
    field("series_is_current", Flag),
    field("series_country_code", Text),
    field("series_language_code", Text),
    field("series_has_gallery", Flag),
    field("series_is_comics_publication", Flag),
    field("series_color", Text),
    field("series_dimensions", Text),
    field("series_paper_stock", Text),
    field("series_binding", TextList),
    field("series_publishing_format", Text),
    field("series_publication_type", Text),
    field("series_is_singleton", Flag),
    field("series_created", Int),
    field("series_modified", Int),
    field("publisher_id", Long),
    field("publisher_name", Text),
    field("publisher_country_code", Text),
    field("publisher_url", Text),
    field("publisher_created", Int),
    field("publisher_modified", Int),
    field("indicia_publisher_id", Long),
    field("indicia_publisher_name", Text),
    field("indicia_publisher_country_code", Text),
    field("indicia_publisher_parent_id", Long),
    field("indicia_publisher_year_began", Int),
    field("indicia_publisher_year_ended", Int),
    field("indicia_publisher_is_surrogate", Flag),
    field("indicia_publisher_url", Text),
    field("indicia_publisher_created", Int),
    field("indicia_publisher_modified", Int),
    field("brand_id", Long),
    field("brand_name", Text),
    field("brand_url", Text),
    field("brand_created", Int),
    field("brand_modified", Int),
    field("story_id", Long),
    field("story_title", Text),
    field("story_feature", Text),
    field("story_sequence_number", Int),
    field("story_page_count", Int),
    field("story_script", TextList),
    field("story_script_creator_id", LongList),
    field("story_pencils", TextList),
    field("story_pencils_creator_id", LongList),
    field("story_inks", TextList),
    field("story_inks_creator_id", LongList),
    field("story_colors", TextList),
    field("story_colors_creator_id", LongList),
    field("story_letters", TextList),
    field("story_letters_creator_id", LongList),
    field("story_editing", TextList),
    field("story_editing_creator_id", LongList),
    field("story_painting", TextList),
    field("story_painting_creator_id", LongList),
    field("story_credit_source", Text),
    field("story_genre", TextList),
    field("story_characters", TextList),
    field("story_type", Text),
    field("story_job_number", Text),
    field("story_first_line", Text),
    field("story_created", Int),
    field("story_modified", Int),
];

/// Catalog entry for an attribute name
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Attribute bag for one issue/story row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    attrs: FxHashMap<&'static str, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: Value) {
        debug_assert!(field_spec(name).is_some(), "{name} missing from FIELDS");
        self.attrs.insert(name, value);
    }

    pub fn set_int(&mut self, name: &'static str, value: i64) {
        self.set(name, Value::Int(value));
    }

    pub fn set_text(&mut self, name: &'static str, value: impl Into<String>) {
        self.set(name, Value::Text(value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.attrs.get(name) {
            Some(Value::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name) {
            Some(Value::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn texts(&self, name: &str) -> Option<&[String]> {
        match self.attrs.get(name) {
            Some(Value::TextList(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn ints(&self, name: &str) -> Option<&[i64]> {
        match self.attrs.get(name) {
            Some(Value::IntList(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.attrs.iter().map(|(k, v)| (*k, v))
    }
}
