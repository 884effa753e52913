//! SQL generation for the GCD extraction queries.
//!
//! The main query is assembled from a column table; columns that only exist in
//! newer GCD dumps are gated on a [`SchemaProfile`] flag and left out of the
//! select list when the flag is off. Join structure never changes:
//! issue ⋈ series ⋈ publisher ⟕ indicia publisher ⟕ brand ⟕ story.

use serde::Deserialize;

/// Which optional parts of the GCD schema the source dump has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchemaProfile {
    pub publication_type: bool,
    pub volume_not_printed: bool,
    pub series_is_singleton: bool,
    pub story_first_line: bool,
    /// Per-story credit table (`gcd_story_credit`)
    pub story_credit: bool,
}

impl Default for SchemaProfile {
    fn default() -> Self {
        Self {
            publication_type: true,
            volume_not_printed: true,
            series_is_singleton: true,
            story_first_line: true,
            story_credit: true,
        }
    }
}

/// Columns that only exist in some dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalColumn {
    PublicationType,
    VolumeNotPrinted,
    SeriesIsSingleton,
    StoryFirstLine,
}

impl SchemaProfile {
    pub fn has(&self, column: OptionalColumn) -> bool {
        match column {
            OptionalColumn::PublicationType => self.publication_type,
            OptionalColumn::VolumeNotPrinted => self.volume_not_printed,
            OptionalColumn::SeriesIsSingleton => self.series_is_singleton,
            OptionalColumn::StoryFirstLine => self.story_first_line,
        }
    }
}

struct SelectColumn {
    expr: &'static str,
    alias: &'static str,
    gate: Option<OptionalColumn>,
}

impl SelectColumn {
    fn included(&self, profile: &SchemaProfile) -> bool {
        self.gate.map_or(true, |g| profile.has(g))
    }
}

const fn col(expr: &'static str, alias: &'static str) -> SelectColumn {
    SelectColumn { expr, alias, gate: None }
}

const fn gated(expr: &'static str, alias: &'static str, gate: OptionalColumn) -> SelectColumn {
    SelectColumn { expr, alias, gate: Some(gate) }
}

#[rustfmt::skip]
const ISSUE_COLUMNS: &[SelectColumn] = &[
    col("issue.id", "issue_id"),
    col("issue.number", "issue_number_raw"),
    col("issue.key_date", "pubdateraw"),
    col("issue.price", "price"),
    col("CAST(issue.page_count AS DOUBLE)", "page_count"),
    col("issue.indicia_frequency", "indicia_frequency"),
    col("issue.isbn", "isbn"),
    col("issue.variant_name", "variant_name"),
    col("issue.variant_of_id", "variant_of_issue_id"),
    col("issue.barcode", "barcode"),
    col("issue.title", "title"),
    col("issue.on_sale_date", "onsaledateraw"),
    col("issue.rating", "rating"),
    gated("issue.volume_not_printed", "volume_not_printed", OptionalColumn::VolumeNotPrinted),
    col("issue.editing", "editing"),
    col("issue.notes", "notes"),
    col("CAST(epoch(issue.created) AS BIGINT)", "created"),
    col("CAST(epoch(issue.modified) AS BIGINT)", "modified"),
    col("series.id", "series_id"),
    col("series.name", "series_name"),
    col("series.year_began", "series_year_began"),
    col("series.year_ended", "series_year_ended"),
    col("series.is_current", "series_is_current"),
    col("series.country_id", "scountryid"),
    col("series.language_id", "slangid"),
    col("series.has_gallery", "series_has_gallery"),
    col("series.is_comics_publication", "series_is_comics_publication"),
    col("series.color", "series_color"),
    col("series.dimensions", "series_dimensions"),
    col("series.paper_stock", "series_paper_stock"),
    col("series.binding", "series_binding"),
    col("series.publishing_format", "series_publishing_format"),
    gated("series.publication_type_id", "spubtypeid", OptionalColumn::PublicationType),
    gated("series.is_singleton", "series_is_singleton", OptionalColumn::SeriesIsSingleton),
    col("CAST(epoch(series.created) AS BIGINT)", "series_created"),
    col("CAST(epoch(series.modified) AS BIGINT)", "series_modified"),
    col("publisher.id", "publisher_id"),
    col("publisher.name", "publisher_name"),
    col("publisher.country_id", "pubcountryid"),
    col("publisher.url", "publisher_url"),
    col("CAST(epoch(publisher.created) AS BIGINT)", "publisher_created"),
    col("CAST(epoch(publisher.modified) AS BIGINT)", "publisher_modified"),
    col("indicia.id", "indicia_publisher_id"),
    col("indicia.name", "indicia_publisher_name"),
    col("indicia.country_id", "indpubcountryid"),
    col("indicia.parent_id", "indicia_publisher_parent_id"),
    col("indicia.year_began", "indicia_publisher_year_began"),
    col("indicia.year_ended", "indicia_publisher_year_ended"),
    col("indicia.is_surrogate", "indicia_publisher_is_surrogate"),
    col("indicia.url", "indicia_publisher_url"),
    col("CAST(epoch(indicia.created) AS BIGINT)", "indicia_publisher_created"),
    col("CAST(epoch(indicia.modified) AS BIGINT)", "indicia_publisher_modified"),
    col("brand.id", "brand_id"),
    col("brand.name", "brand_name"),
    col("brand.url", "brand_url"),
    col("CAST(epoch(brand.created) AS BIGINT)", "brand_created"),
    col("CAST(epoch(brand.modified) AS BIGINT)", "brand_modified"),
    col("story.id", "story_id"),
    col("story.title", "story_title"),
    col("story.feature", "story_feature"),
    col("story.sequence_number", "story_sequence_number"),
    col("CAST(story.page_count AS DOUBLE)", "story_page_count"),
    col("story.script", "story_script"),
    col("story.pencils", "story_pencils"),
    col("story.inks", "story_inks"),
    col("story.colors", "story_colors"),
    col("story.letters", "story_letters"),
    col("story.editing", "story_editing"),
    col("story.genre", "story_genre"),
    col("story.characters", "story_characters"),
    col("story.type_id", "strtypeid"),
    col("story.job_number", "story_job_number"),
    gated("story.first_line", "story_first_line", OptionalColumn::StoryFirstLine),
    col("CAST(epoch(story.created) AS BIGINT)", "story_created"),
    col("CAST(epoch(story.modified) AS BIGINT)", "story_modified"),
];

const ISSUE_FROM: &str = "\
FROM gcd_issue AS issue
  INNER JOIN gcd_series AS series ON issue.series_id = series.id
  INNER JOIN gcd_publisher AS publisher ON series.publisher_id = publisher.id
  LEFT OUTER JOIN gcd_indicia_publisher AS indicia ON issue.indicia_publisher_id = indicia.id
  LEFT OUTER JOIN gcd_brand AS brand ON issue.brand_id = brand.id
  LEFT OUTER JOIN gcd_story AS story ON story.issue_id = issue.id";

/// Returns the main issue/story query for the given profile.
pub fn issue_query(profile: &SchemaProfile) -> String {
    let select = ISSUE_COLUMNS
        .iter()
        .filter(|c| c.included(profile))
        .map(|c| format!("  {} AS {}", c.expr, c.alias))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("SELECT\n{select}\n{ISSUE_FROM}")
}

/// Result-set column names of the main query for the given profile
pub fn issue_columns(profile: &SchemaProfile) -> Vec<&'static str> {
    ISSUE_COLUMNS
        .iter()
        .filter(|c| c.included(profile))
        .map(|c| c.alias)
        .collect()
}

/// Returns the credit-detail query, ordered by story id.
pub fn credit_query() -> &'static str {
    "SELECT c.story_id AS story_id, c.credit_type_id AS credit_type_id, \
            cr.gcd_official_name AS name, cr.id AS creator_id \
     FROM gcd_story_credit AS c \
       INNER JOIN gcd_creator_name_detail AS n ON c.creator_id = n.id \
       INNER JOIN gcd_creator AS cr ON n.creator_id = cr.id \
     ORDER BY c.story_id"
}
