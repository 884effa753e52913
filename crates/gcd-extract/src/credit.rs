//! Per-story creator credits from the GCD credit table.
//!
//! The credit table tags each credit with a type code. Most codes name one
//! creative role; a few are composites ("pencils and inks") that stand for
//! several roles at once. Composites are decomposed when a credit is recorded,
//! so the index only ever holds credits under atomic roles.
//!
//! Input must arrive ordered by story id. A story whose rows are not
//! contiguous ends up split across several records and only the last one is
//! reachable by lookup.

use std::fmt;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;

use crate::schema::credit_query;
use crate::source::{GcdSource, SourceRow};

/// An atomic creative role; each maps to one pair of document attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Script,
    Pencils,
    Inks,
    Colors,
    Letters,
    StoryEditing,
    Painting,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Script,
        Role::Pencils,
        Role::Inks,
        Role::Colors,
        Role::Letters,
        Role::StoryEditing,
        Role::Painting,
    ];

    /// Attribute holding the creator names
    pub fn field(self) -> &'static str {
        match self {
            Self::Script => "story_script",
            Self::Pencils => "story_pencils",
            Self::Inks => "story_inks",
            Self::Colors => "story_colors",
            Self::Letters => "story_letters",
            Self::StoryEditing => "story_editing",
            Self::Painting => "story_painting",
        }
    }

    /// Attribute holding the creator ids
    pub fn creator_id_field(self) -> &'static str {
        match self {
            Self::Script => "story_script_creator_id",
            Self::Pencils => "story_pencils_creator_id",
            Self::Inks => "story_inks_creator_id",
            Self::Colors => "story_colors_creator_id",
            Self::Letters => "story_letters_creator_id",
            Self::StoryEditing => "story_editing_creator_id",
            Self::Painting => "story_painting_creator_id",
        }
    }
}

/// A credit type code from `gcd_story_credit.credit_type_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditType {
    Atomic { code: i32, role: Role },
    Composite { code: i32, parts: &'static [i32] },
}

/// Every known credit type code
pub const CREDIT_TYPES: &[CreditType] = &[
    CreditType::Atomic { code: 1, role: Role::Script },
    CreditType::Atomic { code: 2, role: Role::Pencils },
    CreditType::Atomic { code: 3, role: Role::Inks },
    CreditType::Atomic { code: 4, role: Role::Colors },
    CreditType::Atomic { code: 5, role: Role::Letters },
    CreditType::Atomic { code: 6, role: Role::StoryEditing },
    CreditType::Composite { code: 7, parts: &[2, 3] },
    CreditType::Composite { code: 8, parts: &[2, 3, 4] },
    CreditType::Atomic { code: 9, role: Role::Painting },
    CreditType::Composite { code: 10, parts: &[1, 2, 3] },
    CreditType::Composite { code: 11, parts: &[1, 2, 3, 4] },
    CreditType::Composite { code: 12, parts: &[1, 2, 3, 5] },
    CreditType::Composite { code: 13, parts: &[1, 2, 3, 4, 5] },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditError {
    /// Names/ids were requested for a composite type
    InvalidArgument(String),
    UnknownCode(i32),
    /// Composite decomposition did not terminate
    Cycle(i32),
}

impl fmt::Display for CreditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::UnknownCode(code) => write!(f, "unknown credit type code {code}"),
            Self::Cycle(code) => write!(f, "credit type {code} decomposes into itself"),
        }
    }
}

impl std::error::Error for CreditError {}

impl CreditType {
    pub fn code(&self) -> i32 {
        match *self {
            Self::Atomic { code, .. } | Self::Composite { code, .. } => code,
        }
    }

    pub fn from_code(code: i32) -> Option<&'static CreditType> {
        CREDIT_TYPES.iter().find(|t| t.code() == code)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite { .. })
    }

    /// Atomic roles this type stands for, in declaration order
    pub fn roles(&self) -> Result<Vec<Role>, CreditError> {
        let mut out = Vec::new();
        self.expand(0, &mut out)?;
        Ok(out)
    }

    fn expand(&self, depth: usize, out: &mut Vec<Role>) -> Result<(), CreditError> {
        if depth > CREDIT_TYPES.len() {
            return Err(CreditError::Cycle(self.code()));
        }
        match *self {
            Self::Atomic { role, .. } => out.push(role),
            Self::Composite { parts, .. } => {
                for &code in parts {
                    CreditType::from_code(code)
                        .ok_or(CreditError::UnknownCode(code))?
                        .expand(depth + 1, out)?;
                }
            }
        }
        Ok(())
    }

    fn role(&self) -> Result<Role, CreditError> {
        match *self {
            Self::Atomic { role, .. } => Ok(role),
            Self::Composite { code, .. } => Err(CreditError::InvalidArgument(format!(
                "credit type {code} is a composite; query one of its atomic roles"
            ))),
        }
    }
}

/// Check the code table once at startup: codes are unique and every
/// composite resolves to atomic roles.
pub fn validate_credit_types() -> Result<(), CreditError> {
    for (i, t) in CREDIT_TYPES.iter().enumerate() {
        if CREDIT_TYPES[..i].iter().any(|o| o.code() == t.code()) {
            return Err(CreditError::InvalidArgument(format!(
                "duplicate credit type code {}",
                t.code()
            )));
        }
        t.roles()?;
    }
    Ok(())
}

/// Credits of one story, grouped by atomic role
#[derive(Debug, Clone, Default)]
pub struct StoryCredits {
    story_id: i64,
    names: FxHashMap<Role, Vec<String>>,
    ids: FxHashMap<Role, Vec<i64>>,
}

impl StoryCredits {
    pub fn new(story_id: i64) -> Self {
        Self {
            story_id,
            ..Default::default()
        }
    }

    pub fn story_id(&self) -> i64 {
        self.story_id
    }

    /// Record one creator under `credit_type`, fanning composites out to
    /// each of their roles.
    pub fn record(
        &mut self,
        credit_type: &CreditType,
        creator_id: i64,
        name: &str,
    ) -> Result<(), CreditError> {
        for role in credit_type.roles()? {
            self.names.entry(role).or_default().push(name.to_string());
            self.ids.entry(role).or_default().push(creator_id);
        }
        Ok(())
    }

    pub fn names(&self, credit_type: &CreditType) -> Result<&[String], CreditError> {
        Ok(self.role_names(credit_type.role()?))
    }

    pub fn ids(&self, credit_type: &CreditType) -> Result<&[i64], CreditError> {
        Ok(self.role_ids(credit_type.role()?))
    }

    pub fn role_names(&self, role: Role) -> &[String] {
        self.names.get(&role).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn role_ids(&self, role: Role) -> &[i64] {
        self.ids.get(&role).map(Vec::as_slice).unwrap_or_default()
    }
}

/// One row of the credit-detail query
#[derive(Debug, Clone)]
pub struct CreditRow {
    pub story_id: i64,
    pub credit_type: i32,
    pub creator_id: i64,
    pub name: String,
}

/// Story id → credits, read-only once built
#[derive(Debug, Default)]
pub struct CreditIndex {
    records: Vec<StoryCredits>,
    by_story: FxHashMap<i64, usize>,
    rejected: usize,
}

impl CreditIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from rows ordered by story id.
    pub fn build(rows: impl IntoIterator<Item = CreditRow>) -> Self {
        let mut builder = CreditIndexBuilder::default();
        for row in rows {
            builder.push(row);
        }
        builder.finish()
    }

    /// Stream the credit-detail query into an index.
    pub fn load(source: &GcdSource) -> Result<Self> {
        let mut builder = CreditIndexBuilder::default();
        source
            .for_each_row(credit_query(), |row| {
                let story_id = row.int("story_id")?;
                let credit_type = row.int("credit_type_id")?;
                let creator_id = row.int("creator_id")?;
                match (story_id, credit_type, creator_id) {
                    (Some(story_id), Some(credit_type), Some(creator_id)) => {
                        builder.push(CreditRow {
                            story_id,
                            credit_type: i32::try_from(credit_type).unwrap_or(-1),
                            creator_id,
                            name: row.text("name")?.unwrap_or_default(),
                        });
                    }
                    _ => builder.reject("credit row with NULL key column"),
                }
                Ok(())
            })
            .context("Failed to load story credits")?;
        let index = builder.finish();
        log::info!(
            "Loaded credit details for {} stories ({} credit rows skipped)",
            index.len(),
            index.rejected()
        );
        Ok(index)
    }

    /// Credits for a story, if it has any recorded
    pub fn get(&self, story_id: i64) -> Option<&StoryCredits> {
        self.by_story.get(&story_id).map(|&i| &self.records[i])
    }

    /// Names under an atomic type; empty for stories without credits.
    pub fn names(&self, story_id: i64, credit_type: &CreditType) -> Result<&[String], CreditError> {
        let role = credit_type.role()?;
        Ok(self.get(story_id).map(|c| c.role_names(role)).unwrap_or_default())
    }

    /// Creator ids under an atomic type; empty for stories without credits.
    pub fn ids(&self, story_id: i64, credit_type: &CreditType) -> Result<&[i64], CreditError> {
        let role = credit_type.role()?;
        Ok(self.get(story_id).map(|c| c.role_ids(role)).unwrap_or_default())
    }

    /// Distinct stories reachable by lookup
    pub fn len(&self) -> usize {
        self.by_story.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_story.is_empty()
    }

    /// Records built, including ones shadowed by a later fragment
    #[cfg(test)]
    fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Credit rows dropped for an unknown type code or NULL key
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

#[derive(Debug, Default)]
struct CreditIndexBuilder {
    index: CreditIndex,
}

impl CreditIndexBuilder {
    fn push(&mut self, row: CreditRow) {
        let Some(credit_type) = CreditType::from_code(row.credit_type) else {
            self.reject(&format!(
                "story {}: unknown credit type {}",
                row.story_id, row.credit_type
            ));
            return;
        };

        let same_story = self
            .index
            .records
            .last()
            .is_some_and(|last| last.story_id == row.story_id);
        if !same_story {
            self.index.records.push(StoryCredits::new(row.story_id));
            self.index
                .by_story
                .insert(row.story_id, self.index.records.len() - 1);
        }

        if let Some(current) = self.index.records.last_mut() {
            if let Err(e) = current.record(credit_type, row.creator_id, &row.name) {
                self.index.rejected += 1;
                log::warn!("story {}: {e}", row.story_id);
            }
        }
    }

    fn reject(&mut self, reason: &str) {
        self.index.rejected += 1;
        log::warn!("Skipping credit row: {reason}");
    }

    fn finish(self) -> CreditIndex {
        self.index
    }
}
