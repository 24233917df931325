//! Typed records, one struct per entity kind.
//!
//! Field names serialize exactly as they appear in the record files.
//! Cross-references are plain ids; resolution happens in the validator.

use crate::types::*;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Common accessors shared by every record kind.
pub trait Record {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn tags(&self) -> &[String];

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::KIND, self.id())
    }
}

// ============================================================
// Institution
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompositionInfo {
    pub total_members: Option<u32>,
    pub how_appointed: Option<String>,
    pub term_length: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeadershipEntry {
    pub name: String,
    pub role: String,
    pub since: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HierarchyInfo {
    pub parent: Option<String>,
    pub children: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Institution {
    pub id: String,
    pub name_official: String,
    pub name_common: String,
    pub acronym: String,
    #[serde(rename = "type")]
    pub branch: InstitutionType,
    pub jurisdiction: String,
    pub established: Option<NaiveDate>,
    pub constitutional_basis: Option<String>,
    pub description: String,
    pub key_functions: Vec<String>,
    pub composition: Option<CompositionInfo>,
    pub current_leadership: Vec<LeadershipEntry>,
    pub hierarchy: Option<HierarchyInfo>,
    pub related_institutions: Vec<String>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Institution {
    pub fn parent(&self) -> Option<&str> {
        self.hierarchy.as_ref().and_then(|h| h.parent.as_deref())
    }

    pub fn children(&self) -> &[String] {
        self.hierarchy.as_ref().map(|h| h.children.as_slice()).unwrap_or(&[])
    }
}

// ============================================================
// Figure
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    pub year: Option<i32>,
}

/// One position held. `end_date: None` means the position is current.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CareerEntry {
    pub role: String,
    pub institution: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl CareerEntry {
    pub fn is_current(&self) -> bool {
        self.end_date.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartyAffiliation {
    pub party: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Controversy {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub summary: String,
    pub sources: Vec<String>,
    pub status: ControversyStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicPosition {
    pub topic: String,
    pub position: String,
    pub source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Figure {
    pub id: String,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub birth_place: Option<String>,
    pub education: Vec<EducationEntry>,
    pub career: Vec<CareerEntry>,
    pub party_affiliations: Vec<PartyAffiliation>,
    /// Event ids.
    pub key_decisions: Vec<String>,
    pub controversies: Vec<Controversy>,
    pub public_positions: Vec<PublicPosition>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Figure {
    /// Role of the most recent open-ended career entry.
    pub fn current_role(&self) -> Option<&str> {
        self.career.iter().rev().find(|c| c.is_current()).map(|c| c.role.as_str())
    }

    /// Institution of the most recent open-ended career entry.
    pub fn current_institution(&self) -> Option<&str> {
        self.career
            .iter()
            .rev()
            .find(|c| c.is_current())
            .map(|c| c.institution.as_str())
    }
}

// ============================================================
// Event
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventActor {
    pub figure_id: String,
    pub role: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub summary: String,
    pub detailed_description: Option<String>,
    pub significance: Option<String>,
    pub actors: Vec<EventActor>,
    pub institutions_involved: Vec<String>,
    /// Events that preceded or produced this one.
    pub causes: Vec<String>,
    /// Events this one produced.
    pub consequences: Vec<String>,
    pub timeline_group: Option<String>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

// ============================================================
// Relationship
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Relationship {
    pub id: String,
    pub source_type: EntityKind,
    pub source_id: String,
    pub target_type: EntityKind,
    pub target_id: String,
    pub relationship_type: RelationshipType,
    pub description: String,
    pub start_date: Option<NaiveDate>,
    /// `None` means the relationship is ongoing.
    pub end_date: Option<NaiveDate>,
    pub strength: RelationshipStrength,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Relationship {
    pub fn source(&self) -> EntityRef {
        EntityRef::new(self.source_type, &self.source_id)
    }

    pub fn target(&self) -> EntityRef {
        EntityRef::new(self.target_type, &self.target_id)
    }

    /// Whether the validity interval contains `date`. Open bounds are unbounded.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |s| s <= date) && self.end_date.map_or(true, |e| date <= e)
    }
}

// ============================================================
// Glossary
// ============================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GlossaryTerm {
    pub id: String,
    pub term_pt: String,
    pub term_en: Option<String>,
    pub definition: String,
    pub legal_definition: Option<String>,
    pub example: Option<String>,
    pub related_terms: Vec<String>,
    pub related_institutions: Vec<String>,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

macro_rules! impl_record {
    ($ty:ty, $kind:expr) => {
        impl Record for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn tags(&self) -> &[String] {
                &self.tags
            }
        }
    };
}

impl_record!(Institution, EntityKind::Institution);
impl_record!(Figure, EntityKind::Figure);
impl_record!(Event, EntityKind::Event);
impl_record!(Relationship, EntityKind::Relationship);
impl_record!(GlossaryTerm, EntityKind::Glossary);

/// Any validated record. Serializes as the bare record (no kind tag).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Institution(Institution),
    Figure(Figure),
    Event(Event),
    Relationship(Relationship),
    Glossary(GlossaryTerm),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Institution(_) => EntityKind::Institution,
            Self::Figure(_) => EntityKind::Figure,
            Self::Event(_) => EntityKind::Event,
            Self::Relationship(_) => EntityKind::Relationship,
            Self::Glossary(_) => EntityKind::Glossary,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Institution(r) => &r.id,
            Self::Figure(r) => &r.id,
            Self::Event(r) => &r.id,
            Self::Relationship(r) => &r.id,
            Self::Glossary(r) => &r.id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind(), self.id())
    }
}

impl From<Institution> for Entity {
    fn from(r: Institution) -> Self {
        Self::Institution(r)
    }
}

impl From<Figure> for Entity {
    fn from(r: Figure) -> Self {
        Self::Figure(r)
    }
}

impl From<Event> for Entity {
    fn from(r: Event) -> Self {
        Self::Event(r)
    }
}

impl From<Relationship> for Entity {
    fn from(r: Relationship) -> Self {
        Self::Relationship(r)
    }
}

impl From<GlossaryTerm> for Entity {
    fn from(r: GlossaryTerm) -> Self {
        Self::Glossary(r)
    }
}
