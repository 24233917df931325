//! Shape validation: raw YAML value → typed record.
//!
//! Every field is checked before giving up, so one `ShapeError` lists all the
//! problems in a record. Nested fields are reported with dotted/indexed paths
//! (`career[1].end_date`). Unknown fields are ignored.

use crate::model::*;
use crate::types::*;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// One offending field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub problem: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.problem)
    }
}

/// All field problems found in one record.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{kind} record '{}' has {} invalid field(s): {}", .id.as_deref().unwrap_or("?"), .fields.len(), join_fields(.fields))]
pub struct ShapeError {
    pub kind: EntityKind,
    /// The record's `id`, when it could be read at all.
    pub id: Option<String>,
    pub fields: Vec<FieldError>,
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Dispatch on kind.
pub fn validate_shape(kind: EntityKind, raw: &Value) -> Result<Entity, ShapeError> {
    match kind {
        EntityKind::Institution => validate_institution(raw).map(Entity::from),
        EntityKind::Figure => validate_figure(raw).map(Entity::from),
        EntityKind::Event => validate_event(raw).map(Entity::from),
        EntityKind::Relationship => validate_relationship(raw).map(Entity::from),
        EntityKind::Glossary => validate_glossary_term(raw).map(Entity::from),
    }
}

/// Identifier slug: lowercase ASCII, digits, `-`, `_`.
pub fn is_valid_id(id: &str) -> bool {
    static SLUG: OnceLock<Option<Regex>> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").ok())
        .as_ref()
        .map(|re| re.is_match(id))
        .unwrap_or(false)
}

// ============================================================
// Per-kind shapes
// ============================================================

pub fn validate_institution(raw: &Value) -> Result<Institution, ShapeError> {
    shape(EntityKind::Institution, raw, |f| {
        let id = f.id("id");
        let name_official = f.required_str("name_official");
        let name_common = f.required_str("name_common");
        let acronym = f.required_str("acronym");
        let branch = f.required_enum::<InstitutionType>("type");
        let jurisdiction = f.required_str("jurisdiction");
        let established = f.opt_date("established");
        let constitutional_basis = f.opt_str("constitutional_basis");
        let description = f.required_str("description");
        let key_functions = f.str_list("key_functions");
        let composition = f.object("composition", |c| {
            Some(CompositionInfo {
                total_members: c.opt_u32("total_members"),
                how_appointed: c.opt_str("how_appointed"),
                term_length: c.opt_str("term_length"),
            })
        });
        let current_leadership = f.list("current_leadership", |l| {
            let name = l.required_str("name");
            let role = l.required_str("role");
            let since = l.opt_date("since");
            Some(LeadershipEntry { name: name?, role: role?, since })
        });
        let hierarchy = f.object("hierarchy", |h| {
            Some(HierarchyInfo {
                parent: h.opt_id("parent"),
                children: h.id_list("children"),
            })
        });
        let related_institutions = f.id_list("related_institutions");
        let (tags, sources, last_updated) = f.metadata();

        Some(Institution {
            id: id?,
            name_official: name_official?,
            name_common: name_common?,
            acronym: acronym?,
            branch: branch?,
            jurisdiction: jurisdiction?,
            established,
            constitutional_basis,
            description: description?,
            key_functions,
            composition,
            current_leadership,
            hierarchy,
            related_institutions,
            tags,
            sources,
            last_updated,
        })
    })
}

pub fn validate_figure(raw: &Value) -> Result<Figure, ShapeError> {
    shape(EntityKind::Figure, raw, |f| {
        let id = f.id("id");
        let full_name = f.required_str("full_name");
        let birth_date = f.opt_date("birth_date");
        let birth_place = f.opt_str("birth_place");
        let education = f.list("education", |e| {
            let institution = e.required_str("institution");
            let degree = e.required_str("degree");
            let year = e.opt_i32("year");
            Some(EducationEntry {
                institution: institution?,
                degree: degree?,
                year,
            })
        });
        let career = f.list("career", |c| {
            let role = c.required_str("role");
            let institution = c.required_str("institution");
            let start_date = c.opt_date("start_date");
            let end_date = c.opt_date("end_date");
            c.check_order("end_date", start_date, end_date);
            let description = c.opt_str("description");
            Some(CareerEntry {
                role: role?,
                institution: institution?,
                start_date,
                end_date,
                description,
            })
        });
        f.check_open_career(&career);
        let party_affiliations = f.list("party_affiliations", |p| {
            let party = p.required_str("party");
            let start = p.opt_date("start");
            let end = p.opt_date("end");
            p.check_order("end", start, end);
            Some(PartyAffiliation { party: party?, start, end })
        });
        let key_decisions = f.id_list("key_decisions");
        let controversies = f.list("controversies", |c| {
            let title = c.required_str("title");
            let date = c.opt_date("date");
            let summary = c.required_str("summary");
            let sources = c.str_list("sources");
            let status = c.required_enum::<ControversyStatus>("status");
            Some(Controversy {
                title: title?,
                date,
                summary: summary?,
                sources,
                status: status?,
            })
        });
        let public_positions = f.list("public_positions", |p| {
            let topic = p.required_str("topic");
            let position = p.required_str("position");
            let source = p.opt_str("source");
            Some(PublicPosition {
                topic: topic?,
                position: position?,
                source,
            })
        });
        let (tags, sources, last_updated) = f.metadata();

        Some(Figure {
            id: id?,
            full_name: full_name?,
            birth_date,
            birth_place,
            education,
            career,
            party_affiliations,
            key_decisions,
            controversies,
            public_positions,
            tags,
            sources,
            last_updated,
        })
    })
}

pub fn validate_event(raw: &Value) -> Result<Event, ShapeError> {
    shape(EntityKind::Event, raw, |f| {
        let id = f.id("id");
        let title = f.required_str("title");
        let date = f.required_date("date");
        let end_date = f.opt_date("end_date");
        f.check_order("end_date", date, end_date);
        let event_type = f.required_enum::<EventType>("type");
        let summary = f.required_str("summary");
        let detailed_description = f.opt_str("detailed_description");
        let significance = f.opt_str("significance");
        let actors = f.list("actors", |a| {
            let figure_id = a.id("figure_id");
            let role = a.required_str("role");
            Some(EventActor {
                figure_id: figure_id?,
                role: role?,
            })
        });
        let institutions_involved = f.id_list("institutions_involved");
        let causes = f.id_list("causes");
        let consequences = f.id_list("consequences");
        let timeline_group = f.opt_str("timeline_group");
        let (tags, sources, last_updated) = f.metadata();

        Some(Event {
            id: id?,
            title: title?,
            date: date?,
            end_date,
            event_type: event_type?,
            summary: summary?,
            detailed_description,
            significance,
            actors,
            institutions_involved,
            causes,
            consequences,
            timeline_group,
            tags,
            sources,
            last_updated,
        })
    })
}

pub fn validate_relationship(raw: &Value) -> Result<Relationship, ShapeError> {
    shape(EntityKind::Relationship, raw, |f| {
        let id = f.id("id");
        let source_type = f.endpoint_kind("source_type");
        let source_id = f.id("source_id");
        let target_type = f.endpoint_kind("target_type");
        let target_id = f.id("target_id");
        let relationship_type = f.required_enum::<RelationshipType>("relationship_type");
        let description = f.required_str("description");
        let start_date = f.opt_date("start_date");
        let end_date = f.opt_date("end_date");
        f.check_order("end_date", start_date, end_date);
        let strength = f.required_enum::<RelationshipStrength>("strength");
        let (tags, sources, last_updated) = f.metadata();

        Some(Relationship {
            id: id?,
            source_type: source_type?,
            source_id: source_id?,
            target_type: target_type?,
            target_id: target_id?,
            relationship_type: relationship_type?,
            description: description?,
            start_date,
            end_date,
            strength: strength?,
            tags,
            sources,
            last_updated,
        })
    })
}

pub fn validate_glossary_term(raw: &Value) -> Result<GlossaryTerm, ShapeError> {
    shape(EntityKind::Glossary, raw, |f| {
        let id = f.id("id");
        let term_pt = f.required_str("term_pt");
        let term_en = f.opt_str("term_en");
        let definition = f.required_str("definition");
        let legal_definition = f.opt_str("legal_definition");
        let example = f.opt_str("example");
        let related_terms = f.id_list("related_terms");
        let related_institutions = f.id_list("related_institutions");
        let (tags, sources, last_updated) = f.metadata();

        Some(GlossaryTerm {
            id: id?,
            term_pt: term_pt?,
            term_en,
            definition: definition?,
            legal_definition,
            example,
            related_terms,
            related_institutions,
            tags,
            sources,
            last_updated,
        })
    })
}

// ============================================================
// Field reader
// ============================================================

fn shape<'m, T, F>(kind: EntityKind, raw: &'m Value, build: F) -> Result<T, ShapeError>
where
    F: for<'x, 'y> FnOnce(&'x mut Fields<'m, 'y>) -> Option<T>,
{
    let raw_id = raw.get("id").and_then(Value::as_str).map(String::from);
    let Some(map) = raw.as_mapping() else {
        return Err(ShapeError {
            kind,
            id: None,
            fields: vec![FieldError::new(
                "<record>",
                format!("expected a mapping, found {}", describe(raw)),
            )],
        });
    };

    let mut errors = Vec::new();
    let built = build(&mut Fields {
        map,
        prefix: String::new(),
        errors: &mut errors,
    });

    match built {
        Some(record) if errors.is_empty() => Ok(record),
        _ => {
            if errors.is_empty() {
                errors.push(FieldError::new("<record>", "incomplete record"));
            }
            Err(ShapeError {
                kind,
                id: raw_id,
                fields: errors,
            })
        }
    }
}

/// Reads fields out of one mapping, pushing every problem into a shared list.
struct Fields<'m, 'e> {
    map: &'m Mapping,
    prefix: String,
    errors: &'e mut Vec<FieldError>,
}

impl<'m, 'e> Fields<'m, 'e> {
    fn path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }

    fn fail(&mut self, name: &str, problem: impl Into<String>) {
        let field = self.path(name);
        self.errors.push(FieldError::new(field, problem));
    }

    /// Present, non-null value.
    fn get(&self, name: &str) -> Option<&'m Value> {
        let map: &'m Mapping = self.map;
        match map.get(name) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }

    fn string(&mut self, name: &str, required: bool) -> Option<String> {
        match self.get(name) {
            None => {
                if required {
                    self.fail(name, "missing required field");
                }
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.fail(name, format!("expected a string, found {}", describe(other)));
                None
            }
        }
    }

    fn required_str(&mut self, name: &str) -> Option<String> {
        self.string(name, true)
    }

    fn opt_str(&mut self, name: &str) -> Option<String> {
        self.string(name, false)
    }

    fn slug(&mut self, name: &str, value: String) -> Option<String> {
        if is_valid_id(&value) {
            Some(value)
        } else {
            self.fail(
                name,
                format!("'{}' is not a valid id (lowercase letters, digits, '-' and '_')", value),
            );
            None
        }
    }

    fn id(&mut self, name: &str) -> Option<String> {
        let value = self.string(name, true)?;
        self.slug(name, value)
    }

    fn opt_id(&mut self, name: &str) -> Option<String> {
        let value = self.string(name, false)?;
        self.slug(name, value)
    }

    fn date(&mut self, name: &str, required: bool) -> Option<NaiveDate> {
        let text = self.string(name, required)?;
        match NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                self.fail(name, format!("invalid date '{}' (expected YYYY-MM-DD)", text));
                None
            }
        }
    }

    fn required_date(&mut self, name: &str) -> Option<NaiveDate> {
        self.date(name, true)
    }

    fn opt_date(&mut self, name: &str) -> Option<NaiveDate> {
        self.date(name, false)
    }

    fn timestamp(&mut self, name: &str) -> Option<DateTime<Utc>> {
        let text = self.string(name, false)?;
        match parse_timestamp(&text) {
            Some(ts) => Some(ts),
            None => {
                self.fail(name, format!("invalid timestamp '{}'", text));
                None
            }
        }
    }

    fn opt_int(&mut self, name: &str) -> Option<i64> {
        match self.get(name) {
            None => None,
            Some(Value::Number(n)) if n.as_i64().is_some() => n.as_i64(),
            Some(other) => {
                self.fail(name, format!("expected an integer, found {}", describe(other)));
                None
            }
        }
    }

    fn opt_ranged<T: TryFrom<i64>>(&mut self, name: &str, range: &str) -> Option<T> {
        let n = self.opt_int(name)?;
        match T::try_from(n) {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(name, format!("{} is out of range ({})", n, range));
                None
            }
        }
    }

    fn opt_u32(&mut self, name: &str) -> Option<u32> {
        self.opt_ranged(name, "expected 0 to 4294967295")
    }

    fn opt_i32(&mut self, name: &str) -> Option<i32> {
        self.opt_ranged(name, "expected a 32-bit integer")
    }

    fn enum_value<T: FromStr<Err = String>>(&mut self, name: &str, required: bool) -> Option<T> {
        let text = self.string(name, required)?;
        match text.parse::<T>() {
            Ok(v) => Some(v),
            Err(problem) => {
                self.fail(name, problem);
                None
            }
        }
    }

    fn required_enum<T: FromStr<Err = String>>(&mut self, name: &str) -> Option<T> {
        self.enum_value(name, true)
    }

    /// Relationship endpoint type: a kind that becomes a graph node.
    fn endpoint_kind(&mut self, name: &str) -> Option<EntityKind> {
        let kind = self.required_enum::<EntityKind>(name)?;
        if kind.is_node_kind() {
            Some(kind)
        } else {
            self.fail(
                name,
                format!("'{}' cannot be a relationship endpoint (expected institution, figure or event)", kind),
            );
            None
        }
    }

    fn sequence(&mut self, name: &str) -> &'m [Value] {
        match self.get(name) {
            None => &[],
            Some(Value::Sequence(items)) => items.as_slice(),
            Some(other) => {
                self.fail(name, format!("expected a list, found {}", describe(other)));
                &[]
            }
        }
    }

    fn str_list(&mut self, name: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (i, item) in self.sequence(name).iter().enumerate() {
            match item {
                Value::String(s) => out.push(s.clone()),
                other => self.fail(
                    &format!("{}[{}]", name, i),
                    format!("expected a string, found {}", describe(other)),
                ),
            }
        }
        out
    }

    fn id_list(&mut self, name: &str) -> Vec<String> {
        let items = self.str_list(name);
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            if let Some(id) = self.slug(&format!("{}[{}]", name, i), item) {
                out.push(id);
            }
        }
        out
    }

    fn object<T, F>(&mut self, name: &str, read: F) -> Option<T>
    where
        F: for<'x, 'y> FnOnce(&'x mut Fields<'m, 'y>) -> Option<T>,
    {
        match self.get(name)? {
            Value::Mapping(map) => {
                let prefix = self.path(name);
                read(&mut Fields {
                    map,
                    prefix,
                    errors: &mut *self.errors,
                })
            }
            other => {
                self.fail(name, format!("expected a mapping, found {}", describe(other)));
                None
            }
        }
    }

    fn list<T, F>(&mut self, name: &str, mut read: F) -> Vec<T>
    where
        F: for<'x, 'y> FnMut(&'x mut Fields<'m, 'y>) -> Option<T>,
    {
        let mut out = Vec::new();
        for (i, item) in self.sequence(name).iter().enumerate() {
            let element = format!("{}[{}]", name, i);
            match item {
                Value::Mapping(map) => {
                    let prefix = self.path(&element);
                    if let Some(v) = read(&mut Fields {
                        map,
                        prefix,
                        errors: &mut *self.errors,
                    }) {
                        out.push(v);
                    }
                }
                other => self.fail(&element, format!("expected a mapping, found {}", describe(other))),
            }
        }
        out
    }

    fn check_order(&mut self, end_field: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                self.fail(end_field, format!("ends ({}) before it starts ({})", end, start));
            }
        }
    }

    /// At most one open-ended career entry per institution.
    fn check_open_career(&mut self, career: &[CareerEntry]) {
        let mut open: HashMap<String, usize> = HashMap::new();
        for (i, entry) in career.iter().enumerate() {
            if !entry.is_current() {
                continue;
            }
            let key = entry.institution.trim().to_lowercase();
            if let Some(first) = open.get(&key) {
                let problem = format!(
                    "second open-ended entry at '{}' (career[{}] is also current)",
                    entry.institution, first
                );
                self.fail(&format!("career[{}].end_date", i), problem);
            } else {
                open.insert(key, i);
            }
        }
    }

    fn metadata(&mut self) -> (Vec<String>, Vec<String>, Option<DateTime<Utc>>) {
        (self.str_list("tags"), self.str_list("sources"), self.timestamp("last_updated"))
    }
}

/// RFC 3339, naive date-time (taken as UTC), or plain date (midnight UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_id("stf"));
        assert!(is_valid_id("lava-jato_2014"));
        assert!(!is_valid_id("STF"));
        assert!(!is_valid_id("-stf"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("a b"));
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2024-03-01T12:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01T12:00:00").is_some());
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn nested_paths_are_indexed() {
        let raw = yaml(
            "id: lula\nfull_name: Lula\ncareer:\n  - role: Presidente\n    institution: Presidência\n    start_date: not-a-date\n",
        );
        let err = validate_figure(&raw).unwrap_err();
        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.fields[0].field, "career[0].start_date");
    }

    #[test]
    fn non_mapping_record() {
        let err = validate_event(&yaml("- just\n- a list\n")).unwrap_err();
        assert_eq!(err.fields[0].field, "<record>");
        assert_eq!(err.id, None);
    }

    #[test]
    fn relationship_endpoint_cannot_be_glossary() {
        let raw = yaml(
            "id: r1\nsource_type: glossary\nsource_id: impeachment\ntarget_type: institution\n\
             target_id: stf\nrelationship_type: checks\ndescription: x\nstrength: weak\n",
        );
        let err = validate_relationship(&raw).unwrap_err();
        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.fields[0].field, "source_type");
    }
}
