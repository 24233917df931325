//! Validator: shape pass, then referential and acyclicity passes.
//!
//! Every problem is collected into one [`ValidationReport`]. A
//! [`KnowledgeBase`] is produced only when the report has no errors.

use crate::kb::KnowledgeBase;
use crate::store::LoadedRecords;
use anticorrupt_core::{validate_shape, Entity, EntityKind, EntityRef, FieldError};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Which directed graph a cycle was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleGraph {
    /// Institution child → parent links.
    Hierarchy,
    /// Event cause → effect links.
    Causal,
}

impl fmt::Display for CycleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hierarchy => write!(f, "institution hierarchy"),
            Self::Causal => write!(f, "causal chain"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("invalid field(s): {}", join_fields(.fields))]
    Shape { fields: Vec<FieldError> },

    #[error("duplicate id (first defined in {})", .first_source.display())]
    DuplicateId { first_source: PathBuf },

    #[error("{field} references {target}, which does not exist")]
    Referential { field: String, target: EntityRef },

    #[error("cycle in {graph}: {}", cycle_text(.path))]
    Cycle { graph: CycleGraph, path: Vec<String> },
}

impl IssueKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Shape { .. } => "shape",
            Self::DuplicateId { .. } => "duplicate_id",
            Self::Referential { .. } => "referential",
            Self::Cycle { .. } => "cycle",
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; ")
}

fn cycle_text(path: &[String]) -> String {
    let mut parts: Vec<&str> = path.iter().map(String::as_str).collect();
    if let Some(first) = path.first() {
        parts.push(first);
    }
    parts.join(" -> ")
}

/// One load-time problem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub kind: EntityKind,
    pub record_id: Option<String>,
    pub source: Option<PathBuf>,
    pub error: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.record_id.as_deref().unwrap_or("?"))?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source.display())?;
        }
        write!(f, ": {}", self.error)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
    pub records_checked: usize,
    pub files_checked: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Errors whose [`IssueKind::name`] equals `name`.
    pub fn errors_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.errors.iter().filter(move |e| e.error.name() == name)
    }

    /// Errors grouped by source file, in first-seen order. Issues without a
    /// file come last under `None`.
    pub fn by_source(&self) -> Vec<(Option<&Path>, Vec<&ValidationIssue>)> {
        let mut groups: Vec<(Option<&Path>, Vec<&ValidationIssue>)> = Vec::new();
        for issue in &self.errors {
            let key = issue.source.as_deref();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, list)) => list.push(issue),
                None => groups.push((key, vec![issue])),
            }
        }
        groups.sort_by_key(|(k, _)| k.is_none());
        groups
    }
}

/// Validator output. `knowledge_base` is `Some` only for a clean report.
#[derive(Clone, Debug)]
pub struct Validated {
    pub report: ValidationReport,
    pub knowledge_base: Option<KnowledgeBase>,
}

/// Run every pass over a full load.
pub fn validate(loaded: &LoadedRecords) -> Validated {
    let mut report = ValidationReport {
        records_checked: loaded.record_count(),
        files_checked: loaded.file_count(),
        ..Default::default()
    };

    for kind in loaded.missing_kinds() {
        report
            .warnings
            .push(format!("no {}/ directory; no {} records loaded", kind.dir_name(), kind));
    }

    for e in loaded.parse_errors() {
        report.errors.push(ValidationIssue {
            kind: e.kind,
            record_id: None,
            source: Some(e.path.clone()),
            error: IssueKind::Parse { message: e.message.clone() },
        });
    }

    // Shape + duplicate pass. Ids of shape-failed records still count as known.
    let mut known: HashSet<EntityRef> = HashSet::new();
    let mut first_source: HashMap<EntityRef, PathBuf> = HashMap::new();
    let mut checked: Vec<(Entity, PathBuf)> = Vec::new();

    for &kind in EntityKind::ALL {
        for raw in loaded.records(kind) {
            let raw_id = raw.raw_id().map(str::to_string);
            if let Some(id) = &raw_id {
                let key = EntityRef::new(kind, id.clone());
                if let Some(first) = first_source.get(&key) {
                    report.errors.push(ValidationIssue {
                        kind,
                        record_id: raw_id.clone(),
                        source: Some(raw.source.clone()),
                        error: IssueKind::DuplicateId { first_source: first.clone() },
                    });
                    continue;
                }
                first_source.insert(key.clone(), raw.source.clone());
                known.insert(key);
            }

            match validate_shape(kind, &raw.value) {
                Ok(entity) => checked.push((entity, raw.source.clone())),
                Err(e) => report.errors.push(ValidationIssue {
                    kind,
                    record_id: e.id.or(raw_id),
                    source: Some(raw.source.clone()),
                    error: IssueKind::Shape { fields: e.fields },
                }),
            }
        }
    }

    // Referential pass.
    for (entity, source) in &checked {
        for (field, target) in references(entity) {
            if !known.contains(&target) {
                report.errors.push(ValidationIssue {
                    kind: entity.kind(),
                    record_id: Some(entity.id().to_string()),
                    source: Some(source.clone()),
                    error: IssueKind::Referential { field, target },
                });
            }
        }
    }

    let mut kb = KnowledgeBase::default();
    let mut sources: HashMap<EntityRef, PathBuf> = HashMap::new();
    for (entity, source) in checked {
        sources.insert(entity.entity_ref(), source);
        kb.insert(entity);
    }

    // Acyclicity pass.
    for (graph, kind, edges) in [
        (CycleGraph::Hierarchy, EntityKind::Institution, hierarchy_edges(&kb)),
        (CycleGraph::Causal, EntityKind::Event, causal_edges(&kb)),
    ] {
        for path in find_cycles(&edges) {
            let head = EntityRef::new(kind, path[0].clone());
            report.errors.push(ValidationIssue {
                kind,
                record_id: Some(head.id.clone()),
                source: sources.get(&head).cloned(),
                error: IssueKind::Cycle { graph, path },
            });
        }
    }

    debug!(
        "validated {} record(s): {} error(s), {} warning(s)",
        report.records_checked,
        report.errors.len(),
        report.warnings.len()
    );

    let knowledge_base = report.is_valid().then_some(kb);
    Validated { report, knowledge_base }
}

/// Every cross-record reference a record makes, with the field it sits in.
pub fn references(entity: &Entity) -> Vec<(String, EntityRef)> {
    fn each(out: &mut Vec<(String, EntityRef)>, field: &str, kind: EntityKind, ids: &[String]) {
        for (i, id) in ids.iter().enumerate() {
            out.push((format!("{}[{}]", field, i), EntityRef::new(kind, id.clone())));
        }
    }

    let mut out = Vec::new();
    match entity {
        Entity::Institution(r) => {
            if let Some(parent) = r.parent() {
                out.push(("hierarchy.parent".to_string(), EntityRef::institution(parent)));
            }
            each(&mut out, "hierarchy.children", EntityKind::Institution, r.children());
            each(&mut out, "related_institutions", EntityKind::Institution, &r.related_institutions);
        }
        Entity::Figure(r) => {
            each(&mut out, "key_decisions", EntityKind::Event, &r.key_decisions);
        }
        Entity::Event(r) => {
            for (i, actor) in r.actors.iter().enumerate() {
                out.push((format!("actors[{}].figure_id", i), EntityRef::figure(actor.figure_id.clone())));
            }
            each(&mut out, "institutions_involved", EntityKind::Institution, &r.institutions_involved);
            each(&mut out, "causes", EntityKind::Event, &r.causes);
            each(&mut out, "consequences", EntityKind::Event, &r.consequences);
        }
        Entity::Relationship(r) => {
            out.push(("source_id".to_string(), r.source()));
            out.push(("target_id".to_string(), r.target()));
        }
        Entity::Glossary(r) => {
            each(&mut out, "related_terms", EntityKind::Glossary, &r.related_terms);
            each(&mut out, "related_institutions", EntityKind::Institution, &r.related_institutions);
        }
    }
    out
}

/// Adjacency lists in record order, duplicates removed, endpoints restricted
/// to records present in the table.
type Edges = Vec<(String, Vec<String>)>;

fn push_edge(edges: &mut Edges, seen: &mut HashSet<(String, String)>, from: &str, to: &str) {
    if !seen.insert((from.to_string(), to.to_string())) {
        return;
    }
    match edges.iter_mut().find(|(n, _)| n == from) {
        Some((_, targets)) => targets.push(to.to_string()),
        None => edges.push((from.to_string(), vec![to.to_string()])),
    }
}

fn hierarchy_edges(kb: &KnowledgeBase) -> Edges {
    let mut edges: Edges = kb.institutions.iter().map(|r| (r.id.clone(), Vec::new())).collect();
    let mut seen = HashSet::new();
    for inst in &kb.institutions {
        if let Some(parent) = inst.parent().filter(|p| kb.institutions.contains(p)) {
            push_edge(&mut edges, &mut seen, &inst.id, parent);
        }
        for child in inst.children().iter().filter(|c| kb.institutions.contains(c)) {
            push_edge(&mut edges, &mut seen, child, &inst.id);
        }
    }
    edges
}

fn causal_edges(kb: &KnowledgeBase) -> Edges {
    let mut edges: Edges = kb.events.iter().map(|r| (r.id.clone(), Vec::new())).collect();
    let mut seen = HashSet::new();
    for event in &kb.events {
        for cause in event.causes.iter().filter(|c| kb.events.contains(c)) {
            push_edge(&mut edges, &mut seen, cause, &event.id);
        }
        for effect in event.consequences.iter().filter(|c| kb.events.contains(c)) {
            push_edge(&mut edges, &mut seen, &event.id, effect);
        }
    }
    edges
}

/// Depth-first search in node order; one cycle per back edge, each rotated
/// so its smallest id comes first.
fn find_cycles(edges: &Edges) -> Vec<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }

    let adjacency: HashMap<&str, &[String]> =
        edges.iter().map(|(n, t)| (n.as_str(), t.as_slice())).collect();
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    for (root, _) in edges {
        if marks.contains_key(root.as_str()) {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        marks.insert(root.as_str(), Mark::Active);

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let next = adjacency.get(node).and_then(|targets| targets.get(top.1));
            let Some(target) = next else {
                marks.insert(node, Mark::Done);
                stack.pop();
                continue;
            };
            top.1 += 1;

            match marks.get(target.as_str()) {
                None => {
                    marks.insert(target.as_str(), Mark::Active);
                    stack.push((target.as_str(), 0));
                }
                Some(Mark::Active) => {
                    if let Some(start) = stack.iter().position(|(n, _)| *n == target.as_str()) {
                        let cycle = stack[start..].iter().map(|(n, _)| n.to_string()).collect();
                        let cycle = rotate_to_min(cycle);
                        if !cycles.contains(&cycle) {
                            cycles.push(cycle);
                        }
                    }
                }
                Some(Mark::Done) => {}
            }
        }
    }
    cycles
}

fn rotate_to_min(mut cycle: Vec<String>) -> Vec<String> {
    if let Some(min) = cycle.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)).map(|(i, _)| i) {
        cycle.rotate_left(min);
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &[&str])]) -> Edges {
        pairs
            .iter()
            .map(|(n, ts)| (n.to_string(), ts.iter().map(|t| t.to_string()).collect()))
            .collect()
    }

    #[test]
    fn two_node_cycle() {
        let cycles = find_cycles(&edges(&[("b", &["a"]), ("a", &["b"])]));
        assert_eq!(cycles, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn self_loop() {
        let cycles = find_cycles(&edges(&[("e1", &["e2"]), ("e2", &["e2"])]));
        assert_eq!(cycles, vec![vec!["e2".to_string()]]);
    }

    #[test]
    fn acyclic_diamond() {
        let g = edges(&[("a", &["b", "c"]), ("b", &["d"]), ("c", &["d"]), ("d", &[])]);
        assert!(find_cycles(&g).is_empty());
    }

    #[test]
    fn three_cycle_rotated() {
        let cycles = find_cycles(&edges(&[("z", &["m"]), ("m", &["a"]), ("a", &["z"])]));
        assert_eq!(cycles, vec![vec!["a".to_string(), "z".to_string(), "m".to_string()]]);
    }

    #[test]
    fn cycle_display_closes_the_loop() {
        let kind = IssueKind::Cycle { graph: CycleGraph::Hierarchy, path: vec!["a".into(), "b".into()] };
        assert_eq!(kind.to_string(), "cycle in institution hierarchy: a -> b -> a");
    }
}
