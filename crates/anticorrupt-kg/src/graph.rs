//! Graph builder and the immutable snapshot it produces.
//!
//! Institutions, figures and events become nodes keyed by `{kind, id}`.
//! Edges come from hierarchy links, causal links, event actors and
//! involved institutions, and one edge per relationship record. Glossary
//! terms stay out of the graph and live in the snapshot's knowledge base.

use crate::kb::KnowledgeBase;
use crate::search::SearchIndex;
use anticorrupt_core::{
    EntityKind, Error, Event, GlossaryTerm, NodeKey, Record, RelationshipStrength,
    RelationshipType, Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Edge label: a structural link or a relationship type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    ParentOf,
    ChildOf,
    Causes,
    CausedBy,
    ActorIn,
    Involves,
    Relation(RelationshipType),
}

impl EdgeLabel {
    pub const STRUCTURAL: &'static [EdgeLabel] = &[
        EdgeLabel::ParentOf,
        EdgeLabel::ChildOf,
        EdgeLabel::Causes,
        EdgeLabel::CausedBy,
        EdgeLabel::ActorIn,
        EdgeLabel::Involves,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParentOf => "parent_of",
            Self::ChildOf => "child_of",
            Self::Causes => "causes",
            Self::CausedBy => "caused_by",
            Self::ActorIn => "actor_in",
            Self::Involves => "involves",
            Self::Relation(t) => t.as_str(),
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::Relation(_))
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EdgeLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for EdgeLabel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::STRUCTURAL
            .iter()
            .find(|l| l.as_str() == s)
            .copied()
            .map(Ok)
            .unwrap_or_else(|| RelationshipType::from_str(s).map(Self::Relation))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Node {
    #[serde(flatten)]
    pub key: NodeKey,
    pub label: String,
    /// Institution branch or event type.
    pub subtype: Option<String>,
    pub tags: Vec<String>,
}

/// Attributes carried by an edge that came from a relationship record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationAttrs {
    pub relationship_id: String,
    pub description: String,
    pub strength: RelationshipStrength,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl RelationAttrs {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |s| s <= date) && self.end_date.map_or(true, |e| date <= e)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Insertion order; stable across rebuilds of the same record set.
    pub index: usize,
    pub source: NodeKey,
    pub target: NodeKey,
    pub label: EdgeLabel,
    /// Actor role, for `actor_in` edges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationAttrs>,
    #[serde(skip)]
    pub(crate) from: usize,
    #[serde(skip)]
    pub(crate) to: usize,
}

/// Immutable graph plus the records and search index it was built from.
#[derive(Debug)]
pub struct GraphSnapshot {
    nodes: Vec<Node>,
    index: HashMap<NodeKey, usize>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    kb: KnowledgeBase,
    search: SearchIndex,
    built_at: DateTime<Utc>,
}

/// Build a snapshot from a validated knowledge base.
pub fn build_graph(kb: KnowledgeBase) -> Result<GraphSnapshot> {
    GraphSnapshot::build(kb)
}

#[derive(Default)]
struct Builder {
    nodes: Vec<Node>,
    index: HashMap<NodeKey, usize>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl Builder {
    fn add_node(&mut self, key: NodeKey, label: &str, subtype: Option<&str>, tags: &[String]) -> Result<()> {
        if self.index.contains_key(&key) {
            return Err(Error::integrity(format!("node {} added twice", key)));
        }
        self.index.insert(key.clone(), self.nodes.len());
        self.nodes.push(Node {
            key,
            label: label.to_string(),
            subtype: subtype.map(str::to_string),
            tags: tags.to_vec(),
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        Ok(())
    }

    /// Endpoints must already be nodes; a miss is an integrity failure.
    fn add_edge(
        &mut self,
        source: NodeKey,
        target: NodeKey,
        label: EdgeLabel,
        role: Option<String>,
        relation: Option<RelationAttrs>,
    ) -> Result<()> {
        let missing = |key: &NodeKey| {
            Error::integrity(format!("{} edge {} -> {} references missing node {}", label, source, target, key))
        };
        let from = *self.index.get(&source).ok_or_else(|| missing(&source))?;
        let to = *self.index.get(&target).ok_or_else(|| missing(&target))?;

        let index = self.edges.len();
        self.edges.push(Edge { index, source, target, label, role, relation, from, to });
        self.outgoing[from].push(index);
        self.incoming[to].push(index);
        Ok(())
    }
}

impl GraphSnapshot {
    pub fn build(kb: KnowledgeBase) -> Result<Self> {
        let mut b = Builder::default();

        for r in &kb.institutions {
            b.add_node(r.entity_ref(), &r.name_common, Some(r.branch.as_str()), &r.tags)?;
        }
        for r in &kb.figures {
            b.add_node(r.entity_ref(), &r.full_name, None, &r.tags)?;
        }
        for r in &kb.events {
            b.add_node(r.entity_ref(), &r.title, Some(r.event_type.as_str()), &r.tags)?;
        }

        // parent_of / child_of, one pair per distinct (parent, child)
        let mut seen = HashSet::new();
        for inst in &kb.institutions {
            let mut pairs = Vec::new();
            if let Some(parent) = inst.parent() {
                pairs.push((parent.to_string(), inst.id.clone()));
            }
            pairs.extend(inst.children().iter().map(|c| (inst.id.clone(), c.clone())));
            for (parent, child) in pairs {
                if seen.insert((parent.clone(), child.clone())) {
                    let (p, c) = (NodeKey::institution(parent), NodeKey::institution(child));
                    b.add_edge(p.clone(), c.clone(), EdgeLabel::ParentOf, None, None)?;
                    b.add_edge(c, p, EdgeLabel::ChildOf, None, None)?;
                }
            }
        }

        // causes / caused_by, one pair per distinct (cause, effect)
        let mut seen = HashSet::new();
        for event in &kb.events {
            let mut pairs: Vec<(String, String)> =
                event.causes.iter().map(|c| (c.clone(), event.id.clone())).collect();
            pairs.extend(event.consequences.iter().map(|q| (event.id.clone(), q.clone())));
            for (cause, effect) in pairs {
                if seen.insert((cause.clone(), effect.clone())) {
                    let (c, e) = (NodeKey::event(cause), NodeKey::event(effect));
                    b.add_edge(c.clone(), e.clone(), EdgeLabel::Causes, None, None)?;
                    b.add_edge(e, c, EdgeLabel::CausedBy, None, None)?;
                }
            }
        }

        for event in &kb.events {
            for actor in &event.actors {
                b.add_edge(
                    NodeKey::figure(actor.figure_id.clone()),
                    event.entity_ref(),
                    EdgeLabel::ActorIn,
                    Some(actor.role.clone()),
                    None,
                )?;
            }
            for inst in &event.institutions_involved {
                b.add_edge(event.entity_ref(), NodeKey::institution(inst.clone()), EdgeLabel::Involves, None, None)?;
            }
        }

        for rel in &kb.relationships {
            let attrs = RelationAttrs {
                relationship_id: rel.id.clone(),
                description: rel.description.clone(),
                strength: rel.strength,
                start_date: rel.start_date,
                end_date: rel.end_date,
            };
            b.add_edge(rel.source(), rel.target(), EdgeLabel::Relation(rel.relationship_type), None, Some(attrs))?;
        }

        let search = SearchIndex::build(&kb);
        debug!("built graph: {} node(s), {} edge(s)", b.nodes.len(), b.edges.len());

        Ok(Self {
            nodes: b.nodes,
            index: b.index,
            edges: b.edges,
            outgoing: b.outgoing,
            incoming: b.incoming,
            kb,
            search,
            built_at: Utc::now(),
        })
    }

    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn position(&self, key: &NodeKey) -> Result<usize> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| Error::not_found(Some(key.kind), key.id.clone()))
    }

    pub(crate) fn node_at(&self, position: usize) -> &Node {
        &self.nodes[position]
    }

    pub(crate) fn outgoing_at(&self, position: usize) -> &[usize] {
        &self.outgoing[position]
    }

    pub(crate) fn incoming_at(&self, position: usize) -> &[usize] {
        &self.incoming[position]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn outgoing(&self, key: &NodeKey) -> Result<impl Iterator<Item = &Edge> + '_> {
        let at = self.position(key)?;
        Ok(self.outgoing[at].iter().map(move |&e| &self.edges[e]))
    }

    pub fn incoming(&self, key: &NodeKey) -> Result<impl Iterator<Item = &Edge> + '_> {
        let at = self.position(key)?;
        Ok(self.incoming[at].iter().map(move |&e| &self.edges[e]))
    }

    /// Edges whose label has this name; `actor_in` covers both the structural
    /// edge and the relationship type.
    pub fn edges_labelled(&self, label: EdgeLabel) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.label.as_str() == label.as_str())
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn search_index(&self) -> &SearchIndex {
        &self.search
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn glossary_term(&self, id: &str) -> Option<&GlossaryTerm> {
        self.kb.glossary.get(id)
    }

    /// Terms listed in a term's `related_terms`.
    pub fn related_terms(&self, id: &str) -> Result<Vec<&GlossaryTerm>> {
        let term = self
            .glossary_term(id)
            .ok_or_else(|| Error::not_found(Some(EntityKind::Glossary), id))?;
        Ok(term.related_terms.iter().filter_map(|t| self.kb.glossary.get(t)).collect())
    }

    /// Nodes of one kind, optionally narrowed to a subtype.
    pub fn nodes_by_kind(&self, kind: EntityKind, subtype: Option<&str>) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.key.kind == kind)
            .filter(|n| subtype.map_or(true, |s| n.subtype.as_deref() == Some(s)))
            .collect()
    }

    /// Events of a timeline group, by date then id.
    pub fn timeline(&self, group: &str) -> Vec<&Event> {
        let mut events: Vec<&Event> =
            self.kb.events.iter().filter(|e| e.timeline_group.as_deref() == Some(group)).collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        events
    }

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_kind = BTreeMap::new();
        for n in &self.nodes {
            *nodes_by_kind.entry(n.key.kind.to_string()).or_insert(0) += 1;
        }
        let mut edges_by_label = BTreeMap::new();
        for e in &self.edges {
            *edges_by_label.entry(e.label.to_string()).or_insert(0) += 1;
        }

        let mut degrees: Vec<Degree> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| Degree {
                key: n.key.clone(),
                label: n.label.clone(),
                degree: self.outgoing[i].len() + self.incoming[i].len(),
            })
            .collect();
        degrees.sort_by(|a, b| {
            b.degree
                .cmp(&a.degree)
                .then_with(|| a.key.id.cmp(&b.key.id))
                .then_with(|| a.key.kind.cmp(&b.key.kind))
        });
        degrees.truncate(10);

        let components = self.component_count();
        GraphStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            nodes_by_kind,
            edges_by_label,
            glossary_terms: self.kb.glossary.len(),
            most_connected: degrees,
            components,
            weakly_connected: components == 1,
        }
    }

    fn component_count(&self) -> usize {
        let mut parent: Vec<usize> = (0..self.nodes.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for e in &self.edges {
            let (a, b) = (find(&mut parent, e.from), find(&mut parent, e.to));
            if a != b {
                parent[a] = b;
            }
        }
        (0..self.nodes.len()).filter(|&i| find(&mut parent, i) == i).count()
    }

    /// Node-link document of the whole graph.
    pub fn export(&self) -> GraphExport {
        GraphExport {
            directed: true,
            multigraph: true,
            built_at: self.built_at,
            nodes: self.nodes.clone(),
            links: self.edges.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Degree {
    #[serde(flatten)]
    pub key: NodeKey,
    pub label: String,
    pub degree: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub edges_by_label: BTreeMap<String, usize>,
    pub glossary_terms: usize,
    pub most_connected: Vec<Degree>,
    pub components: usize,
    pub weakly_connected: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct GraphExport {
    pub directed: bool,
    pub multigraph: bool,
    pub built_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub links: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_parses_structural_before_relation() {
        assert_eq!("parent_of".parse::<EdgeLabel>().unwrap(), EdgeLabel::ParentOf);
        assert_eq!("actor_in".parse::<EdgeLabel>().unwrap(), EdgeLabel::ActorIn);
        assert_eq!(
            "oversees".parse::<EdgeLabel>().unwrap(),
            EdgeLabel::Relation(RelationshipType::Oversees)
        );
        assert!("watches".parse::<EdgeLabel>().is_err());
    }

    #[test]
    fn label_serializes_as_name() {
        let json = serde_json::to_string(&EdgeLabel::Relation(RelationshipType::LedTo)).unwrap();
        assert_eq!(json, r#""led_to""#);
    }

    #[test]
    fn edge_to_missing_node_fails_loudly() {
        let mut b = Builder::default();
        b.add_node(NodeKey::institution("stf"), "STF", None, &[]).unwrap();
        let err = b
            .add_edge(NodeKey::institution("stf"), NodeKey::institution("cnj"), EdgeLabel::ParentOf, None, None)
            .unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
        assert!(err.to_string().contains("institution:cnj"));
    }

    #[test]
    fn empty_graph_is_not_connected() {
        let snap = GraphSnapshot::build(KnowledgeBase::default()).unwrap();
        let stats = snap.stats();
        assert_eq!(stats.nodes, 0);
        assert!(!stats.weakly_connected);
    }
}
