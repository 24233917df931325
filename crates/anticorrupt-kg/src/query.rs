//! Graph queries against a snapshot: resolve, neighbors, bounded traversal,
//! shortest path. All results are owned and deterministic.

use crate::graph::{Edge, EdgeLabel, GraphSnapshot, Node};
use anticorrupt_core::{EntityKind, Error, NodeKey, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

/// Which edges a query may follow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeFilter {
    pub direction: Direction,
    labels: Option<Vec<&'static str>>,
    /// Drop relationship edges whose validity interval excludes this date.
    pub active_on: Option<NaiveDate>,
}

impl EdgeFilter {
    pub fn outgoing() -> Self {
        Self { direction: Direction::Outgoing, ..Default::default() }
    }

    pub fn incoming() -> Self {
        Self { direction: Direction::Incoming, ..Default::default() }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Restrict to these labels. Labels are compared by name.
    pub fn labels(mut self, labels: impl IntoIterator<Item = EdgeLabel>) -> Self {
        self.labels = Some(labels.into_iter().map(|l| l.as_str()).collect());
        self
    }

    pub fn active_on(mut self, date: NaiveDate) -> Self {
        self.active_on = Some(date);
        self
    }

    pub fn admits(&self, edge: &Edge) -> bool {
        if let Some(labels) = &self.labels {
            if !labels.contains(&edge.label.as_str()) {
                return false;
            }
        }
        match (self.active_on, &edge.relation) {
            (Some(date), Some(attrs)) => attrs.is_active_on(date),
            _ => true,
        }
    }
}

/// One edge as seen from a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Neighbor {
    pub node: Node,
    /// `Outgoing` when the edge points away from the queried node.
    pub direction: Direction,
    pub edge: Edge,
}

/// One hop of a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Step {
    pub from: NodeKey,
    pub to: NodeKey,
    pub direction: Direction,
    pub edge: Edge,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reached {
    pub node: Node,
    pub depth: usize,
    pub path: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationalPath {
    pub nodes: Vec<NodeKey>,
    pub steps: Vec<Step>,
}

impl RelationalPath {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// (edge index, other endpoint position, direction)
type Hop = (usize, usize, Direction);

impl GraphSnapshot {
    /// Map a bare id to a node. Without a kind, institution, figure and
    /// event are tried in that order.
    pub fn resolve(&self, id: &str, kind: Option<EntityKind>) -> Result<NodeKey> {
        let kinds: &[EntityKind] = match kind {
            Some(ref k) => std::slice::from_ref(k),
            None => EntityKind::NODE_KINDS,
        };
        kinds
            .iter()
            .map(|&k| NodeKey::new(k, id))
            .find(|key| self.contains(key))
            .ok_or_else(|| Error::not_found(kind, id))
    }

    pub fn get_node(&self, key: &NodeKey) -> Result<&Node> {
        let at = self.position(key)?;
        Ok(self.node_at(at))
    }

    /// Adjacent edges in insertion order.
    fn hops(&self, at: usize, filter: &EdgeFilter) -> Vec<Hop> {
        let mut hops = Vec::new();
        if filter.direction != Direction::Incoming {
            for &e in self.outgoing_at(at) {
                hops.push((e, self.edges()[e].to, Direction::Outgoing));
            }
        }
        if filter.direction != Direction::Outgoing {
            for &e in self.incoming_at(at) {
                let edge = &self.edges()[e];
                // a self-loop already counted as outgoing
                if filter.direction == Direction::Both && edge.from == edge.to {
                    continue;
                }
                hops.push((e, edge.from, Direction::Incoming));
            }
        }
        hops.retain(|&(e, _, _)| filter.admits(&self.edges()[e]));
        hops.sort_by_key(|&(e, _, _)| e);
        hops
    }

    fn step(&self, from: usize, (e, to, direction): Hop) -> Step {
        Step {
            from: self.node_at(from).key.clone(),
            to: self.node_at(to).key.clone(),
            direction,
            edge: self.edges()[e].clone(),
        }
    }

    pub fn neighbors(&self, key: &NodeKey, filter: &EdgeFilter) -> Result<Vec<Neighbor>> {
        let at = self.position(key)?;
        Ok(self
            .hops(at, filter)
            .into_iter()
            .map(|(e, other, direction)| Neighbor {
                node: self.node_at(other).clone(),
                direction,
                edge: self.edges()[e].clone(),
            })
            .collect())
    }

    /// Breadth-first expansion up to `max_depth` hops. The start node is not
    /// included. Each node appears once, with the first path that reached it.
    pub fn traverse(&self, key: &NodeKey, max_depth: usize, filter: &EdgeFilter) -> Result<Vec<Reached>> {
        let start = self.position(key)?;
        let mut via: HashMap<usize, (usize, Hop)> = HashMap::new();
        let mut depth_of: HashMap<usize, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        let mut order = Vec::new();

        while let Some(at) = queue.pop_front() {
            let depth = depth_of[&at];
            if depth >= max_depth {
                continue;
            }
            for hop in self.hops(at, filter) {
                let next = hop.1;
                if depth_of.contains_key(&next) {
                    continue;
                }
                depth_of.insert(next, depth + 1);
                via.insert(next, (at, hop));
                order.push(next);
                queue.push_back(next);
            }
        }

        Ok(order
            .into_iter()
            .map(|node| Reached {
                node: self.node_at(node).clone(),
                depth: depth_of[&node],
                path: self.unwind(&via, start, node),
            })
            .collect())
    }

    /// Unweighted shortest path. Candidate hops are tried by edge label,
    /// then neighbor id, then neighbor kind, then edge insertion order.
    pub fn shortest_path(&self, from: &NodeKey, to: &NodeKey, filter: &EdgeFilter) -> Result<Option<RelationalPath>> {
        let start = self.position(from)?;
        let goal = self.position(to)?;
        if start == goal {
            return Ok(Some(RelationalPath { nodes: vec![from.clone()], steps: vec![] }));
        }

        let mut via: HashMap<usize, (usize, Hop)> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(at) = queue.pop_front() {
            let mut hops = self.hops(at, filter);
            hops.sort_by(|a, b| {
                let (ka, kb) = (&self.node_at(a.1).key, &self.node_at(b.1).key);
                self.edges()[a.0]
                    .label
                    .as_str()
                    .cmp(self.edges()[b.0].label.as_str())
                    .then_with(|| ka.id.cmp(&kb.id))
                    .then_with(|| ka.kind.cmp(&kb.kind))
                    .then_with(|| a.0.cmp(&b.0))
            });
            for hop in hops {
                let next = hop.1;
                if next == start || via.contains_key(&next) {
                    continue;
                }
                via.insert(next, (at, hop));
                if next == goal {
                    let steps = self.unwind(&via, start, goal);
                    let mut nodes = vec![from.clone()];
                    nodes.extend(steps.iter().map(|s| s.to.clone()));
                    return Ok(Some(RelationalPath { nodes, steps }));
                }
                queue.push_back(next);
            }
        }
        Ok(None)
    }

    fn unwind(&self, via: &HashMap<usize, (usize, Hop)>, start: usize, end: usize) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut at = end;
        while at != start {
            let Some(&(prev, hop)) = via.get(&at) else { break };
            steps.push(self.step(prev, hop));
            at = prev;
        }
        steps.reverse();
        steps
    }
}
