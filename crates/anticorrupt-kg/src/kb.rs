//! Validated records, one table per kind.
//!
//! Each table is an arena (`Vec`) plus an id index. Cross-record links stay
//! plain ids and are resolved through [`KnowledgeBase::contains`] / `get`.

use anticorrupt_core::{
    Entity, EntityKind, EntityRef, Event, Figure, GlossaryTerm, Institution, Record, Relationship,
};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct Table<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { rows: Vec::new(), index: HashMap::new() }
    }
}

impl<T: Record> Table<T> {
    /// Append a row. Returns `false` (and drops the row) if the id is taken.
    pub fn insert(&mut self, row: T) -> bool {
        if self.index.contains_key(row.id()) {
            return false;
        }
        self.index.insert(row.id().to_string(), self.rows.len());
        self.rows.push(row);
        true
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.rows[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Rows in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a, T: Record> IntoIterator for &'a Table<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The full validated record set.
#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
    pub institutions: Table<Institution>,
    pub figures: Table<Figure>,
    pub events: Table<Event>,
    pub relationships: Table<Relationship>,
    pub glossary: Table<GlossaryTerm>,
}

impl KnowledgeBase {
    pub fn insert(&mut self, entity: Entity) -> bool {
        match entity {
            Entity::Institution(r) => self.institutions.insert(r),
            Entity::Figure(r) => self.figures.insert(r),
            Entity::Event(r) => self.events.insert(r),
            Entity::Relationship(r) => self.relationships.insert(r),
            Entity::Glossary(r) => self.glossary.insert(r),
        }
    }

    pub fn contains(&self, target: &EntityRef) -> bool {
        match target.kind {
            EntityKind::Institution => self.institutions.contains(&target.id),
            EntityKind::Figure => self.figures.contains(&target.id),
            EntityKind::Event => self.events.contains(&target.id),
            EntityKind::Relationship => self.relationships.contains(&target.id),
            EntityKind::Glossary => self.glossary.contains(&target.id),
        }
    }

    /// Owned copy of a record.
    pub fn get(&self, target: &EntityRef) -> Option<Entity> {
        let id = target.id.as_str();
        match target.kind {
            EntityKind::Institution => self.institutions.get(id).cloned().map(Entity::from),
            EntityKind::Figure => self.figures.get(id).cloned().map(Entity::from),
            EntityKind::Event => self.events.get(id).cloned().map(Entity::from),
            EntityKind::Relationship => self.relationships.get(id).cloned().map(Entity::from),
            EntityKind::Glossary => self.glossary.get(id).cloned().map(Entity::from),
        }
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Institution => self.institutions.len(),
            EntityKind::Figure => self.figures.len(),
            EntityKind::Event => self.events.len(),
            EntityKind::Relationship => self.relationships.len(),
            EntityKind::Glossary => self.glossary.len(),
        }
    }

    pub fn len(&self) -> usize {
        EntityKind::ALL.iter().map(|&k| self.count(k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anticorrupt_core::RelationshipStrength;
    use anticorrupt_core::RelationshipType;

    fn rel(id: &str) -> Relationship {
        Relationship {
            id: id.into(),
            source_type: EntityKind::Institution,
            source_id: "tse".into(),
            target_type: EntityKind::Institution,
            target_id: "stf".into(),
            relationship_type: RelationshipType::Oversees,
            description: String::new(),
            start_date: None,
            end_date: None,
            strength: RelationshipStrength::Moderate,
            tags: vec![],
            sources: vec![],
            last_updated: None,
        }
    }

    #[test]
    fn first_row_wins() {
        let mut table = Table::default();
        assert!(table.insert(rel("r1")));
        let mut other = rel("r1");
        other.description = "later".into();
        assert!(!table.insert(other));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("r1").unwrap().description, "");
    }

    #[test]
    fn lookup_by_ref() {
        let mut kb = KnowledgeBase::default();
        kb.insert(rel("r1").into());
        assert!(kb.contains(&EntityRef::new(EntityKind::Relationship, "r1")));
        assert!(!kb.contains(&EntityRef::institution("r1")));
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.get(&EntityRef::new(EntityKind::Relationship, "r1")).unwrap().id(), "r1");
    }
}
