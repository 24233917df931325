//! Free-text search over every record kind.
//!
//! Ranking: exact id, then exact name or acronym, then total substring
//! occurrences across indexed fields (descending), then id. Matching is
//! case-insensitive.

use crate::kb::KnowledgeBase;
use anticorrupt_core::{EntityRef, Record};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ExactId,
    ExactName,
    Substring,
    /// Glossary term related to a glossary hit.
    Related,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub entity: EntityRef,
    pub label: String,
    pub tier: MatchTier,
    /// Substring occurrences across indexed fields.
    pub score: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub expand_related: bool,
}

#[derive(Clone, Debug)]
struct Document {
    entity: EntityRef,
    label: String,
    /// Lowercased name fields: names, acronym, title, terms.
    names: Vec<String>,
    /// Lowercased free text, names included.
    text: Vec<String>,
    related: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SearchIndex {
    docs: Vec<Document>,
}

fn lower<'a>(fields: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    fields.into_iter().filter(|s| !s.is_empty()).map(|s| s.to_lowercase()).collect()
}

impl SearchIndex {
    pub fn build(kb: &KnowledgeBase) -> Self {
        let mut docs = Vec::new();

        for r in &kb.institutions {
            let names = lower([&r.name_official, &r.name_common, &r.acronym]);
            let mut text = names.clone();
            text.extend(lower([&r.description]));
            text.extend(lower(&r.key_functions));
            text.extend(lower(r.tags()));
            docs.push(Document { entity: r.entity_ref(), label: r.name_common.clone(), names, text, related: vec![] });
        }

        for r in &kb.figures {
            let names = lower([&r.full_name]);
            let mut text = names.clone();
            text.extend(lower(r.career.iter().flat_map(|c| [&c.role, &c.institution])));
            text.extend(lower(r.controversies.iter().map(|c| &c.title)));
            text.extend(lower(r.public_positions.iter().map(|p| &p.topic)));
            text.extend(lower(r.tags()));
            docs.push(Document { entity: r.entity_ref(), label: r.full_name.clone(), names, text, related: vec![] });
        }

        for r in &kb.events {
            let names = lower([&r.title]);
            let mut text = names.clone();
            text.extend(lower([&r.summary]));
            text.extend(lower(r.detailed_description.iter()));
            text.extend(lower(r.significance.iter()));
            text.extend(lower(r.timeline_group.iter()));
            text.extend(lower(r.tags()));
            docs.push(Document { entity: r.entity_ref(), label: r.title.clone(), names, text, related: vec![] });
        }

        for r in &kb.relationships {
            let mut text = lower([&r.description]);
            text.extend(lower(r.tags()));
            docs.push(Document { entity: r.entity_ref(), label: r.id.clone(), names: vec![], text, related: vec![] });
        }

        for r in &kb.glossary {
            let names = lower([Some(&r.term_pt), r.term_en.as_ref()].into_iter().flatten());
            let mut text = names.clone();
            text.extend(lower([&r.definition]));
            text.extend(lower(r.legal_definition.iter()));
            text.extend(lower(r.example.iter()));
            text.extend(lower(r.tags()));
            docs.push(Document {
                entity: r.entity_ref(),
                label: r.term_pt.clone(),
                names,
                text,
                related: r.related_terms.clone(),
            });
        }

        Self { docs }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Ranked hits. A blank query returns nothing.
    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(SearchHit, &Document)> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let score: usize = doc.text.iter().map(|t| t.matches(q.as_str()).count()).sum();
                let tier = if doc.entity.id == q {
                    MatchTier::ExactId
                } else if doc.names.iter().any(|n| *n == q) {
                    MatchTier::ExactName
                } else if score > 0 {
                    MatchTier::Substring
                } else {
                    return None;
                };
                let hit = SearchHit { entity: doc.entity.clone(), label: doc.label.clone(), tier, score };
                Some((hit, doc))
            })
            .collect();

        hits.sort_by(|(a, _), (b, _)| {
            (a.tier, Reverse(a.score), &a.entity.id, a.entity.kind)
                .cmp(&(b.tier, Reverse(b.score), &b.entity.id, b.entity.kind))
        });

        let mut related = Vec::new();
        if options.expand_related {
            let mut present: HashSet<EntityRef> = hits.iter().map(|(h, _)| h.entity.clone()).collect();
            for (_, doc) in &hits {
                for id in &doc.related {
                    let target = EntityRef::glossary(id.clone());
                    if !present.insert(target.clone()) {
                        continue;
                    }
                    if let Some(term) = self.docs.iter().find(|d| d.entity == target) {
                        related.push(SearchHit {
                            entity: target,
                            label: term.label.clone(),
                            tier: MatchTier::Related,
                            score: 0,
                        });
                    }
                }
            }
        }

        let mut out: Vec<SearchHit> = hits.into_iter().map(|(h, _)| h).collect();
        out.extend(related);
        if let Some(limit) = options.limit {
            out.truncate(limit);
        }
        out
    }
}
