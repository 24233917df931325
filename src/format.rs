//! Plain-text rendering for CLI output.

use anticorrupt_core::{Event, NodeKey};
use anticorrupt_kg::{
    Direction, GraphStats, Neighbor, Reached, RelationalPath, SearchHit, Step, ValidationReport,
};

pub fn format_report(report: &ValidationReport) -> String {
    let mut out = String::new();

    for (source, issues) in report.by_source() {
        match source {
            Some(path) => out.push_str(&format!("{}\n", path.display())),
            None => out.push_str("(no file)\n"),
        }
        for issue in issues {
            let id = issue.record_id.as_deref().unwrap_or("?");
            out.push_str(&format!("  ✗ {} '{}': {}\n", issue.kind, id, issue.error));
        }
    }

    for warning in &report.warnings {
        out.push_str(&format!("  ! {}\n", warning));
    }

    if report.is_valid() {
        out.push_str(&format!(
            "✓ {} record(s) in {} file(s), no errors\n",
            report.records_checked, report.files_checked
        ));
    } else {
        out.push_str(&format!(
            "✗ {} error(s) across {} record(s) in {} file(s)\n",
            report.error_count(),
            report.records_checked,
            report.files_checked
        ));
    }
    out
}

pub fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results for '{}'\n", query);
    }
    let mut out = format!("{} result(s) for '{}'\n", hits.len(), query);
    for hit in hits {
        out.push_str(&format!(
            "  {:<13} {:<40} {} [{:?}, {}]\n",
            hit.entity.kind.as_str(), hit.entity.id, hit.label, hit.tier, hit.score
        ));
    }
    out
}

fn arrow(direction: Direction, label: &str) -> String {
    match direction {
        Direction::Incoming => format!("<-{}-", label),
        _ => format!("-{}->", label),
    }
}

pub fn format_neighbors(center: &NodeKey, neighbors: &[Neighbor]) -> String {
    let mut out = format!("{} ({} connection(s))\n", center, neighbors.len());
    for n in neighbors {
        out.push_str(&format!("  {} {} ({})", arrow(n.direction, n.edge.label.as_str()), n.node.key, n.node.label));
        if let Some(role) = &n.edge.role {
            out.push_str(&format!(" as {}", role));
        }
        if let Some(rel) = &n.edge.relation {
            out.push_str(&format!(" [{}]", rel.strength));
            if rel.start_date.is_some() || rel.end_date.is_some() {
                let start = rel.start_date.map(|d| d.to_string()).unwrap_or_else(|| "…".into());
                let end = rel.end_date.map(|d| d.to_string()).unwrap_or_else(|| "…".into());
                out.push_str(&format!(" {}..{}", start, end));
            }
        }
        out.push('\n');
    }
    out
}

fn format_steps(steps: &[Step]) -> String {
    let mut out = String::new();
    if let Some(first) = steps.first() {
        out.push_str(&first.from.to_string());
    }
    for step in steps {
        out.push_str(&format!(" {} {}", arrow(step.direction, step.edge.label.as_str()), step.to));
    }
    out
}

pub fn format_path(from: &str, to: &str, path: Option<&RelationalPath>) -> String {
    match path {
        None => format!("No path from {} to {}\n", from, to),
        Some(p) if p.is_empty() => format!("{} is {}\n", from, to),
        Some(p) => format!("{} hop(s): {}\n", p.len(), format_steps(&p.steps)),
    }
}

pub fn format_reached(start: &NodeKey, reached: &[Reached]) -> String {
    let mut out = format!("{} reaches {} node(s)\n", start, reached.len());
    for r in reached {
        out.push_str(&format!("  [{}] {} ({})\n", r.depth, r.node.key, r.node.label));
        out.push_str(&format!("      via {}\n", format_steps(&r.path)));
    }
    out
}

pub fn format_stats(stats: &GraphStats) -> String {
    let mut out = format!("Nodes: {}\nEdges: {}\nGlossary terms: {}\n", stats.nodes, stats.edges, stats.glossary_terms);
    out.push_str("\nNodes by kind:\n");
    for (kind, n) in &stats.nodes_by_kind {
        out.push_str(&format!("  {:<12} {}\n", kind, n));
    }
    out.push_str("\nEdges by label:\n");
    for (label, n) in &stats.edges_by_label {
        out.push_str(&format!("  {:<12} {}\n", label, n));
    }
    out.push_str("\nMost connected:\n");
    for d in &stats.most_connected {
        out.push_str(&format!("  {:>4}  {} ({})\n", d.degree, d.key, d.label));
    }
    out.push_str(&format!(
        "\nWeakly connected: {} ({} component(s))\n",
        if stats.weakly_connected { "yes" } else { "no" },
        stats.components
    ));
    out
}

pub fn format_timeline(group: &str, events: &[&Event]) -> String {
    if events.is_empty() {
        return format!("No events in timeline '{}'\n", group);
    }
    let mut out = format!("═══ {} ═══\n", group);
    for e in events {
        out.push_str(&format!("{}  {} ({})\n", e.date, e.title, e.event_type));
        out.push_str(&format!("            {}\n", e.summary));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anticorrupt_core::EntityRef;
    use anticorrupt_kg::MatchTier;

    #[test]
    fn empty_search() {
        assert_eq!(format_hits("xyz", &[]), "No results for 'xyz'\n");
    }

    #[test]
    fn hit_line_names_kind_and_id() {
        let hits = [SearchHit {
            entity: EntityRef::institution("stf"),
            label: "STF".into(),
            tier: MatchTier::ExactId,
            score: 3,
        }];
        let text = format_hits("stf", &hits);
        assert!(text.starts_with("1 result(s)"));
        assert!(text.contains("institution"));
        assert!(text.contains("ExactId"));
    }

    #[test]
    fn clean_report_summary() {
        let report = ValidationReport { records_checked: 4, files_checked: 4, ..Default::default() };
        assert_eq!(format_report(&report), "✓ 4 record(s) in 4 file(s), no errors\n");
    }

    #[test]
    fn missing_path() {
        assert_eq!(format_path("a", "b", None), "No path from a to b\n");
    }
}
