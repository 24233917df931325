//! Tests for anticorrupt-core: kinds, references, record shapes, errors

use anticorrupt_core::schema::*;
use anticorrupt_core::*;
use chrono::NaiveDate;
use serde_yaml::Value;

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

const STF: &str = r#"
id: stf
name_official: Supremo Tribunal Federal
name_common: STF
acronym: STF
type: judicial
jurisdiction: federal
description: Corte constitucional do Brasil.
hierarchy:
  parent: null
  children: [cnj]
tags: [judiciario]
"#;

// ===========================================================================
// EntityKind
// ===========================================================================

#[test]
fn kind_directories() {
    assert_eq!(EntityKind::Institution.dir_name(), "institutions");
    assert_eq!(EntityKind::Glossary.dir_name(), "glossary");
    assert_eq!(EntityKind::Glossary.collection_key(), "terms");
    assert_eq!(EntityKind::Relationship.collection_key(), "relationships");
}

#[test]
fn only_three_kinds_are_nodes() {
    let nodes: Vec<_> = EntityKind::ALL.iter().filter(|k| k.is_node_kind()).collect();
    assert_eq!(nodes.len(), 3);
    assert!(!EntityKind::Relationship.is_node_kind());
    assert!(!EntityKind::Glossary.is_node_kind());
}

#[test]
fn kind_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&EntityKind::Figure).unwrap(), r#""figure""#);
}

// ===========================================================================
// Institution
// ===========================================================================

#[test]
fn valid_institution() {
    let inst = validate_institution(&yaml(STF)).unwrap();
    assert_eq!(inst.id, "stf");
    assert_eq!(inst.branch, InstitutionType::Judicial);
    assert_eq!(inst.parent(), None);
    assert_eq!(inst.children(), ["cnj".to_string()]);
}

#[test]
fn institution_reports_every_bad_field() {
    let raw = yaml("id: stf\nname_common: STF\ntype: supreme\ntags: tribunal\n");
    let err = validate_institution(&raw).unwrap_err();
    let fields: Vec<&str> = err.fields.iter().map(|f| f.field.as_str()).collect();
    assert!(fields.contains(&"name_official"));
    assert!(fields.contains(&"acronym"));
    assert!(fields.contains(&"type"));
    assert!(fields.contains(&"jurisdiction"));
    assert!(fields.contains(&"description"));
    assert!(fields.contains(&"tags"));
    assert_eq!(err.id.as_deref(), Some("stf"));
    assert_eq!(err.kind, EntityKind::Institution);
}

#[test]
fn institution_rejects_bad_child_id() {
    let raw = yaml(&STF.replace("children: [cnj]", "children: [CNJ]"));
    let err = validate_institution(&raw).unwrap_err();
    assert_eq!(err.fields.len(), 1);
    assert_eq!(err.fields[0].field, "hierarchy.children[0]");
}

#[test]
fn institution_negative_member_count() {
    let raw = yaml(&format!("{}composition:\n  total_members: -11\n", STF));
    let err = validate_institution(&raw).unwrap_err();
    assert_eq!(err.fields.len(), 1);
    assert_eq!(err.fields[0].field, "composition.total_members");
    assert!(err.fields[0].problem.contains("out of range"));

    let raw = yaml(&format!("{}composition:\n  total_members: 11\n", STF));
    let inst = validate_institution(&raw).unwrap();
    assert_eq!(inst.composition.and_then(|c| c.total_members), Some(11));
}

#[test]
fn figure_education_year_out_of_range() {
    let raw = yaml(
        "id: moraes\nfull_name: Alexandre de Moraes\neducation:\n  - institution: USP\n    degree: Direito\n    year: 99999999999\n",
    );
    let err = validate_figure(&raw).unwrap_err();
    assert_eq!(err.fields.len(), 1);
    assert_eq!(err.fields[0].field, "education[0].year");
}

// ===========================================================================
// Figure
// ===========================================================================

#[test]
fn figure_current_role_is_last_open_entry() {
    let raw = yaml(
        r#"
id: lula
full_name: Luiz Inácio Lula da Silva
career:
  - role: Presidente da República
    institution: Presidência
    start_date: "2003-01-01"
    end_date: "2010-12-31"
  - role: Presidente da República
    institution: Presidência
    start_date: "2023-01-01"
"#,
    );
    let fig = validate_figure(&raw).unwrap();
    assert_eq!(fig.current_role(), Some("Presidente da República"));
    assert_eq!(fig.current_institution(), Some("Presidência"));
}

#[test]
fn figure_two_open_entries_same_institution() {
    let raw = yaml(
        r#"
id: moraes
full_name: Alexandre de Moraes
career:
  - role: Ministro
    institution: STF
    start_date: "2017-03-22"
  - role: Presidente
    institution: stf
    start_date: "2023-01-01"
  - role: Presidente
    institution: TSE
    start_date: "2022-08-16"
"#,
    );
    let err = validate_figure(&raw).unwrap_err();
    assert_eq!(err.fields.len(), 1);
    assert_eq!(err.fields[0].field, "career[1].end_date");
}

#[test]
fn figure_career_end_before_start() {
    let raw = yaml(
        "id: x\nfull_name: X\ncareer:\n  - role: r\n    institution: i\n    start_date: \"2020-01-01\"\n    end_date: \"2019-01-01\"\n",
    );
    let err = validate_figure(&raw).unwrap_err();
    assert_eq!(err.fields[0].field, "career[0].end_date");
}

#[test]
fn figure_invalid_controversy_status() {
    let raw = yaml(
        "id: x\nfull_name: X\ncontroversies:\n  - title: t\n    summary: s\n    status: rumored\n",
    );
    let err = validate_figure(&raw).unwrap_err();
    assert_eq!(err.fields[0].field, "controversies[0].status");
    assert!(err.fields[0].problem.contains("rumored"));
}

// ===========================================================================
// Event
// ===========================================================================

#[test]
fn event_missing_date() {
    let raw = yaml("id: e1\ntitle: E1\ntype: crisis\nsummary: s\n");
    let err = validate_event(&raw).unwrap_err();
    assert_eq!(err.fields, vec![FieldError::new("date", "missing required field")]);
}

#[test]
fn event_with_actors_and_links() {
    let raw = yaml(
        r#"
id: impeachment-dilma
title: Impeachment de Dilma Rousseff
date: "2016-08-31"
type: crisis
summary: Processo de impeachment.
actors:
  - figure_id: dilma
    role: impeached
institutions_involved: [senado-federal, stf]
causes: [pedaladas-fiscais]
consequences: [governo-temer]
"#,
    );
    let event = validate_event(&raw).unwrap();
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2016, 8, 31).unwrap());
    assert_eq!(event.actors[0].figure_id, "dilma");
    assert_eq!(event.causes, vec!["pedaladas-fiscais"]);
    assert_eq!(event.consequences, vec!["governo-temer"]);
}

// ===========================================================================
// Relationship
// ===========================================================================

#[test]
fn relationship_interval() {
    let raw = yaml(
        r#"
id: temer-appointed-moraes
source_type: figure
source_id: moraes
target_type: figure
target_id: temer
relationship_type: appointed_by
description: Indicado ao STF.
start_date: "2017-02-06"
end_date: "2017-03-22"
strength: strong
"#,
    );
    let rel = validate_relationship(&raw).unwrap();
    assert_eq!(rel.source(), EntityRef::figure("moraes"));
    assert!(rel.is_active_on(NaiveDate::from_ymd_opt(2017, 3, 1).unwrap()));
    assert!(!rel.is_active_on(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()));
}

#[test]
fn relationship_invalid_type() {
    let raw = yaml(
        "id: r\nsource_type: institution\nsource_id: a\ntarget_type: institution\ntarget_id: b\n\
         relationship_type: loves\ndescription: d\nstrength: strong\n",
    );
    let err = validate_relationship(&raw).unwrap_err();
    assert_eq!(err.fields[0].field, "relationship_type");
}

// ===========================================================================
// Glossary / dispatch
// ===========================================================================

#[test]
fn glossary_term_missing_required() {
    let err = validate_glossary_term(&yaml("id: impeachment\n")).unwrap_err();
    assert_eq!(err.fields.len(), 2);
}

#[test]
fn validate_shape_dispatches_on_kind() {
    let entity = validate_shape(EntityKind::Institution, &yaml(STF)).unwrap();
    assert_eq!(entity.kind(), EntityKind::Institution);
    assert_eq!(entity.entity_ref(), EntityRef::institution("stf"));
    assert!(validate_shape(EntityKind::Event, &yaml(STF)).is_err());
}

#[test]
fn typed_record_serializes_to_same_shape() {
    let inst = validate_institution(&yaml(STF)).unwrap();
    let text = serde_yaml::to_string(&Entity::from(inst.clone())).unwrap();
    assert!(text.contains("type: judicial"));
    let back = validate_institution(&yaml(&text)).unwrap();
    assert_eq!(back, inst);
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn not_found_display_names_kind_and_id() {
    let err = Error::not_found(Some(EntityKind::Figure), "ghost");
    assert_eq!(err.to_string(), "figure not found: ghost");
    assert!(err.is_not_found());
    let err = Error::not_found(None, "ghost");
    assert_eq!(err.to_string(), "entity not found: ghost");
}

#[test]
fn shape_error_display_lists_fields() {
    let err = validate_event(&yaml("id: e1\n")).unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("event record 'e1'"));
    assert!(text.contains("[title]"));
}
