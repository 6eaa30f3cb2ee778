mod common;

use common::{memory_store, Decoration, Ghost, Level, LevelRow, Note, Person, PersonRow};
use recordmap_core::{
    DecodeError, DeleteOutcome, FetchError, Mappable, MappingEngine, MappingError, Predicate,
    Record, StoreAccess,
};

/// Query-only model matching people by name.
struct ByName(&'static str);

impl Mappable for ByName {
    fn entity_type(&self) -> Option<&str> {
        Some("Person")
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        Some(Predicate::eq("name", self.0))
    }

    fn populate(&self, record: &mut Record) {
        record.set("name", self.0);
    }
}

fn seeded_engine() -> MappingEngine<recordmap_core::InMemoryStore> {
    let mut engine = MappingEngine::new(memory_store());
    engine
        .insert(&Person::new("ada@example.com", "Ada"))
        .unwrap();
    engine
        .insert(&Person::new("grace@example.com", "Grace"))
        .unwrap();
    engine
}

#[test]
fn retrieve_returns_only_records_matching_predicate() {
    let engine = seeded_engine();

    let matched = engine.retrieve(&ByName("Grace")).unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(
        matched[0].value("email").as_str(),
        Some("grace@example.com")
    );
}

#[test]
fn retrieve_without_predicate_returns_every_record_of_the_type() {
    let mut engine = MappingEngine::new(memory_store());
    for text in ["a", "b", "c"] {
        engine
            .insert(&Note {
                text: text.to_string(),
            })
            .unwrap();
    }

    let all = engine
        .retrieve(&Note {
            text: "ignored".to_string(),
        })
        .unwrap();
    let texts: Vec<&str> = all
        .iter()
        .filter_map(|record| record.value("text").as_str())
        .collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
}

#[test]
fn retrieve_without_entity_type_yields_nothing() {
    let engine = seeded_engine();
    let before = engine.store().fetch_count();

    let records = engine.retrieve(&Decoration { notes: Vec::new() }).unwrap();
    assert!(records.is_empty());
    assert_eq!(engine.store().fetch_count(), before);
}

#[test]
fn failed_fetch_is_distinguishable_and_collapsible() {
    let mut engine = seeded_engine();
    engine.store_mut().fail_fetches("Person");

    let err = engine.retrieve(&ByName("Ada")).unwrap_err();
    assert!(matches!(err, FetchError::Unavailable(_)));
    assert!(engine.retrieve_or_empty(&ByName("Ada")).is_empty());

    engine.store_mut().restore_fetches();
    assert_eq!(engine.retrieve_or_empty(&ByName("Ada")).len(), 1);
}

#[test]
fn retrieve_of_unregistered_entity_reports_unknown_entity() {
    let engine = seeded_engine();
    let err = engine.retrieve(&Ghost).unwrap_err();
    assert!(matches!(err, FetchError::UnknownEntity(name) if name == "Ghost"));
}

#[test]
fn retrieve_as_decodes_typed_rows() {
    let engine = seeded_engine();

    let rows: Vec<PersonRow> = engine.retrieve_as(&ByName("Ada")).unwrap();
    assert_eq!(
        rows,
        vec![PersonRow {
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            nickname: None,
        }]
    );
}

#[test]
fn retrieve_as_rejects_mismatched_entity() {
    let engine = seeded_engine();

    let err = engine.retrieve_as::<LevelRow, _>(&ByName("Ada")).unwrap_err();
    assert!(matches!(
        err,
        MappingError::EntityMismatch { ref expected, ref actual }
            if expected == "Level" && actual == "Person"
    ));
}

#[test]
fn retrieve_as_surfaces_decode_errors() {
    let mut engine = MappingEngine::new(memory_store());
    engine.create("Person").unwrap().set("email", "x@example.com");
    engine.commit().unwrap();

    let err = engine
        .retrieve_as::<PersonRow, _>(&Person::new("x@example.com", "X"))
        .unwrap_err();
    assert!(matches!(
        err,
        MappingError::Decode(DecodeError::MissingField { ref field, .. }) if field == "name"
    ));
}

#[test]
fn create_then_commit_persists_a_manual_record() {
    let mut engine = MappingEngine::new(memory_store());
    assert!(!engine.commit().unwrap());

    engine.create("Level").unwrap().set("level", 7);
    assert!(engine.create("Ghost").is_err());
    assert!(engine.commit().unwrap());

    let rows: Vec<LevelRow> = engine
        .retrieve_as(&Level {
            level: 7,
            deepest: 7,
        })
        .unwrap();
    assert_eq!(rows, vec![LevelRow { level: 7 }]);
    assert_eq!(engine.store().commit_count(), 1);
}

#[test]
fn delete_on_empty_store_is_silent() {
    let mut engine = MappingEngine::new(memory_store());

    let outcome = engine
        .delete(&Person::new("nobody@example.com", "Nobody"))
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::NothingToDelete);
    assert_eq!(outcome.deleted_count(), 0);
    assert_eq!(engine.store().commit_count(), 0);
}

#[test]
fn delete_removes_matches_and_commits_once() {
    let mut engine = seeded_engine();
    let commits_before = engine.store().commit_count();

    let outcome = engine.delete(&ByName("Ada")).unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted { count: 1 });
    assert_eq!(engine.store().commit_count(), commits_before + 1);
    assert_eq!(engine.store().record_count("Person"), 1);
    assert!(engine.retrieve(&ByName("Ada")).unwrap().is_empty());
}

#[test]
fn delete_without_predicate_removes_every_record_of_the_type() {
    let mut engine = MappingEngine::new(memory_store());
    for text in ["a", "b"] {
        engine
            .insert(&Note {
                text: text.to_string(),
            })
            .unwrap();
    }

    let outcome = engine
        .delete(&Note {
            text: String::new(),
        })
        .unwrap();
    assert_eq!(outcome.deleted_count(), 2);
    assert_eq!(engine.store().record_count("Note"), 0);
}

#[test]
fn delete_of_unknown_entity_is_nothing_to_delete() {
    let mut engine = seeded_engine();
    assert_eq!(
        engine.delete(&Ghost).unwrap(),
        DeleteOutcome::NothingToDelete
    );
}

#[test]
fn delete_propagates_fetch_and_commit_failures() {
    let mut engine = seeded_engine();

    engine.store_mut().fail_fetches("Person");
    assert!(matches!(
        engine.delete(&ByName("Ada")).unwrap_err(),
        MappingError::Fetch(_)
    ));
    engine.store_mut().restore_fetches();

    engine.store_mut().fail_next_commit();
    assert!(matches!(
        engine.delete(&ByName("Ada")).unwrap_err(),
        MappingError::Commit(_)
    ));
    assert!(engine.store().has_changes());
    assert_eq!(engine.store().record_count("Person"), 2);
}
