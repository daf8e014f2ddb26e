mod common;

use common::{memory_db, service, service_with, IndexCall, RecordingIndex};
use serde_json::json;
use suivi_core::{
    Annee, Criteria, EntityRef, FicheSuiviOuvrage, Macon, Pageable, Prevision, SearchHits,
    ServiceError, ValidationError,
};

fn count<E: suivi_core::Entity>(service: &suivi_core::EntityService<E>) -> u64 {
    service.count_by_criteria(&Criteria::default()).unwrap()
}

#[test]
fn create_assigns_id_and_indexes_once() {
    let (macons, index) = service::<Macon>(memory_db());

    let saved = macons.create(Macon::new("Dupont")).unwrap();

    assert!(saved.id.is_some());
    assert_eq!(count(&macons), 1);
    assert_eq!(index.calls(), vec![IndexCall::Save(saved.clone())]);
    assert_eq!(macons.find_one(saved.id.unwrap()).unwrap(), Some(saved));
}

#[test]
fn create_with_id_writes_nothing() {
    let (macons, index) = service::<Macon>(memory_db());
    let mut macon = Macon::new("preset");
    macon.id = Some(7);

    let err = macons.create(macon).unwrap_err();

    assert!(matches!(err, ServiceError::IdExists));
    assert_eq!(err.error_key(), "idexists");
    assert_eq!(count(&macons), 0);
    assert!(index.calls().is_empty());
}

#[test]
fn invalid_fields_write_nothing() {
    let db = memory_db();
    let (previsions, prevision_index) = service::<Prevision>(db.clone());
    let (fiches, fiche_index) = service::<FicheSuiviOuvrage>(db);

    let err = previsions.create(Prevision::new(-1)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::Negative { .. })
    ));

    let err = fiches.create(FicheSuiviOuvrage::new("   ")).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    assert_eq!(count(&previsions), 0);
    assert_eq!(count(&fiches), 0);
    assert!(prevision_index.calls().is_empty());
    assert!(fiche_index.calls().is_empty());
}

#[test]
fn dangling_reference_is_rejected_without_index_call() {
    let (fiches, index) = service::<FicheSuiviOuvrage>(memory_db());
    let mut fiche = FicheSuiviOuvrage::new("REF-1");
    fiche.macon = Some(EntityRef::new(999));

    let err = fiches.create(fiche).unwrap_err();

    assert!(matches!(err, ServiceError::InvalidReference(_)));
    assert!(err.is_client_error());
    assert_eq!(count(&fiches), 0);
    assert!(index.calls().is_empty());
}

#[test]
fn prevision_can_be_owned_by_one_annee_only() {
    let db = memory_db();
    let (previsions, _) = service::<Prevision>(db.clone());
    let (annees, index) = service::<Annee>(db);
    let prevision = previsions.create(Prevision::new(10)).unwrap();

    let mut first = Annee::new("2023");
    first.prevision = Some(EntityRef::new(prevision.id.unwrap()));
    annees.create(first).unwrap();

    let mut second = Annee::new("2024");
    second.prevision = Some(EntityRef::new(prevision.id.unwrap()));
    let err = annees.create(second).unwrap_err();

    assert_eq!(err.error_key(), "referenceinvalid");
    assert_eq!(count(&annees), 1);
    assert_eq!(index.calls().len(), 1);
}

#[test]
fn update_replaces_fields_and_indexes_once() {
    let (previsions, index) = service::<Prevision>(memory_db());
    let mut created = Prevision::new(3);
    created.commentaire = Some("initial".to_string());
    let created = previsions.create(created).unwrap();
    let id = created.id.unwrap();

    let mut replacement = Prevision::new(8);
    replacement.id = Some(id);
    let updated = previsions.update(id, replacement.clone()).unwrap();

    assert_eq!(updated, replacement);
    assert_eq!(count(&previsions), 1);
    assert_eq!(
        index.calls(),
        vec![IndexCall::Save(created), IndexCall::Save(updated)]
    );
}

#[test]
fn update_id_errors_write_nothing() {
    let (macons, index) = service::<Macon>(memory_db());
    let saved = macons.create(Macon::new("stable")).unwrap();
    let id = saved.id.unwrap();

    let err = macons.update(id, Macon::new("no id")).unwrap_err();
    assert!(matches!(err, ServiceError::IdNull));

    let mut other = Macon::new("other");
    other.id = Some(id + 1);
    let err = macons.update(id, other).unwrap_err();
    assert!(matches!(err, ServiceError::IdMismatch { .. }));
    assert_eq!(err.error_key(), "idinvalid");

    let mut missing = Macon::new("missing");
    missing.id = Some(id + 50);
    let err = macons.update(id + 50, missing).unwrap_err();
    assert!(matches!(err, ServiceError::IdNotFound(_)));

    assert_eq!(macons.find_one(id).unwrap(), Some(saved));
    assert_eq!(index.calls().len(), 1);
}

#[test]
fn partial_update_changes_only_given_members() {
    let db = memory_db();
    let (annees, _) = service::<Annee>(db.clone());
    let (fiches, index) = service::<FicheSuiviOuvrage>(db);
    let annee = annees.create(Annee::new("2024")).unwrap();

    let mut fiche = FicheSuiviOuvrage::new("VOILE-3");
    fiche.nb_elements = Some(4);
    fiche.observation = Some("RAS".to_string());
    fiche.annee = Some(EntityRef::new(annee.id.unwrap()));
    let fiche = fiches.create(fiche).unwrap();
    let id = fiche.id.unwrap();

    let patched = fiches
        .partial_update(
            id,
            &json!({"id": id, "nbElements": 6, "observation": null, "dateCoulage": "2024-05-02"}),
        )
        .unwrap();

    assert_eq!(patched.reference, "VOILE-3");
    assert_eq!(patched.nb_elements, Some(6));
    assert_eq!(patched.observation, None);
    assert_eq!(patched.annee, fiche.annee);
    assert_eq!(patched.date_coulage.unwrap().to_string(), "2024-05-02");
    assert_eq!(count(&fiches), 1);
    assert_eq!(index.calls().len(), 2);
    assert_eq!(index.calls()[1], IndexCall::Save(patched));
}

#[test]
fn empty_patch_keeps_entity_intact() {
    let (previsions, index) = service::<Prevision>(memory_db());
    let mut prevision = Prevision::new(12);
    prevision.commentaire = Some("garder".to_string());
    let saved = previsions.create(prevision).unwrap();
    let id = saved.id.unwrap();

    let patched = previsions.partial_update(id, &json!({ "id": id })).unwrap();

    assert_eq!(patched, saved);
    assert_eq!(previsions.find_one(id).unwrap(), Some(saved));
    assert_eq!(index.calls().len(), 2);
}

#[test]
fn partial_update_rejections_write_nothing() {
    let (previsions, index) = service::<Prevision>(memory_db());
    let saved = previsions.create(Prevision::new(5)).unwrap();
    let id = saved.id.unwrap();

    let cases = [
        (json!({"nbOuvrages": 1}), "idnull"),
        (json!({"id": id + 1, "nbOuvrages": 1}), "idinvalid"),
        (json!({"id": "x"}), "patchinvalid"),
        (json!([1, 2]), "patchinvalid"),
        (json!({"id": id, "nbOuvrages": null}), "validation"),
        (json!({"id": id, "nbOuvrages": -4}), "validation"),
        (json!({"id": id, "commentaire": "x".repeat(256)}), "validation"),
    ];
    for (patch, key) in cases {
        let err = previsions.partial_update(id, &patch).unwrap_err();
        assert_eq!(err.error_key(), key, "patch {patch}");
    }

    let err = previsions
        .partial_update(id + 9, &json!({ "id": id + 9 }))
        .unwrap_err();
    assert!(matches!(err, ServiceError::IdNotFound(_)));

    assert_eq!(previsions.find_one(id).unwrap(), Some(saved));
    assert_eq!(index.calls().len(), 1);
}

#[test]
fn delete_removes_row_and_indexes_once() {
    let (macons, index) = service::<Macon>(memory_db());
    let saved = macons.create(Macon::new("a supprimer")).unwrap();
    let id = saved.id.unwrap();

    assert!(macons.delete(id).unwrap());

    assert_eq!(count(&macons), 0);
    assert_eq!(index.calls()[1..], [IndexCall::Delete(id)]);
}

#[test]
fn delete_of_unknown_id_still_clears_index() {
    let (macons, index) = service::<Macon>(memory_db());

    assert!(!macons.delete(404).unwrap());
    assert_eq!(index.calls(), vec![IndexCall::Delete(404)]);
}

#[test]
fn delete_of_referenced_row_is_a_conflict() {
    let db = memory_db();
    let (macons, macon_index) = service::<Macon>(db.clone());
    let (fiches, _) = service::<FicheSuiviOuvrage>(db);
    let macon = macons.create(Macon::new("occupe")).unwrap();
    let id = macon.id.unwrap();
    let mut fiche = FicheSuiviOuvrage::new("DALLE-1");
    fiche.macon = Some(EntityRef::new(id));
    fiches.create(fiche).unwrap();

    let err = macons.delete(id).unwrap_err();

    assert!(matches!(err, ServiceError::StillReferenced(found) if found == id));
    assert_eq!(count(&macons), 1);
    assert_eq!(macon_index.calls().len(), 1);
}

#[test]
fn index_failures_do_not_fail_writes() {
    let (macons, index) = service_with::<Macon>(memory_db(), RecordingIndex::failing());

    let saved = macons.create(Macon::new("resilient")).unwrap();
    assert!(macons.delete(saved.id.unwrap()).unwrap());

    assert_eq!(index.calls().len(), 2);
    assert_eq!(count(&macons), 0);
}

#[test]
fn search_returns_index_hits_verbatim() {
    let (macons, index) = service::<Macon>(memory_db());
    let mut canned = Macon::new("only in index");
    canned.id = Some(77);
    index.set_hits(SearchHits {
        items: vec![canned.clone()],
        total: 31,
    });

    let page = macons.search("index", &Pageable::new(2, 5)).unwrap();

    assert_eq!(page.items, vec![canned]);
    assert_eq!(page.total, 31);
    match &index.calls()[..] {
        [IndexCall::Search(query)] => {
            assert_eq!(query.text, "index");
            assert_eq!(query.limit, 5);
            assert_eq!(query.offset, 10);
        }
        other => panic!("unexpected index calls: {other:?}"),
    }
}

#[test]
fn find_by_criteria_pages_and_counts() {
    let (macons, _) = service::<Macon>(memory_db());
    for name in ["a", "b", "c", "d", "e"] {
        macons.create(Macon::new(name)).unwrap();
    }

    let page = macons
        .find_by_criteria(&Criteria::default(), &Pageable::new(1, 2))
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.total_pages(), 3);
    let names = page.items.iter().map(|m| m.libelle.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["c", "d"]);
}

#[test]
fn reindex_rebuilds_documents_from_store() {
    let (macons, index) = service::<Macon>(memory_db());
    let first = macons.create(Macon::new("un")).unwrap();
    let second = macons.create(Macon::new("deux")).unwrap();

    assert_eq!(macons.reindex().unwrap(), 2);

    assert_eq!(
        index.calls()[2..],
        [
            IndexCall::Clear,
            IndexCall::Save(first),
            IndexCall::Save(second)
        ]
    );
}
