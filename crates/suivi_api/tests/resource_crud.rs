mod common;

use axum::http::{Method, StatusCode};
use common::{test_app, IndexCall};
use serde_json::json;

#[tokio::test]
async fn create_returns_location_alert_and_indexes_once() {
    let app = test_app();

    let response = app
        .post_json("/api/macons", json!({ "libelle": "Dupont" }))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let id = response.body["id"].as_i64().unwrap();
    assert_eq!(response.header("location"), format!("/api/macons/{id}"));
    assert_eq!(response.header("x-suiviapp-alert"), "suiviApp.macon.created");
    assert_eq!(response.header("x-suiviapp-params"), id.to_string());
    assert_eq!(response.body["libelle"], "Dupont");

    let calls = app.macons.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(&calls[0], IndexCall::Save(saved) if saved.id == Some(id)));
    assert_eq!(app.get("/api/macons/count").await.body, json!(1));
}

#[tokio::test]
async fn create_with_existing_id_is_rejected_without_writes() {
    let app = test_app();

    let response = app
        .post_json("/api/macons", json!({ "id": 5, "libelle": "preset" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errorKey"], "idexists");
    assert_eq!(response.body["message"], "error.idexists");
    assert_eq!(response.body["entityName"], "macon");
    assert_eq!(response.header("x-suiviapp-error"), "error.idexists");
    assert_eq!(response.header("x-suiviapp-params"), "macon");
    assert_eq!(app.get("/api/macons/count").await.body, json!(0));
    assert!(app.macons.calls().is_empty());
}

#[tokio::test]
async fn missing_required_fields_are_rejected() {
    let app = test_app();

    let response = app.post_json("/api/macons", json!({})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/api/previsions", json!({ "nbOuvrages": null }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/api/fiche-suivi-ouvrages", json!({ "reference": "  " }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errorKey"], "validation");

    assert!(app.macons.calls().is_empty());
    assert!(app.previsions.calls().is_empty());
    assert!(app.fiches.calls().is_empty());
}

#[tokio::test]
async fn non_json_body_is_unsupported() {
    let app = test_app();

    let response = app
        .send(
            Method::POST,
            "/api/macons",
            Some(("text/plain", json!({ "libelle": "x" }))),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(app.macons.calls().is_empty());
}

#[tokio::test]
async fn get_returns_entity_or_404() {
    let app = test_app();
    let id = app
        .create("previsions", json!({ "nbOuvrages": 4, "commentaire": "lot A" }))
        .await;

    let found = app.get(&format!("/api/previsions/{id}")).await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(
        found.body,
        json!({ "id": id, "nbOuvrages": 4, "commentaire": "lot A" })
    );

    let missing = app.get(&format!("/api/previsions/{}", id + 1)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let malformed = app.get("/api/previsions/abc").await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn put_replaces_entity_and_indexes_once() {
    let app = test_app();
    let id = app
        .create("previsions", json!({ "nbOuvrages": 4, "commentaire": "lot A" }))
        .await;

    let response = app
        .put_json(
            &format!("/api/previsions/{id}"),
            json!({ "id": id, "nbOuvrages": 9 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("x-suiviapp-alert"), "suiviApp.prevision.updated");
    assert_eq!(response.body, json!({ "id": id, "nbOuvrages": 9, "commentaire": null }));
    assert_eq!(app.previsions.calls().len(), 2);
    assert_eq!(app.get("/api/previsions/count").await.body, json!(1));
}

#[tokio::test]
async fn put_id_errors_are_bad_requests() {
    let app = test_app();
    let id = app.create("macons", json!({ "libelle": "stable" })).await;
    let uri = format!("/api/macons/{id}");

    let cases = [
        (json!({ "libelle": "x" }), "idnull"),
        (json!({ "id": id + 1, "libelle": "x" }), "idinvalid"),
    ];
    for (body, key) in cases {
        let response = app.put_json(&uri, body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["errorKey"], key);
    }

    let unknown = id + 10;
    let response = app
        .put_json(
            &format!("/api/macons/{unknown}"),
            json!({ "id": unknown, "libelle": "x" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errorKey"], "idnotfound");

    assert_eq!(app.get(&uri).await.body["libelle"], "stable");
    assert_eq!(app.macons.calls().len(), 1);
}

#[tokio::test]
async fn patch_merges_only_given_members() {
    let app = test_app();
    let annee = app.create("annees", json!({ "libelle": "2024" })).await;
    let id = app
        .create(
            "fiche-suivi-ouvrages",
            json!({
                "reference": "POUTRE-7",
                "dateCoulage": "2024-02-01",
                "nbElements": 3,
                "observation": "fissure",
                "annee": { "id": annee }
            }),
        )
        .await;

    let response = app
        .patch_json(
            &format!("/api/fiche-suivi-ouvrages/{id}"),
            json!({ "id": id, "nbElements": 5, "observation": null }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["reference"], "POUTRE-7");
    assert_eq!(response.body["dateCoulage"], "2024-02-01");
    assert_eq!(response.body["nbElements"], 5);
    assert_eq!(response.body["observation"], json!(null));
    assert_eq!(response.body["annee"], json!({ "id": annee }));
    assert_eq!(app.fiches.calls().len(), 2);
}

#[tokio::test]
async fn empty_patch_leaves_entity_intact() {
    let app = test_app();
    let id = app
        .create("previsions", json!({ "nbOuvrages": 2, "commentaire": "garder" }))
        .await;
    let before = app.get(&format!("/api/previsions/{id}")).await.body;

    let response = app
        .patch_json(&format!("/api/previsions/{id}"), json!({ "id": id }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, before);
    assert_eq!(app.get(&format!("/api/previsions/{id}")).await.body, before);
}

#[tokio::test]
async fn patch_accepts_plain_json_and_rejects_other_types() {
    let app = test_app();
    let id = app.create("macons", json!({ "libelle": "avant" })).await;
    let uri = format!("/api/macons/{id}");

    let response = app
        .send(
            Method::PATCH,
            &uri,
            Some(("application/json", json!({ "id": id, "libelle": "apres" }))),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["libelle"], "apres");

    let response = app
        .send(
            Method::PATCH,
            &uri,
            Some(("text/plain", json!({ "id": id, "libelle": "jamais" }))),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn patch_id_errors_and_missing_path_id() {
    let app = test_app();
    let id = app.create("macons", json!({ "libelle": "stable" })).await;

    let response = app
        .patch_json(&format!("/api/macons/{id}"), json!({ "libelle": "x" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errorKey"], "idnull");

    let response = app
        .patch_json(
            &format!("/api/macons/{id}"),
            json!({ "id": id + 1, "libelle": "x" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errorKey"], "idinvalid");

    let response = app
        .patch_json("/api/macons", json!({ "id": id, "libelle": "x" }))
        .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);

    assert_eq!(app.macons.calls().len(), 1);
}

#[tokio::test]
async fn delete_returns_204_and_indexes_once() {
    let app = test_app();
    let id = app.create("prefabricants", json!({ "libelle": "Beton+" })).await;

    let response = app.delete(&format!("/api/prefabricants/{id}")).await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(
        response.header("x-suiviapp-alert"),
        "suiviApp.prefabricant.deleted"
    );
    assert_eq!(app.get("/api/prefabricants/count").await.body, json!(0));
    assert_eq!(app.prefabricants.calls()[1..], [IndexCall::Delete(id)]);
}

#[tokio::test]
async fn delete_of_referenced_row_conflicts() {
    let app = test_app();
    let macon = app.create("macons", json!({ "libelle": "occupe" })).await;
    app.create(
        "fiche-suivi-ouvrages",
        json!({ "reference": "DALLE-2", "macon": { "id": macon } }),
    )
    .await;

    let response = app.delete(&format!("/api/macons/{macon}")).await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["errorKey"], "referenced");
    assert_eq!(app.get("/api/macons/count").await.body, json!(1));
}

#[tokio::test]
async fn dangling_reference_is_a_bad_request() {
    let app = test_app();

    let response = app
        .post_json(
            "/api/annees",
            json!({ "libelle": "2030", "prevision": { "id": 999 } }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errorKey"], "referenceinvalid");
    assert!(app.annees.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_share_the_store_without_stalling() {
    let app = test_app();

    let (nord, sud, est, ouest, health) = tokio::join!(
        app.post_json("/api/macons", json!({ "libelle": "Nord" })),
        app.post_json("/api/macons", json!({ "libelle": "Sud" })),
        app.post_json("/api/macons", json!({ "libelle": "Est" })),
        app.post_json("/api/macons", json!({ "libelle": "Ouest" })),
        app.get("/management/health"),
    );

    for response in [&nord, &sud, &est, &ouest] {
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    }
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "UP");

    let count = app.get("/api/macons/count").await;
    assert_eq!(count.body, json!(4));
    let saves = app
        .macons
        .calls()
        .into_iter()
        .filter(|call| matches!(call, IndexCall::Save(_)))
        .count();
    assert_eq!(saves, 4);
}
