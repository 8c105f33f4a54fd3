mod common;

use common::{serve, TestServer};
use flowrun::config::Config;
use flowrun::diagram::storage::DiagramStorage;
use flowrun::server::{build_router, build_state};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

async fn app() -> TestServer {
    let storage = DiagramStorage::in_memory().await.unwrap();
    let state = build_state(&Config::default(), storage).await.unwrap();
    serve(build_router(state)).await
}

fn survey() -> Value {
    json!({
        "title": "Eligibility",
        "description": "Checks whether an applicant is an adult",
        "author": "user-1",
        "result": [
            { "label": "Adult", "value": "answers.age >= 18", "reference": "policy-7" },
            { "label": "Minor", "value": "answers.age < 18" }
        ],
        "nodes": [
            { "id": "start", "type": "input", "position": { "x": 0, "y": 0 }, "data": { "label": "Start" } },
            { "id": "age", "type": "question", "data": { "question": "Age?", "valid": "answers.age > 0" } },
            { "id": "end", "type": "output", "data": {} }
        ],
        "edges": [
            { "id": "e1", "source": "start", "target": "age" },
            { "id": "e2", "source": "age", "target": "end" }
        ],
        "viewport": { "x": 0, "y": 0, "zoom": 1 }
    })
}

#[tokio::test]
async fn health_check_answers_ok() {
    let server = app().await;
    let body = reqwest::get(server.url("/healthz")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn diagram_crud_round_trip() {
    let server = app().await;
    let client = Client::new();

    let created = client.post(server.url("/api/diagrams")).json(&survey()).send().await.unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let id = created.json::<Value>().await.unwrap()["id"].as_str().unwrap().to_string();

    let fetched: Value = client
        .get(server.url(&format!("/api/diagrams/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["title"], json!("Eligibility"));
    assert_eq!(fetched["nodes"][1]["type"], json!("question"));
    assert!(fetched["createdAt"].is_string());

    let mut edited = survey();
    edited["title"] = json!("Eligibility v2");
    let updated = client
        .put(server.url(&format!("/api/diagrams/{}", id)))
        .json(&edited)
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);

    let listing: Value = client.get(server.url("/api/diagrams")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listing["totalCount"], json!(1));
    assert_eq!(listing["diagrams"][0]["title"], json!("Eligibility v2"));

    let public: Value = client
        .get(server.url("/api/diagrams?public=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public["totalCount"], json!(0));

    let deleted = client.delete(server.url(&format!("/api/diagrams/{}", id))).send().await.unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    let gone = client.get(server.url(&format!("/api/diagrams/{}", id))).send().await.unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejects_invalid_and_conflicting_diagrams() {
    let server = app().await;
    let client = Client::new();

    let mut untitled = survey();
    untitled["description"] = json!("");
    let response = client.post(server.url("/api/diagrams")).json(&untitled).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut duplicated = survey();
    duplicated["nodes"][2]["id"] = json!("age");
    let response = client.post(server.url("/api/diagrams")).json(&duplicated).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut fixed_id = survey();
    fixed_id["id"] = json!("eligibility");
    let first = client.post(server.url("/api/diagrams")).json(&fixed_id).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = client.post(server.url("/api/diagrams")).json(&fixed_id).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let missing = client
        .put(server.url("/api/diagrams/nope"))
        .json(&survey())
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn runs_are_driven_by_events() {
    let server = app().await;
    let client = Client::new();

    let created: Value = client
        .post(server.url("/api/diagrams"))
        .json(&survey())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let diagram_id = created["id"].as_str().unwrap();

    let run = client
        .post(server.url(&format!("/api/diagrams/{}/runs", diagram_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(run.status(), StatusCode::CREATED);
    let run: Value = run.json().await.unwrap();
    assert_eq!(run["snapshot"]["state"], json!({ "value": "idle" }));
    let events_url = server.url(&format!("/api/runs/{}/events", run["runId"].as_str().unwrap()));
    let run_url = server.url(&format!("/api/runs/{}", run["runId"].as_str().unwrap()));

    let waiting: Value = client
        .post(&events_url)
        .json(&json!({ "type": "START" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(waiting["state"], json!({ "value": "running", "step": "waitingInput" }));
    assert_eq!(waiting["currentNodeId"], json!("age"));

    let done: Value = client
        .post(&events_url)
        .json(&json!({ "type": "ANSWER", "nodeId": "age", "answer": 30 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(done["state"], json!({ "value": "completed" }));
    assert_eq!(done["answers"], json!({ "age": 30 }));
    assert_eq!(
        done["results"],
        json!([{ "label": "Adult", "value": "answers.age >= 18", "reference": "policy-7" }])
    );
    assert_eq!(done["answerReport"], json!([{ "id": "age", "answer": 30, "valid": true }]));

    let current: Value = client.get(&run_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(current, done);

    let discarded = client.delete(&run_url).send().await.unwrap();
    assert_eq!(discarded.status(), StatusCode::OK);
    let gone = client.get(&run_url).send().await.unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_runs_and_diagrams_are_not_found() {
    let server = app().await;
    let client = Client::new();

    let no_diagram = client.post(server.url("/api/diagrams/missing/runs")).send().await.unwrap();
    assert_eq!(no_diagram.status(), StatusCode::NOT_FOUND);

    let no_run = client
        .post(server.url(&format!("/api/runs/{}/events", uuid::Uuid::new_v4())))
        .json(&json!({ "type": "STOP" }))
        .send()
        .await
        .unwrap();
    assert_eq!(no_run.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_gemini_credential_can_be_set_and_never_blank() {
    let server = app().await;
    let client = Client::new();

    let stored = client
        .put(server.url("/api/credentials/gemini"))
        .json(&json!({ "apiKey": "new-key" }))
        .send()
        .await
        .unwrap();
    assert_eq!(stored.status(), StatusCode::NO_CONTENT);

    let blank = client
        .put(server.url("/api/credentials/gemini"))
        .json(&json!({ "apiKey": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let unknown = client
        .put(server.url("/api/credentials/puter"))
        .json(&json!({ "apiKey": "token" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}
