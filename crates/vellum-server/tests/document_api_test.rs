//! HTTP-level tests for documents, versions, sharing and comments.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use vellum_storage::ObjectStore;

use common::TestApp;

#[tokio::test]
async fn upload_show_and_download() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (user_id, token) = app.user("acme", "alice@example.com").await;

    let doc = app.upload(&token, "notes.txt", b"hello world").await;
    assert_eq!(doc["title"], "notes.txt");
    assert_eq!(doc["owner_id"], user_id.as_str());
    assert_eq!(doc["current_version"], 1);
    assert_eq!(doc["file_size"], 11);
    assert_eq!(doc["file_size_formatted"], "11 B");
    assert_eq!(app.store.len().await, 1);

    let id = doc["id"].as_str().unwrap();
    let (status, body) = app.get(&format!("/api/v1/documents/{id}/download"), &token).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["url"].as_str().unwrap().contains("expires="));

    let (_, body) = app.get(&format!("/api/v1/documents/{id}"), &token).await;
    assert_eq!(body["data"]["download_count"], 1);
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_storage() {
    let mut settings = common::settings();
    settings.max_upload_bytes = 16;
    let app = TestApp::with_settings(settings).await;
    app.create_tenant("acme").await;
    let (_, token) = app.user("acme", "alice@example.com").await;

    let (status, body) = app
        .upload_to("/api/v1/documents", &token, "big.txt", &[b'x'; 64], &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("maximum upload size")
    );
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn upload_normalises_tags() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, token) = app.user("acme", "alice@example.com").await;

    let (status, body) = app
        .upload_to(
            "/api/v1/documents",
            &token,
            "plan.txt",
            b"plan",
            &[("title", "Plan"), ("tags", "Work, work ,Q3,")],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["title"], "Plan");
    assert_eq!(body["data"]["tags"], json!(["work", "q3"]));
}

#[tokio::test]
async fn soft_deleted_documents_disappear() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, token) = app.user("acme", "alice@example.com").await;

    let keep = app.upload(&token, "keep.txt", b"keep").await;
    let gone = app.upload(&token, "gone.txt", b"gone").await;
    let gone_id = gone["id"].as_str().unwrap();

    let (status, _) = app.delete(&format!("/api/v1/documents/{gone_id}"), &token).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/v1/documents", &token).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["id"], keep["id"]);

    let (status, _) = app.get(&format!("/api/v1/documents/{gone_id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The stored object stays until an admin purges the document.
    assert_eq!(app.store.len().await, 2);
}

#[tokio::test]
async fn versions_and_restore() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, token) = app.user("acme", "alice@example.com").await;

    let doc = app.upload(&token, "Q3 report.txt", b"first draft").await;
    let id = doc["id"].as_str().unwrap();
    let v1_key = doc["storage_key"].as_str().unwrap().to_string();

    let (status, body) = app
        .upload_to(
            &format!("/api/v1/documents/{id}/versions"),
            &token,
            "report-v2.txt",
            b"second draft, longer",
            &[("change_note", "rewrite")],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["current_version"], 2);
    assert_eq!(body["data"]["file_name"], "report-v2.txt");
    let history_before = body["data"]["versions"].clone();

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/documents/{id}/versions/1/restore"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["current_version"], 3);
    assert_eq!(body["data"]["file_size"], 11);
    assert_eq!(body["data"]["file_name"], "Q3 report.txt");
    assert_eq!(body["data"]["storage_key"], v1_key.as_str());

    // Restore appends; earlier entries are untouched.
    let history = body["data"]["versions"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0], history_before[0]);
    assert_eq!(history[1], history_before[1]);
    assert_eq!(history[2]["file_name"], "Q3 report.txt");
    assert_eq!(history[2]["storage_key"], v1_key.as_str());
    assert_eq!(history[2]["change_note"], "Restored from version 1");

    let (status, body) = app.get(&format!("/api/v1/documents/{id}/download"), &token).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["file_name"], "Q3 report.txt");
    assert!(body["data"]["url"].as_str().unwrap().contains(&v1_key));
    assert_eq!(app.store.get(&v1_key).await.unwrap().as_ref(), b"first draft");
    // Restoring reuses the stored object instead of writing a new one.
    assert_eq!(app.store.len().await, 2);

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/documents/{id}/versions/3/restore"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get(&format!("/api/v1/documents/{id}/versions"), &token).await;
    let numbers: Vec<u64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![3, 2, 1]);
}

#[tokio::test]
async fn other_tenants_cannot_see_documents() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    app.create_tenant("globex").await;
    let (_, alice) = app.user("acme", "alice@example.com").await;
    let (_, mallory) = app.user("globex", "mallory@example.com").await;

    let doc = app.upload(&alice, "secret.txt", b"secret").await;
    let id = doc["id"].as_str().unwrap();

    let (status, _) = app.get(&format!("/api/v1/documents/{id}"), &mallory).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/api/v1/documents/{id}"), &mallory).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/v1/documents", &mallory).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn unshared_documents_are_forbidden_within_a_tenant() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, alice) = app.user("acme", "alice@example.com").await;
    let (_, bob) = app.user("acme", "bob@example.com").await;

    let doc = app.upload(&alice, "private.txt", b"private").await;
    let id = doc["id"].as_str().unwrap();

    let (status, _) = app.get(&format!("/api/v1/documents/{id}"), &bob).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sharing_twice_keeps_one_entry_and_notifies() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, alice) = app.user("acme", "alice@example.com").await;
    let (bob_id, bob) = app.user("acme", "bob@example.com").await;

    let doc = app.upload(&alice, "shared.txt", b"shared").await;
    let id = doc["id"].as_str().unwrap();
    let share = json!({ "user_id": bob_id, "permission": "view" });

    for _ in 0..2 {
        let (status, body) = app
            .post(&format!("/api/v1/documents/{id}/share"), Some(&alice), share.clone())
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["shared_with"].as_array().unwrap().len(), 1);
    }

    let (status, _) = app.get(&format!("/api/v1/documents/{id}"), &bob).await;
    assert_eq!(status, StatusCode::OK);

    // View permission does not allow editing.
    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/v1/documents/{id}"),
            Some(&bob),
            Some(json!({ "title": "mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.get("/api/v1/notifications/unread-count", &bob).await;
    assert_eq!(body["data"]["count"], 1);

    let (status, body) = app
        .delete(&format!("/api/v1/documents/{id}/share/{bob_id}"), &alice)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["shared_with"].as_array().unwrap().is_empty());
    let (status, _) = app.get(&format!("/api/v1/documents/{id}"), &bob).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cannot_share_with_another_tenant() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    app.create_tenant("globex").await;
    let (_, alice) = app.user("acme", "alice@example.com").await;
    let (mallory_id, _) = app.user("globex", "mallory@example.com").await;

    let doc = app.upload(&alice, "a.txt", b"a").await;
    let id = doc["id"].as_str().unwrap();
    let (status, _) = app
        .post(
            &format!("/api/v1/documents/{id}/share"),
            Some(&alice),
            json!({ "user_id": mallory_id, "permission": "edit" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn copy_creates_an_independent_document() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, token) = app.user("acme", "alice@example.com").await;

    let doc = app.upload(&token, "orig.txt", b"original").await;
    let id = doc["id"].as_str().unwrap();
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/documents/{id}/copy"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_ne!(body["data"]["id"], doc["id"]);
    assert_eq!(body["data"]["title"], "orig.txt (Copy)");
    assert_eq!(body["data"]["current_version"], 1);
    assert_eq!(app.store.len().await, 2);
}

#[tokio::test]
async fn comments_thread_and_react_once_per_user() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, alice) = app.user("acme", "alice@example.com").await;
    let (bob_id, bob) = app.user("acme", "bob@example.com").await;

    let doc = app.upload(&alice, "discuss.txt", b"discuss").await;
    let id = doc["id"].as_str().unwrap();
    app.post(
        &format!("/api/v1/documents/{id}/share"),
        Some(&alice),
        json!({ "user_id": bob_id, "permission": "view" }),
    )
    .await;

    let (status, body) = app
        .post(
            &format!("/api/v1/documents/{id}/comments"),
            Some(&bob),
            json!({ "content": "Looks good" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let comment_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/api/v1/documents/{id}/comments"),
            Some(&alice),
            json!({ "content": "Thanks", "parent_id": comment_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let reply_id = body["data"]["id"].as_str().unwrap().to_string();

    // Replies cannot be replied to.
    let (status, _) = app
        .post(
            &format!("/api/v1/documents/{id}/comments"),
            Some(&bob),
            json!({ "content": "Nested", "parent_id": reply_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for emoji in ["👍", "🎉"] {
        let (status, body) = app
            .request(
                Method::PUT,
                &format!("/api/v1/comments/{comment_id}/reactions"),
                Some(&alice),
                Some(json!({ "emoji": emoji })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (status, body) = app.get(&format!("/api/v1/documents/{id}/comments"), &bob).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let threads = body["data"].as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["replies"].as_array().unwrap().len(), 1);
    let reactions = threads[0]["reactions"].as_array().unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0]["emoji"], "🎉");

    // Alice is notified of Bob's comment, Bob of Alice's reply.
    let (_, body) = app.get("/api/v1/notifications/unread-count", &alice).await;
    assert_eq!(body["data"]["count"], 1);

    // Only the author may edit.
    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/v1/comments/{comment_id}"),
            Some(&alice),
            Some(json!({ "content": "hijacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn page_numbers_past_the_cap_are_rejected() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, token) = app.user("acme", "alice@example.com").await;
    app.upload(&token, "notes.txt", b"hello").await;

    let (status, body) = app
        .get("/api/v1/documents?page=18446744073709551615&limit=100", &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["errors"][0]["field"], "page");

    let (status, body) = app.get("/api/v1/documents?page=1000000&limit=100", &token).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["pagination"]["total"], 1);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn whitespace_only_text_is_rejected() {
    let app = TestApp::new().await;
    app.create_tenant("acme").await;
    let (_, token) = app.user("acme", "alice@example.com").await;
    let doc = app.upload(&token, "notes.txt", b"hello").await;
    let id = doc["id"].as_str().unwrap();

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/api/v1/documents/{id}"),
            Some(&token),
            Some(json!({ "title": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["errors"][0]["field"], "title");

    let (status, body) = app
        .post(
            &format!("/api/v1/documents/{id}/comments"),
            Some(&token),
            json!({ "content": " \n\t " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["errors"][0]["field"], "content");

    let (_, body) = app.get(&format!("/api/v1/documents/{id}"), &token).await;
    assert_eq!(body["data"]["title"], "notes.txt");
}
