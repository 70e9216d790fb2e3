mod common;

use axum::Router;
use common::{attachment, mail, temp_storage};
use slurper::{app::AppState, http, storage::Storage};
use tempfile::TempDir;
use tokio::task::JoinHandle;

async fn start_server() -> (String, Storage, TempDir, JoinHandle<()>) {
    let (storage, dir) = temp_storage().await;
    let state = AppState {
        storage: storage.clone(),
    };
    let app: Router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), storage, dir, handle)
}

#[tokio::test]
async fn list_and_fetch_mail() {
    let (base, storage, _dir, _srv) = start_server().await;
    let mut item = mail("Hello JSON", "2020-01-01 00:00:00");
    item.attachments = vec![attachment("a.txt", b"ABC123")];
    storage.store(&item).await.unwrap();
    storage
        .store(&mail("Second", "2020-02-01 00:00:00"))
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let res = client.get(format!("{}/mail", base)).send().await.unwrap();
    assert!(res.status().is_success());
    let v: serde_json::Value = res.json().await.unwrap();
    assert_eq!(v["totalRecords"], 2);
    let items = v["mailItems"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["subject"], "Second");

    let res = client
        .get(format!("{}/mail?offset=1&length=1", base))
        .send()
        .await
        .unwrap();
    let v: serde_json::Value = res.json().await.unwrap();
    assert_eq!(v["mailItems"].as_array().unwrap().len(), 1);
    assert_eq!(v["mailItems"][0]["subject"], "Hello JSON");

    let res = client
        .get(format!("{}/mail/{}", base, item.id))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let v: serde_json::Value = res.json().await.unwrap();
    assert_eq!(v["id"], item.id.as_str());
    assert_eq!(v["toAddresses"][0], "you@example.test");
    assert_eq!(v["attachments"][0]["fileName"], "a.txt");
}

#[tokio::test]
async fn unknown_mail_is_not_found() {
    let (base, _storage, _dir, _srv) = start_server().await;
    let res = reqwest::get(format!("{}/mail/does-not-exist", base))
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_attachment_bytes() {
    let (base, storage, _dir, _srv) = start_server().await;
    let mut item = mail("With file", "2020-01-01 00:00:00");
    item.attachments = vec![attachment("a.txt", b"ABC123")];
    storage.store(&item).await.unwrap();
    let att_id = storage.get_by_id(&item.id).await.unwrap().attachments[0]
        .id
        .clone();

    let res = reqwest::get(format!("{}/mail/{}/attachment/{}", base, item.id, att_id))
        .await
        .unwrap();
    assert!(res.status().is_success());
    assert_eq!(
        res.headers()["content-type"],
        "application/octet-stream"
    );
    let body = res.bytes().await.unwrap();
    assert_eq!(&body[..], b"ABC123");

    let res = reqwest::get(format!("{}/mail/{}/attachment/missing", base, item.id))
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_and_count_endpoints_filter_results() {
    let (base, storage, _dir, _srv) = start_server().await;
    for (subject, date) in [
        ("Alpha One", "2020-01-01 00:00:00"),
        ("Beta Two", "2020-02-01 00:00:00"),
        ("Alpha Three", "2020-03-01 00:00:00"),
    ] {
        storage.store(&mail(subject, date)).await.unwrap();
    }

    let res = reqwest::get(format!("{}/search?message=Alpha", base))
        .await
        .unwrap();
    assert!(res.status().is_success());
    let arr: serde_json::Value = res.json().await.unwrap();
    let arr = arr.as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert!(
        arr.iter()
            .all(|m| m["subject"].as_str().unwrap().contains("Alpha"))
    );

    let res = reqwest::get(format!(
        "{}/mailcount?start=2020-01-15&end=2020-02-15",
        base
    ))
    .await
    .unwrap();
    let v: serde_json::Value = res.json().await.unwrap();
    assert_eq!(v["mailCount"], 1);
}

#[tokio::test]
async fn delete_endpoint_prunes_by_cutoff() {
    let (base, storage, _dir, _srv) = start_server().await;
    storage
        .store(&mail("old", "2019-06-01 00:00:00"))
        .await
        .unwrap();
    storage
        .store(&mail("new", "2021-06-01 00:00:00"))
        .await
        .unwrap();

    let client = reqwest::Client::new();
    let res = client
        .delete(format!("{}/mail?cutoff=2020-01-01", base))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let v: serde_json::Value = res.json().await.unwrap();
    assert_eq!(v["deleted"], 1);

    let res = client
        .delete(format!("{}/mail?cutoff=soon", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    let res = client
        .delete(format!("{}/mail", base))
        .send()
        .await
        .unwrap();
    let v: serde_json::Value = res.json().await.unwrap();
    assert_eq!(v["deleted"], 1);
    assert_eq!(storage.count(&Default::default()).await.unwrap(), 0);
}
