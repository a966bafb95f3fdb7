use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use course_backend::error::Error;
use course_backend::services::judge_service::{CodeJudge, HttpJudge};
use reqwest::Client;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn judge(server: &MockServer, attempts: u32) -> HttpJudge {
    HttpJudge::new(
        Client::new(),
        Url::parse(&server.uri()).unwrap(),
        Some("judge-key".into()),
        attempts,
        Duration::from_millis(10),
    )
}

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/submissions"))
        .and(query_param("base64_encoded", "true"))
        .and(header("X-Auth-Token", "judge-key"))
        .and(body_partial_json(json!({ "language_id": 71 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "token": "tok-1" })))
        .expect(1)
        .mount(server)
        .await;
}

fn verdict(id: i32, description: &str, stdout: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": { "id": id, "description": description },
        "stdout": stdout.map(|s| STANDARD.encode(s)),
        "stderr": null,
        "compile_output": null,
        "time": "0.02",
        "memory": 3100
    }))
}

#[tokio::test]
async fn polls_until_a_terminal_status() {
    let server = MockServer::start().await;
    mount_submit(&server).await;

    Mock::given(method("GET"))
        .and(path("/submissions/tok-1"))
        .respond_with(verdict(2, "Processing", None))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/submissions/tok-1"))
        .respond_with(verdict(3, "Accepted", Some("42\n")))
        .mount(&server)
        .await;

    let run = judge(&server, 5)
        .run("print(42)", "python", "")
        .await
        .expect("verdict");

    assert!(run.accepted());
    assert_eq!(run.stdout.as_deref(), Some("42\n"));
    assert_eq!(run.memory, Some(3100));
}

#[tokio::test]
async fn gives_up_after_the_configured_polls() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/submissions/tok-1"))
        .respond_with(verdict(1, "In Queue", None))
        .expect(3)
        .mount(&server)
        .await;

    let err = judge(&server, 3).run("print(42)", "python", "").await.unwrap_err();
    assert!(matches!(err, Error::Judge(_)));
}

#[tokio::test]
async fn rejected_submission_is_a_judge_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submissions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = judge(&server, 3).run("print(1)", "python", "").await.unwrap_err();
    assert!(matches!(err, Error::Judge(_)));
}

#[tokio::test]
async fn unsupported_language_never_reaches_the_judge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = judge(&server, 3).run("DISPLAY 'HI'", "cobol", "").await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}
