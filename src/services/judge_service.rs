use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Judge statuses 1 (queued) and 2 (processing) are transient; anything
/// above is terminal. 3 is "Accepted".
const STATUS_ACCEPTED: i32 = 3;
const LAST_TRANSIENT_STATUS: i32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRun {
    pub status_id: i32,
    pub status: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub time: Option<String>,
    pub memory: Option<i64>,
}

impl JudgeRun {
    pub fn accepted(&self) -> bool {
        self.status_id == STATUS_ACCEPTED
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeJudge: Send + Sync {
    /// Executes `source` once against `stdin` and waits for a terminal verdict.
    async fn run(&self, source: &str, language: &str, stdin: &str) -> Result<JudgeRun>;
}

pub fn language_id(language: &str) -> Option<i32> {
    match language.trim().to_ascii_lowercase().as_str() {
        "c" => Some(50),
        "cpp" | "c++" => Some(54),
        "go" => Some(60),
        "java" => Some(62),
        "javascript" | "js" => Some(63),
        "python" | "python3" => Some(71),
        "rust" => Some(73),
        "typescript" | "ts" => Some(74),
        _ => None,
    }
}

#[derive(Clone)]
pub struct HttpJudge {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    poll_attempts: u32,
    poll_interval: Duration,
}

#[derive(Serialize)]
struct SubmitRequest {
    source_code: String,
    language_id: i32,
    stdin: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    token: String,
}

#[derive(Deserialize)]
struct StatusField {
    id: i32,
    description: String,
}

#[derive(Deserialize)]
struct PollResponse {
    status: StatusField,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    time: Option<String>,
    memory: Option<i64>,
}

impl HttpJudge {
    pub fn new(
        client: Client,
        base_url: Url,
        api_key: Option<String>,
        poll_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            poll_attempts: poll_attempts.max(1),
            poll_interval,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("X-Auth-Token", key),
            None => req,
        }
    }

    async fn submit(&self, source: &str, language_id: i32, stdin: &str) -> Result<String> {
        let body = SubmitRequest {
            source_code: STANDARD.encode(source),
            language_id,
            stdin: STANDARD.encode(stdin),
        };
        let resp = self
            .authorize(self.client.post(self.endpoint("submissions")))
            .query(&[("base64_encoded", "true"), ("wait", "false")])
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Judge(format!("submission rejected with status {}", resp.status())));
        }
        let parsed: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| Error::Judge(format!("unreadable submission response: {}", e)))?;
        Ok(parsed.token)
    }

    async fn poll(&self, token: &str) -> Result<Option<JudgeRun>> {
        let resp = self
            .authorize(self.client.get(self.endpoint(&format!("submissions/{}", token))))
            .query(&[
                ("base64_encoded", "true"),
                ("fields", "status,stdout,stderr,compile_output,time,memory"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Judge(format!("status lookup failed with {}", resp.status())));
        }
        let body: PollResponse = resp
            .json()
            .await
            .map_err(|e| Error::Judge(format!("unreadable status response: {}", e)))?;

        if body.status.id <= LAST_TRANSIENT_STATUS {
            return Ok(None);
        }
        Ok(Some(JudgeRun {
            status_id: body.status.id,
            status: body.status.description,
            stdout: decode_field(body.stdout)?,
            stderr: decode_field(body.stderr)?,
            compile_output: decode_field(body.compile_output)?,
            time: body.time,
            memory: body.memory,
        }))
    }
}

#[async_trait]
impl CodeJudge for HttpJudge {
    async fn run(&self, source: &str, language: &str, stdin: &str) -> Result<JudgeRun> {
        let lang = language_id(language)
            .ok_or_else(|| Error::BadRequest(format!("Unsupported language: {}", language)))?;
        let token = self.submit(source, lang, stdin).await?;
        tracing::debug!(%token, language, "submitted code to judge");

        for attempt in 1..=self.poll_attempts {
            if let Some(run) = self.poll(&token).await? {
                tracing::debug!(%token, attempt, status = %run.status, "judge finished");
                return Ok(run);
            }
            if attempt < self.poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        Err(Error::Judge(format!(
            "no verdict for {} after {} polls",
            token, self.poll_attempts
        )))
    }
}

fn decode_field(value: Option<String>) -> Result<Option<String>> {
    let Some(encoded) = value else { return Ok(None) };
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| Error::Judge(format!("invalid base64 from judge: {}", e)))?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_languages_resolve() {
        assert_eq!(language_id("Python"), Some(71));
        assert_eq!(language_id(" rust "), Some(73));
        assert_eq!(language_id("c++"), Some(54));
        assert_eq!(language_id("cobol"), None);
    }

    #[test]
    fn decode_strips_line_wrapping() {
        let encoded = STANDARD.encode("hello world\n");
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_field(Some(wrapped)).unwrap().as_deref(), Some("hello world\n"));
        assert_eq!(decode_field(None).unwrap(), None);
        assert!(decode_field(Some("***".into())).is_err());
    }
}
