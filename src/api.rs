// API client module: a blocking HTTP client for the Alist storage service.
// It logs in once, keeps the token and implements `remote::Remote` on top
// of the service's JSON endpoints. Every method is a single request.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::paths::join_remote;
use crate::remote::{normalize_dir, Lookup, Remote, RemoteEntry};

/// Request timeout used when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Authenticated client. The token is fixed for the life of the value, so
/// a single instance can be shared across upload threads.
pub struct AlistClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for AlistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlistClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Every endpoint answers with this envelope; `code` mirrors an HTTP status.
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Serialize, Debug)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Debug)]
struct LoginData {
    token: String,
}

#[derive(Serialize, Debug)]
struct PathRequest<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Serialize, Debug)]
struct RemoveRequest<'a> {
    #[serde(rename = "name")]
    names: &'a [String],
    dir: &'a str,
}

#[derive(Deserialize, Debug)]
struct ObjectInfo {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    is_dir: bool,
}

#[derive(Deserialize, Debug)]
struct DirInfo {
    name: String,
}

impl AlistClient {
    /// Log in and return a client bound to the issued token.
    ///
    /// `host` is either a bare host name, which is reached over HTTPS, or a
    /// full URL. `timeout` applies to every request, login included.
    pub fn login_with_timeout(
        host: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::login_with_client(client, host, username, password)
    }

    /// Same as [`AlistClient::login_with_timeout`] on a caller-built client.
    pub fn login_with_client(
        client: Client,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, ApiError> {
        let base_url = api_base(host);
        let token = authenticate(&client, &base_url, username, password)?;
        tracing::info!(base_url = %base_url, user = username, "logged in");
        Ok(AlistClient {
            client,
            base_url,
            token,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> RequestBuilder {
        self.client
            .post(self.url(endpoint))
            .header(AUTHORIZATION, &self.token)
            .json(body)
    }
}

fn authenticate(
    client: &Client,
    base_url: &str,
    username: &str,
    password: &str,
) -> Result<String, ApiError> {
    let res = client
        .post(format!("{base_url}/auth/login"))
        .json(&LoginRequest { username, password })
        .send()?;
    let envelope: Envelope<LoginData> = read_envelope(res)?;
    match (envelope.code, envelope.data) {
        (200, Some(data)) => Ok(data.token),
        (code, _) => Err(ApiError::Auth {
            code,
            message: envelope.message,
        }),
    }
}

/// `example.org` -> `https://example.org/api`; a full URL keeps its scheme.
pub fn api_base(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/api")
    } else {
        format!("https://{host}/api")
    }
}

/// Percent-encodes each segment of a remote path and keeps `/` literal.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_envelope<T: DeserializeOwned>(res: Response) -> Result<Envelope<T>, ApiError> {
    let status = res.status();
    let text = res.text()?;
    serde_json::from_str(&text).map_err(|e| {
        ApiError::Decode(format!("{status}: {e}: {}", truncate(&text, 200)))
    })
}

// The service reports missing paths as a regular error envelope whose
// message mentions "not found". This is the only place that looks at it.
fn is_not_found(envelope_code: i64, message: &str) -> bool {
    envelope_code != 200 && message.to_ascii_lowercase().contains("not found")
}

fn is_already_exists(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("already exist") || message.contains("file exists")
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn remote_error(path: &str, code: i64, message: String) -> ApiError {
    ApiError::Remote {
        path: path.to_string(),
        code,
        message,
    }
}

impl Remote for AlistClient {
    fn stat(&self, path: &str, password: Option<&str>) -> Result<Lookup<RemoteEntry>, ApiError> {
        tracing::debug!(path, "fs/get");
        let res = self.post("/fs/get", &PathRequest { path, password }).send()?;
        let envelope: Envelope<ObjectInfo> = read_envelope(res)?;
        if is_not_found(envelope.code, &envelope.message) {
            return Ok(Lookup::NotFound);
        }
        match (envelope.code, envelope.data) {
            (200, Some(info)) => Ok(Lookup::Found(RemoteEntry {
                path: path.to_string(),
                size: info.size,
                is_dir: info.is_dir,
            })),
            (code, _) => Err(remote_error(path, code, envelope.message)),
        }
    }

    fn list_dir(
        &self,
        path: &str,
        password: Option<&str>,
    ) -> Result<Lookup<Vec<RemoteEntry>>, ApiError> {
        tracing::debug!(path, "fs/dirs");
        let res = self.post("/fs/dirs", &PathRequest { path, password }).send()?;
        let envelope: Envelope<Vec<DirInfo>> = read_envelope(res)?;
        if is_not_found(envelope.code, &envelope.message) {
            return Ok(Lookup::NotFound);
        }
        if envelope.code != 200 {
            return Err(remote_error(path, envelope.code, envelope.message));
        }
        let parent = normalize_dir(path);
        let entries = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|dir| RemoteEntry {
                path: join_remote(&parent, &dir.name),
                size: 0,
                is_dir: true,
            })
            .collect();
        Ok(Lookup::Found(entries))
    }

    fn create_dir(&self, path: &str) -> Result<(), ApiError> {
        tracing::debug!(path, "fs/mkdir");
        let res = self
            .post("/fs/mkdir", &PathRequest { path, password: None })
            .send()?;
        let envelope: Envelope<serde_json::Value> = read_envelope(res)?;
        if envelope.code == 200 || is_already_exists(&envelope.message) {
            Ok(())
        } else {
            Err(remote_error(path, envelope.code, envelope.message))
        }
    }

    fn remove(&self, names: &[String], dir: &str) -> Result<(), ApiError> {
        tracing::debug!(dir, count = names.len(), "fs/remove");
        let res = self.post("/fs/remove", &RemoveRequest { names, dir }).send()?;
        let envelope: Envelope<serde_json::Value> = read_envelope(res)?;
        if envelope.code == 200 {
            Ok(())
        } else {
            Err(remote_error(dir, envelope.code, envelope.message))
        }
    }

    fn upload_bytes(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), ApiError> {
        let len = bytes.len();
        let file_path = HeaderValue::from_str(&encode_path(path))
            .map_err(|e| ApiError::Decode(format!("bad File-Path header for {path}: {e}")))?;
        let res = self
            .client
            .put(self.url("/fs/put"))
            .header(AUTHORIZATION, &self.token)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, len.to_string())
            .header("File-Path", file_path)
            .header("As-Task", "false")
            .header("Overwrite", if overwrite { "true" } else { "false" })
            .body(bytes)
            .send()?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(ApiError::Upload {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Envelope<serde_json::Value> = read_envelope(res)?;
        if envelope.code != 200 {
            return Err(remote_error(path, envelope.code, envelope.message));
        }
        tracing::debug!(path, bytes = len, "stored");
        Ok(())
    }
}
