use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared client for discovery APIs and alert webhooks
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized
pub fn client() -> Result<Client> {
    crate::scan::ensure_crypto_provider();

    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to create HTTP client")
}

/// POST `body` as JSON and return the response status
///
/// # Errors
///
/// Returns an error if the request cannot be sent
pub async fn post_json<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    body: &T,
) -> Result<StatusCode> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("request to {} failed", redact(url)))?;

    Ok(response.status())
}

/// Webhook URLs carry their credential; keep only scheme and host for messages
#[must_use]
pub fn redact(url: &str) -> String {
    reqwest::Url::parse(url).map_or_else(
        |_| "<invalid url>".to_string(),
        |parsed| {
            format!(
                "{}://{}/…",
                parsed.scheme(),
                parsed.host_str().unwrap_or_default()
            )
        },
    )
}


/// Canned-response HTTP server for exercising API clients in unit tests
#[cfg(test)]
pub(crate) mod stub {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use reqwest::Client;
    use std::sync::{Arc, Mutex};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    /// One request as received by [`Stub`]
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: String,
        pub target: String,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl Recorded {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    /// Answers the n-th connection with the n-th `(status, body)`, then 404.
    ///
    /// `{base}` in a body is replaced with the stub's own URL.
    pub struct Stub {
        pub url: String,
        requests: Arc<Mutex<Vec<Recorded>>>,
        handle: JoinHandle<()>,
    }

    impl Stub {
        pub async fn start(responses: Vec<(u16, &str)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let responses: Vec<(u16, String)> = responses
                .into_iter()
                .map(|(status, body)| (status, body.replace("{base}", &url)))
                .collect();
            let recorded = requests.clone();
            let handle = tokio::spawn(async move {
                let mut canned = responses.into_iter();
                while let Ok((mut stream, _)) = listener.accept().await {
                    let Some(request) = read_request(&mut stream).await else {
                        continue;
                    };
                    recorded.lock().unwrap().push(request);

                    let (status, body) = canned.next().unwrap_or((404, "{}".to_string()));
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                }
            });

            Self {
                url,
                requests,
                handle,
            }
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Drop for Stub {
        fn drop(&mut self) {
            self.handle.abort();
        }
    }

    /// Client that never routes the loopback stub through an environment proxy
    pub fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    async fn read_request(stream: &mut TcpStream) -> Option<Recorded> {
        let mut data = Vec::new();
        let mut buf = [0_u8; 4096];

        let head_end = loop {
            let read = stream.read(&mut buf).await.ok()?;
            if read == 0 {
                return None;
            }
            data.extend_from_slice(buf.get(..read)?);
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(data.get(..head_end)?).to_string();
        let mut lines = head.lines();
        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let target = request_line.next()?.to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
            .collect();

        let length = headers
            .iter()
            .find(|(key, _)| key == "content-length")
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .unwrap_or(0);
        while data.len() < head_end + length {
            let read = stream.read(&mut buf).await.ok()?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(buf.get(..read)?);
        }

        Some(Recorded {
            method,
            target,
            headers,
            body: String::from_utf8_lossy(data.get(head_end..)?).to_string(),
        })
    }
}
