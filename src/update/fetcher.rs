use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, trace};

use super::error::{Result, UpdateError};

/// How a response body should be handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Decode the body as text (metadata, signatures, keys).
    Text,
    /// Keep the body as raw bytes (executables).
    Binary,
}

/// A fetched response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    /// Size of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of the body, whichever encoding it was fetched with.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// Abstraction over retrieving remote content.
///
/// Only `200 OK` counts as success. Implementations must not retry; the
/// pipeline treats every failure as final.
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body in the requested encoding.
    fn fetch(&self, url: &str, encoding: Encoding) -> impl Future<Output = Result<Body>> + Send;

    /// GET `url` as text.
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String>> + Send {
        async move {
            match self.fetch(url, Encoding::Text).await? {
                Body::Text(text) => Ok(text),
                Body::Binary(bytes) => String::from_utf8(bytes).map_err(|_| UpdateError::NotText {
                    url: url.to_string(),
                }),
            }
        }
    }

    /// GET `url` as raw bytes.
    fn fetch_binary(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send {
        async move { Ok(self.fetch(url, Encoding::Binary).await?.into_bytes()) }
    }
}

/// [`Fetcher`] backed by a shared `reqwest` client.
///
/// Every request carries the configured `user-agent`; release-hosting APIs
/// such as GitHub reject requests without one.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher sending `user_agent`, with an optional per-request timeout.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> reqwest::Result<Self> {
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, encoding: Encoding) -> Result<Body> {
        debug!(url, ?encoding, "Get url");

        let transport = |source| UpdateError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();

        if status != StatusCode::OK {
            // Binary bodies never reach the log.
            match encoding {
                Encoding::Text => {
                    let body = response.text().await.unwrap_or_default();
                    debug!(status = status.as_u16(), body = %body, "Get url failed");
                }
                Encoding::Binary => debug!(status = status.as_u16(), "Get url failed"),
            }
            return Err(UpdateError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        match encoding {
            Encoding::Text => {
                let text = response.text().await.map_err(transport)?;
                trace!(body = %text, "Get url body");
                Ok(Body::Text(text))
            }
            Encoding::Binary => {
                let bytes = response.bytes().await.map_err(transport)?;
                debug!(url, bytes = bytes.len(), "Downloaded binary");
                Ok(Body::Binary(bytes.to_vec()))
            }
        }
    }
}
