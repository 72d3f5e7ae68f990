use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::update::{Body, Encoding, Fetcher, Result, UpdateError};

#[derive(Debug, Clone)]
enum Route {
    Content(Vec<u8>),
    Status(u16),
}

/// In-memory [`Fetcher`] serving canned responses and recording every request.
///
/// Unknown URLs answer `404`. Clones share routes and the request log, so a
/// test can keep one clone while the updater owns another.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with `200 OK` at `url`, replacing any earlier route.
    pub fn serve(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> &Self {
        self.routes().insert(url.into(), Route::Content(body.into()));
        self
    }

    /// Answer `url` with a non-200 status.
    pub fn respond(&self, url: impl Into<String>, status: u16) -> &Self {
        self.routes().insert(url.into(), Route::Status(status));
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.log().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.log().iter().filter(|requested| *requested == url).count()
    }

    pub fn clear_requests(&self) {
        self.log().clear();
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<String, Route>> {
        self.routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn log(&self) -> MutexGuard<'_, Vec<String>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, encoding: Encoding) -> Result<Body> {
        self.log().push(url.to_string());
        let route = self.routes().get(url).cloned();

        match route {
            Some(Route::Content(bytes)) => match encoding {
                Encoding::Binary => Ok(Body::Binary(bytes)),
                Encoding::Text => String::from_utf8(bytes).map(Body::Text).map_err(|_| {
                    UpdateError::NotText {
                        url: url.to_string(),
                    }
                }),
            },
            Some(Route::Status(status)) => Err(UpdateError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(UpdateError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
