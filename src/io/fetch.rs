use std::{
    fs::{self, File},
    io::{ErrorKind, Read, Write},
    path::Path,
    time::Duration,
};

use reqwest::{blocking::Client, Url};
use tracing::{debug, info};

use crate::{
    config::FetchConfig,
    error::FetchError,
    io::{net::http_client, progress::ProgressReporter},
};

const CHUNK_SIZE: usize = 16 * 1024;

/// Retrieves the audio for a source locator into a local file.
pub trait AudioFetcher: Send + Sync {
    /// Stream the audio for `locator` into `dest`, replacing whatever was
    /// there. Returns the number of bytes written.
    ///
    /// On error `dest` may hold a partial download; removing it is up to the
    /// caller.
    fn fetch(
        &self,
        locator: &str,
        dest: &Path,
        progress: &ProgressReporter,
    ) -> Result<u64, FetchError>;
}

/// Fetches from an HTTP conversion service that takes the locator and an
/// access token as query parameters and answers with the raw audio stream.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    endpoint: String,
    locator_param: String,
    token_param: String,
    token: Option<String>,
    min_payload_bytes: u64,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let timeout = (cfg.timeout_secs > 0).then(|| Duration::from_secs(cfg.timeout_secs));
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: cfg.endpoint.clone(),
            locator_param: cfg.locator_param.clone(),
            token_param: cfg.token_param.clone(),
            token: cfg.token.clone().filter(|t| !t.is_empty()),
            min_payload_bytes: cfg.min_payload_bytes,
        })
    }

    /// Full request URL with the locator (and token, when configured)
    /// percent-encoded into the query string.
    pub fn request_url(&self, locator: &str) -> Result<Url, FetchError> {
        let mut params = vec![(self.locator_param.as_str(), locator)];
        if let Some(token) = &self.token {
            params.push((self.token_param.as_str(), token.as_str()));
        }
        Url::parse_with_params(&self.endpoint, params).map_err(|e| FetchError::Endpoint {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }
}

impl AudioFetcher for HttpFetcher {
    fn fetch(
        &self,
        locator: &str,
        dest: &Path,
        progress: &ProgressReporter,
    ) -> Result<u64, FetchError> {
        let url = self.request_url(locator)?;
        info!(locator, dest = %dest.display(), "downloading audio");

        let mut resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let total = resp.content_length();
        if let Some(t) = total {
            if t < self.min_payload_bytes {
                return Err(FetchError::Implausible {
                    bytes: t,
                    min: self.min_payload_bytes,
                });
            }
        }

        let write_err = |source| FetchError::Write {
            path: dest.to_path_buf(),
            source,
        };
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        // create() truncates, so a stale file is replaced rather than appended to
        let mut file = File::create(dest).map_err(write_err)?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;
        loop {
            let n = match resp.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => return Err(FetchError::Interrupted { received, source }),
            };
            file.write_all(&buf[..n]).map_err(write_err)?;
            received += n as u64;
            progress.download(received, total);
        }
        file.flush().map_err(write_err)?;

        if let Some(expected) = total {
            if received < expected {
                return Err(FetchError::Truncated { received, expected });
            }
        }
        if received < self.min_payload_bytes {
            return Err(FetchError::Implausible {
                bytes: received,
                min: self.min_payload_bytes,
            });
        }

        debug!(bytes = received, "download complete");
        Ok(received)
    }
}
