use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::FetchError;

const USER_AGENT: &str = concat!("stemdeck/", env!("CARGO_PKG_VERSION"));

/// Blocking client shared by all downloads of one fetcher.
///
/// `timeout` bounds the whole request including the body stream; `None`
/// disables it.
pub fn http_client(timeout: Option<Duration>) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30));
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    Ok(builder.build()?)
}
