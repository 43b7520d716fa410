//! Where tile bodies come from.

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use std::{future::Future, io};
use thiserror::Error;

use crate::tile::Tile;
use crate::url::UrlFormat;

/// The streamed body of a successfully requested tile.
pub type TileBody = BoxStream<'static, io::Result<Bytes>>;

/// A single failed attempt at requesting a tile. Always worth retrying.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid tile URL: {0}")]
    Url(String),

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("received status {status} from {url}")]
    Status { url: String, status: StatusCode },
}

/// Something tiles can be requested from.
pub trait TileSource: Send + Sync {
    /// Requests `tile`, resolving to its body once the server answered
    /// with `200 OK`.
    fn fetch(&self, tile: Tile) -> impl Future<Output = Result<TileBody, SourceError>> + Send;
}

/// Fetches tiles over HTTP.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    url: UrlFormat,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, url: UrlFormat) -> Self {
        Self { client, url }
    }
}

impl TileSource for HttpSource {
    async fn fetch(&self, tile: Tile) -> Result<TileBody, SourceError> {
        let url = self
            .url
            .tile_url(&tile)
            .map_err(|e| SourceError::Url(format!("{:#}", e)))?;

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(source) => return Err(SourceError::Request { url, source }),
        };

        if response.status() != StatusCode::OK {
            return Err(SourceError::Status {
                url,
                status: response.status(),
            });
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .boxed())
    }
}
