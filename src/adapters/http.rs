use std::io::{self, Read};

use crate::{adapters, model, util};

/// Opens plain HTTP(S) GET streams.
#[derive(Clone, Debug, Default)]
pub struct HttpOpener {
    client: reqwest::Client,
}

impl HttpOpener {
    pub fn new() -> Self {
        HttpOpener::default()
    }
}

impl adapters::UrlOpener for HttpOpener {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, model::fs::FSError> {
        let resp = util::poll::poll_remote("open_url", url, self.client.get(url).send())?;
        let resp = resp
            .error_for_status()
            .map_err(|err| match err.status() {
                Some(reqwest::StatusCode::NOT_FOUND) => model::fs::FSError::NotFound(url.to_string()),
                _ => model::fs::FSError::remote("open_url", url, err),
            })?;

        Ok(Box::new(ResponseReader {
            response: resp,
            chunk: Vec::new(),
            pos: 0,
        }))
    }
}

/// Blocking reader over a response body, pulling one chunk at a time.
struct ResponseReader {
    response: reqwest::Response,
    chunk: Vec<u8>,
    pos: usize,
}

impl Read for ResponseReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pos >= self.chunk.len() {
            match util::poll::poll_until_ready(self.response.chunk()) {
                Err(err) => return Err(io::Error::other(err)),
                Ok(None) => return Ok(0),
                Ok(Some(bytes)) => {
                    self.chunk = bytes.to_vec();
                    self.pos = 0;
                }
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
