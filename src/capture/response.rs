//! Fully buffered, serializable HTTP responses

use std::collections::BTreeMap;
use std::fmt::Display;

use bytes::{Buf, BufMut};
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::Response;

use crate::{AcacheError, Result};

/// Encoded response magic: "ACSR"
pub const RESPONSE_MAGIC: [u8; 4] = *b"ACSR";

/// Current encoding version
pub const RESPONSE_VERSION: u8 = 1;

/// Magic + version + CRC32 trailer
const MIN_ENCODED_LEN: usize = RESPONSE_MAGIC.len() + 1 + 4;

/// A response drained into memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorableResponse {
    /// Status line text, e.g. `"200 OK"`
    pub status: String,
    /// Numeric status code
    pub status_code: u16,
    /// Header name to values, in arrival order per name
    pub header: BTreeMap<String, Vec<String>>,
    /// Response body
    pub body: Vec<u8>,
}

impl StorableResponse {
    /// Drain a live response into memory
    ///
    /// The body stream is consumed.
    ///
    /// # Errors
    ///
    /// Returns `Read` if a header value is not UTF-8 or the body cannot be
    /// fully read
    pub async fn from_live_response<B>(response: Response<B>) -> Result<Self>
    where
        B: Body,
        B::Error: Display,
    {
        Self::from_live_response_limited(response, usize::MAX).await
    }

    /// Drain a live response, refusing bodies larger than `max_size`
    ///
    /// # Errors
    ///
    /// Returns `Read` if a header value is not UTF-8 or the body cannot be
    /// fully read, or `DataTooLarge` if the body exceeds `max_size`
    pub async fn from_live_response_limited<B>(response: Response<B>, max_size: usize) -> Result<Self>
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = response.into_parts();

        let status = match parts.status.canonical_reason() {
            Some(reason) => format!("{} {reason}", parts.status.as_str()),
            None => parts.status.as_str().to_string(),
        };

        let mut header: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in parts.headers.keys() {
            let mut values = Vec::new();
            for value in parts.headers.get_all(name) {
                let value = std::str::from_utf8(value.as_bytes()).map_err(|_| {
                    AcacheError::Read(format!("Header '{name}' has a non UTF-8 value"))
                })?;
                values.push(value.to_string());
            }
            header.insert(name.as_str().to_string(), values);
        }

        let body = body
            .collect()
            .await
            .map_err(|e| AcacheError::Read(e.to_string()))?
            .to_bytes();

        if body.len() > max_size {
            return Err(AcacheError::DataTooLarge {
                size: body.len(),
                limit: max_size,
            });
        }

        Ok(Self {
            status,
            status_code: parts.status.as_u16(),
            header,
            body: body.to_vec(),
        })
    }

    /// First `Content-Type` value, matched case-insensitively
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    /// Encode into the binary storage layout
    ///
    /// Layout (little-endian): magic, version, status line, status code,
    /// header count, then per header the name, value count and values,
    /// then body length (u64) and body, then CRC32 of all preceding bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(64 + self.body.len());

        data.put_slice(&RESPONSE_MAGIC);
        data.put_u8(RESPONSE_VERSION);

        put_str(&mut data, &self.status);
        data.put_u16_le(self.status_code);

        data.put_u32_le(self.header.len() as u32);
        for (name, values) in &self.header {
            put_str(&mut data, name);
            data.put_u32_le(values.len() as u32);
            for value in values {
                put_str(&mut data, value);
            }
        }

        data.put_u64_le(self.body.len() as u64);
        data.put_slice(&self.body);

        let crc = crc32fast::hash(&data);
        data.put_u32_le(crc);

        data
    }

    /// Decode bytes produced by [`encode`](Self::encode)
    ///
    /// # Errors
    ///
    /// Returns `Format` if the bytes are truncated, fail the checksum, or
    /// do not follow the layout
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_ENCODED_LEN {
            return Err(AcacheError::Format("Response too short".to_string()));
        }

        let (payload, mut trailer) = data.split_at(data.len() - 4);
        let expected = trailer.get_u32_le();
        let actual = crc32fast::hash(payload);
        if expected != actual {
            return Err(AcacheError::Format(format!(
                "CRC mismatch: expected {expected:#x}, got {actual:#x}"
            )));
        }

        let mut cur = payload;

        if take(&mut cur, RESPONSE_MAGIC.len(), "magic")? != RESPONSE_MAGIC {
            return Err(AcacheError::Format("Invalid magic bytes".to_string()));
        }
        let version = take(&mut cur, 1, "version")?.get_u8();
        if version != RESPONSE_VERSION {
            return Err(AcacheError::Format(format!(
                "Unsupported version: {version}, expected {RESPONSE_VERSION}"
            )));
        }

        let status = take_str(&mut cur, "status line")?;
        let status_code = take(&mut cur, 2, "status code")?.get_u16_le();

        let header_count = take(&mut cur, 4, "header count")?.get_u32_le();
        let mut header = BTreeMap::new();
        for _ in 0..header_count {
            let name = take_str(&mut cur, "header name")?;
            let value_count = take(&mut cur, 4, "header value count")?.get_u32_le();

            let mut values = Vec::new();
            for _ in 0..value_count {
                values.push(take_str(&mut cur, "header value")?);
            }

            if header.insert(name.clone(), values).is_some() {
                return Err(AcacheError::Format(format!("Duplicate header '{name}'")));
            }
        }

        let body_len = take(&mut cur, 8, "body length")?.get_u64_le();
        let body_len = usize::try_from(body_len)
            .map_err(|_| AcacheError::Format(format!("Body length {body_len} out of range")))?;
        let body = take(&mut cur, body_len, "body")?.to_vec();

        if !cur.is_empty() {
            return Err(AcacheError::Format(format!(
                "{} trailing bytes after body",
                cur.len()
            )));
        }

        Ok(Self {
            status,
            status_code,
            header,
            body,
        })
    }
}

fn put_str(data: &mut Vec<u8>, value: &str) {
    data.put_u32_le(value.len() as u32);
    data.put_slice(value.as_bytes());
}

fn take<'a>(cur: &mut &'a [u8], len: usize, what: &str) -> Result<&'a [u8]> {
    if cur.len() < len {
        return Err(AcacheError::Format(format!("Missing {what}")));
    }
    let (head, rest) = cur.split_at(len);
    *cur = rest;
    Ok(head)
}

fn take_str(cur: &mut &[u8], what: &str) -> Result<String> {
    let len = take(cur, 4, what)?.get_u32_le() as usize;
    let raw = take(cur, len, what)?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| AcacheError::Format(format!("Invalid UTF-8 in {what}")))
}
