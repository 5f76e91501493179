//! Pluggable form body readers and the ordered registry they are looked up in.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use encoding_rs::Encoding;
use mime::Mime;

use crate::charset;
use crate::error::DecodeError;
use crate::form::{parse_form, FormData};
use crate::media;

/// Largest body a reader buffers before giving up
pub const DEFAULT_MAX_IN_MEMORY_SIZE: usize = 256 * 1024;

/// Which decoding path a form read is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormTarget {
    /// Ordinary form decoding that honours the request's `charset` parameter
    Standard,
    /// Always decode with the pinned legacy charset
    Pinned,
}

#[async_trait]
pub trait FormReader: Send + Sync {
    fn can_read(&self, target: FormTarget, media: Option<&Mime>) -> bool;

    /// Consume `body` and decode it. `Ok(None)` means the body had no bytes.
    async fn read(&self, body: Body, media: Option<&Mime>) -> Result<Option<FormData>, DecodeError>;
}

async fn read_bytes(body: Body, limit: usize) -> Result<Option<axum::body::Bytes>, DecodeError> {
    let bytes = axum::body::to_bytes(body, limit).await?;
    Ok(if bytes.is_empty() { None } else { Some(bytes) })
}

/// Reads form bodies with the pinned charset, whatever the `Content-Type`
/// says. Only claims [`FormTarget::Pinned`] so it never intercepts ordinary
/// form requests.
#[derive(Debug, Clone)]
pub struct PinnedFormReader {
    charset: &'static Encoding,
    max_in_memory_size: usize,
}

impl PinnedFormReader {
    pub fn new(charset: &'static Encoding, max_in_memory_size: usize) -> Self {
        Self { charset, max_in_memory_size }
    }
}

impl Default for PinnedFormReader {
    fn default() -> Self {
        Self::new(charset::pinned(), DEFAULT_MAX_IN_MEMORY_SIZE)
    }
}

#[async_trait]
impl FormReader for PinnedFormReader {
    fn can_read(&self, target: FormTarget, media: Option<&Mime>) -> bool {
        target == FormTarget::Pinned && media::is_form_compatible(media)
    }

    async fn read(&self, body: Body, _media: Option<&Mime>) -> Result<Option<FormData>, DecodeError> {
        let Some(bytes) = read_bytes(body, self.max_in_memory_size).await? else {
            return Ok(None);
        };
        let text = charset::decode(&bytes, self.charset)?;
        let form = parse_form(&text, self.charset)?;
        tracing::debug!(charset = self.charset.name(), fields = form.len(), "Decoded pinned form body");
        Ok(Some(form))
    }
}

/// Ordinary form reader: uses the request's `charset` parameter, UTF-8 when
/// there is none or it is unusable.
#[derive(Debug, Clone)]
pub struct StandardFormReader {
    max_in_memory_size: usize,
}

impl StandardFormReader {
    pub fn new(max_in_memory_size: usize) -> Self {
        Self { max_in_memory_size }
    }

    fn charset_for(media: Option<&Mime>) -> &'static Encoding {
        media
            .and_then(media::charset_param)
            .and_then(|label| charset::resolve(label).ok())
            .unwrap_or(encoding_rs::UTF_8)
    }
}

impl Default for StandardFormReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_MEMORY_SIZE)
    }
}

#[async_trait]
impl FormReader for StandardFormReader {
    fn can_read(&self, target: FormTarget, media: Option<&Mime>) -> bool {
        target == FormTarget::Standard && media::is_form_compatible(media)
    }

    async fn read(&self, body: Body, media: Option<&Mime>) -> Result<Option<FormData>, DecodeError> {
        let charset = Self::charset_for(media);
        let Some(bytes) = read_bytes(body, self.max_in_memory_size).await? else {
            return Ok(None);
        };
        let text = charset::decode(&bytes, charset)?;
        Ok(Some(parse_form(&text, charset)?))
    }
}

/// Ordered collection of readers; the first one that can read wins.
#[derive(Clone, Default)]
pub struct FormReaders {
    readers: Vec<Arc<dyn FormReader>>,
}

impl FormReaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pinned reader for `charset`, then the standard reader.
    pub fn with_defaults(charset: &'static Encoding, max_in_memory_size: usize) -> Self {
        Self::new()
            .register(PinnedFormReader::new(charset, max_in_memory_size))
            .register(StandardFormReader::new(max_in_memory_size))
    }

    pub fn register<R: FormReader + 'static>(mut self, reader: R) -> Self {
        self.readers.push(Arc::new(reader));
        self
    }

    pub fn find(&self, target: FormTarget, media: &Mime) -> Option<Arc<dyn FormReader>> {
        self.readers.iter().find(|r| r.can_read(target, Some(media))).cloned()
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl fmt::Debug for FormReaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormReaders").field("len", &self.readers.len()).finish()
    }
}
