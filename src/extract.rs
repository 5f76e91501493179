//! Form extraction that chooses a reader per request.
//!
//! Unlike a cached "form data" accessor, nothing is remembered on the request:
//! every extraction takes the body again, so a second extraction on the same
//! [`FormBody`] fails with [`DecodeError::BodyConsumed`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequest, Request};
use mime::Mime;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use crate::error::{AppError, DecodeError};
use crate::form::FormData;
use crate::media;
use crate::reader::{FormReader, FormReaders, FormTarget, PinnedFormReader, StandardFormReader};
use crate::state::AppState;

static EMPTY_FORM_DATA: Lazy<Arc<FormData>> = Lazy::new(|| Arc::new(FormData::new()));

/// The shared empty result returned for non-form requests and empty bodies.
pub fn empty_form_data() -> Arc<FormData> {
    Arc::clone(&EMPTY_FORM_DATA)
}

/// A request body that can be taken exactly once.
#[derive(Clone)]
pub struct FormBody {
    inner: Arc<Mutex<Option<Body>>>,
}

impl From<Body> for FormBody {
    fn from(body: Body) -> Self {
        FormBody { inner: Arc::new(Mutex::new(Some(body))) }
    }
}

impl FormBody {
    pub async fn take(&self) -> Result<Body, DecodeError> {
        self.inner.lock().await.take().ok_or(DecodeError::BodyConsumed)
    }
}

impl fmt::Debug for FormBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormBody").finish_non_exhaustive()
    }
}

/// Reads a form body for one [`FormTarget`].
#[derive(Debug, Clone, Copy)]
pub struct FormExtractor {
    target: FormTarget,
}

/// Extractor that decodes form bodies with the pinned charset.
pub fn to_form_data() -> FormExtractor {
    FormExtractor::new(FormTarget::Pinned)
}

/// Extractor for ordinary form bodies.
pub fn to_standard_form_data() -> FormExtractor {
    FormExtractor::new(FormTarget::Standard)
}

impl FormExtractor {
    pub fn new(target: FormTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> FormTarget {
        self.target
    }

    fn fallback(&self) -> Arc<dyn FormReader> {
        match self.target {
            FormTarget::Pinned => Arc::new(PinnedFormReader::default()),
            FormTarget::Standard => Arc::new(StandardFormReader::default()),
        }
    }

    /// Decode `body` into form fields.
    ///
    /// A missing or non-form `content_type` yields the shared empty result
    /// without touching the body. Otherwise the first reader in `readers` that
    /// can read this target is used, falling back to the built-in reader.
    pub async fn extract(
        &self,
        content_type: Option<&Mime>,
        body: &FormBody,
        readers: &FormReaders,
    ) -> Result<Arc<FormData>, DecodeError> {
        let form_type = mime::APPLICATION_WWW_FORM_URLENCODED;
        if !content_type.is_some_and(|ct| media::is_compatible(&form_type, ct)) {
            tracing::debug!(content_type = ?content_type.map(|m| m.essence_str()), "Not a form request");
            return Ok(empty_form_data());
        }

        let reader = readers.find(self.target, &form_type).unwrap_or_else(|| {
            tracing::debug!(form_target = ?self.target(), "No registered form reader; using built-in");
            self.fallback()
        });

        let body = body.take().await?;
        match reader.read(body, content_type).await? {
            Some(form) => Ok(Arc::new(form)),
            None => Ok(empty_form_data()),
        }
    }
}

async fn extract_request(extractor: FormExtractor, req: Request, state: &AppState) -> Result<Arc<FormData>, AppError> {
    let content_type = media::content_type(req.headers());
    let body = FormBody::from(req.into_body());
    Ok(extractor.extract(content_type.as_ref(), &body, &state.readers).await?)
}

/// Form fields decoded with the pinned charset, ignoring any declared charset.
#[derive(Debug, Clone)]
pub struct PinnedForm(pub Arc<FormData>);

#[async_trait]
impl FromRequest<AppState> for PinnedForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        extract_request(to_form_data(), req, state).await.map(PinnedForm)
    }
}

/// Form fields decoded with the declared charset, UTF-8 by default.
#[derive(Debug, Clone)]
pub struct StandardForm(pub Arc<FormData>);

#[async_trait]
impl FromRequest<AppState> for StandardForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        extract_request(to_standard_form_data(), req, state).await.map(StandardForm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::DEFAULT_MAX_IN_MEMORY_SIZE;
    use encoding_rs::EUC_KR;

    /// Claims the pinned target and returns a fixed form without reading bytes.
    struct FixedReader;

    #[async_trait]
    impl FormReader for FixedReader {
        fn can_read(&self, target: FormTarget, _media: Option<&Mime>) -> bool {
            target == FormTarget::Pinned
        }

        async fn read(&self, _body: Body, _media: Option<&Mime>) -> Result<Option<FormData>, DecodeError> {
            let mut form = FormData::new();
            form.add("reader", Some("fixed".to_string()));
            Ok(Some(form))
        }
    }

    fn form_type() -> Mime {
        mime::APPLICATION_WWW_FORM_URLENCODED
    }

    fn defaults() -> FormReaders {
        FormReaders::with_defaults(EUC_KR, DEFAULT_MAX_IN_MEMORY_SIZE)
    }

    #[tokio::test]
    async fn test_decodes_pinned_form() {
        let body = FormBody::from(Body::from("text_en=Hello+World&text_kr=%C7%D1%B1%DB"));
        let form = to_form_data().extract(Some(&form_type()), &body, &defaults()).await.unwrap();

        assert_eq!(form.first("text_en"), Some("Hello World"));
        assert_eq!(form.first("text_kr"), Some("한글"));
    }

    #[tokio::test]
    async fn test_non_form_content_type_is_empty_and_leaves_body() {
        let body = FormBody::from(Body::from("a=1"));
        let form = to_form_data()
            .extract(Some(&mime::APPLICATION_JSON), &body, &defaults())
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&form, &empty_form_data()));
        assert!(body.take().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_content_type_is_empty() {
        let body = FormBody::from(Body::from("a=1"));
        let form = to_form_data().extract(None, &body, &defaults()).await.unwrap();
        assert!(Arc::ptr_eq(&form, &empty_form_data()));
    }

    #[tokio::test]
    async fn test_empty_body_is_shared_empty() {
        let body = FormBody::from(Body::empty());
        let form = to_form_data().extract(Some(&form_type()), &body, &defaults()).await.unwrap();
        assert!(Arc::ptr_eq(&form, &empty_form_data()));
    }

    #[tokio::test]
    async fn test_second_extraction_fails() {
        let body = FormBody::from(Body::from("a=1"));
        let extractor = to_form_data();

        let first = extractor.extract(Some(&form_type()), &body, &defaults()).await.unwrap();
        assert_eq!(first.first("a"), Some("1"));

        let second = extractor.extract(Some(&form_type()), &body, &defaults()).await;
        assert!(matches!(second, Err(DecodeError::BodyConsumed)));
    }

    #[tokio::test]
    async fn test_prefers_registered_reader() {
        let readers = FormReaders::new()
            .register(StandardFormReader::default())
            .register(FixedReader)
            .register(PinnedFormReader::new(EUC_KR, DEFAULT_MAX_IN_MEMORY_SIZE));
        let body = FormBody::from(Body::from("a=1"));

        let form = to_form_data().extract(Some(&form_type()), &body, &readers).await.unwrap();

        assert_eq!(form.first("reader"), Some("fixed"));
        assert!(!form.contains_key("a"));
    }

    #[tokio::test]
    async fn test_falls_back_to_pinned_reader() {
        let readers = FormReaders::new().register(StandardFormReader::default());
        let body = FormBody::from(Body::from("text_kr=%C7%D1%B1%DB"));
        let media: Mime = "application/x-www-form-urlencoded; charset=UTF-8".parse().unwrap();

        let form = to_form_data().extract(Some(&media), &body, &readers).await.unwrap();

        assert_eq!(form.first("text_kr"), Some("한글"));
    }

    #[tokio::test]
    async fn test_standard_extractor_skips_pinned_reader() {
        let readers = FormReaders::new().register(FixedReader).register(StandardFormReader::default());
        let body = FormBody::from(Body::from("t=%ED%95%9C"));

        let form = to_standard_form_data()
            .extract(Some(&form_type()), &body, &readers)
            .await
            .unwrap();

        assert_eq!(form.first("t"), Some("한"));
    }

    #[tokio::test]
    async fn test_malformed_escape_propagates() {
        let body = FormBody::from(Body::from("a=%ZZ"));
        let result = to_form_data().extract(Some(&form_type()), &body, &defaults()).await;
        assert!(matches!(result, Err(DecodeError::MalformedEscape { .. })));
    }
}
