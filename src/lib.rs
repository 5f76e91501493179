//! Accept `application/x-www-form-urlencoded` bodies encoded in a legacy
//! charset (EUC-KR by default) and decode them to Unicode, regardless of what
//! the `Content-Type` header claims.

pub mod charset;
pub mod config;
pub mod error;
pub mod extract;
pub mod form;
pub mod handlers;
pub mod media;
pub mod reader;
pub mod routes;
pub mod state;

pub use error::{AppError, ConfigError, DecodeError, EncodeError};
pub use extract::{to_form_data, to_standard_form_data, FormBody, FormExtractor, PinnedForm, StandardForm};
pub use form::{encode_form, parse_form, FormData};
pub use reader::{FormReader, FormReaders, FormTarget, PinnedFormReader, StandardFormReader};
pub use state::AppState;
