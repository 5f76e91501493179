use encoding_rs::Encoding;

use crate::reader::FormReaders;

#[derive(Clone, Debug)]
pub struct AppState {
    /// Charset pinned at startup
    pub charset: &'static Encoding,
    /// Readers consulted by the form extractors, in order
    pub readers: FormReaders,
    pub max_body_size: usize,
}

impl AppState {
    /// State with the default reader registry for `charset`.
    pub fn new(charset: &'static Encoding, max_body_size: usize) -> Self {
        Self {
            charset,
            readers: FormReaders::with_defaults(charset, max_body_size),
            max_body_size,
        }
    }

    pub fn with_readers(mut self, readers: FormReaders) -> Self {
        self.readers = readers;
        self
    }
}
