use std::fmt;

/// Downloaded bytes that a transport can upload, such as a preview image.
///
/// Held behind an `Arc` by the enrichment bundle and the composed message;
/// the buffer is freed once the last delivery referencing it is done.
#[derive(Clone, PartialEq, Eq)]
pub struct BinaryResource {
    pub source_url: String,
    pub bytes: Vec<u8>,
}

impl BinaryResource {
    pub fn new(source_url: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source_url: source_url.into(),
            bytes,
        }
    }
}

impl fmt::Debug for BinaryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryResource")
            .field("source_url", &self.source_url)
            .field("len", &self.bytes.len())
            .finish()
    }
}
