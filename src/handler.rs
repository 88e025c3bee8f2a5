// Per-extension file handlers.
//
// A handler knows how to package a modified file against its reference copy
// and how to fold packaged overlays back onto a base. The registry maps a
// normalized extension (lowercase, no dot, no trailing `.zs`) to a handler.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::document::{DocumentCodec, NativeCodec};
use crate::patch::{self, Patch, PatchError};

/// Result of packaging one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packaged {
    pub bytes: Vec<u8>,
    /// The patch carries no entries; callers elide the file.
    pub is_empty: bool,
}

pub trait FileHandler: Send + Sync {
    /// Extensions served by this handler, lowercase without the dot.
    fn extensions(&self) -> &[&'static str];

    /// Encode the delta that turns `reference` into `modified`.
    fn package(&self, name: &str, reference: &[u8], modified: &[u8])
    -> Result<Packaged, PatchError>;

    /// Fold `overlays` onto `base`, lowest priority first.
    fn merge(&self, name: &str, base: &[u8], overlays: &[&[u8]]) -> Result<Vec<u8>, PatchError>;
}

// ---------------------------------------------------------------------------
// Document handler
// ---------------------------------------------------------------------------

/// Tree-patch handler for hierarchical documents.
#[derive(Clone)]
pub struct DocumentHandler {
    codec: Arc<dyn DocumentCodec>,
}

impl DocumentHandler {
    pub const EXTENSIONS: &'static [&'static str] = &["byml", "byaml", "bgyml"];

    pub fn new(codec: Arc<dyn DocumentCodec>) -> Self {
        Self { codec }
    }
}

impl Default for DocumentHandler {
    fn default() -> Self {
        Self::new(Arc::new(NativeCodec))
    }
}

impl FileHandler for DocumentHandler {
    fn extensions(&self) -> &[&'static str] {
        Self::EXTENSIONS
    }

    fn package(
        &self,
        name: &str,
        reference: &[u8],
        modified: &[u8],
    ) -> Result<Packaged, PatchError> {
        let reference = self.codec.decode(reference)?;
        let modified = self.codec.decode(modified)?;
        let delta = patch::diff(&reference, &modified);
        log::debug!("{name}: {} patch entries", delta.len());
        Ok(Packaged {
            is_empty: delta.is_empty(),
            bytes: self.codec.encode(&delta.to_document())?,
        })
    }

    fn merge(&self, name: &str, base: &[u8], overlays: &[&[u8]]) -> Result<Vec<u8>, PatchError> {
        let mut doc = self.codec.decode(base)?;
        for (priority, overlay) in overlays.iter().enumerate() {
            let delta = Patch::from_document(&self.codec.decode(overlay)?)?;
            log::debug!("{name}: applying overlay {priority} ({} entries)", delta.len());
            doc = patch::apply_owned(doc, &delta);
        }
        Ok(self.codec.encode(&doc)?)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn FileHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in document handler over `codec`.
    pub fn with_defaults(codec: Arc<dyn DocumentCodec>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DocumentHandler::new(codec)));
        registry
    }

    /// Register `handler` for every extension it declares, replacing any
    /// previous handler for those extensions.
    pub fn register(&mut self, handler: Arc<dyn FileHandler>) {
        for ext in handler.extensions() {
            self.handlers
                .insert(normalize_extension(ext), Arc::clone(&handler));
        }
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn FileHandler>> {
        self.handlers.get(&normalize_extension(extension)).cloned()
    }

    /// Handler for a file or archive-member name.
    pub fn for_name(&self, name: &str) -> Option<Arc<dyn FileHandler>> {
        extension_of(name).and_then(|ext| self.get(&ext))
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// True when `name` ends in a registered extension, optionally followed
    /// by `.zs`.
    pub fn supports(&self, name: &str) -> bool {
        self.for_name(name).is_some()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Extension of `name` with any trailing `.zs` ignored.
pub fn extension_of(name: &str) -> Option<String> {
    let name = name.strip_suffix(".zs").unwrap_or(name);
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(normalize_extension)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn encode(doc: &Document) -> Vec<u8> {
        NativeCodec.encode(doc).unwrap()
    }

    fn ints(values: &[i32]) -> Document {
        Document::Array(values.iter().copied().map(Document::Int32).collect())
    }

    #[test]
    fn registry_normalizes_extensions() {
        let registry = HandlerRegistry::with_defaults(Arc::new(NativeCodec));
        assert!(registry.get("BYML").is_some());
        assert!(registry.get(".bgyml").is_some());
        assert!(registry.for_name("Actor/Foo.game__Bar.bgyml").is_some());
        assert!(registry.for_name("Banc/Map.byml.zs").is_some());
        assert!(registry.for_name("Model/Thing.bfres").is_none());
        assert!(registry.for_name("README").is_none());
        assert_eq!(registry.extensions(), ["bgyml", "byaml", "byml"]);
    }

    #[test]
    fn package_reports_empty_for_unchanged_document() {
        let doc = encode(&ints(&[1, 2, 3]));
        let packaged = DocumentHandler::default()
            .package("a.byml", &doc, &doc)
            .unwrap();
        assert!(packaged.is_empty);
    }

    #[test]
    fn merge_folds_overlays_in_priority_order() {
        let handler = DocumentHandler::default();
        let base = ints(&[1]);
        let low = handler
            .package("a.byml", &encode(&base), &encode(&ints(&[1, 2])))
            .unwrap();
        let high = handler
            .package("a.byml", &encode(&base), &encode(&ints(&[1, 3])))
            .unwrap();
        let merged = handler
            .merge("a.byml", &encode(&base), &[&low.bytes, &high.bytes])
            .unwrap();
        assert_eq!(NativeCodec.decode(&merged).unwrap(), ints(&[1, 2, 3]));
    }

    #[test]
    fn undecodable_input_is_an_error() {
        let err = DocumentHandler::default()
            .package("a.byml", b"junk", b"junk")
            .unwrap_err();
        assert!(matches!(err, PatchError::Document(_)));
    }
}
