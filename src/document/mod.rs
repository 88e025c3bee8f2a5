// Document model: the tagged-union tree shared by the patch engines and the
// overlay orchestrator, plus the codec seam used to read and write it.

pub mod codec;
pub mod node;

pub use codec::{DocumentCodec, DocumentError, NativeCodec};
pub use node::{Document, DocumentKind, HashMap32, HashMap64, Map};
