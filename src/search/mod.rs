pub mod embed;
pub mod indexing;
pub mod vector;

pub use embed::{Embedder, HashingEmbedder, SharedEmbedder, embedder_from_config};
pub use indexing::{IndexReport, build_index, clear_index, format_document};
pub use vector::{IndexedDocument, ScoredDocument, all_documents, document_count, similarity_search};
