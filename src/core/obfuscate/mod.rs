//! Symbol renaming engine.
//!
//! A run fills one `NameTable` (from indexer declarations or from tagged
//! tokens), then rewrites sources and Interface Builder documents against
//! it, and finally persists it as the conversion map.

mod collector;
mod document;
mod map_writer;
mod name_table;
mod rewriter;
mod tag_scan;

pub use collector::{
    CollectedReferences, FileReferenceSet, KindMatcher, ReferenceCollector, ReferenceRecord,
};
pub use document::{rewrite_document, DocumentOutcome, DocumentSubstitution, TargetIndex};
pub use map_writer::{map_path, render_map, write_map, MAP_FILE_NAME, OUTPUT_DIR};
pub use name_table::{NameGenerator, NameTable, RandomNameGenerator, DEFAULT_NAME_LENGTH};
pub use rewriter::{rewrite, tokenize, RewriteOutcome, SkipReason, SkippedReference};
pub use tag_scan::{TagScanOutcome, TagScanner};

#[cfg(test)]
pub(crate) use name_table::testing;
