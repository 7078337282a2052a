//! Folded-character trie for cairn item lookups
//!
//! [`FoldedTrieIndex`] is a multi-map from string keys to values. Each trie
//! level consumes a fixed number of key characters and folds them into a
//! numeric bucket, which keeps the branching factor bounded regardless of the
//! key alphabet. Distinct keys may share a leaf, so every leaf keeps the
//! literal keys and lookups always re-check them.
//!
//! ```
//! use cairn_index::FoldedTrieIndex;
//!
//! let mut index = FoldedTrieIndex::new();
//! index.insert("Id=report-2024", 1u32);
//! index.insert("finance", 1u32);
//! index.insert("Id=report-2025", 2u32);
//!
//! assert_eq!(index.search_exact("finance"), vec![1]);
//! assert_eq!(index.search("Id=report-*").len(), 2);
//! ```

pub mod fold;
pub mod glob;
pub mod trie;

pub use fold::{Segment, TrieConfig};
pub use glob::{glob_match, is_literal, literal_prefix};
pub use trie::FoldedTrieIndex;
