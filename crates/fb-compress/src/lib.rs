//! Bundle compression engine — pluggable, self-describing text compressors.
//!
//! Strategies:
//! 1. None — passthrough
//! 2. Dictionary — repeated substrings → `«k»` references
//! 3. Template — near-duplicate lines → one parameterized pattern + `T<k>{..}` rows
//! 4. Delta — near-duplicate files → edit scripts against an earlier file
//! 5. Combined — several of the above applied as layers
//!
//! The [`Registry`] holds strategies by name and the [`Selector`] runs one
//! compress/decompress call per bundle part.

pub mod combined;
pub mod delta;
pub mod dictionary;
mod envelope;
pub mod none;
pub mod registry;
pub mod selector;
pub mod strategy;
pub mod template;

pub use combined::CombinedStrategy;
pub use delta::{DeltaOp, DeltaStrategy, FileUnit};
pub use dictionary::{DictionaryStrategy, Pattern};
pub use none::NoneStrategy;
pub use registry::Registry;
pub use selector::{CompressionResult, Selector};
pub use strategy::{Compressed, Strategy};
pub use template::{Template, TemplateInstance, TemplateStrategy};

pub use fb_core::{CompressionConfig, CompressionError, Result};
