//! Entity resolution: name variants, alias table, resolver and mention
//! extraction.

pub mod alias;
pub mod extractor;
pub mod resolver;
pub mod variants;

pub use alias::AliasTable;
pub use extractor::{Mention, MentionExtractor};
pub use resolver::{EntityIndex, EntityResolver, IndexedName, MatchMethod, Resolution};
