//! Local text processing: cleanup, chunking, heading detection.

pub mod normalize;
pub mod remaining;
pub mod split;
pub mod titles;

pub use normalize::normalize;
pub use remaining::remaining_text;
pub use split::{TextChunk, UrlRange, find_url_ranges, split_text, text_chunks};
pub use titles::{find_title_boundaries, is_title_end, section_around};
