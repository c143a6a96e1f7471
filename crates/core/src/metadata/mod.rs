//! Metadata normalization.
//!
//! Turns a raw torrent name/path into a canonical (title, year, resolution,
//! codec) tuple. The external library lookup is tried first; the regex
//! parser is the fallback. `normalize` is total and never fails.

mod library;
mod parser;
mod types;

pub use library::NfoMetadataLibrary;
pub use parser::NameParser;
pub use types::{Codec, LibraryHit, MetadataLibrary, NormalizedMetadata, Resolution};

use std::sync::Arc;

use crate::client::LocalTorrent;

/// Produces `NormalizedMetadata` from local torrents.
pub struct Normalizer {
    parser: NameParser,
    library: Option<Arc<dyn MetadataLibrary>>,
}

impl Normalizer {
    pub fn new(library: Option<Arc<dyn MetadataLibrary>>) -> Self {
        Self {
            parser: NameParser::new(),
            library,
        }
    }

    /// Normalize a local torrent. Total: every torrent yields metadata,
    /// with `Unknown` tags and an absent year in the worst case.
    pub async fn normalize(&self, torrent: &LocalTorrent) -> NormalizedMetadata {
        // Resolution and codec always come from the release name; the
        // library does not know about encode variants.
        let resolution = self.parser.extract_resolution(&torrent.name);
        let codec = self.parser.extract_codec(&torrent.name);

        if let Some(library) = &self.library {
            if let Some(hit) = library.lookup(&torrent.save_path).await {
                return NormalizedMetadata {
                    title: self.parser.canonicalize(&hit.title),
                    display_title: hit.title,
                    year: hit.year,
                    resolution,
                    codec,
                };
            }
        }

        let (display_title, year) = self.parser.extract_title_year(&torrent.name);
        NormalizedMetadata {
            title: self.parser.canonicalize(&display_title),
            display_title,
            year,
            resolution,
            codec,
        }
    }
}
