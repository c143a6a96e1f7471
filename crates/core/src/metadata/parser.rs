//! Regex-based release name parsing.
//!
//! The fallback path of the normalizer: an ordered set of extraction
//! strategies over the raw torrent name, each returning an explicit absent
//! value rather than failing.

use regex_lite::Regex;

use super::{Codec, Resolution};

/// Compiled extraction patterns for release names.
pub struct NameParser {
    title_year: Regex,
    resolution: Regex,
    codec: Regex,
    brackets: Regex,
    release_group: Regex,
    separators: Regex,
}

impl NameParser {
    pub fn new() -> Self {
        Self {
            // Title anchored at the start, up to a 4-digit year.
            title_year: Regex::new(r"^(?P<title>.+?)[ ._(\[]+(?P<year>(?:19|20)\d{2})(?:[ ._)\]]|$)")
                .expect("static regex"),
            resolution: Regex::new(r"(?i)\b(2160p|4k|1080p|720p)\b").expect("static regex"),
            codec: Regex::new(r"(?i)\b(h\.?264|x264|avc|h\.?265|x265|hevc)\b")
                .expect("static regex"),
            brackets: Regex::new(r"\[[^\]]*\]").expect("static regex"),
            release_group: Regex::new(r"-[A-Za-z0-9]+$").expect("static regex"),
            separators: Regex::new(r"[._\s]+").expect("static regex"),
        }
    }

    /// Extract (display title, year) from a release name.
    ///
    /// Without a year the title is everything before the first
    /// resolution/codec token, or the whole cleaned name.
    pub fn extract_title_year(&self, name: &str) -> (String, Option<u16>) {
        let cleaned = self.pre_clean(name);

        if let Some(caps) = self.title_year.captures(&cleaned) {
            let title = self.collapse(&caps["title"]);
            let year = caps["year"].parse::<u16>().ok();
            if !title.is_empty() {
                return (title, year);
            }
        }

        // No year: cut at the first quality token, if any.
        let cut = self
            .resolution
            .find(&cleaned)
            .map(|m| m.start())
            .into_iter()
            .chain(self.codec.find(&cleaned).map(|m| m.start()))
            .min()
            .unwrap_or(cleaned.len());

        (self.collapse(&cleaned[..cut]), None)
    }

    /// Scan anywhere in the name for a resolution tag.
    pub fn extract_resolution(&self, name: &str) -> Resolution {
        match self.resolution.find(name) {
            Some(m) => match m.as_str().to_lowercase().as_str() {
                "720p" => Resolution::R720p,
                "1080p" => Resolution::R1080p,
                "2160p" | "4k" => Resolution::R2160p,
                _ => Resolution::Unknown,
            },
            None => Resolution::Unknown,
        }
    }

    /// Scan anywhere in the name for a codec tag.
    pub fn extract_codec(&self, name: &str) -> Codec {
        match self.codec.find(name) {
            Some(m) => {
                let tag = m.as_str().to_lowercase().replace('.', "");
                match tag.as_str() {
                    "h264" | "x264" | "avc" => Codec::H264,
                    "h265" | "x265" | "hevc" => Codec::H265,
                    _ => Codec::Unknown,
                }
            }
            None => Codec::Unknown,
        }
    }

    /// Lowercased canonical form of a display title. Idempotent.
    pub fn canonicalize(&self, display_title: &str) -> String {
        self.collapse(display_title).to_lowercase()
    }

    /// Strip bracketed tags and, for dot-separated release names, the
    /// trailing `-GROUP` suffix.
    fn pre_clean(&self, name: &str) -> String {
        let stripped = self.brackets.replace_all(name, " ");
        if stripped.contains('.') {
            self.release_group.replace(&stripped, "").into_owned()
        } else {
            stripped.into_owned()
        }
    }

    /// Collapse dot/underscore/whitespace runs to single spaces and trim.
    fn collapse(&self, text: &str) -> String {
        self.separators.replace_all(text, " ").trim().to_string()
    }
}

impl Default for NameParser {
    fn default() -> Self {
        Self::new()
    }
}
