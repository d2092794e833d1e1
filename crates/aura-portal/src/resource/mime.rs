//! Image MIME sniffing from magic bytes.

use std::fmt;

/// Image formats recognised from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageMime {
    /// `89 50 4E 47`
    Png,
    /// `FF D8 FF`; also the fallback for unrecognised payloads
    #[default]
    Jpeg,
    /// `47 49 46`
    Gif,
    /// `52 49 46 46` (RIFF container)
    Webp,
}

const SIGNATURES: &[(&[u8], ImageMime)] = &[
    (&[0x89, 0x50, 0x4E, 0x47], ImageMime::Png),
    (&[0xFF, 0xD8, 0xFF], ImageMime::Jpeg),
    (&[0x47, 0x49, 0x46], ImageMime::Gif),
    (&[0x52, 0x49, 0x46, 0x46], ImageMime::Webp),
];

impl ImageMime {
    /// Detect the format of `bytes`, defaulting to JPEG.
    pub fn sniff(bytes: &[u8]) -> Self {
        SIGNATURES
            .iter()
            .find(|(magic, _)| bytes.starts_with(magic))
            .map(|(_, mime)| *mime)
            .unwrap_or_default()
    }

    /// MIME type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
