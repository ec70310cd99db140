//! Per-extension file readers
//!
//! Every reader implements the [`Reader`] capability. The set of readers is
//! closed and listed in [`ReaderKind`]; lookup by extension goes through a
//! static registry in the fixed order text, image, byte.

use crate::error::{Error, Result};
use crate::io::get_file_extension;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Extensions decoded as UTF-8 text
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "rst", "py", "html", "css", "js", "json", "toml", "yaml", "yml", "rs", "ts",
    "c", "h", "cpp", "sh", "xml", "csv", "ini", "cfg",
];

/// Extensions captured as image data
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp", "tif", "svg", "ico", "psd", "raw",
    "arw", "cr2", "crw", "dcr", "dng", "erf", "kdc", "mos", "nef", "nrw", "orf", "pef", "raf",
    "rw2", "srw", "x3f",
];

/// Extensions explicitly registered for raw byte capture
pub const BYTE_EXTENSIONS: &[&str] = &[
    "zip", "rar", "7z", "gz", "bz2", "xz", "tar", "tgz", "iso", "dmg", "img", "bin", "exe",
    "dll", "msi", "apk", "ipa", "deb", "rpm", "cab", "pkg", "mpkg", "msp", "mst", "msu", "mse",
    "makefile", "",
];

/// Content produced by a reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Bytes(Vec<u8>),
    Text(String),
    Image(Vec<u8>),
}

impl FileContent {
    /// Exact on-disk bytes of the content
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Bytes(bytes) | FileContent::Image(bytes) => bytes,
            FileContent::Text(text) => text.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Read and validation capability shared by all readers
pub trait Reader {
    /// Human readable name used in logs and errors
    fn name(&self) -> &'static str;

    /// Extensions this reader declares support for
    fn valid_extensions(&self) -> &'static [&'static str];

    /// Decode a file into its content representation
    fn read_content(&self, bytes: Vec<u8>) -> Result<FileContent>;

    /// Check a list of extensions against this reader
    ///
    /// Returns whether all are valid plus the indices of the invalid ones.
    fn validate_extensions(&self, extensions: &[&str]) -> (bool, Vec<usize>) {
        let invalid: Vec<usize> = extensions
            .iter()
            .enumerate()
            .filter(|(_, ext)| !self.valid_extensions().contains(&ext.to_ascii_lowercase().as_str()))
            .map(|(idx, _)| idx)
            .collect();
        (invalid.is_empty(), invalid)
    }

    /// Validate the file's extension, then read it
    fn read(&self, path: &Path) -> Result<FileContent> {
        let extension = get_file_extension(path);
        let (valid, _) = self.validate_extensions(&[extension.as_str()]);
        if !valid {
            return Err(Error::ExtensionMismatch {
                reader: self.name(),
                extension,
            });
        }

        let bytes = fs::read(path).map_err(|e| Error::from_io(e, path))?;
        self.read_content(bytes)
    }
}

/// Raw bytes; accepts any extension
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteReader;

impl Reader for ByteReader {
    fn name(&self) -> &'static str {
        "ByteReader"
    }

    fn valid_extensions(&self) -> &'static [&'static str] {
        BYTE_EXTENSIONS
    }

    fn read_content(&self, bytes: Vec<u8>) -> Result<FileContent> {
        Ok(FileContent::Bytes(bytes))
    }

    fn validate_extensions(&self, _extensions: &[&str]) -> (bool, Vec<usize>) {
        (true, Vec::new())
    }
}

/// UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReader;

impl Reader for TextReader {
    fn name(&self) -> &'static str {
        "TextReader"
    }

    fn valid_extensions(&self) -> &'static [&'static str] {
        TEXT_EXTENSIONS
    }

    fn read_content(&self, bytes: Vec<u8>) -> Result<FileContent> {
        String::from_utf8(bytes)
            .map(FileContent::Text)
            .map_err(|e| Error::CorruptData(format!("not valid UTF-8: {}", e.utf8_error())))
    }
}

/// Binary passthrough tagged as an image
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageReader;

impl Reader for ImageReader {
    fn name(&self) -> &'static str {
        "ImageReader"
    }

    fn valid_extensions(&self) -> &'static [&'static str] {
        IMAGE_EXTENSIONS
    }

    fn read_content(&self, bytes: Vec<u8>) -> Result<FileContent> {
        Ok(FileContent::Image(bytes))
    }
}

/// Closed set of reader variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderKind {
    Text,
    Image,
    Byte,
}

static TEXT_READER: TextReader = TextReader;
static IMAGE_READER: ImageReader = ImageReader;
static BYTE_READER: ByteReader = ByteReader;

/// Registry order used for extension lookup
const REGISTRY: [ReaderKind; 3] = [ReaderKind::Text, ReaderKind::Image, ReaderKind::Byte];

impl ReaderKind {
    /// The reader implementing this variant
    pub fn reader(self) -> &'static dyn Reader {
        match self {
            ReaderKind::Text => &TEXT_READER,
            ReaderKind::Image => &IMAGE_READER,
            ReaderKind::Byte => &BYTE_READER,
        }
    }

    pub fn name(self) -> &'static str {
        self.reader().name()
    }
}

/// Every reader variant, in registry order
pub fn get_all_readers() -> Vec<ReaderKind> {
    REGISTRY.to_vec()
}

/// First reader whose declared extension list contains `extension`
pub fn get_reader_by_extension(extension: &str) -> Result<ReaderKind> {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    REGISTRY
        .iter()
        .copied()
        .find(|kind| kind.reader().valid_extensions().contains(&extension.as_str()))
        .ok_or(Error::UnsupportedExtension(extension))
}
