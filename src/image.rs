//! Program images for the DCPU-16.
//!
//! An image is a block of 16-bit words plus the address it loads at.
//! Two on-disk encodings are understood:
//! - Binary: two bytes per word, big-endian unless told otherwise
//! - Hex: whitespace-separated hex words, `;` starts a comment

use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::{Cpu, MemoryError};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Byte order of binary images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// On-disk encoding of a program image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Binary { endian: Endian },
    Hex,
}

impl ImageFormat {
    /// Guess the format from a file extension.
    ///
    /// `.hex` and `.txt` are read as hex text; everything else as big-endian binary.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("hex") | Some("txt") => ImageFormat::Hex,
            _ => ImageFormat::Binary { endian: Endian::Big },
        }
    }
}

/// A loaded program image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramImage {
    /// Load address of the first word.
    pub origin: u16,
    pub words: Vec<u16>,
}

impl ProgramImage {
    pub fn new(origin: u16, words: Vec<u16>) -> Self {
        Self { origin, words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Parse raw file contents.
    pub fn parse(bytes: &[u8], format: ImageFormat) -> Result<Self, ImageError> {
        let words = match format {
            ImageFormat::Binary { endian } => parse_binary(bytes, endian)?,
            ImageFormat::Hex => {
                let text = std::str::from_utf8(bytes).map_err(|e| ImageError::Parse {
                    line: 0,
                    message: format!("not UTF-8 text: {}", e),
                })?;
                parse_hex(text)?
            }
        };

        if words.len() > MEMORY_SIZE {
            return Err(ImageError::TooLarge(words.len()));
        }

        Ok(Self::new(0, words))
    }

    /// Load an image from disk.
    pub fn load<P: AsRef<Path>>(path: P, format: ImageFormat) -> Result<Self, ImageError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
        Self::parse(&bytes, format)
    }

    /// Save an image to disk.
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ImageFormat) -> Result<(), ImageError> {
        let mut file =
            std::fs::File::create(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
        file.write_all(&self.encode(format))
            .map_err(|e| ImageError::Io(e.to_string()))
    }

    /// Encode into the given on-disk format.
    pub fn encode(&self, format: ImageFormat) -> Vec<u8> {
        match format {
            ImageFormat::Binary { endian } => self
                .words
                .iter()
                .flat_map(|w| match endian {
                    Endian::Big => w.to_be_bytes(),
                    Endian::Little => w.to_le_bytes(),
                })
                .collect(),
            ImageFormat::Hex => {
                let mut out = format!("; {} words\n", self.words.len());
                for chunk in self.words.chunks(8) {
                    let line: Vec<String> = chunk.iter().map(|w| format!("{:04x}", w)).collect();
                    out.push_str(&line.join(" "));
                    out.push('\n');
                }
                out.into_bytes()
            }
        }
    }

    /// Copy the image into a CPU's memory at its origin.
    pub fn load_into(&self, cpu: &mut Cpu) -> Result<(), MemoryError> {
        cpu.load(self.origin, &self.words)
    }
}

fn parse_binary(bytes: &[u8], endian: Endian) -> Result<Vec<u16>, ImageError> {
    if bytes.len() % 2 != 0 {
        return Err(ImageError::OddLength(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            match endian {
                Endian::Big => u16::from_be_bytes(pair),
                Endian::Little => u16::from_le_bytes(pair),
            }
        })
        .collect())
}

fn parse_hex(text: &str) -> Result<Vec<u16>, ImageError> {
    let mut words = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let code = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };

        for token in code.split_whitespace() {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);

            let invalid = || ImageError::Parse {
                line: line_num + 1,
                message: format!("invalid hex word '{}'", token),
            };
            if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            let word = u16::from_str_radix(digits, 16).map_err(|_| invalid())?;
            words.push(word);
        }
    }

    Ok(words)
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("binary image has odd length {0}")]
    OddLength(usize),

    #[error("image of {0} words does not fit in memory")]
    TooLarge(usize),
}
