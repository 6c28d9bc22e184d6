use crate::raw::{hc, CompressionMode, DEFAULT_ACCELERATION};

/// A builder-style struct that configures compression settings.
/// The same settings drive the streaming format and the block format.
///
/// Create it using `Default::default()`.
#[derive(Clone, Debug)]
pub struct CompressionSettings<'a> {
    acceleration: usize,
    high_compression: bool,
    compression_level: i32,
    dictionary: Option<&'a [u8]>,
}
impl<'a> Default for CompressionSettings<'a> {
    fn default() -> Self {
        Self {
            acceleration: DEFAULT_ACCELERATION,
            high_compression: false,
            compression_level: hc::DEFAULT_LEVEL as i32,
            dictionary: None,
        }
    }
}
impl<'a> CompressionSettings<'a> {
    /// Trades compression ratio for speed in the fast coder. 1 is the slowest and densest setting;
    /// values below 1 are treated as 1.
    ///
    /// Ignored when high compression is enabled.
    pub fn acceleration(&mut self, v: usize) -> &mut Self {
        self.acceleration = v;
        self
    }

    /// Use the hash-chain coder instead of the fast one.
    /// It is considerably slower to compress; decompression speed is unaffected.
    ///
    /// Disabled by default.
    pub fn high_compression(&mut self, v: bool) -> &mut Self {
        self.high_compression = v;
        self
    }

    /// Search effort of the high compression coder, from 1 to 12.
    /// Zero or negative values select the default of 9, larger values are capped at 12.
    pub fn compression_level(&mut self, v: i32) -> &mut Self {
        self.compression_level = v;
        self
    }

    /// A dictionary is a constant slice of bytes shared by the compressing and decompressing party.
    /// The first block of a stream may reference it, which helps a lot with short streams.
    ///
    /// Only the trailing 64 KiB of a dictionary are ever referenced. Decompressing with a different
    /// (or no) dictionary is not detected reliably: it either fails or produces the wrong value.
    ///
    /// The block format does not use dictionaries.
    pub fn dictionary(&mut self, dict: &'a [u8]) -> &mut Self {
        self.dictionary = Some(dict);
        self
    }

    pub(crate) fn mode(&self) -> CompressionMode {
        if self.high_compression {
            CompressionMode::High { level: hc::clamp_level(self.compression_level) }
        } else {
            CompressionMode::Fast { acceleration: self.acceleration }
        }
    }

    pub(crate) fn dictionary_bytes(&self) -> Option<&'a [u8]> {
        self.dictionary
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fast() {
        assert_eq!(CompressionSettings::default().mode(), CompressionMode::Fast { acceleration: 1 });
    }

    #[test]
    fn high_compression_clamps_level() {
        let mut settings = CompressionSettings::default();
        settings.high_compression(true).compression_level(40);
        assert_eq!(settings.mode(), CompressionMode::High { level: hc::MAX_LEVEL });
        settings.compression_level(0);
        assert_eq!(settings.mode(), CompressionMode::High { level: hc::DEFAULT_LEVEL });
    }
}
