//! Compression backends for archive payloads (spec §4.C).
//!
//! Each format picks its own default via [`Compression::default_for`]; an
//! override can replace it through [`crate::model::DebOverrides::compression`]
//! / [`crate::model::RpmOverrides::compression`].

use std::io::{self, Write};

use crate::model::Format;

/// A compression scheme plus its level/preset, resolved to a concrete
/// [`Write`] adapter by [`Compression::writer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// gzip via `flate2`. apk fixes this at level 6 regardless of what's
    /// requested here (spec §4.G); deb/rpm honor the level.
    Gzip { level: u32 },
    /// `.xz` container via `xz2`, preset 0-9 (optionally `| EXTREME_FLAG`
    /// upstream, but we don't expose that knob).
    Xz { preset: u32 },
    /// Raw legacy `.lzma` stream, no xz container. RPM historically used
    /// this before switching to xz; kept for completeness (spec §4.F).
    Lzma { preset: u32 },
    /// zstd via the `zstd` crate, levels 1-22. Arch's only compression.
    Zstd { level: i32 },
    /// No compression; payload passes through unchanged.
    None,
}

impl Compression {
    /// Each format's default compressor. RPM's is pinned by spec §4.F
    /// ("`PAYLOADCOMPRESSOR` (default gzip, configurable)"); apk's gzip and
    /// Arch's zstd are not actually configurable (spec §4.G, §4.H always
    /// use them) — `default_for` still covers them so every emitter can
    /// reach for the same helper uniformly. Deb is left at xz/preset 6,
    /// matching modern `dpkg-deb`'s default, since the spec doesn't pin
    /// one (see DESIGN.md Open Question).
    #[must_use]
    pub fn default_for(format: Format) -> Self {
        match format {
            Format::Deb => Compression::Xz { preset: 6 },
            Format::Rpm => Compression::Gzip { level: 6 },
            Format::Apk => Compression::Gzip { level: 6 },
            Format::Arch => Compression::Zstd { level: 3 },
        }
    }

    /// Wraps `inner` so writes to the result are compressed before landing
    /// on `inner`. Callers must call `finish` (via the returned trait
    /// object's `Drop`, or explicitly where the encoder requires it) — see
    /// [`Self::finish`].
    pub fn writer<'w, W: Write + 'w>(self, inner: W) -> io::Result<Box<dyn CompressWriter + 'w>> {
        match self {
            Compression::Gzip { level } => {
                let enc = flate2::write::GzEncoder::new(inner, flate2::Compression::new(level));
                Ok(Box::new(enc))
            }
            Compression::Xz { preset } => {
                let enc = xz2::write::XzEncoder::new(inner, preset);
                Ok(Box::new(enc))
            }
            Compression::Lzma { preset } => {
                let opts = xz2::stream::LzmaOptions::new_preset(preset)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                let stream = xz2::stream::Stream::new_lzma_encoder(&opts)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                let enc = xz2::write::XzEncoder::new_stream(inner, stream);
                Ok(Box::new(enc))
            }
            Compression::Zstd { level } => {
                let enc = zstd::stream::write::Encoder::new(inner, level)?.auto_finish();
                Ok(Box::new(enc))
            }
            Compression::None => Ok(Box::new(Passthrough(inner))),
        }
    }

    /// File extension the compressed member gets appended to its base
    /// name, e.g. `data.tar` + this = `data.tar.xz` (spec §4.E/§4.F).
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Compression::Gzip { .. } => "gz",
            Compression::Xz { .. } => "xz",
            Compression::Lzma { .. } => "lzma",
            Compression::Zstd { .. } => "zst",
            Compression::None => "",
        }
    }
}

/// A [`Write`] implementation that also knows how to flush trailing
/// compressor state.
///
/// `GzEncoder`/`XzEncoder` both expose `finish(self) -> io::Result<W>`,
/// which consumes `self` by value and so can't be reached through a
/// `Box<dyn Write>`. `try_finish(&mut self)` does the same flush without
/// consuming the encoder, which is what this trait exposes uniformly.
pub trait CompressWriter: Write {
    /// Writes any trailing bytes the compressor was holding back. Must be
    /// called exactly once, after all payload bytes have been written,
    /// before reading back whatever sink received them.
    fn finish_stream(&mut self) -> io::Result<()>;
}

impl<W: Write> CompressWriter for flate2::write::GzEncoder<W> {
    fn finish_stream(&mut self) -> io::Result<()> {
        self.try_finish()
    }
}

impl<W: Write> CompressWriter for xz2::write::XzEncoder<W> {
    fn finish_stream(&mut self) -> io::Result<()> {
        self.try_finish()
    }
}

impl<W: Write> CompressWriter for zstd::stream::write::AutoFinishEncoder<'static, W> {
    fn finish_stream(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Identity wrapper so [`Compression::None`] can return the same
/// `Box<dyn CompressWriter>` shape as every real compressor.
struct Passthrough<W>(W);

impl<W: Write> Write for Passthrough<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> CompressWriter for Passthrough<W> {
    fn finish_stream(&mut self) -> io::Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_per_format_matches_spec_table() {
        assert_eq!(Compression::default_for(Format::Deb).extension(), "xz");
        assert_eq!(Compression::default_for(Format::Rpm).extension(), "gz");
        assert_eq!(Compression::default_for(Format::Apk).extension(), "gz");
        assert_eq!(Compression::default_for(Format::Arch).extension(), "zst");
    }

    #[test]
    fn gzip_roundtrips_via_flate2_decoder() {
        let mut buf = Vec::new();
        {
            let mut w = Compression::Gzip { level: 6 }.writer(&mut buf).unwrap();
            w.write_all(b"hello world").unwrap();
            w.finish_stream().unwrap();
        }
        let mut dec = flate2::read::GzDecoder::new(&buf[..]);
        let mut out = String::new();
        std::io::Read::read_to_string(&mut dec, &mut out).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn none_passes_through() {
        let mut buf = Vec::new();
        {
            let mut w = Compression::None.writer(&mut buf).unwrap();
            w.write_all(b"raw").unwrap();
        }
        assert_eq!(buf, b"raw");
    }
}
