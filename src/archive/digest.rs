//! Counting and digesting writer adapters (spec §4.C).
//!
//! Every emitter needs the byte count of a payload it's still streaming
//! (for ar/tar headers written before the body, or for picking the final
//! `Size:`/`FILESIZES` tag) and, for deb/rpm/apk, one or more running
//! hashes of the same bytes. Both wrap an inner [`Write`] and pass bytes
//! through unchanged.

use std::io::{self, Write};

use md5::Digest as _;

/// Counts bytes written through it; never buffers them.
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Which digests a [`DigestWriter`] should accumulate. Each format needs
/// a different subset (spec §4.E-§4.H).
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSet {
    pub md5: bool,
    pub sha1: bool,
    pub sha256: bool,
}

/// Running digest state. `finish` is non-destructive with respect to the
/// inner writer: callers keep writing after reading an intermediate
/// digest if they need to (e.g. apk's per-entry PAX checksum followed by
/// the whole-tarball digest).
#[derive(Default)]
pub struct Digests {
    md5: Option<md5::Md5>,
    sha1: Option<sha1::Sha1>,
    sha256: Option<sha2::Sha256>,
}

impl Digests {
    fn new(set: DigestSet) -> Self {
        Self {
            md5: set.md5.then(md5::Md5::new),
            sha1: set.sha1.then(sha1::Sha1::new),
            sha256: set.sha256.then(sha2::Sha256::new),
        }
    }

    fn update(&mut self, data: &[u8]) {
        if let Some(h) = &mut self.md5 {
            h.update(data);
        }
        if let Some(h) = &mut self.sha1 {
            h.update(data);
        }
        if let Some(h) = &mut self.sha256 {
            h.update(data);
        }
    }

    #[must_use]
    pub fn md5_hex(&self) -> Option<String> {
        self.md5.clone().map(|h| hex(&h.finalize()))
    }

    #[must_use]
    pub fn sha1_hex(&self) -> Option<String> {
        self.sha1.clone().map(|h| hex(&h.finalize()))
    }

    #[must_use]
    pub fn sha256_hex(&self) -> Option<String> {
        self.sha256.clone().map(|h| hex(&h.finalize()))
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String never fails");
    }
    s
}

/// Fans written bytes through to `inner` unchanged while feeding the
/// requested subset of hashes.
pub struct DigestWriter<W> {
    inner: W,
    digests: Digests,
}

impl<W: Write> DigestWriter<W> {
    #[must_use]
    pub fn new(inner: W, set: DigestSet) -> Self {
        Self {
            inner,
            digests: Digests::new(set),
        }
    }

    #[must_use]
    pub fn digests(&self) -> &Digests {
        &self.digests
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.digests.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_writer_counts_exactly_what_was_written() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"hello").unwrap();
        w.write_all(b" world").unwrap();
        assert_eq!(w.count(), 11);
    }

    #[test]
    fn digest_writer_matches_known_md5() {
        let mut w = DigestWriter::new(Vec::new(), DigestSet { md5: true, sha1: false, sha256: false });
        w.write_all(b"abc").unwrap();
        assert_eq!(w.digests().md5_hex().unwrap(), "900150983cd24fb0d6963f7d28e17f72");
        assert!(w.digests().sha1_hex().is_none());
    }
}
