//! Fixed BSD-style `ar` writer used only by the deb emitter (spec §4.C,
//! §4.E): `debian-binary`, `control.tar.*`, `data.tar.*`, in that order,
//! with an optional detached-signature member appended last.
//!
//! Written by hand rather than pulled in as a dependency: deb's envelope
//! is four fixed members with a very small header, and we need exact
//! control over member ordering and the trailing signature member.

use std::io::{self, Write};

const MAGIC: &[u8] = b"!<arch>\n";

/// Appends one 60-byte ar header plus its (even-padded) body to `out`.
pub fn append_member<W: Write + ?Sized>(out: &mut W, name: &str, mtime: i64, data: &[u8]) -> io::Result<()> {
    if name.len() > 16 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("ar member name {name:?} exceeds the 16-byte BSD-variant limit"),
        ));
    }

    let mut header = [b' '; 60];
    header[0..name.len()].copy_from_slice(name.as_bytes());
    write_field(&mut header, 16, 12, &mtime.max(0).to_string());
    write_field(&mut header, 28, 6, "0");
    write_field(&mut header, 34, 6, "0");
    write_field(&mut header, 40, 8, "100644");
    write_field(&mut header, 48, 10, &data.len().to_string());
    header[58] = b'`';
    header[59] = b'\n';

    out.write_all(&header)?;
    out.write_all(data)?;
    if data.len() % 2 == 1 {
        out.write_all(&[b'\n'])?;
    }
    Ok(())
}

fn write_field(header: &mut [u8; 60], offset: usize, width: usize, value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(width);
    header[offset..offset + n].copy_from_slice(&bytes[..n]);
}

/// Writes the global `!<arch>\n` magic. Must be the first thing written
/// to the archive.
pub fn write_magic<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_and_header_shape() {
        let mut out = Vec::new();
        write_magic(&mut out).unwrap();
        append_member(&mut out, "debian-binary", 0, b"2.0\n").unwrap();

        assert_eq!(&out[0..8], MAGIC);
        assert_eq!(&out[8..21], b"debian-binary");
        assert_eq!(out[8 + 58], b'`');
        assert_eq!(out[8 + 59], b'\n');
    }

    #[test]
    fn odd_length_body_is_padded_to_even() {
        let mut out = Vec::new();
        append_member(&mut out, "x", 0, b"odd").unwrap();
        assert_eq!(out.len() % 2, 0);
        assert_eq!(*out.last().unwrap(), b'\n');
    }

    #[test]
    fn name_over_16_bytes_is_rejected() {
        let mut out = Vec::new();
        assert!(append_member(&mut out, &"x".repeat(17), 0, b"").is_err());
    }
}
