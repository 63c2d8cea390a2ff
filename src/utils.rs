// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Unaligned big-/little-endian load and store helpers plus a few buffer
//! utilities shared by the CDB builders, the sense decoder and the backends.
//!
//! All loaders read from the start of `buf`; all stores write to the start of
//! `buf`. Bounds are the caller's responsibility: a short slice panics the
//! same way a slice index would.

use std::fmt::Write;

#[inline]
pub fn get_unaligned_be16(buf: &[u8]) -> u16 {
    u16::from_be_bytes([buf[0], buf[1]])
}

#[inline]
pub fn get_unaligned_be24(buf: &[u8]) -> u32 {
    u32::from_be_bytes([0, buf[0], buf[1], buf[2]])
}

#[inline]
pub fn get_unaligned_be32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Top two bytes of the result are always zero.
#[inline]
pub fn get_unaligned_be48(buf: &[u8]) -> u64 {
    u64::from_be_bytes([0, 0, buf[0], buf[1], buf[2], buf[3], buf[4], buf[5]])
}

#[inline]
pub fn get_unaligned_be64(buf: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[..8]);
    u64::from_be_bytes(b)
}

#[inline]
pub fn put_unaligned_be16(v: u16, buf: &mut [u8]) {
    buf[..2].copy_from_slice(&v.to_be_bytes());
}

#[inline]
pub fn put_unaligned_be24(v: u32, buf: &mut [u8]) {
    buf[..3].copy_from_slice(&v.to_be_bytes()[1..]);
}

#[inline]
pub fn put_unaligned_be32(v: u32, buf: &mut [u8]) {
    buf[..4].copy_from_slice(&v.to_be_bytes());
}

/// Stores the low 48 bits of `v`.
#[inline]
pub fn put_unaligned_be48(v: u64, buf: &mut [u8]) {
    buf[..6].copy_from_slice(&v.to_be_bytes()[2..]);
}

#[inline]
pub fn put_unaligned_be64(v: u64, buf: &mut [u8]) {
    buf[..8].copy_from_slice(&v.to_be_bytes());
}

#[inline]
pub fn get_unaligned_le16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}

#[inline]
pub fn get_unaligned_le24(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], 0])
}

#[inline]
pub fn get_unaligned_le32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Top two bytes of the result are always zero.
#[inline]
pub fn get_unaligned_le48(buf: &[u8]) -> u64 {
    u64::from_le_bytes([buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], 0, 0])
}

#[inline]
pub fn get_unaligned_le64(buf: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(b)
}

#[inline]
pub fn put_unaligned_le16(v: u16, buf: &mut [u8]) {
    buf[..2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_unaligned_le24(v: u32, buf: &mut [u8]) {
    buf[..3].copy_from_slice(&v.to_le_bytes()[..3]);
}

#[inline]
pub fn put_unaligned_le32(v: u32, buf: &mut [u8]) {
    buf[..4].copy_from_slice(&v.to_le_bytes());
}

/// Stores the low 48 bits of `v`.
#[inline]
pub fn put_unaligned_le48(v: u64, buf: &mut [u8]) {
    buf[..6].copy_from_slice(&v.to_le_bytes()[..6]);
}

#[inline]
pub fn put_unaligned_le64(v: u64, buf: &mut [u8]) {
    buf[..8].copy_from_slice(&v.to_le_bytes());
}

/// Space-separated lowercase hex, the format used for CDB and sense traces.
pub fn hex_spaced(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        let _ = write!(&mut s, "{byte:02x}");
    }
    s
}

/// Decode a hex dump (whitespace, `0x` prefixes and `#` comments tolerated)
/// into raw bytes. Used by decode-only tooling fed from prerecorded dumps.
pub fn decode_hex_dump(text: &str) -> anyhow::Result<Vec<u8>> {
    let mut cleaned = String::with_capacity(text.len());
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("");
        for tok in line.split(|c: char| c.is_whitespace() || c == ',') {
            let tok = tok
                .strip_prefix("0x")
                .or_else(|| tok.strip_prefix("0X"))
                .unwrap_or(tok);
            if tok.len() == 1 {
                cleaned.push('0');
            }
            cleaned.push_str(tok);
        }
    }
    hex::decode(&cleaned).map_err(|e| anyhow::anyhow!("hex decode error: {e}"))
}

/// Trim trailing spaces and NULs from an ASCII identification field.
pub fn trim_ascii(bytes: &[u8]) -> String {
    let s: String = bytes
        .iter()
        .map(|&b| if b.is_ascii() && b != 0 { b as char } else { ' ' })
        .collect();
    s.trim().to_string()
}

/// Copy `src` into `dst` and pad the rest with ASCII spaces.
pub fn copy_space_padded(dst: &mut [u8], src: &[u8]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(b' ');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_round_trip_all_widths() {
        let mut b = [0u8; 8];
        put_unaligned_be16(0xbeef, &mut b);
        assert_eq!(get_unaligned_be16(&b), 0xbeef);
        put_unaligned_be24(0x12_3456, &mut b);
        assert_eq!(get_unaligned_be24(&b), 0x12_3456);
        put_unaligned_be32(0xdead_beef, &mut b);
        assert_eq!(get_unaligned_be32(&b), 0xdead_beef);
        put_unaligned_be48(0x1234_5678_9abc, &mut b);
        assert_eq!(get_unaligned_be48(&b), 0x1234_5678_9abc);
        put_unaligned_be64(0x0102_0304_0506_0708, &mut b);
        assert_eq!(b, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(get_unaligned_be64(&b), 0x0102_0304_0506_0708);
    }

    #[test]
    fn le_round_trip_all_widths() {
        let mut b = [0u8; 8];
        put_unaligned_le16(0xbeef, &mut b);
        assert_eq!(get_unaligned_le16(&b), 0xbeef);
        put_unaligned_le24(0x12_3456, &mut b);
        assert_eq!(&b[..3], &[0x56, 0x34, 0x12]);
        assert_eq!(get_unaligned_le24(&b), 0x12_3456);
        put_unaligned_le32(0xdead_beef, &mut b);
        assert_eq!(get_unaligned_le32(&b), 0xdead_beef);
        put_unaligned_le48(0x1234_5678_9abc, &mut b);
        assert_eq!(get_unaligned_le48(&b), 0x1234_5678_9abc);
        put_unaligned_le64(u64::MAX - 1, &mut b);
        assert_eq!(get_unaligned_le64(&b), u64::MAX - 1);
    }

    #[test]
    fn be48_store_drops_high_bytes() {
        let mut b = [0xffu8; 8];
        put_unaligned_be48(0xffff_0000_0000_0001, &mut b);
        assert_eq!(&b[..6], &[0, 0, 0, 0, 0, 1]);
        assert_eq!(b[6], 0xff, "store must not write past 6 bytes");
        assert_eq!(get_unaligned_be48(&b), 1);
    }

    #[test]
    #[should_panic]
    fn short_buffer_panics() {
        let b = [0u8; 3];
        let _ = get_unaligned_be32(&b);
    }

    #[test]
    fn hex_dump_decoding() {
        let bytes = decode_hex_dump("72 05 24 0 # sense\n0x00,00 00 08").expect("decode");
        assert_eq!(bytes, vec![0x72, 0x05, 0x24, 0x00, 0x00, 0x00, 0x00, 0x08]);
        assert_eq!(hex_spaced(&bytes[..3]), "72 05 24");
    }
}
