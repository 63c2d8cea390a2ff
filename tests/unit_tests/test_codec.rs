// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use scsi_pt_rs::utils::*;

const SAMPLES: [u64; 6] = [
    0,
    1,
    0x0102_0304_0506_0708,
    0x8000_0000_0000_0000,
    0xdead_beef_cafe_f00d,
    u64::MAX,
];

fn mask(w: u32) -> u64 {
    if w == 64 { u64::MAX } else { (1u64 << w) - 1 }
}

#[test]
fn big_endian_store_then_load_at_every_offset() {
    let mut buf = [0u8; 12];
    for off in 0..4 {
        for x in SAMPLES {
            let b = &mut buf[off..];
            put_unaligned_be16(x as u16, b);
            assert_eq!(get_unaligned_be16(b) as u64, x & mask(16));
            put_unaligned_be24((x & mask(24)) as u32, b);
            assert_eq!(get_unaligned_be24(b) as u64, x & mask(24));
            put_unaligned_be32(x as u32, b);
            assert_eq!(get_unaligned_be32(b) as u64, x & mask(32));
            put_unaligned_be48(x & mask(48), b);
            assert_eq!(get_unaligned_be48(b), x & mask(48));
            put_unaligned_be64(x, b);
            assert_eq!(get_unaligned_be64(b), x);
        }
    }
}

#[test]
fn little_endian_store_then_load_at_every_offset() {
    let mut buf = [0u8; 12];
    for off in 0..4 {
        for x in SAMPLES {
            let b = &mut buf[off..];
            put_unaligned_le16(x as u16, b);
            assert_eq!(get_unaligned_le16(b) as u64, x & mask(16));
            put_unaligned_le24((x & mask(24)) as u32, b);
            assert_eq!(get_unaligned_le24(b) as u64, x & mask(24));
            put_unaligned_le32(x as u32, b);
            assert_eq!(get_unaligned_le32(b) as u64, x & mask(32));
            put_unaligned_le48(x & mask(48), b);
            assert_eq!(get_unaligned_le48(b), x & mask(48));
            put_unaligned_le64(x, b);
            assert_eq!(get_unaligned_le64(b), x);
        }
    }
}

#[test]
fn byte_order_is_as_named() {
    let mut b = [0u8; 3];
    put_unaligned_be24(0x0a0b0c, &mut b);
    assert_eq!(b, [0x0a, 0x0b, 0x0c]);
    put_unaligned_le24(0x0a0b0c, &mut b);
    assert_eq!(b, [0x0c, 0x0b, 0x0a]);
}
