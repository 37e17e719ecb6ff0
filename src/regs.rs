// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! JPU and VEU register maps.

use crate::mmio::RegisterFile;
use bitflags::bitflags;

// JPU core
pub const JCMOD: usize = 0x00;
pub const JCCMD: usize = 0x04;
pub const JCQTN: usize = 0x0c;
pub const JCHTN: usize = 0x10;
pub const JCDRIU: usize = 0x14;
pub const JCDRID: usize = 0x18;
pub const JCVSZU: usize = 0x1c;
pub const JCVSZD: usize = 0x20;
pub const JCHSZU: usize = 0x24;
pub const JCHSZD: usize = 0x28;
pub const JCDTCU: usize = 0x2c;
pub const JCDTCM: usize = 0x30;
pub const JCDTCD: usize = 0x34;
pub const JINTE: usize = 0x38;
pub const JINTS: usize = 0x3c;
pub const JCDERR: usize = 0x40;

// JPU interface
pub const JIFCNT: usize = 0x60;
pub const JIFECNT: usize = 0x70;
pub const JIFESYA1: usize = 0x74;
pub const JIFESCA1: usize = 0x78;
pub const JIFESYA2: usize = 0x7c;
pub const JIFESCA2: usize = 0x80;
pub const JIFESMW: usize = 0x84;
pub const JIFESVSZ: usize = 0x88;
pub const JIFESHSZ: usize = 0x8c;
pub const JIFEDA1: usize = 0x90;
pub const JIFEDA2: usize = 0x94;
pub const JIFEDRSZ: usize = 0x98;
pub const JIFDCNT: usize = 0xa0;
pub const JIFDSA1: usize = 0xa4;
pub const JIFDSA2: usize = 0xa8;
pub const JIFDDRSZ: usize = 0xac;
pub const JIFDDMW: usize = 0xb0;
pub const JIFDDVSZ: usize = 0xb4;
pub const JIFDDHSZ: usize = 0xb8;
pub const JIFDDYA1: usize = 0xbc;
pub const JIFDDCA1: usize = 0xc0;

// JPU tables
pub const JCQTBL0: usize = 0x10000;
pub const JCQTBL1: usize = 0x10040;
pub const JCHTBD0: usize = 0x10100;
pub const JCHTBA0: usize = 0x10120;
pub const JCHTBD1: usize = 0x10200;
pub const JCHTBA1: usize = 0x10220;

/// Size of the JPU register window including the tables.
pub const JPU_REGS_SIZE: usize = 0x10400;

pub const JCMOD_INPUT_CTRL: u32 = 0x0000_0080;
pub const JCMOD_DSP_ENCODE: u32 = 0x0000_0000;
pub const JCMOD_DSP_DECODE: u32 = 0x0000_0008;
pub const JCMOD_SAMPLING_MASK: u32 = 0x0000_0007;
pub const JCMOD_SAMPLING_422: u32 = 1;
pub const JCMOD_SAMPLING_420: u32 = 2;

pub const JCCMD_START: u32 = 0x0000_0001;
pub const JCCMD_RESTART: u32 = 0x0000_0002;
pub const JCCMD_END: u32 = 0x0000_0004;
pub const JCCMD_READ_RESTART: u32 = 0x0000_0010;
pub const JCCMD_WRITE_RESTART: u32 = 0x0000_0020;
pub const JCCMD_RESET: u32 = 0x0000_0080;
pub const JCCMD_LCMD1: u32 = 0x0000_0100;
pub const JCCMD_LCMD2: u32 = 0x0000_0200;

pub const JIFCNT_VJSEL_JPU: u32 = 0x0000_0002;

pub const JIFECNT_420: u32 = 0x0000_0001;
pub const JIFECNT_LINEBUF_MODE: u32 = 0x0000_0002;
pub const JIFECNT_RELOAD_ENABLE: u32 = 0x0000_0008;
pub const JIFECNT_SWAP_4321: u32 = 0x0000_0070;
pub const JIFECNT_LINES_SHIFT: u32 = 16;

pub const JIFDCNT_SWAP_4321: u32 = 0x0000_0007;
pub const JIFDCNT_RELOAD_ENABLE: u32 = 0x0000_0008;

bitflags! {
    /// JINTS / JINTE interrupt sources.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Interrupts: u32 {
        /// Decode: the stream header has been parsed.
        const HEADER = 1 << 3;
        const ERROR = 1 << 5;
        /// Decode: the whole image has been written.
        const DONE = 1 << 6;
        /// Encode: the last coded byte has been written.
        const TRANSFER_DONE = 1 << 10;
        /// Line buffer 1 has been consumed.
        const LINEBUF0 = 1 << 11;
        /// Line buffer 2 has been consumed.
        const LINEBUF1 = 1 << 12;
        /// Encode: a reload segment is full.
        const LOADED = 1 << 13;
        /// Decode: a reload segment has been drained.
        const RELOAD = 1 << 14;
    }
}

// VEU
pub const VESTR: usize = 0x00;
pub const VESWR: usize = 0x10;
pub const VESSR: usize = 0x14;
pub const VSAYR: usize = 0x18;
pub const VSACR: usize = 0x1c;
pub const VEDWR: usize = 0x30;
pub const VDAYR: usize = 0x34;
pub const VDACR: usize = 0x38;
pub const VTRCR: usize = 0x50;
pub const VRFCR: usize = 0x54;
pub const VRFSR: usize = 0x58;
pub const VSWPR: usize = 0x94;
pub const VEIER: usize = 0xa0;
pub const VEVTR: usize = 0xa4;

pub const VESTR_START: u32 = 0x0000_0001;
pub const VEIER_END: u32 = 0x0000_0001;
pub const VSWPR_DEFAULT: u32 = 0x0000_0067;

pub const VTRCR_SRC_YCBCR420: u32 = 0x0000_0100;
pub const VTRCR_SRC_YCBCR422: u32 = 0x0000_0200;
pub const VTRCR_SRC_RGB565: u32 = 0x0000_0c00;
pub const VTRCR_SRC_RGB888: u32 = 0x0000_0d00;
pub const VTRCR_SRC_RGBX888: u32 = 0x0000_0e00;
pub const VTRCR_DST_YCBCR422: u32 = 0x0000_0002;
pub const VTRCR_RGB_TO_YCBCR: u32 = 0x0000_4000;

/// Quantization tables, natural order (ITU T.81 Annex K).
pub const QUANT_LUMA: [u8; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, 12, 12, 14, 19, 26, 58, 60, 55, 14, 13, 16, 24, 40, 57, 69,
    56, 14, 17, 22, 29, 51, 87, 80, 62, 18, 22, 37, 56, 68, 109, 103, 77, 24, 35, 55, 64, 81, 104,
    113, 92, 49, 64, 78, 87, 103, 121, 120, 101, 72, 92, 95, 98, 112, 100, 103, 99,
];

pub const QUANT_CHROMA: [u8; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99, 18, 21, 26, 66, 99, 99, 99, 99, 24, 26, 56, 99, 99, 99, 99,
    99, 47, 66, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
];

/// Huffman table: code counts per length followed by the symbol values.
pub struct Huffman {
    pub bits: [u8; 16],
    pub values: &'static [u8],
}

pub const DC_LUMA: Huffman = Huffman {
    bits: [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0],
    values: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
};

pub const DC_CHROMA: Huffman = Huffman {
    bits: [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0],
    values: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
};

pub const AC_LUMA: Huffman = Huffman {
    bits: [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d],
    values: &[
        0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
        0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52,
        0xd1, 0xf0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25,
        0x26, 0x27, 0x28, 0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45,
        0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64,
        0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83,
        0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
        0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
        0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3,
        0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8,
        0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
    ],
};

pub const AC_CHROMA: Huffman = Huffman {
    bits: [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77],
    values: &[
        0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61,
        0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33,
        0x52, 0xf0, 0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18,
        0x19, 0x1a, 0x26, 0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44,
        0x45, 0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63,
        0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a,
        0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97,
        0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
        0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca,
        0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7,
        0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
    ],
};

/// Writes `bytes` to consecutive registers, four bytes per word, MSB first.
pub fn write_table(regs: &dyn RegisterFile, offset: usize, bytes: impl IntoIterator<Item = u8>) {
    let mut word = 0u32;
    let mut n = 0usize;
    for b in bytes {
        word = (word << 8) | b as u32;
        n += 1;
        if n % 4 == 0 {
            regs.write32(offset + n - 4, word);
            word = 0;
        }
    }
    if n % 4 != 0 {
        let pad = 4 - n % 4;
        regs.write32(offset + n - n % 4, word << (8 * pad));
    }
}

fn write_huffman(regs: &dyn RegisterFile, offset: usize, table: &Huffman) {
    write_table(
        regs,
        offset,
        table.bits.iter().chain(table.values).copied(),
    );
}

pub fn init_quantization_tables(regs: &dyn RegisterFile) {
    write_table(regs, JCQTBL0, QUANT_LUMA);
    write_table(regs, JCQTBL1, QUANT_CHROMA);
}

pub fn init_huffman_tables(regs: &dyn RegisterFile) {
    write_huffman(regs, JCHTBD0, &DC_LUMA);
    write_huffman(regs, JCHTBA0, &AC_LUMA);
    write_huffman(regs, JCHTBD1, &DC_CHROMA);
    write_huffman(regs, JCHTBA1, &AC_CHROMA);
}

/// Byte count written so far by the encoder (24 bits over three registers).
pub fn coded_data_amount(regs: &dyn RegisterFile) -> usize {
    (((regs.read32(JCDTCU) & 0xff) << 16)
        | ((regs.read32(JCDTCM) & 0xff) << 8)
        | (regs.read32(JCDTCD) & 0xff)) as usize
}
