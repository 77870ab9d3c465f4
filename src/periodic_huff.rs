//! One-Pass Huffman Coding with Periodic Rebuilds
//!
//! A middle road between the static and adaptive coders.  Both sides seed a
//! running count of one per alphabet symbol, so every symbol has a codeword
//! from the first bit, and rebuild the canonical tree from their counts every
//! 2^p symbols.  The counts evolve identically on both sides, so no code
//! table travels in the stream.  Until the first rebuild the uniform
//! canonical code is the identity map, and short inputs pass through
//! unchanged behind the 4 byte header.
//!
//! Seeding the whole alphabet is what keeps this coder one-pass, but it also
//! limits it to symbol widths of 1 or 2 bytes; wider alphabets belong to the
//! adaptive coder and its NYT escape.

use std::io::{Cursor,Read,Write,Seek,SeekFrom,BufReader,BufWriter};
use std::collections::HashMap;
use crate::{DYNERR,Error,Options};
use crate::tools::bits::{BitWriter,BitReader};
use crate::tools::huffman_tree::HuffmanTree;
use crate::tools::symbol::*;

const HEADER_SIZE: u64 = 4;

/// running symbol counts, seeded to one so every codeword exists up front
fn uniform_counts(bits_per_symbol: usize) -> HashMap<u64,u64> {
    (0..1u64 << bits_per_symbol).map(|symbol| (symbol,1)).collect()
}

fn rebuild(counts: &HashMap<u64,u64>) -> Result<HuffmanTree,Error> {
    HuffmanTree::from_code_lengths(&HuffmanTree::code_lengths(counts))
}

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.  Can panic if options are inconsistent.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let width = opt.bytes_per_symbol;
    assert!(width >= 1 && width <= 2,"periodic coding is limited to 1 or 2 byte symbols");
    assert!(opt.period_exponent >= 10 && opt.period_exponent <= 20,"period exponent must lie in 10..=20");
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let expanded_length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    // provisional header, the dummy counts are patched once they are known
    writer.write_all(&[
        opt.period_exponent as u8,
        (width * BITS_PER_BYTE) as u8,
        0,
        0
    ])?;
    let period = 1u64 << opt.period_exponent;
    let mut counts = uniform_counts(width * BITS_PER_BYTE);
    let mut tree = rebuild(&counts)?;
    let mut bw = BitWriter::new();
    let mut buf = vec![0u8;width];
    let mut dummy_symbol_bytes = 0u8;
    let mut symbols: u64 = 0;
    while let Some(pad) = read_symbol(&mut reader,&mut buf)? {
        if pad > 0 {
            dummy_symbol_bytes = pad;
        }
        let symbol = bytes_to_symbol(&buf);
        match tree.code(symbol) {
            Some(code) => {
                for bit in code.iter() {
                    bw.put_bit(bit);
                }
            },
            None => return Err(Box::new(Error::InvariantViolation))
        }
        *counts.entry(symbol).or_insert(0) += 1;
        symbols += 1;
        if symbols % period == 0 {
            tree = rebuild(&counts)?;
            log::debug!("tree rebuilt after {} symbols, {:.3} bits per symbol",
                symbols,bw.bit_count() as f64 / symbols as f64);
        }
        if symbols % 4096 == 0 {
            bw.drain(&mut writer)?;
        }
    }
    let dummy_codeword_bits = bw.finish(&mut writer)?;
    writer.flush()?;
    let out_size = writer.stream_position()?;
    // patch the dummy counts
    writer.seek(SeekFrom::Start(2))?;
    writer.write_all(&[dummy_symbol_bytes,dummy_codeword_bits])?;
    writer.flush()?;
    writer.seek(SeekFrom::End(0))?;
    Ok((expanded_length,out_size))
}

/// Main decompression function.
/// `compressed_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `expanded_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R, expanded_out: &mut W) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);
    let compressed_length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    let mut header = [0u8;HEADER_SIZE as usize];
    read_header(&mut reader,&mut header)?;
    let period_exponent = header[0] as usize;
    let bits_per_symbol = header[1] as usize;
    let dummy_symbol_bytes = header[2] as usize;
    let dummy_codeword_bits = header[3] as u64;
    if period_exponent < 10 || period_exponent > 20 {
        return Err(Box::new(Error::InvalidHeader));
    }
    if bits_per_symbol != BITS_PER_BYTE && bits_per_symbol != 2 * BITS_PER_BYTE {
        return Err(Box::new(Error::InvalidHeader));
    }
    let width = bits_per_symbol / BITS_PER_BYTE;
    if dummy_codeword_bits > 7 || dummy_symbol_bytes >= width {
        return Err(Box::new(Error::InvalidHeader));
    }
    let content_bits = (compressed_length - HEADER_SIZE) * 8;
    if dummy_codeword_bits > content_bits {
        return Err(Box::new(Error::InvalidHeader));
    }
    let content_bits = content_bits - dummy_codeword_bits;
    let period = 1u64 << period_exponent;
    let mut counts = uniform_counts(bits_per_symbol);
    let mut tree = rebuild(&counts)?;
    let mut br = BitReader::new();
    // hold one symbol back so the trailing pad bytes can be withheld
    let mut pending: Option<u64> = None;
    let mut out_size: u64 = 0;
    let mut symbols: u64 = 0;
    for _i in 0..content_bits {
        let bit = br.get_bit(&mut reader)? != 0;
        if let Some(symbol) = tree.decode_bit(bit)? {
            if let Some(prev) = pending.replace(symbol) {
                writer.write_all(&symbol_to_bytes(prev,width)?)?;
                out_size += width as u64;
            }
            *counts.entry(symbol).or_insert(0) += 1;
            symbols += 1;
            if symbols % period == 0 {
                tree = rebuild(&counts)?;
            }
        }
    }
    if !tree.at_root() {
        return Err(Box::new(Error::MalformedStream));
    }
    if let Some(last) = pending {
        let bytes = symbol_to_bytes(last,width)?;
        writer.write_all(&bytes[..width - dummy_symbol_bytes])?;
        out_size += (width - dummy_symbol_bytes) as u64;
    }
    writer.flush()?;
    Ok((compressed_length,out_size))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8]) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************

#[cfg(test)]
use crate::STD_OPTIONS;

#[cfg(test)]
fn periodic_options(bytes_per_symbol: usize, period_exponent: usize) -> Options {
    Options {
        bytes_per_symbol,
        period_exponent,
        ..STD_OPTIONS
    }
}

#[cfg(test)]
fn skewed_bytes(count: usize, seed: u64) -> Vec<u8> {
    let alphabet = b"aabbbcdde ";
    let mut state = seed;
    (0..count).map(|_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        alphabet[(state >> 56) as usize % alphabet.len()]
    }).collect()
}

#[test]
fn identity_before_first_rebuild() {
    // the uniform canonical code maps every byte to itself
    let test_data = "abracadabra".as_bytes();
    let huff_str = "0A 08 00 00 61 62 72 61 63 61 64 61 62 72 61";
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,test_data.to_vec());
}

#[test]
fn rebuilds_shorten_skewed_input() {
    let test_data = skewed_bytes(3000,0xbeef_cafe);
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    // two rebuild boundaries crossed, the tail is coded in a few bits each
    assert!(compressed.len() < test_data.len());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn invertibility_edge_sizes() {
    for width in 1..=2 {
        let opt = periodic_options(width,10);
        for len in [0,1,width-1,width,width+1,3*width] {
            let test_data = skewed_bytes(len,0x5ca1_ab1e);
            let compressed = compress_slice(&test_data,&opt).expect("compression failed");
            let expanded = expand_slice(&compressed).expect("expansion failed");
            assert_eq!(test_data,expanded,"width {} len {}",width,len);
        }
    }
    assert_eq!(compress_slice(&[],&STD_OPTIONS).unwrap().len(),HEADER_SIZE as usize);
}

#[test]
fn invertibility_wide() {
    // odd length at width 2 exercises the pad byte across rebuilds
    let test_data = skewed_bytes(2049,0x0123_4567);
    let compressed = compress_slice(&test_data,&periodic_options(2,10)).expect("compression failed");
    assert_eq!(compressed[2],1);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn longer_period_is_honored() {
    let test_data = skewed_bytes(5000,0x89ab_cdef);
    let compressed = compress_slice(&test_data,&periodic_options(1,12)).expect("compression failed");
    assert_eq!(compressed[0],12);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn bad_headers_are_rejected() {
    let compressed = compress_slice("abc".as_bytes(),&STD_OPTIONS).expect("compression failed");
    let mut bad = compressed.clone();
    bad[0] = 3; // period exponent out of range
    assert!(expand_slice(&bad).is_err());
    bad[0] = 10;
    bad[1] = 24; // too wide for a seeded alphabet
    assert!(expand_slice(&bad).is_err());
    assert!(expand_slice(&compressed[..2]).is_err());
}
