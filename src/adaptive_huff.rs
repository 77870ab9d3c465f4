//! One-Pass Huffman Coding with a Self-Adjusting Tree
//!
//! Encoder and decoder run the same FGK tree (see `tools::adaptive_tree`), so
//! the stream carries only a 5 byte header ahead of the codewords.  A symbol's
//! first appearance is escaped through the NYT leaf and transmitted raw; after
//! that its codeword tracks the evolving distribution.  With a nonzero chunk
//! size the tree periodically shrinks its weights, biasing the code toward
//! recent input.

use std::io::{Cursor,Read,Write,Seek,SeekFrom,BufReader,BufWriter};
use crate::{DYNERR,Error,Options};
use crate::tools::bits::{BitWriter,BitReader};
use crate::tools::adaptive_tree::AdaptiveTree;
use crate::tools::symbol::*;

const HEADER_SIZE: u64 = 5;

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.  Can panic if options are inconsistent.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let width = opt.bytes_per_symbol;
    assert!(width >= 1 && width <= MAX_BYTES_PER_SYMBOL);
    assert!(opt.chunk_size < 256,"chunk size must fit in one byte");
    assert!(opt.shrink_factor > 1 && opt.shrink_factor < 256,"shrink factor must fit in one byte");
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let expanded_length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    // provisional header, the dummy counts are patched once they are known
    writer.write_all(&[
        (width * BITS_PER_BYTE) as u8,
        0,
        0,
        opt.chunk_size as u8,
        opt.shrink_factor as u8
    ])?;
    let mut tree = AdaptiveTree::create(width,opt.chunk_size,opt.shrink_factor);
    let mut bw = BitWriter::new();
    let mut buf = vec![0u8;width];
    let mut dummy_symbol_bytes = 0u8;
    let mut symbols: u64 = 0;
    let mut next_report = BYTES_PER_MB;
    while let Some(pad) = read_symbol(&mut reader,&mut buf)? {
        if pad > 0 {
            dummy_symbol_bytes = pad;
        }
        tree.encode_symbol(bytes_to_symbol(&buf),&mut bw)?;
        symbols += 1;
        if symbols % 4096 == 0 {
            bw.drain(&mut writer)?;
        }
        let processed = symbols * width as u64;
        if processed >= next_report {
            log::info!("{} MB compressed, {:.3} bits per symbol",
                processed / BYTES_PER_MB,bw.bit_count() as f64 / symbols as f64);
            next_report += BYTES_PER_MB;
        }
    }
    let bits_written = bw.bit_count();
    let dummy_codeword_bits = bw.finish(&mut writer)?;
    writer.flush()?;
    let out_size = writer.stream_position()?;
    // patch the dummy counts
    writer.seek(SeekFrom::Start(1))?;
    writer.write_all(&[dummy_codeword_bits,dummy_symbol_bytes])?;
    writer.flush()?;
    writer.seek(SeekFrom::End(0))?;
    log::debug!("{} symbols to {} bits, {} shrinks",symbols,bits_written,tree.shrink_count());
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
    let bits_per_symbol = header[0] as usize;
    let dummy_codeword_bits = header[1] as u64;
    let dummy_symbol_bytes = header[2] as usize;
    let chunk_size = header[3] as usize;
    let shrink_factor = header[4] as usize;
    if bits_per_symbol == 0 || bits_per_symbol % BITS_PER_BYTE != 0
    || bits_per_symbol > MAX_BYTES_PER_SYMBOL * BITS_PER_BYTE {
        return Err(Box::new(Error::InvalidHeader));
    }
    let width = bits_per_symbol / BITS_PER_BYTE;
    if dummy_codeword_bits > 7 || dummy_symbol_bytes >= width {
        return Err(Box::new(Error::InvalidHeader));
    }
    if chunk_size > 0 && shrink_factor < 2 {
        return Err(Box::new(Error::InvalidHeader));
    }
    let content_bits = (compressed_length - HEADER_SIZE) * 8;
    if dummy_codeword_bits > content_bits {
        return Err(Box::new(Error::InvalidHeader));
    }
    let content_bits = content_bits - dummy_codeword_bits;
    let mut tree = AdaptiveTree::create(width,chunk_size,shrink_factor);
    let mut br = BitReader::new();
    // hold one symbol back so the trailing pad bytes can be withheld
    let mut pending: Option<u64> = None;
    let mut out_size: u64 = 0;
    for _i in 0..content_bits {
        let bit = br.get_bit(&mut reader)? != 0;
        if let Some(symbol) = tree.decode_bit(bit)? {
            if let Some(prev) = pending.replace(symbol) {
                writer.write_all(&symbol_to_bytes(prev,width)?)?;
                out_size += width as u64;
            }
        }
    }
    if !tree.at_symbol_boundary() {
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
fn shrink_options(bytes_per_symbol: usize, chunk_size: usize, shrink_factor: usize) -> Options {
    Options {
        bytes_per_symbol,
        chunk_size,
        shrink_factor,
        ..STD_OPTIONS
    }
}

#[cfg(test)]
fn lcg_bytes(count: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..count).map(|_| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 56) as u8
    }).collect()
}

#[test]
fn compression_works() {
    let test_data = "abcd".as_bytes();
    let huff_str = "08 02 00 00 02 61 31 0C 71 90";
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());

    let test_data = "abracadabra".as_bytes();
    let huff_str = "08 04 00 00 02 61 31 0E 48 C6 C6 46 C0";
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());

    let test_data = "mississippi river".as_bytes();
    let huff_str = "08 02 00 00 02 6D 34 8E 77 10 E1 3C 10 41 CB 63 B2 19 54";
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
}

#[test]
fn single_zero_byte() {
    // the first symbol rides the NYT escape at the root: just its raw bits
    let compressed = compress_slice(&[0u8],&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode("080000000200").unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,vec![0u8]);
}

#[test]
fn repeated_symbols_shorten() {
    let test_data = "aaaa".as_bytes();
    let huff_str = "08 05 00 00 02 61 E0";
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());

    // two symbols settle into 1- and 2-bit codewords
    let test_data: Vec<u8> = "ab".repeat(1000).into_bytes();
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed.len(),382);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,test_data);

    let test_data = "ab".repeat(8).into_bytes();
    let huff_str = "08 02 00 00 02 61 31 5B 6D B4";
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
}

#[test]
fn wide_symbols() {
    // 5 bytes at 2 bytes per symbol: one pad byte is recorded and stripped
    let test_data = "abcab".as_bytes();
    let huff_str = "10 05 01 00 02 61 62 31 B0 8C 40 00";
    let compressed = compress_slice(test_data,&shrink_options(2,0,2)).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
    assert_eq!(compressed[2],1);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,test_data.to_vec());

    let test_data = "banana band".as_bytes();
    let huff_str = "10 04 01 00 02 62 61 37 30 A1 03 10 61 6E C6 40 00";
    let compressed = compress_slice(test_data,&shrink_options(2,0,2)).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn invertibility_edge_sizes() {
    for width in 1..=4 {
        let opt = shrink_options(width,0,2);
        for len in [0,1,width-1,width,width+1,3*width] {
            let test_data = lcg_bytes(len,0x5ca1_ab1e);
            let compressed = compress_slice(&test_data,&opt).expect("compression failed");
            let expanded = expand_slice(&compressed).expect("expansion failed");
            assert_eq!(test_data,expanded,"width {} len {}",width,len);
        }
    }
    // an empty input is just the header
    assert_eq!(compress_slice(&[],&STD_OPTIONS).unwrap().len(),HEADER_SIZE as usize);
}

#[test]
fn invertibility_bulk() {
    for width in [1,2,3,8] {
        let test_data = lcg_bytes(40_000 + width,0xfeed_f00d);
        let compressed = compress_slice(&test_data,&shrink_options(width,0,2)).expect("compression failed");
        let expanded = expand_slice(&compressed).expect("expansion failed");
        assert_eq!(test_data,expanded,"width {}",width);
    }
}

#[test]
fn shrink_safety() {
    // long enough to cross the 1 MB chunk boundary and shrink once
    let test_data = lcg_bytes(1_200_000,0x0dd_ba11);
    let compressed = compress_slice(&test_data,&shrink_options(1,1,2)).expect("compression failed");
    assert_eq!(compressed[3],1);
    assert_eq!(compressed[4],2);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);

    // drifting distribution with a harsher factor
    let mut test_data = vec![b'x';700_000];
    test_data.extend(lcg_bytes(700_000,0x7ea_c0de));
    let compressed = compress_slice(&test_data,&shrink_options(1,1,3)).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn truncated_streams_are_rejected() {
    let compressed = compress_slice("abcd".as_bytes(),&STD_OPTIONS).expect("compression failed");
    assert!(expand_slice(&compressed[..compressed.len()-1]).is_err());
    assert!(expand_slice(&compressed[..3]).is_err());
    let mut bad = compressed.clone();
    bad[0] = 12; // not a multiple of 8
    assert!(expand_slice(&bad).is_err());
    bad[0] = 0;
    assert!(expand_slice(&bad).is_err());
}
