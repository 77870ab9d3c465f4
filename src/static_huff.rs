//! Two-Pass Huffman Coding with a Canonical Code Table
//!
//! The first pass measures the symbol distribution; the header then carries
//! one (symbol, code length) pair per used symbol, and the second pass emits
//! codewords.  Because both sides rebuild the same canonical tree from the
//! lengths alone, no tree structure travels in the stream.
//!
//! An empty input compresses to an empty file: the dictionary size field
//! reserves zero for the full-alphabet case, so there is no way to write an
//! empty dictionary, and none is needed.

use std::io::{Cursor,Read,Write,Seek,SeekFrom,BufReader,BufWriter};
use std::collections::{BTreeMap,HashMap};
use crate::{DYNERR,Error,Options};
use crate::tools::bits::{BitWriter,BitReader};
use crate::tools::huffman_tree::HuffmanTree;
use crate::tools::symbol::*;

/// Main compression function.
/// `expanded_in` is an object with `Read` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is an object with `Write` and `Seek` traits, usually `std::fs::File`, or `std::io::Cursor<Vec<u8>>`.
/// Returns (in_size,out_size) or error.  Can panic if options are inconsistent.
pub fn compress<R,W>(expanded_in: &mut R, compressed_out: &mut W, opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read + Seek, W: Write + Seek {
    let width = opt.bytes_per_symbol;
    assert!(width >= 1 && width <= MAX_BYTES_PER_SYMBOL);
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let expanded_length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    if expanded_length == 0 {
        writer.flush()?;
        return Ok((0,0));
    }
    // first pass: measure the distribution
    let mut freq: HashMap<u64,u64> = HashMap::new();
    let mut dummy_symbol_bytes = 0u8;
    let mut buf = vec![0u8;width];
    while let Some(pad) = read_symbol(&mut reader,&mut buf)? {
        if pad > 0 {
            dummy_symbol_bytes = pad;
        }
        *freq.entry(bytes_to_symbol(&buf)).or_insert(0) += 1;
    }
    let lengths = HuffmanTree::code_lengths(&freq);
    let tree = HuffmanTree::from_code_lengths(&lengths)?;
    let total_bits: u64 = lengths.iter().map(|(symbol,len)| freq[symbol] * len).sum();
    let dummy_codeword_bits = ((8 - total_bits % 8) % 8) as u8;
    log::debug!("{} symbols over {} bits, {} dummy bits",freq.len(),total_bits,dummy_codeword_bits);
    // header
    writer.write_all(&[(width * BITS_PER_BYTE) as u8,dummy_symbol_bytes])?;
    let dict_size = match freq.len() as u128 == 1u128 << (width * BITS_PER_BYTE) {
        true => 0,
        false => freq.len() as u64
    };
    writer.write_all(&symbol_to_bytes(dict_size,width)?)?;
    for (&symbol,&len) in &lengths {
        writer.write_all(&symbol_to_bytes(symbol,width)?)?;
        writer.write_all(&symbol_to_bytes(len,width)?)?;
    }
    writer.write_all(&[dummy_codeword_bits])?;
    // second pass: emit the codewords
    reader.seek(SeekFrom::Start(0))?;
    let mut bw = BitWriter::new();
    let mut symbols: u64 = 0;
    while let Some(_pad) = read_symbol(&mut reader,&mut buf)? {
        match tree.code(bytes_to_symbol(&buf)) {
            Some(code) => {
                for bit in code.iter() {
                    bw.put_bit(bit);
                }
            },
            None => return Err(Box::new(Error::InvariantViolation))
        }
        symbols += 1;
        if symbols % 4096 == 0 {
            bw.drain(&mut writer)?;
        }
    }
    let trailing = bw.finish(&mut writer)?;
    if trailing != dummy_codeword_bits {
        return Err(Box::new(Error::InvariantViolation));
    }
    writer.flush()?;
    let out_size = writer.stream_position()?;
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
    if compressed_length == 0 {
        writer.flush()?;
        return Ok((0,0));
    }
    // header
    let mut two = [0u8;2];
    read_header(&mut reader,&mut two)?;
    let bits_per_symbol = two[0] as usize;
    let dummy_symbol_bytes = two[1] as usize;
    if bits_per_symbol == 0 || bits_per_symbol % BITS_PER_BYTE != 0
    || bits_per_symbol > MAX_BYTES_PER_SYMBOL * BITS_PER_BYTE {
        return Err(Box::new(Error::InvalidHeader));
    }
    let width = bits_per_symbol / BITS_PER_BYTE;
    if dummy_symbol_bytes >= width {
        return Err(Box::new(Error::InvalidHeader));
    }
    let mut wbuf = vec![0u8;width];
    read_header(&mut reader,&mut wbuf)?;
    let dict_size: u128 = match bytes_to_symbol(&wbuf) {
        0 => 1u128 << bits_per_symbol,
        n => n as u128
    };
    let mut lengths: BTreeMap<u64,u64> = BTreeMap::new();
    let mut entries: u128 = 0;
    while entries < dict_size {
        read_header(&mut reader,&mut wbuf)?;
        let symbol = bytes_to_symbol(&wbuf);
        read_header(&mut reader,&mut wbuf)?;
        let len = match bytes_to_symbol(&wbuf) {
            0 if bits_per_symbol >= 64 => return Err(Box::new(Error::InvalidHeader)),
            0 => 1u64 << bits_per_symbol,
            n => n
        };
        lengths.insert(symbol,len);
        entries += 1;
    }
    if lengths.len() as u128 != dict_size {
        return Err(Box::new(Error::InvalidHeader));
    }
    let mut one = [0u8;1];
    read_header(&mut reader,&mut one)?;
    let dummy_codeword_bits = one[0] as u64;
    if dummy_codeword_bits > 7 {
        return Err(Box::new(Error::InvalidHeader));
    }
    let mut tree = HuffmanTree::from_code_lengths(&lengths)?;
    // content
    let header_size = reader.stream_position()?;
    let content_bits = (compressed_length - header_size) * 8;
    if dummy_codeword_bits > content_bits {
        return Err(Box::new(Error::InvalidHeader));
    }
    let content_bits = content_bits - dummy_codeword_bits;
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
fn wide_options(bytes_per_symbol: usize) -> Options {
    Options {
        bytes_per_symbol,
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
    let test_data = "abracadabra".as_bytes();
    let huff_str = "08 00 05 61 01 62 03 63 04 64 04 72 02 01 69 CF 68";
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());

    let test_data = "mississippi river".as_bytes();
    let huff_str = "08 00 08 20 04 65 04 69 02 6D 04 70 03 72 03 73 02 76 04 02 E1 45 24 32 9F B4";
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
}

#[test]
fn single_symbol_alphabet() {
    let test_data = "aaa".as_bytes();
    let huff_str = "08 00 01 61 01 05 00";
    let compressed = compress_slice(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,test_data.to_vec());
}

#[test]
fn wide_symbols() {
    // 5 bytes at 2 bytes per symbol: one pad byte is recorded and stripped
    let test_data = "abcab".as_bytes();
    let huff_str = "10 01 00 03 61 62 00 02 62 00 00 02 63 61 00 01 03 98";
    let compressed = compress_slice(test_data,&wide_options(2)).expect("compression failed");
    assert_eq!(compressed,hex::decode(huff_str.replace(" ","")).unwrap());
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,test_data.to_vec());

    let test_data = "aabbccdd".as_bytes();
    let huff_str = "10 00 00 04 61 61 00 02 62 62 00 02 63 63 00 02 64 64 00 02 00 1B";
    let compressed = compress_slice(test_data,&wide_options(2)).expect("compression failed");
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
        let opt = wide_options(width);
        for len in [0,1,width-1,width,width+1,3*width] {
            let test_data = lcg_bytes(len,0x5ca1_ab1e);
            let compressed = compress_slice(&test_data,&opt).expect("compression failed");
            let expanded = expand_slice(&compressed).expect("expansion failed");
            assert_eq!(test_data,expanded,"width {} len {}",width,len);
        }
    }
}

#[test]
fn invertibility_bulk() {
    for width in [1,2,3,8] {
        let test_data = lcg_bytes(40_000 + width,0xfeed_f00d);
        let compressed = compress_slice(&test_data,&wide_options(width)).expect("compression failed");
        let expanded = expand_slice(&compressed).expect("expansion failed");
        assert_eq!(test_data,expanded,"width {}",width);
    }
}

#[test]
fn uniform_distribution_is_incompressible() {
    // all 256 byte values once: every code length is 8, so the payload
    // matches the input and the dictionary size field reads 0 for "full"
    let test_data: Vec<u8> = (0..=255).collect();
    let compressed = compress_slice(&test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed[2],0);
    assert_eq!(compressed.len(),2 + 1 + 512 + 1 + 256);
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn truncated_streams_are_rejected() {
    let compressed = compress_slice("abracadabra".as_bytes(),&STD_OPTIONS).expect("compression failed");
    assert!(expand_slice(&compressed[..compressed.len()-1]).is_err());
    assert!(expand_slice(&compressed[..4]).is_err());
    let mut bad = compressed.clone();
    bad[0] = 7; // not a multiple of 8
    assert!(expand_slice(&bad).is_err());
}
