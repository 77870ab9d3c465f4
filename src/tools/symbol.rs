//! Fixed-width symbols and their wire form.
//! A symbol is 1 to 8 input bytes interpreted as a big-endian integer.

use std::io::{Read,ErrorKind};
use crate::{DYNERR,Error};

pub const BITS_PER_BYTE: usize = 8;
pub const MAX_BYTES_PER_SYMBOL: usize = 8;
pub const BYTES_PER_MB: u64 = 1 << 20;

/// big-endian wire form of `symbol`, error if it does not fit in `width` bytes
pub fn symbol_to_bytes(symbol: u64, width: usize) -> Result<Vec<u8>,Error> {
    if width < MAX_BYTES_PER_SYMBOL && symbol >> (width * BITS_PER_BYTE) != 0 {
        return Err(Error::InvariantViolation);
    }
    Ok(symbol.to_be_bytes()[MAX_BYTES_PER_SYMBOL - width..].to_vec())
}

/// interpret up to 8 big-endian bytes as a symbol
pub fn bytes_to_symbol(buf: &[u8]) -> u64 {
    let mut ans: u64 = 0;
    for b in buf {
        ans = (ans << BITS_PER_BYTE) | *b as u64;
    }
    ans
}

/// Read one symbol worth of bytes, zero-padding a short tail.
/// Returns None at end of input, otherwise the count of padded bytes.
pub fn read_symbol<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<Option<u8>> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e)
        }
    }
    if got == 0 {
        return Ok(None);
    }
    for b in buf[got..].iter_mut() {
        *b = 0;
    }
    Ok(Some((buf.len() - got) as u8))
}

/// read exactly `buf.len()` header bytes, flagging a short file as a bad header
pub fn read_header<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(),DYNERR> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Box::new(Error::InvalidHeader)),
        Err(e) => Err(Box::new(e))
    }
}

#[test]
fn wire_form() {
    assert_eq!(symbol_to_bytes(0x61,1).unwrap(),vec![0x61]);
    assert_eq!(symbol_to_bytes(0x6162,2).unwrap(),vec![0x61,0x62]);
    assert_eq!(symbol_to_bytes(1,3).unwrap(),vec![0,0,1]);
    assert_eq!(symbol_to_bytes(u64::MAX,8).unwrap(),vec![0xff;8]);
    assert!(symbol_to_bytes(256,1).is_err());
    assert!(symbol_to_bytes(1<<16,2).is_err());
}

#[test]
fn wire_form_inverts() {
    for symbol in [0u64,1,0x61,0xffff,0x123456789abcdef0] {
        for width in 1..=8 {
            if width < 8 && symbol >> (width*8) != 0 {
                continue;
            }
            let bytes = symbol_to_bytes(symbol,width).unwrap();
            assert_eq!(bytes.len(),width);
            assert_eq!(bytes_to_symbol(&bytes),symbol);
        }
    }
}

#[test]
fn short_tail_is_padded() {
    let mut src = std::io::Cursor::new(vec![1u8,2,3,4,5]);
    let mut buf = [0u8;3];
    assert_eq!(read_symbol(&mut src,&mut buf).unwrap(),Some(0));
    assert_eq!(buf,[1,2,3]);
    assert_eq!(read_symbol(&mut src,&mut buf).unwrap(),Some(1));
    assert_eq!(buf,[4,5,0]);
    assert_eq!(read_symbol(&mut src,&mut buf).unwrap(),None);
}
