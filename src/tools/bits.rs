//! Bit-level packing on top of byte streams.
//! Codewords are packed MSB first, matching the `bit_vec` crate's byte order.

use bit_vec::BitVec;
use std::io::{Read,Write};

/// Accumulates codeword bits and hands completed bytes to a writer.
/// The final partial byte is right-padded by `finish`, which reports the
/// pad width for the header's dummy bit count.
pub struct BitWriter {
    bits: BitVec,
    written: u64
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            written: 0
        }
    }
    /// total bits pushed so far
    pub fn bit_count(&self) -> u64 {
        self.written
    }
    pub fn put_bit(&mut self, bit: bool) {
        self.bits.push(bit);
        self.written += 1;
    }
    /// push the low `num_bits` of `code` starting from the most significant
    pub fn put_code(&mut self, num_bits: usize, code: u64) {
        for i in (0..num_bits).rev() {
            self.bits.push(code >> i & 1 != 0);
        }
        self.written += num_bits as u64;
    }
    /// write out completed bytes, keeping the unaligned tail
    pub fn drain<W: Write>(&mut self, writer: &mut W) -> std::io::Result<()> {
        let whole = self.bits.len() / 8;
        if whole == 0 {
            return Ok(());
        }
        let bytes = self.bits.to_bytes();
        writer.write_all(&bytes[..whole])?;
        let cpy = self.bits.clone();
        self.bits = BitVec::new();
        for i in whole*8..cpy.len() {
            self.bits.push(cpy.get(i).unwrap());
        }
        Ok(())
    }
    /// write everything, zero-padding the last byte to a boundary,
    /// and return the number of padding bits
    pub fn finish<W: Write>(mut self, writer: &mut W) -> std::io::Result<u8> {
        let dummy = (8 - self.bits.len() % 8) % 8;
        for _i in 0..dummy {
            self.bits.push(false);
        }
        writer.write_all(&self.bits.to_bytes())?;
        Ok(dummy as u8)
    }
}

/// Unpacks a byte stream into bits, refilling one byte at a time.
pub struct BitReader {
    bits: BitVec,
    ptr: usize
}

impl BitReader {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            ptr: 0
        }
    }
    /// keep the bit vector small, we don't need the bits behind us
    fn drop_leading_bits(&mut self) {
        let cpy = self.bits.clone();
        self.bits = BitVec::new();
        for i in self.ptr..cpy.len() {
            self.bits.push(cpy.get(i).unwrap());
        }
        self.ptr = 0;
    }
    /// Get the next bit, reading from the stream as needed.
    /// Running off the end of the stream surfaces as `UnexpectedEof`.
    pub fn get_bit<R: Read>(&mut self, reader: &mut R) -> std::io::Result<u8> {
        match self.bits.get(self.ptr) {
            Some(bit) => {
                self.ptr += 1;
                Ok(bit as u8)
            },
            None => {
                let mut by: [u8;1] = [0];
                reader.read_exact(&mut by)?;
                if self.bits.len() > 512 {
                    self.drop_leading_bits();
                }
                self.bits.append(&mut BitVec::from_bytes(&by));
                self.get_bit(reader)
            }
        }
    }
}

#[test]
fn writer_packs_msb_first() {
    let mut bw = BitWriter::new();
    bw.put_code(8,0x61);
    bw.put_bit(true);
    bw.put_bit(false);
    bw.put_bit(true);
    assert_eq!(bw.bit_count(),11);
    let mut sink: Vec<u8> = Vec::new();
    let dummy = bw.finish(&mut sink).unwrap();
    assert_eq!(dummy,5);
    assert_eq!(sink,vec![0x61,0b1010_0000]);
}

#[test]
fn writer_drains_whole_bytes() {
    let mut bw = BitWriter::new();
    let mut sink: Vec<u8> = Vec::new();
    bw.put_code(12,0xabc);
    bw.drain(&mut sink).unwrap();
    assert_eq!(sink,vec![0xab]);
    bw.put_code(4,0xd);
    let dummy = bw.finish(&mut sink).unwrap();
    assert_eq!(dummy,0);
    assert_eq!(sink,vec![0xab,0xcd]);
}

#[test]
fn reader_inverts_writer() {
    let mut bw = BitWriter::new();
    for i in 0..64 {
        bw.put_bit(i % 3 == 0);
    }
    let mut sink: Vec<u8> = Vec::new();
    bw.finish(&mut sink).unwrap();
    let mut src = std::io::Cursor::new(sink);
    let mut br = BitReader::new();
    for i in 0..64 {
        assert_eq!(br.get_bit(&mut src).unwrap(),(i % 3 == 0) as u8);
    }
    assert!(br.get_bit(&mut src).is_err());
}
