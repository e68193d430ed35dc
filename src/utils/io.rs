// Byte-level helpers shared by every container codec

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::error::{Result, TagError};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

fn bytes_at<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    let end = offset.checked_add(N).ok_or(TagError::ShortRead {
        needed: N,
        available: 0,
    })?;
    match buf.get(offset..end) {
        Some(slice) => {
            let mut out = [0u8; N];
            out.copy_from_slice(slice);
            Ok(out)
        }
        None => Err(TagError::ShortRead {
            needed: N,
            available: buf.len().saturating_sub(offset),
        }),
    }
}

/// Read big-endian 24-bit integer at `offset`
pub fn read_u24_be(buf: &[u8], offset: usize) -> Result<u32> {
    let b: [u8; 3] = bytes_at(buf, offset)?;
    Ok((u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]))
}

/// Read big-endian 32-bit integer at `offset`
pub fn read_u32_be(buf: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_be_bytes(bytes_at(buf, offset)?))
}

/// Read little-endian 32-bit integer at `offset`
pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_le_bytes(bytes_at(buf, offset)?))
}

/// Read synchsafe 32-bit integer (7 bits per byte) at `offset`
pub fn read_synchsafe_u32(buf: &[u8], offset: usize) -> Result<u32> {
    let b: [u8; 4] = bytes_at(buf, offset)?;
    Ok(decode_synchsafe(b))
}

pub fn decode_synchsafe(b: [u8; 4]) -> u32 {
    (u32::from(b[0] & 0x7F) << 21)
        | (u32::from(b[1] & 0x7F) << 14)
        | (u32::from(b[2] & 0x7F) << 7)
        | u32::from(b[3] & 0x7F)
}

/// Pack a 28-bit value into four bytes with the top bit of each byte clear
pub fn encode_synchsafe(value: u32) -> Result<[u8; 4]> {
    if value > 0x0FFF_FFFF {
        return Err(TagError::UnsupportedFeature(format!(
            "{value} does not fit in a synchsafe integer"
        )));
    }
    Ok([
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ])
}

pub fn write_u24_be(value: u32, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_be_bytes()[1..]);
}

pub fn write_u32_be(value: u32, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn write_u32_le(value: u32, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Fill `buf` completely, reporting a short read instead of a bare EOF
pub fn read_exact_or_short<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(TagError::ShortRead {
                    needed: buf.len(),
                    available: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Copy exactly `len` bytes from `reader` to `writer` through a fixed buffer
pub fn copy_bytes<R: Read, W: Write>(reader: &mut R, writer: &mut W, len: u64) -> Result<u64> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut remaining = len;

    while remaining > 0 {
        let chunk = remaining.min(COPY_BUFFER_SIZE as u64) as usize;
        let read = match reader.read(&mut buffer[..chunk]) {
            Ok(0) => {
                return Err(TagError::ShortRead {
                    needed: len as usize,
                    available: (len - remaining) as usize,
                })
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        match writer.write_all(&buffer[..read]) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::WriteZero => {
                return Err(TagError::ShortWrite {
                    expected: len,
                    written: len - remaining,
                })
            }
            Err(e) => return Err(e.into()),
        }
        remaining -= read as u64;
    }

    Ok(len)
}

/// Check whether the whole stream consists of zero bytes; an empty stream is not
pub fn is_zero_filled<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    let pos = reader.stream_position()?;
    reader.seek(SeekFrom::Start(0))?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut seen_any = false;
    let result = loop {
        let read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if read == 0 {
            break seen_any;
        }
        seen_any = true;
        if buffer[..read].iter().any(|&b| b != 0) {
            break false;
        }
    };

    reader.seek(SeekFrom::Start(pos))?;
    Ok(result)
}

/// Bounds-checked cursor over a byte slice
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceReader { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(TagError::ShortRead {
                needed: len,
                available: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        let v = read_u32_be(self.data, self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let v = read_u32_le(self.data, self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    /// Bytes up to (not including) the next NUL; the NUL is consumed
    pub fn read_until_nul(&mut self) -> Result<&'a [u8]> {
        let rest = self.rest();
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.pos += end + 1;
                Ok(&rest[..end])
            }
            None => Err(TagError::corrupt("missing string terminator")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_endian_reads() {
        let buf = [0x00, 0x00, 0x01, 0x02, 0xFF];
        assert_eq!(read_u32_be(&buf, 0).unwrap(), 0x0102);
        assert_eq!(read_u32_le(&buf, 1).unwrap(), 0xFF02_0100);
        assert_eq!(read_u24_be(&buf, 2).unwrap(), 0x0102FF);
    }

    #[test]
    fn test_short_read_is_reported() {
        let buf = [1u8, 2, 3];
        match read_u32_be(&buf, 0) {
            Err(TagError::ShortRead { needed, available }) => {
                assert_eq!(needed, 4);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(read_u32_le(&buf, usize::MAX - 1).is_err());
    }

    #[test]
    fn test_writes() {
        let mut buf = Vec::new();
        write_u32_be(0x0102_0304, &mut buf);
        write_u32_le(0x0102_0304, &mut buf);
        write_u24_be(0x00AB_CDEF, &mut buf);
        assert_eq!(buf, [1, 2, 3, 4, 4, 3, 2, 1, 0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_synchsafe() {
        assert_eq!(encode_synchsafe(257).unwrap(), [0, 0, 2, 1]);
        assert_eq!(decode_synchsafe([0, 0, 2, 1]), 257);
        assert_eq!(decode_synchsafe(encode_synchsafe(0x0FFF_FFFF).unwrap()), 0x0FFF_FFFF);
        assert!(encode_synchsafe(0x1000_0000).is_err());
    }

    #[test]
    fn test_copy_bytes() {
        let data: Vec<u8> = (0..200_000u32).map(|i| i as u8).collect();
        let mut out = Vec::new();
        copy_bytes(&mut Cursor::new(&data), &mut out, 150_000).unwrap();
        assert_eq!(out, &data[..150_000]);

        let mut out = Vec::new();
        let err = copy_bytes(&mut Cursor::new(&data[..10]), &mut out, 11).unwrap_err();
        assert!(matches!(err, TagError::ShortRead { available: 10, .. }));
    }

    #[test]
    fn test_zero_filled() {
        assert!(is_zero_filled(&mut Cursor::new(vec![0u8; 100_000])).unwrap());
        let mut data = vec![0u8; 100_000];
        data[99_999] = 1;
        assert!(!is_zero_filled(&mut Cursor::new(data)).unwrap());
        assert!(!is_zero_filled(&mut Cursor::new(Vec::new())).unwrap());
    }

    #[test]
    fn test_slice_reader() {
        let mut r = SliceReader::new(b"abc\0\x00\x00\x00\x05rest");
        assert_eq!(r.read_until_nul().unwrap(), b"abc");
        assert_eq!(r.read_u32_be().unwrap(), 5);
        assert_eq!(r.rest(), b"rest");
        assert!(r.take(5).is_err());
        assert_eq!(r.take(4).unwrap(), b"rest");
        assert_eq!(r.remaining(), 0);
    }
}
