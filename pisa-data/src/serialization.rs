use std::io::{self, Read, Result, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Serialize a layout type to a byte stream.
///
/// The wire format is type-specific and documented on each implementor.
/// All multi-byte integers are written in little-endian order.
pub trait WriterTo {
    /// Writes the complete serialized representation to `writer`.
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()>;

    /// Exact size in bytes of the serialized representation.
    fn wire_bytes(&self) -> u64 {
        let mut counter = CountingWriter::default();
        self.write_to(&mut counter).expect("counting writer never fails");
        counter.written
    }
}

/// Deserialize a layout type from a byte stream, overwriting `self`.
pub trait ReaderFrom {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()>;
}

#[derive(Default)]
struct CountingWriter {
    written: u64,
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    debug_assert!(bytes.len() <= u16::MAX as usize);
    writer.write_u16::<LittleEndian>(bytes.len() as u16)?;
    writer.write_all(bytes)
}

pub(crate) fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u16::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub(crate) fn write_u32_slice<W: Write>(writer: &mut W, values: &[u32]) -> Result<()> {
    writer.write_u32::<LittleEndian>(values.len() as u32)?;
    for &v in values {
        writer.write_u32::<LittleEndian>(v)?;
    }
    Ok(())
}

pub(crate) fn read_u32_vec<R: Read>(reader: &mut R) -> Result<Vec<u32>> {
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(reader.read_u32::<LittleEndian>()?);
    }
    Ok(values)
}
