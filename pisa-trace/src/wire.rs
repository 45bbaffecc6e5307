use std::collections::BTreeMap;
use std::collections::HashSet;
use std::io::{self, Read, Result as IoResult, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use pisa_data::context::Scheme;
use pisa_data::{ReaderFrom, WriterTo};

const TRACE_MAGIC: &[u8; 4] = b"PTRC";
const TRACE_VERSION: u16 = 1;

/// One operand reference of a wire-level instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arg {
    pub symbol_name: String,
    pub num_rns: u32,
    pub order: u32,
}

/// A typed scalar parameter attached to an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    U32(u32),
    U64(u64),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
}

impl ParamValue {
    /// Text form of the value, used wherever the consumer parses it back.
    pub fn as_text(&self) -> String {
        match self {
            ParamValue::U32(v) => v.to_string(),
            ParamValue::U64(v) => v.to_string(),
            ParamValue::I32(v) => v.to_string(),
            ParamValue::I64(v) => v.to_string(),
            ParamValue::F32(v) => v.to_string(),
            ParamValue::F64(v) => v.to_string(),
            ParamValue::Str(v) => v.clone(),
        }
    }
}

/// A wire-level FHE trace instruction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instruction {
    pub op: String,
    pub dests: Vec<Arg>,
    pub srcs: Vec<Arg>,
    pub params: BTreeMap<String, ParamValue>,
}

/// A serialized FHE program trace: a global header describing the context
/// shape and a flat instruction list.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub scheme: Scheme,
    pub n: u32,
    pub key_rns_num: u32,
    pub q_size: u32,
    pub dnum: u32,
    pub alpha: u32,
    pub instructions: Vec<Instruction>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            scheme: Scheme::Bgv,
            n: 0,
            key_rns_num: 0,
            q_size: 0,
            dnum: 0,
            alpha: 0,
            instructions: Vec::new(),
        }
    }
}

/// Source and destination symbol names of one instruction.
pub fn get_symbols(instruction: &Instruction) -> (Vec<String>, Vec<String>) {
    let srcs = instruction
        .srcs
        .iter()
        .map(|a| a.symbol_name.clone())
        .collect();
    let dests = instruction
        .dests
        .iter()
        .map(|a| a.symbol_name.clone())
        .collect();
    (srcs, dests)
}

/// All source and destination symbols of a trace, bootstrap helpers
/// excluded. With `exclusive_outputs`, destinations that are also consumed
/// somewhere are dropped from the output set.
pub fn get_all_symbols(trace: &Trace, exclusive_outputs: bool) -> (HashSet<String>, HashSet<String>) {
    let mut inputs = HashSet::new();
    let mut outputs = HashSet::new();
    for instruction in &trace.instructions {
        if instruction.op.starts_with("bk_") {
            continue;
        }
        let (srcs, dests) = get_symbols(instruction);
        inputs.extend(srcs);
        outputs.extend(dests);
    }
    if exclusive_outputs {
        outputs = outputs.difference(&inputs).cloned().collect();
    }
    (inputs, outputs)
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> IoResult<()> {
    writer.write_u16::<LittleEndian>(s.len() as u16)?;
    writer.write_all(s.as_bytes())
}

fn read_string<R: Read>(reader: &mut R) -> IoResult<String> {
    let len = reader.read_u16::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn scheme_tag(scheme: Scheme) -> u8 {
    match scheme {
        Scheme::Bgv => 0,
        Scheme::Bfv => 1,
        Scheme::Ckks => 2,
    }
}

fn scheme_from_tag(tag: u8) -> IoResult<Scheme> {
    match tag {
        0 => Ok(Scheme::Bgv),
        1 => Ok(Scheme::Bfv),
        2 => Ok(Scheme::Ckks),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown scheme tag {other}"),
        )),
    }
}

impl WriterTo for Arg {
    fn write_to<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        write_string(writer, &self.symbol_name)?;
        writer.write_u32::<LittleEndian>(self.num_rns)?;
        writer.write_u32::<LittleEndian>(self.order)
    }
}

impl ReaderFrom for Arg {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> IoResult<()> {
        self.symbol_name = read_string(reader)?;
        self.num_rns = reader.read_u32::<LittleEndian>()?;
        self.order = reader.read_u32::<LittleEndian>()?;
        Ok(())
    }
}

impl WriterTo for ParamValue {
    fn write_to<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        match self {
            ParamValue::U32(v) => {
                writer.write_u8(0)?;
                writer.write_u32::<LittleEndian>(*v)
            }
            ParamValue::U64(v) => {
                writer.write_u8(1)?;
                writer.write_u64::<LittleEndian>(*v)
            }
            ParamValue::I32(v) => {
                writer.write_u8(2)?;
                writer.write_i32::<LittleEndian>(*v)
            }
            ParamValue::I64(v) => {
                writer.write_u8(3)?;
                writer.write_i64::<LittleEndian>(*v)
            }
            ParamValue::F32(v) => {
                writer.write_u8(4)?;
                writer.write_f32::<LittleEndian>(*v)
            }
            ParamValue::F64(v) => {
                writer.write_u8(5)?;
                writer.write_f64::<LittleEndian>(*v)
            }
            ParamValue::Str(v) => {
                writer.write_u8(6)?;
                write_string(writer, v)
            }
        }
    }
}

impl ParamValue {
    fn read<R: Read>(reader: &mut R) -> IoResult<Self> {
        Ok(match reader.read_u8()? {
            0 => ParamValue::U32(reader.read_u32::<LittleEndian>()?),
            1 => ParamValue::U64(reader.read_u64::<LittleEndian>()?),
            2 => ParamValue::I32(reader.read_i32::<LittleEndian>()?),
            3 => ParamValue::I64(reader.read_i64::<LittleEndian>()?),
            4 => ParamValue::F32(reader.read_f32::<LittleEndian>()?),
            5 => ParamValue::F64(reader.read_f64::<LittleEndian>()?),
            6 => ParamValue::Str(read_string(reader)?),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown parameter tag {other}"),
                ))
            }
        })
    }
}

impl WriterTo for Instruction {
    fn write_to<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        write_string(writer, &self.op)?;
        writer.write_u32::<LittleEndian>(self.dests.len() as u32)?;
        for dest in &self.dests {
            dest.write_to(writer)?;
        }
        writer.write_u32::<LittleEndian>(self.srcs.len() as u32)?;
        for src in &self.srcs {
            src.write_to(writer)?;
        }
        writer.write_u32::<LittleEndian>(self.params.len() as u32)?;
        for (key, value) in &self.params {
            write_string(writer, key)?;
            value.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for Instruction {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> IoResult<()> {
        self.op = read_string(reader)?;
        let dest_count = reader.read_u32::<LittleEndian>()? as usize;
        self.dests = Vec::with_capacity(dest_count);
        for _ in 0..dest_count {
            let mut arg = Arg::default();
            arg.read_from(reader)?;
            self.dests.push(arg);
        }
        let src_count = reader.read_u32::<LittleEndian>()? as usize;
        self.srcs = Vec::with_capacity(src_count);
        for _ in 0..src_count {
            let mut arg = Arg::default();
            arg.read_from(reader)?;
            self.srcs.push(arg);
        }
        let param_count = reader.read_u32::<LittleEndian>()? as usize;
        self.params = BTreeMap::new();
        for _ in 0..param_count {
            let key = read_string(reader)?;
            self.params.insert(key, ParamValue::read(reader)?);
        }
        Ok(())
    }
}

impl WriterTo for Trace {
    fn write_to<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        writer.write_all(TRACE_MAGIC)?;
        writer.write_u16::<LittleEndian>(TRACE_VERSION)?;
        writer.write_u8(scheme_tag(self.scheme))?;
        writer.write_u32::<LittleEndian>(self.n)?;
        writer.write_u32::<LittleEndian>(self.key_rns_num)?;
        writer.write_u32::<LittleEndian>(self.q_size)?;
        writer.write_u32::<LittleEndian>(self.dnum)?;
        writer.write_u32::<LittleEndian>(self.alpha)?;
        writer.write_u32::<LittleEndian>(self.instructions.len() as u32)?;
        for instruction in &self.instructions {
            instruction.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for Trace {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> IoResult<()> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != TRACE_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "not a trace file"));
        }
        let version = reader.read_u16::<LittleEndian>()?;
        if version != TRACE_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported trace version {version}"),
            ));
        }
        self.scheme = scheme_from_tag(reader.read_u8()?)?;
        self.n = reader.read_u32::<LittleEndian>()?;
        self.key_rns_num = reader.read_u32::<LittleEndian>()?;
        self.q_size = reader.read_u32::<LittleEndian>()?;
        self.dnum = reader.read_u32::<LittleEndian>()?;
        self.alpha = reader.read_u32::<LittleEndian>()?;
        let count = reader.read_u32::<LittleEndian>()? as usize;
        self.instructions = Vec::with_capacity(count);
        for _ in 0..count {
            let mut instruction = Instruction::default();
            instruction.read_from(reader)?;
            self.instructions.push(instruction);
        }
        Ok(())
    }
}

impl Trace {
    pub fn store(&self, path: &std::path::Path) -> IoResult<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write_to(&mut file)
    }

    pub fn load(path: &std::path::Path) -> IoResult<Self> {
        let mut file = std::io::BufReader::new(std::fs::File::open(path)?);
        let mut trace = Trace::default();
        trace.read_from(&mut file)?;
        Ok(trace)
    }
}
