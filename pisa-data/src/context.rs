use std::collections::BTreeMap;
use std::io::{self, Read, Result as IoResult, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::DataError;
use crate::layouts::{Ciphertext, KeyBundle};
use crate::serialization::{read_string, read_u32_vec, write_string, write_u32_slice, ReaderFrom, WriterTo};

/// The FHE scheme a trace was produced under. The lowering treats the
/// scheme as a tag selecting which metadata families apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scheme {
    Bgv,
    Bfv,
    Ckks,
}

impl Scheme {
    pub fn as_upper(&self) -> &'static str {
        match self {
            Scheme::Bgv => "BGV",
            Scheme::Bfv => "BFV",
            Scheme::Ckks => "CKKS",
        }
    }

    pub fn as_lower(&self) -> &'static str {
        match self {
            Scheme::Bgv => "bgv",
            Scheme::Bfv => "bfv",
            Scheme::Ckks => "ckks",
        }
    }

    pub fn parse(s: &str) -> Option<Scheme> {
        match s.to_ascii_uppercase().as_str() {
            "BGV" => Some(Scheme::Bgv),
            "BFV" => Some(Scheme::Bfv),
            "CKKS" => Some(Scheme::Ckks),
            _ => None,
        }
    }

    fn to_tag(self) -> u8 {
        match self {
            Scheme::Bgv => 0,
            Scheme::Bfv => 1,
            Scheme::Ckks => 2,
        }
    }

    fn from_tag(tag: u8) -> IoResult<Scheme> {
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
}

/// BGV key material is held per plaintext-modulus index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BgvPlaintextInfo {
    pub plaintext_modulus: u32,
    pub keys: KeyBundle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BgvInfo {
    pub plaintext_specific: Vec<BgvPlaintextInfo>,
    pub recrypt_key: Option<Ciphertext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CkksInfo {
    pub keys: KeyBundle,
    /// Key-switching constants precomputed by the producing library,
    /// keyed by the downstream immediate name they feed.
    pub metadata_extra: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeInfo {
    Bgv(BgvInfo),
    Bfv,
    Ckks(CkksInfo),
}

/// The cryptographic context a trace was captured under. Read-only after
/// construction; [`FheContext::validate`] checks the structural invariants
/// (`key_rns_num = q_size + sizeP`, `alpha * dnum >= q_size`, power-of-two
/// ring dimension, non-zero primes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FheContext {
    pub scheme: Scheme,
    /// Ring dimension N, a power of two.
    pub n: u32,
    /// Ordered RNS primes, `key_rns_num` of them.
    pub q_i: Vec<u32>,
    /// 2N-th root of unity per prime.
    pub psi: Vec<u32>,
    pub q_size: u32,
    pub alpha: u32,
    pub dnum: u32,
    pub key_rns_num: u32,
    pub info: SchemeInfo,
}

impl FheContext {
    pub fn key_rns_num(&self) -> usize {
        self.key_rns_num as usize
    }

    pub fn q(&self, i: usize) -> u32 {
        self.q_i[i]
    }

    pub fn bgv_info(&self) -> Result<&BgvInfo, DataError> {
        match &self.info {
            SchemeInfo::Bgv(info) => Ok(info),
            _ => Err(DataError::SchemeMismatch {
                expected: Scheme::Bgv,
                found: self.scheme,
            }),
        }
    }

    pub fn ckks_info(&self) -> Result<&CkksInfo, DataError> {
        match &self.info {
            SchemeInfo::Ckks(info) => Ok(info),
            _ => Err(DataError::SchemeMismatch {
                expected: Scheme::Ckks,
                found: self.scheme,
            }),
        }
    }

    /// Galois elements for which rotation keys exist, across all key sets.
    pub fn galois_elements(&self) -> Vec<u32> {
        let mut elements = std::collections::BTreeSet::new();
        match &self.info {
            SchemeInfo::Bgv(info) => {
                for pt in &info.plaintext_specific {
                    elements.extend(pt.keys.rotation_keys.keys().copied());
                }
            }
            SchemeInfo::Ckks(info) => {
                elements.extend(info.keys.rotation_keys.keys().copied());
            }
            SchemeInfo::Bfv => {}
        }
        elements.into_iter().collect()
    }

    pub fn validate(&self) -> Result<(), DataError> {
        if self.n == 0 || !self.n.is_power_of_two() {
            return Err(DataError::FieldOutOfRange(format!(
                "ring dimension {} is not a power of two",
                self.n
            )));
        }
        if self.key_rns_num == 0 {
            return Err(DataError::FieldOutOfRange("no RNS primes".into()));
        }
        if self.q_i.len() != self.key_rns_num as usize {
            return Err(DataError::FieldOutOfRange(format!(
                "{} primes for key_rns_num {}",
                self.q_i.len(),
                self.key_rns_num
            )));
        }
        if self.psi.len() != self.q_i.len() {
            return Err(DataError::FieldOutOfRange(format!(
                "{} roots of unity for {} primes",
                self.psi.len(),
                self.q_i.len()
            )));
        }
        if self.q_i.iter().any(|&q| q == 0) {
            return Err(DataError::FieldOutOfRange("zero RNS prime".into()));
        }
        if self.q_size > self.key_rns_num {
            return Err(DataError::FieldOutOfRange(format!(
                "q_size {} exceeds key_rns_num {}",
                self.q_size, self.key_rns_num
            )));
        }
        if self.alpha as u64 * self.dnum as u64 > 0
            && (self.alpha as u64 * self.dnum as u64) < self.q_size as u64
        {
            return Err(DataError::FieldOutOfRange(format!(
                "alpha {} * dnum {} does not cover q_size {}",
                self.alpha, self.dnum, self.q_size
            )));
        }
        if self.scheme == Scheme::Ckks && self.key_rns_num < 2 {
            return Err(DataError::FieldOutOfRange(
                "CKKS requires at least two RNS primes".into(),
            ));
        }
        match (&self.info, self.scheme) {
            (SchemeInfo::Bgv(_), Scheme::Bgv)
            | (SchemeInfo::Bfv, Scheme::Bfv)
            | (SchemeInfo::Ckks(_), Scheme::Ckks) => Ok(()),
            (_, scheme) => Err(DataError::FieldOutOfRange(format!(
                "scheme info does not match scheme tag {scheme:?}"
            ))),
        }
    }
}

impl WriterTo for BgvPlaintextInfo {
    fn write_to<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        writer.write_u32::<LittleEndian>(self.plaintext_modulus)?;
        self.keys.write_to(writer)
    }
}

impl ReaderFrom for BgvPlaintextInfo {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> IoResult<()> {
        self.plaintext_modulus = reader.read_u32::<LittleEndian>()?;
        self.keys.read_from(reader)
    }
}

impl WriterTo for FheContext {
    fn write_to<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        writer.write_u8(self.scheme.to_tag())?;
        writer.write_u32::<LittleEndian>(self.n)?;
        write_u32_slice(writer, &self.q_i)?;
        write_u32_slice(writer, &self.psi)?;
        writer.write_u32::<LittleEndian>(self.q_size)?;
        writer.write_u32::<LittleEndian>(self.alpha)?;
        writer.write_u32::<LittleEndian>(self.dnum)?;
        writer.write_u32::<LittleEndian>(self.key_rns_num)?;
        match &self.info {
            SchemeInfo::Bgv(info) => {
                writer.write_u32::<LittleEndian>(info.plaintext_specific.len() as u32)?;
                for pt in &info.plaintext_specific {
                    pt.write_to(writer)?;
                }
                match &info.recrypt_key {
                    Some(key) => {
                        writer.write_u8(1)?;
                        key.write_to(writer)?;
                    }
                    None => writer.write_u8(0)?,
                }
            }
            SchemeInfo::Bfv => {}
            SchemeInfo::Ckks(info) => {
                info.keys.write_to(writer)?;
                writer.write_u32::<LittleEndian>(info.metadata_extra.len() as u32)?;
                for (key, value) in &info.metadata_extra {
                    write_string(writer, key)?;
                    writer.write_u32::<LittleEndian>(*value)?;
                }
            }
        }
        Ok(())
    }
}

impl ReaderFrom for FheContext {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> IoResult<()> {
        self.scheme = Scheme::from_tag(reader.read_u8()?)?;
        self.n = reader.read_u32::<LittleEndian>()?;
        self.q_i = read_u32_vec(reader)?;
        self.psi = read_u32_vec(reader)?;
        self.q_size = reader.read_u32::<LittleEndian>()?;
        self.alpha = reader.read_u32::<LittleEndian>()?;
        self.dnum = reader.read_u32::<LittleEndian>()?;
        self.key_rns_num = reader.read_u32::<LittleEndian>()?;
        self.info = match self.scheme {
            Scheme::Bgv => {
                let count = reader.read_u32::<LittleEndian>()? as usize;
                let mut plaintext_specific = Vec::with_capacity(count);
                for _ in 0..count {
                    let mut pt = BgvPlaintextInfo::default();
                    pt.read_from(reader)?;
                    plaintext_specific.push(pt);
                }
                let recrypt_key = if reader.read_u8()? != 0 {
                    let mut key = Ciphertext::default();
                    key.read_from(reader)?;
                    Some(key)
                } else {
                    None
                };
                SchemeInfo::Bgv(BgvInfo {
                    plaintext_specific,
                    recrypt_key,
                })
            }
            Scheme::Bfv => SchemeInfo::Bfv,
            Scheme::Ckks => {
                let mut keys = KeyBundle::default();
                keys.read_from(reader)?;
                let count = reader.read_u32::<LittleEndian>()? as usize;
                let mut metadata_extra = BTreeMap::new();
                for _ in 0..count {
                    let key = read_string(reader)?;
                    let value = reader.read_u32::<LittleEndian>()?;
                    metadata_extra.insert(key, value);
                }
                SchemeInfo::Ckks(CkksInfo {
                    keys,
                    metadata_extra,
                })
            }
        };
        Ok(())
    }
}

impl Default for FheContext {
    fn default() -> Self {
        Self {
            scheme: Scheme::Bgv,
            n: 0,
            q_i: Vec::new(),
            psi: Vec::new(),
            q_size: 0,
            alpha: 0,
            dnum: 0,
            key_rns_num: 0,
            info: SchemeInfo::Bgv(BgvInfo::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn bgv_context() -> FheContext {
        FheContext {
            scheme: Scheme::Bgv,
            n: 16,
            q_i: vec![97, 193],
            psi: vec![8, 125],
            q_size: 1,
            alpha: 1,
            dnum: 1,
            key_rns_num: 2,
            info: SchemeInfo::Bgv(BgvInfo {
                plaintext_specific: vec![BgvPlaintextInfo {
                    plaintext_modulus: 2,
                    keys: KeyBundle::default(),
                }],
                recrypt_key: None,
            }),
        }
    }

    #[test]
    fn context_round_trip() {
        let ctx = bgv_context();
        let mut buf = Vec::new();
        ctx.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, ctx.wire_bytes());

        let mut back = FheContext::default();
        back.read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn validation_rejects_bad_shapes() {
        let mut ctx = bgv_context();
        ctx.validate().unwrap();

        ctx.n = 12;
        assert!(ctx.validate().is_err());

        let mut ctx = bgv_context();
        ctx.q_i.push(5);
        assert!(ctx.validate().is_err());

        let mut ctx = bgv_context();
        ctx.q_i[0] = 0;
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn scheme_accessors_check_the_tag() {
        let ctx = bgv_context();
        assert!(ctx.bgv_info().is_ok());
        assert!(matches!(
            ctx.ckks_info(),
            Err(DataError::SchemeMismatch { .. })
        ));
    }
}
