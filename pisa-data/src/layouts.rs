use std::collections::BTreeMap;
use std::io::{Read, Result, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::serialization::{read_string, read_u32_vec, write_string, write_u32_slice, ReaderFrom, WriterTo};

/// One residue of a polynomial: `coeffs.len()` coefficients modulo `modulus`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RnsPolynomial {
    pub coeffs: Vec<u32>,
    pub modulus: u32,
}

impl RnsPolynomial {
    pub fn new(coeffs: Vec<u32>, modulus: u32) -> Self {
        Self { coeffs, modulus }
    }

    pub fn constant(value: u32, degree: usize, modulus: u32) -> Self {
        Self {
            coeffs: vec![value; degree],
            modulus,
        }
    }
}

/// A polynomial in RNS representation, one [`RnsPolynomial`] per prime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Polynomial {
    pub rns_polys: Vec<RnsPolynomial>,
}

/// An ordered sequence of polynomials. Order 2 for a fresh encryption,
/// 3 after a multiplication. Test-vector payloads share this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ciphertext {
    pub polys: Vec<Polynomial>,
}

impl Ciphertext {
    pub fn order(&self) -> usize {
        self.polys.len()
    }
}

/// A key-switching key: one [`Ciphertext`] per decomposition digit.
/// `k` is the extension-prime count parameter reported by the producing
/// library; it is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySwitch {
    pub digits: Vec<Ciphertext>,
    pub k: u32,
}

/// Named input payloads for a lowered program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestVector {
    pub sym_data_map: BTreeMap<String, Ciphertext>,
}

/// Relinearization key plus rotation keys indexed by Galois element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBundle {
    pub relin_key: KeySwitch,
    pub rotation_keys: BTreeMap<u32, KeySwitch>,
}

// Wire formats. Every container is a `u32` element count followed by its
// elements; coefficients are raw little-endian `u32` runs.

impl WriterTo for RnsPolynomial {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.modulus)?;
        write_u32_slice(writer, &self.coeffs)
    }
}

impl ReaderFrom for RnsPolynomial {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        self.modulus = reader.read_u32::<LittleEndian>()?;
        self.coeffs = read_u32_vec(reader)?;
        Ok(())
    }
}

impl WriterTo for Polynomial {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.rns_polys.len() as u32)?;
        for rns in &self.rns_polys {
            rns.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for Polynomial {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let count = reader.read_u32::<LittleEndian>()? as usize;
        self.rns_polys = Vec::with_capacity(count);
        for _ in 0..count {
            let mut rns = RnsPolynomial::default();
            rns.read_from(reader)?;
            self.rns_polys.push(rns);
        }
        Ok(())
    }
}

impl WriterTo for Ciphertext {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.polys.len() as u32)?;
        for poly in &self.polys {
            poly.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for Ciphertext {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let count = reader.read_u32::<LittleEndian>()? as usize;
        self.polys = Vec::with_capacity(count);
        for _ in 0..count {
            let mut poly = Polynomial::default();
            poly.read_from(reader)?;
            self.polys.push(poly);
        }
        Ok(())
    }
}

impl WriterTo for KeySwitch {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.k)?;
        writer.write_u32::<LittleEndian>(self.digits.len() as u32)?;
        for digit in &self.digits {
            digit.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for KeySwitch {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        self.k = reader.read_u32::<LittleEndian>()?;
        let count = reader.read_u32::<LittleEndian>()? as usize;
        self.digits = Vec::with_capacity(count);
        for _ in 0..count {
            let mut digit = Ciphertext::default();
            digit.read_from(reader)?;
            self.digits.push(digit);
        }
        Ok(())
    }
}

impl WriterTo for TestVector {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.sym_data_map.len() as u32)?;
        for (sym, data) in &self.sym_data_map {
            write_string(writer, sym)?;
            data.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for TestVector {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let count = reader.read_u32::<LittleEndian>()? as usize;
        self.sym_data_map = BTreeMap::new();
        for _ in 0..count {
            let sym = read_string(reader)?;
            let mut data = Ciphertext::default();
            data.read_from(reader)?;
            self.sym_data_map.insert(sym, data);
        }
        Ok(())
    }
}

impl WriterTo for KeyBundle {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.relin_key.write_to(writer)?;
        writer.write_u32::<LittleEndian>(self.rotation_keys.len() as u32)?;
        for (galois_elt, key) in &self.rotation_keys {
            writer.write_u32::<LittleEndian>(*galois_elt)?;
            key.write_to(writer)?;
        }
        Ok(())
    }
}

impl ReaderFrom for KeyBundle {
    fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        self.relin_key.read_from(reader)?;
        let count = reader.read_u32::<LittleEndian>()? as usize;
        self.rotation_keys = BTreeMap::new();
        for _ in 0..count {
            let galois_elt = reader.read_u32::<LittleEndian>()?;
            let mut key = KeySwitch::default();
            key.read_from(reader)?;
            self.rotation_keys.insert(galois_elt, key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ciphertext() -> Ciphertext {
        Ciphertext {
            polys: vec![
                Polynomial {
                    rns_polys: vec![RnsPolynomial::new(vec![1, 2, 3, 4], 97)],
                },
                Polynomial {
                    rns_polys: vec![RnsPolynomial::new(vec![5, 6, 7, 8], 97)],
                },
            ],
        }
    }

    #[test]
    fn ciphertext_round_trip() {
        let ct = sample_ciphertext();
        let mut buf = Vec::new();
        ct.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, ct.wire_bytes());

        let mut back = Ciphertext::default();
        back.read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, ct);
    }

    #[test]
    fn testvector_round_trip() {
        let mut tv = TestVector::default();
        tv.sym_data_map.insert("a".into(), sample_ciphertext());
        tv.sym_data_map.insert("out".into(), sample_ciphertext());

        let mut buf = Vec::new();
        tv.write_to(&mut buf).unwrap();
        let mut back = TestVector::default();
        back.read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, tv);
    }
}
