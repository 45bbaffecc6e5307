use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pisa_data::context::Scheme;
use pisa_trace::{PolyOperation, PolyProgram};
use tracing::{debug, warn};

use crate::error::{KernelGenError, MapperError};
use crate::isa::{parse_pisa, parse_pisa_file, PisaInstruction};
use crate::process::run_captured;

/// How the external kernel generator is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelProtocol {
    /// The `CONTEXT`/`DATA`/`OP` descriptor on stdin, positional operand
    /// names (`output0`, `input0`, ...).
    Stdin,
    /// Positional CLI arguments, CSV kernel library.
    LegacyCsv,
    /// Positional CLI arguments, HDF kernel library.
    LegacyHdf,
}

/// Everything needed to request one kernel: the operation shape plus the
/// program-wide context parameters.
#[derive(Debug, Clone)]
pub struct KernelRequest {
    pub scheme: Scheme,
    pub op_name: String,
    pub n: u32,
    pub key_rns: u32,
    pub q_size: u32,
    pub dnum: u32,
    pub alpha: u32,
    pub galois_elt: u32,
    pub rns_terms: u32,
    pub cipher_degree: u32,
    /// Polynomial-part count per output operand.
    pub output_orders: Vec<u32>,
    /// Polynomial-part count per input operand.
    pub input_orders: Vec<u32>,
}

impl KernelRequest {
    pub fn from_operation(op: &PolyOperation, program: &PolyProgram) -> Self {
        Self {
            scheme: program.scheme,
            op_name: op.name.clone(),
            n: program.poly_modulus_degree,
            key_rns: program.key_rns,
            q_size: program.q_size,
            dnum: program.dnum,
            alpha: program.alpha,
            galois_elt: op.galois_elt,
            rns_terms: op.rns_terms,
            cipher_degree: op.cipher_degree,
            output_orders: op.outputs.iter().map(|o| o.order).collect(),
            input_orders: op.inputs.iter().map(|o| o.order).collect(),
        }
    }

    /// Deterministic cache file name: shape fields joined by underscores,
    /// lowercase scheme, `.csv` extension.
    pub fn file_name(&self, protocol: KernelProtocol) -> String {
        match protocol {
            KernelProtocol::Stdin => format!(
                "{}_{}_{}_{}_{}.csv",
                self.scheme.as_lower(),
                self.op_name,
                self.n,
                self.cipher_degree,
                self.rns_terms
            ),
            KernelProtocol::LegacyCsv => format!(
                "{}_{}_{}_{}_{}.csv",
                self.scheme.as_lower(),
                self.op_name,
                self.n,
                self.rns_terms,
                self.cipher_degree
            ),
            KernelProtocol::LegacyHdf => {
                let mut parts = self.hdf_args();
                parts.push(self.cipher_degree.to_string());
                format!("{}.csv", parts.join("_"))
            }
        }
    }

    /// The stdin descriptor of the new generator. Operands are renamed to
    /// the positional `output{k}` / `input{k}` convention so one cached
    /// kernel serves every instantiation of the same shape.
    pub fn stdin_payload(&self) -> String {
        let mut payload = format!(
            "CONTEXT {} {} {} {}\n",
            self.scheme.as_upper(),
            self.n,
            self.key_rns,
            self.rns_terms
        );
        for (i, order) in self.output_orders.iter().enumerate() {
            payload.push_str(&format!("DATA output{i} {order}\n"));
        }
        for (i, order) in self.input_orders.iter().enumerate() {
            payload.push_str(&format!("DATA input{i} {order}\n"));
        }
        payload.push_str(&self.op_name.to_uppercase());
        for i in 0..self.output_orders.len() {
            payload.push_str(&format!(" output{i}"));
        }
        for i in 0..self.input_orders.len() {
            payload.push_str(&format!(" input{i}"));
        }
        payload.push('\n');
        payload
    }

    /// Positional arguments of the legacy CSV generator.
    pub fn legacy_args(&self) -> Vec<String> {
        let mut args = vec![
            self.scheme.as_lower().to_owned(),
            self.op_name.clone(),
            self.n.to_string(),
            self.rns_terms.to_string(),
            (self.rns_terms + 1).to_string(),
        ];
        match self.op_name.as_str() {
            "add" => args.push(self.cipher_degree.to_string()),
            // RNS-prime decomposition: dnum equals the rns count and the
            // digit size collapses to one when unset.
            "relin" | "rotate" => {
                let alpha = if self.alpha == 0 { 1 } else { self.alpha };
                args.push(self.rns_terms.to_string());
                args.push(alpha.to_string());
                args.push(alpha.to_string());
            }
            _ => {}
        }
        args
    }

    /// Positional arguments of the HDF generator.
    pub fn hdf_args(&self) -> Vec<String> {
        let mut args = vec![
            self.scheme.as_lower().to_owned(),
            self.op_name.clone(),
            self.n.to_string(),
            self.rns_terms.to_string(),
            self.key_rns.to_string(),
        ];
        match self.op_name.as_str() {
            "relin" => {
                args.push(self.dnum.to_string());
                args.push(self.alpha.to_string());
                args.push(self.alpha.to_string());
                args.push(self.q_size.to_string());
            }
            "add" => args.push(self.cipher_degree.to_string()),
            "rotate" => {
                args.push(self.dnum.to_string());
                args.push(self.alpha.to_string());
                args.push(self.alpha.to_string());
                args.push(self.q_size.to_string());
                args.push(self.galois_elt.to_string());
            }
            "rescale" => args.push(self.q_size.to_string()),
            _ => {}
        }
        args
    }
}

/// On-disk cache of generated kernels, one CSV file per request shape.
///
/// Concurrent fetches of the same shape serialize on a per-key mutex so
/// the generator runs at most once; files are published by writing to a
/// temporary and renaming, so readers never observe partial output.
#[derive(Debug)]
pub struct KernelCache {
    dir: PathBuf,
    use_cache: bool,
    remove_on_drop: bool,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KernelCache {
    pub fn new(dir: impl Into<PathBuf>, use_cache: bool, remove_on_drop: bool) -> Self {
        Self {
            dir: dir.into(),
            use_cache,
            remove_on_drop,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_owned()).or_default().clone()
    }

    /// Returns the kernel for `request`, from cache or by invoking the
    /// generator at `kerngen`. A cache entry that fails to parse is treated
    /// as a miss and regenerated.
    pub fn fetch(
        &self,
        kerngen: &Path,
        request: &KernelRequest,
        protocol: KernelProtocol,
        timeout: Option<Duration>,
    ) -> Result<Vec<PisaInstruction>, MapperError> {
        std::fs::create_dir_all(&self.dir)?;

        let file_name = request.file_name(protocol);
        let lock = self.key_lock(&file_name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.dir.join(&file_name);
        if self.use_cache && path.exists() {
            match parse_pisa_file(&path) {
                Ok(instructions) => {
                    debug!(kernel = file_name.as_str(), "kernel cache hit");
                    return Ok(instructions);
                }
                Err(err) => {
                    warn!(
                        kernel = file_name.as_str(),
                        %err,
                        "cached kernel is unreadable, regenerating"
                    );
                }
            }
        }

        let stdout = match protocol {
            KernelProtocol::Stdin => run_captured(
                kerngen,
                &["-q".to_owned(), "-l".to_owned()],
                Some(&request.stdin_payload()),
                timeout,
            )?,
            KernelProtocol::LegacyCsv => {
                run_captured(kerngen, &request.legacy_args(), None, timeout)?
            }
            KernelProtocol::LegacyHdf => run_captured(kerngen, &request.hdf_args(), None, timeout)?,
        };

        let instructions = parse_pisa(stdout.as_slice())
            .map_err(|err| KernelGenError::UnparseableOutput(err.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp.write_all(&stdout)?;
        temp.persist(&path).map_err(|err| err.error)?;

        Ok(instructions)
    }
}

impl Drop for KernelCache {
    fn drop(&mut self) {
        if self.remove_on_drop {
            if let Err(err) = std::fs::remove_dir_all(&self.dir) {
                debug!(dir = %self.dir.display(), %err, "kernel cache removal failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> KernelRequest {
        KernelRequest {
            scheme: Scheme::Bgv,
            op_name: "add".to_owned(),
            n: 16384,
            key_rns: 4,
            q_size: 3,
            dnum: 3,
            alpha: 1,
            galois_elt: 0,
            rns_terms: 3,
            cipher_degree: 2,
            output_orders: vec![2],
            input_orders: vec![2, 2],
        }
    }

    #[test]
    fn file_names_are_deterministic_per_protocol() {
        let request = request();
        assert_eq!(
            request.file_name(KernelProtocol::Stdin),
            "bgv_add_16384_2_3.csv"
        );
        assert_eq!(
            request.file_name(KernelProtocol::LegacyCsv),
            "bgv_add_16384_3_2.csv"
        );
        assert_eq!(
            request.file_name(KernelProtocol::LegacyHdf),
            "bgv_add_16384_3_4_2_2.csv"
        );
    }

    #[test]
    fn stdin_payload_uses_positional_operands() {
        let payload = request().stdin_payload();
        assert_eq!(
            payload,
            "CONTEXT BGV 16384 4 3\nDATA output0 2\nDATA input0 2\nDATA input1 2\nADD output0 input0 input1\n"
        );
    }

    #[test]
    fn rotate_args_carry_the_galois_element() {
        let mut request = request();
        request.op_name = "rotate".to_owned();
        request.galois_elt = 5;
        assert_eq!(
            request.hdf_args(),
            vec!["bgv", "rotate", "16384", "3", "4", "3", "1", "1", "3", "5"]
        );
        assert_eq!(
            request.legacy_args(),
            vec!["bgv", "rotate", "16384", "3", "4", "3", "1", "1"]
        );
    }
}
