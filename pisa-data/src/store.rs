use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::context::{FheContext, SchemeInfo};
use crate::error::DataError;
use crate::layouts::{Ciphertext, KeySwitch, TestVector};
use crate::manifest::Manifest;
use crate::serialization::{ReaderFrom, WriterTo};

/// Blobs larger than this are split into one file per constituent.
const SPLIT_BYTES: u64 = 1 << 30;

fn write_blob<T: WriterTo>(path: &Path, value: &T) -> Result<(), DataError> {
    let mut writer = BufWriter::new(File::create(path)?);
    value.write_to(&mut writer)?;
    Ok(())
}

fn read_blob<T: ReaderFrom + Default>(path: &Path) -> Result<T, DataError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut value = T::default();
    value.read_from(&mut reader)?;
    Ok(value)
}

/// Resolves a manifest entry relative to the manifest's own directory.
fn resolve(manifest_path: &Path, entry: &str) -> PathBuf {
    let entry = Path::new(entry);
    if entry.is_absolute() {
        entry.to_owned()
    } else {
        manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(entry)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Writes the context under `prefix`, registering the files in `manifest`.
///
/// Contexts whose encoding exceeds 2^30 bytes have their rotation keys
/// split out one file per Galois element under `[rotation_keys]`.
pub fn store_context(
    manifest: &mut Manifest,
    prefix: &Path,
    context: &FheContext,
) -> Result<(), DataError> {
    let mut main = context.clone();

    if context.wire_bytes() > SPLIT_BYTES {
        if let SchemeInfo::Ckks(info) = &mut main.info {
            let mut part = 1;
            for (galois_elt, key) in std::mem::take(&mut info.keys.rotation_keys) {
                let path = prefix.with_file_name(format!(
                    "{}_context_part_{part}",
                    file_name(prefix)
                ));
                debug!(galois_elt, path = %path.display(), "splitting rotation key");
                write_blob(&path, &key)?;
                manifest.insert("rotation_keys", &galois_elt.to_string(), &file_name(&path));
                part += 1;
            }
        }
    }

    let main_path = prefix.with_file_name(format!("{}_context_part_0", file_name(prefix)));
    write_blob(&main_path, &main)?;
    manifest.insert("context", "main", &file_name(&main_path));
    Ok(())
}

/// Writes the test vector under `prefix`. Vectors whose encoding exceeds
/// 2^30 bytes are split per symbol; otherwise a single `full` entry.
pub fn store_testvector(
    manifest: &mut Manifest,
    prefix: &Path,
    testvector: &TestVector,
) -> Result<(), DataError> {
    if testvector.wire_bytes() > SPLIT_BYTES {
        for (part, (sym, data)) in testvector.sym_data_map.iter().enumerate() {
            let path =
                prefix.with_file_name(format!("{}_testvector_part_{part}", file_name(prefix)));
            write_blob(&path, data)?;
            manifest.insert("testvector", sym, &file_name(&path));
        }
        return Ok(());
    }

    let path = prefix.with_file_name(format!("{}_testvector_part_0", file_name(prefix)));
    write_blob(&path, testvector)?;
    manifest.insert("testvector", "full", &file_name(&path));
    Ok(())
}

/// Writes context + test vector + manifest in one go.
pub fn store_data_trace(
    manifest_path: &Path,
    context: &FheContext,
    testvector: &TestVector,
) -> Result<(), DataError> {
    let mut manifest = Manifest::new();
    store_context(&mut manifest, manifest_path, context)?;
    store_testvector(&mut manifest, manifest_path, testvector)?;
    manifest.to_file(manifest_path)?;
    Ok(())
}

pub fn load_context_from_manifest(
    manifest_path: &Path,
    manifest: &Manifest,
) -> Result<FheContext, DataError> {
    let main = manifest
        .get("context", "main")
        .ok_or_else(|| DataError::MissingContextField("context/main".into()))?;
    let mut context: FheContext = read_blob(&resolve(manifest_path, main))?;

    if let Some(entries) = manifest.section("rotation_keys") {
        let SchemeInfo::Ckks(info) = &mut context.info else {
            return Err(DataError::SchemeMismatch {
                expected: crate::context::Scheme::Ckks,
                found: context.scheme,
            });
        };
        for (galois_elt, file) in entries {
            let galois_elt: u32 = galois_elt
                .parse()
                .map_err(|_| DataError::FieldOutOfRange(format!("galois element {galois_elt}")))?;
            let key: KeySwitch = read_blob(&resolve(manifest_path, file))?;
            info.keys.rotation_keys.insert(galois_elt, key);
        }
    }

    context.validate()?;
    Ok(context)
}

pub fn load_testvector_from_manifest(
    manifest_path: &Path,
    manifest: &Manifest,
) -> Result<TestVector, DataError> {
    let entries = manifest
        .section("testvector")
        .ok_or_else(|| DataError::MissingContextField("testvector".into()))?;

    if let Some(full) = manifest.get("testvector", "full") {
        return read_blob(&resolve(manifest_path, full));
    }

    let mut testvector = TestVector::default();
    for (sym, file) in entries {
        let data: Ciphertext = read_blob(&resolve(manifest_path, file))?;
        testvector.sym_data_map.insert(sym.clone(), data);
    }
    Ok(testvector)
}

pub fn load_context(manifest_path: &Path) -> Result<FheContext, DataError> {
    let manifest = Manifest::from_file(manifest_path)?;
    load_context_from_manifest(manifest_path, &manifest)
}

pub fn load_testvector(manifest_path: &Path) -> Result<TestVector, DataError> {
    let manifest = Manifest::from_file(manifest_path)?;
    load_testvector_from_manifest(manifest_path, &manifest)
}

pub fn load_data_trace(manifest_path: &Path) -> Result<(FheContext, TestVector), DataError> {
    let manifest = Manifest::from_file(manifest_path)?;
    Ok((
        load_context_from_manifest(manifest_path, &manifest)?,
        load_testvector_from_manifest(manifest_path, &manifest)?,
    ))
}
