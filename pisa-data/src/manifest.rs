use std::fs::File;
use std::io::{BufRead, BufReader, Read, Result as IoResult, Write};
use std::path::Path;

use tracing::warn;

use crate::error::DataError;

/// A `[section] key=value` manifest tying a multi-file dump together.
///
/// Section order and the entry order within a section are preserved on
/// write; lookups are by name. All whitespace handling is ASCII-only, so a
/// parse/generate round trip is byte-stable for any manifest this type
/// itself produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key = value` under `section`, creating the section at the
    /// end if it does not exist and replacing the value if the key does.
    pub fn insert(&mut self, section: &str, key: &str, value: &str) {
        let section = match self.sections.iter_mut().find(|s| s.name == section) {
            Some(existing) => existing,
            None => {
                self.sections.push(Section {
                    name: section.to_owned(),
                    entries: Vec::new(),
                });
                self.sections.last_mut().expect("just pushed")
            }
        };
        match section.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_owned(),
            None => section.entries.push((key.to_owned(), value.to_owned())),
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn section(&self, name: &str) -> Option<&[(String, String)]> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.entries.as_slice())
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.iter().any(|s| s.name == name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Parses a manifest. Every line is stripped of ASCII whitespace before
    /// interpretation. Lines that do not split into exactly `key=value` are
    /// logged and skipped; a file with no bracketed section is rejected.
    pub fn parse<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut manifest = Manifest::new();
        let mut current_section: Option<String> = None;

        for (line_number, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let line: String = line.chars().filter(|c| !c.is_ascii_whitespace()).collect();

            if line.len() >= 2 && line.starts_with('[') && line.ends_with(']') {
                current_section = Some(line[1..line.len() - 1].to_owned());
                continue;
            }

            let Some(section) = &current_section else {
                continue;
            };

            let mut parts: Vec<&str> = line.split('=').collect();
            if line.ends_with('=') {
                parts.pop();
            }
            if parts.len() != 2 {
                warn!(line = line_number + 1, "ignoring incorrect manifest line");
                continue;
            }

            manifest.insert(section, parts[0], parts[1]);
        }

        if manifest.sections.is_empty() {
            return Err(DataError::MalformedManifest);
        }
        Ok(manifest)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        for section in &self.sections {
            writeln!(writer, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                writeln!(writer, "{key}={value}")?;
            }
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        Self::parse(File::open(path)?)
    }

    pub fn to_file(&self, path: &Path) -> IoResult<()> {
        let mut file = File::create(path)?;
        self.write(&mut file)
    }
}
