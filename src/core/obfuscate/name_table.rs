//! Original → generated identifier table.
//!
//! Keyed by spelling, not by symbol: two unrelated symbols that share a name
//! share a replacement. Rewrite passes depend on this, since they only see
//! token text.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Letters only, so a generated name is a valid identifier in any position.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const DEFAULT_NAME_LENGTH: usize = 25;

/// Source of fresh replacement names.
pub trait NameGenerator {
    fn generate(&mut self, length: usize) -> Result<String>;
}

/// Random names drawn from the OS entropy source.
#[derive(Debug, Default)]
pub struct RandomNameGenerator;

impl NameGenerator for RandomNameGenerator {
    fn generate(&mut self, length: usize) -> Result<String> {
        let mut name = String::with_capacity(length);
        let mut buf = [0u8; 64];
        // Bytes at or above 208 (52 * 4) are rejected.
        let limit = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

        while name.len() < length {
            getrandom::getrandom(&mut buf).map_err(|e| {
                Error::internal_unexpected(format!("OS entropy source unavailable: {}", e))
            })?;
            for &byte in buf.iter() {
                if name.len() == length {
                    break;
                }
                if byte < limit {
                    name.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
                }
            }
        }

        Ok(name)
    }
}

pub struct NameTable {
    names: BTreeMap<String, String>,
    length: usize,
    generator: Box<dyn NameGenerator>,
}

impl std::fmt::Debug for NameTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameTable")
            .field("names", &self.names)
            .field("length", &self.length)
            .finish()
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::with_length(DEFAULT_NAME_LENGTH)
    }
}

impl NameTable {
    pub fn with_length(length: usize) -> Self {
        Self::with_generator(length, Box::new(RandomNameGenerator))
    }

    pub fn with_generator(length: usize, generator: Box<dyn NameGenerator>) -> Self {
        Self {
            names: BTreeMap::new(),
            length,
            generator,
        }
    }

    /// Return the replacement for `original`, generating it on first use.
    ///
    /// Fails only when the generator cannot produce a name; the table is
    /// left unchanged in that case.
    pub fn resolve(&mut self, original: &str) -> Result<String> {
        if let Some(existing) = self.names.get(original) {
            return Ok(existing.clone());
        }
        let generated = self.generator.generate(self.length)?;
        self.names.insert(original.to_string(), generated.clone());
        Ok(generated)
    }

    /// Read-only lookup used by the rewrite passes.
    pub fn get(&self, original: &str) -> Option<&str> {
        self.names.get(original).map(String::as_str)
    }

    pub fn contains(&self, original: &str) -> bool {
        self.names.contains_key(original)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Entries sorted by original name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::NameGenerator;
    use crate::error::Result;

    /// Deterministic generator: `X1`, `X2`, ... regardless of the requested length.
    #[derive(Debug, Default)]
    pub struct SequenceGenerator {
        next: usize,
    }

    impl NameGenerator for SequenceGenerator {
        fn generate(&mut self, _length: usize) -> Result<String> {
            self.next += 1;
            Ok(format!("X{}", self.next))
        }
    }
}
