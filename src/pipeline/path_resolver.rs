//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di output della conversione e delle coppie
//! vecchio → nuovo registrate nella rename map.
//!
//! Due sorgenti con lo stesso stem (`a.jpg`, `a.png`) producono lo stesso
//! `a.webp`: `OutputClaims` assegna ogni output al primo sorgente che lo reclama.

use crate::{error::PipelineError, file_manager::relative_slash_path};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// `.webp` sibling of a source file (`a/b/photo.JPG` → `a/b/photo.webp`)
    pub fn webp_path(source: &Path) -> Result<PathBuf, PipelineError> {
        let stem = source.file_stem().ok_or_else(|| {
            PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid file name: {}", source.display()),
            ))
        })?;

        let mut file_name = stem.to_os_string();
        file_name.push(".webp");
        Ok(source.with_file_name(file_name))
    }

    /// Old and new path relative to the scan root, `/`-separated
    pub fn rename_pair(source: &Path, output: &Path, root: &Path) -> Option<(String, String)> {
        let old = relative_slash_path(source, root)?;
        let new = relative_slash_path(output, root)?;
        (!old.is_empty() && !new.is_empty()).then_some((old, new))
    }
}

/// First-come ownership of output paths within one run
#[derive(Debug, Default)]
pub struct OutputClaims {
    owners: HashMap<PathBuf, PathBuf>,
}

impl OutputClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `output` for `source`; fails if another source already owns it
    pub fn claim(&mut self, output: &Path, source: &Path) -> Result<(), PipelineError> {
        match self.owners.get(output) {
            Some(owner) if owner != source => Err(PipelineError::OutputCollision {
                output: output.to_path_buf(),
                claimed_by: owner.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.owners.insert(output.to_path_buf(), source.to_path_buf());
                Ok(())
            }
        }
    }
}
