//! Collects the workshop files and packs them into the downloadable zip.
use crate::BundleError;
use crate::templates::RenderedPage;
use indexmap::IndexMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const DOCUMENTATION: &str = "README";
pub const ASSETS_DIR: &str = "images";
/// Images used by the hosted demo only, never shipped in the archive.
pub const RESERVED_ASSETS: &[&str] = &["apple.jpg", "meditation.jpg", "runner.jpg"];
/// Flag whose page is rendered but deliberately left out of the archive.
pub const EXCLUDED_FLAG: &str = "erratum";
const ARCHIVE_FOLDER: &str = "html";

/// Files to archive, in insertion order. A path is only ever added once.
#[derive(Debug, Default)]
pub struct ArchiveManifest {
    entries: IndexMap<String, Vec<u8>>,
}

impl ArchiveManifest {
    /// Returns false, leaving the manifest untouched, when `path` is already present.
    pub fn add(&mut self, path: impl Into<String>, content: Vec<u8>) -> bool {
        let path = path.into();
        if self.entries.contains_key(&path) {
            return false;
        }
        self.entries.insert(path, content);
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn archive_path(out_dir: &Path, org_identifier: &str) -> PathBuf {
    out_dir.join(format!("splitworkshop-{org_identifier}.zip"))
}

pub struct Assembler {
    root: PathBuf,
}

impl Assembler {
    pub fn new(root: &Path) -> Self {
        Assembler {
            root: root.to_path_buf(),
        }
    }

    pub fn build_manifest(&self, pages: &[RenderedPage]) -> ArchiveManifest {
        let mut manifest = ArchiveManifest::default();

        for page in pages.iter().filter(|p| p.flag != EXCLUDED_FLAG) {
            manifest.add(page.file_name.clone(), page.content.clone().into_bytes());
        }

        match fs::read(self.root.join(DOCUMENTATION)) {
            Ok(doc) => {
                manifest.add(DOCUMENTATION, doc);
            }
            Err(e) => tracing::warn!(file = DOCUMENTATION, error = %e, "documentation not found"),
        }

        for (name, content) in self.assets() {
            manifest.add(format!("{ASSETS_DIR}/{name}"), content);
        }

        tracing::info!(files = manifest.len(), "built archive manifest");
        manifest
    }

    /// Every non-reserved file of the assets directory, sorted by name. An unreadable
    /// directory contributes nothing.
    fn assets(&self) -> Vec<(String, Vec<u8>)> {
        let dir = self.root.join(ASSETS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(
                    dir = %dir.display(),
                    error = %e,
                    "could not read assets directory"
                );
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !RESERVED_ASSETS.contains(&name.as_str()))
            .collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| match fs::read(dir.join(&name)) {
                Ok(content) => Some((name, content)),
                Err(e) => {
                    tracing::warn!(asset = %name, error = %e, "could not read asset");
                    None
                }
            })
            .collect()
    }

    /// Writes the manifest as a deflate-compressed zip, every entry under `html/`.
    pub fn write_archive(
        &self,
        manifest: &ArchiveManifest,
        out_dir: &Path,
        org_identifier: &str,
    ) -> Result<PathBuf, BundleError> {
        fs::create_dir_all(out_dir)?;
        let path = archive_path(out_dir, org_identifier);

        let file = File::create(&path)?;
        let mut writer = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9));

        for (entry, content) in &manifest.entries {
            writer.start_file(format!("{ARCHIVE_FOLDER}/{entry}"), options)?;
            writer.write_all(content)?;
        }
        writer.finish()?.flush()?;

        tracing::info!(path = %path.display(), files = manifest.len(), "wrote archive");
        Ok(path)
    }
}
