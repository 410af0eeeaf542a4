use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::media::{MediaCategory, MediaFormat};

/// Category subdirectories under the base download directory, created on
/// demand.
#[derive(Debug)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    pub fn dir_for(&self, category: MediaCategory) -> anyhow::Result<PathBuf> {
        let dir = self.base.join(category.subdir());
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create download directory {}", dir.display()))?;

        Ok(dir)
    }
}

/// Where a single download ends up: directory, title and container.
/// Mutated at most once, when the duplicate guard picks a new copy name.
#[derive(Debug)]
pub struct OutputTarget {
    dir: PathBuf,
    title: String,
    format: MediaFormat,
}

impl OutputTarget {
    pub fn new(dir: PathBuf, title: String, format: MediaFormat) -> Self {
        Self { dir, title, format }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The path the engine is expected to produce.
    pub fn final_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{}", self.title, self.format.ext()))
    }

    /// Output template handed to the engine. Audio extraction goes through
    /// intermediate containers, so the extension is left to the engine there.
    pub fn engine_template(&self) -> String {
        match self.format.category() {
            MediaCategory::Video => self.final_path().display().to_string(),
            MediaCategory::Audio | MediaCategory::Spotify => self
                .dir
                .join(format!("{}.%(ext)s", self.title))
                .display()
                .to_string(),
        }
    }

    /// Renames the target to the next free "title (n)" variant and returns
    /// the new final path.
    pub fn promote_to_copy(&mut self) -> PathBuf {
        let fresh = next_free_path(&self.final_path());
        if let Some(stem) = fresh.file_stem() {
            self.title = stem.to_string_lossy().into_owned();
        }

        fresh
    }
}

/// Finds a path that does not exist yet by appending " (n)" before the
/// extension, scanning upward from 2.
pub fn next_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 2u64.. {
        let mut name = format!("{stem} ({n})");
        if let Some(ext) = &ext {
            name.push('.');
            name.push_str(ext);
        }

        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
    }

    unreachable!("ran out of candidate file names")
}

/// Strips characters that are unsafe in file names and falls back to a
/// generic title when nothing usable is left.
pub fn sanitize_title(raw: &str) -> String {
    let cleaned = raw
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .trim_matches('.')
        .to_string();

    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}
