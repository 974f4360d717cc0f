//! Picture folder the child describes from.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// A picture and the subject it shows, taken from the file stem
/// (`dolphin.jpg` shows a "dolphin").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub file: PathBuf,
    pub subject: String,
}

impl Picture {
    pub fn from_path(file: impl Into<PathBuf>) -> Option<Self> {
        let file = file.into();
        let subject = file.file_stem()?.to_str()?.trim().to_string();
        if subject.is_empty() {
            return None;
        }
        Some(Self { file, subject })
    }

    /// Subject with each word capitalised, for headings.
    pub fn title(&self) -> String {
        self.subject
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

/// Image files in one directory.  Each call to [`choose`](Self::choose)
/// re-lists the directory, so pictures added while the app runs are picked
/// up.
#[derive(Debug, Clone)]
pub struct PictureLibrary {
    dir: PathBuf,
}

impl PictureLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All pictures, sorted by file name.  A missing directory is empty.
    pub fn list(&self) -> Vec<Picture> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("pictures: cannot read {}: {e}", self.dir.display());
                return Vec::new();
            }
        };

        let mut pictures: Vec<Picture> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .filter_map(Picture::from_path)
            .collect();
        pictures.sort_by(|a, b| a.file.cmp(&b.file));
        pictures
    }

    /// A uniformly random picture, or `None` when the folder has none.
    pub fn choose(&self) -> Option<Picture> {
        let picture = self.list().choose(&mut rand::thread_rng()).cloned();
        match &picture {
            Some(p) => log::debug!("pictures: chose {}", p.file.display()),
            None => log::warn!("pictures: no images in {}", self.dir.display()),
        }
        picture
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
