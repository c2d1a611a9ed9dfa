use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A check file found under the check root. `name` is the path relative to
/// the root without the `.check` extension, used for display and filtering.
#[derive(Debug, Clone)]
pub struct CheckFile {
    pub path: PathBuf,
    pub name: String,
}

impl CheckFile {
    pub fn new(path: PathBuf, root: &Path) -> Self {
        let name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .with_extension("")
            .to_string_lossy()
            .into_owned();
        Self { path, name }
    }
}

pub fn discover_check_files(root: &Path) -> Result<Vec<CheckFile>> {
    if root.is_file() {
        return Ok(vec![CheckFile::new(
            root.to_path_buf(),
            root.parent().unwrap_or(Path::new("")),
        )]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        if path.extension().is_none_or(|ext| ext != "check") {
            continue;
        }
        // Underscore-prefixed names are reserved
        if path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('_'))
        {
            continue;
        }

        files.push(CheckFile::new(path.to_path_buf(), root));
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
