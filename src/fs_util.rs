use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::error::OrganizerError;

/// Names of the immediate subdirectories of `root`, sorted.
pub fn list_dir_names(root: &Utf8Path) -> Result<Vec<String>, OrganizerError> {
    list_names(root, |file_type| file_type.is_dir())
}

/// Names of the regular files directly inside `root`, sorted.
pub fn list_file_names(root: &Utf8Path) -> Result<Vec<String>, OrganizerError> {
    list_names(root, |file_type| file_type.is_file())
}

fn list_names(
    root: &Utf8Path,
    keep: impl Fn(&fs::FileType) -> bool,
) -> Result<Vec<String>, OrganizerError> {
    if !root.as_std_path().is_dir() {
        return Err(OrganizerError::PathNotFound(root.to_path_buf()));
    }
    let entries = fs::read_dir(root.as_std_path())
        .map_err(|err| OrganizerError::Filesystem(format!("read dir {root}: {err}")))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| OrganizerError::Filesystem(err.to_string()))?;
        // Follow symlinks so linked session folders are still picked up.
        let file_type = match fs::metadata(entry.path()) {
            Ok(meta) => meta.file_type(),
            Err(_) => continue,
        };
        if !keep(&file_type) {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => {
                tracing::warn!(dir = %root, name = ?raw, "skipping non-utf8 entry");
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Moves a file, falling back to copy and delete when a rename crosses
/// filesystems.
pub fn move_file(source: &Utf8Path, dest: &Utf8Path) -> Result<(), OrganizerError> {
    match fs::rename(source.as_std_path(), dest.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            copy_file_atomic(source, dest)?;
            fs::remove_file(source.as_std_path())
                .map_err(|err| OrganizerError::Filesystem(format!("remove {source}: {err}")))
        }
        Err(err) => Err(OrganizerError::Filesystem(format!(
            "move {source} -> {dest}: {err}"
        ))),
    }
}

pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), OrganizerError> {
    let parent = dest
        .parent()
        .ok_or_else(|| OrganizerError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| OrganizerError::Filesystem(err.to_string()))?;
    let temp = Builder::new()
        .prefix("nifti-org-file")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| OrganizerError::Filesystem(err.to_string()))?;
    fs::copy(source.as_std_path(), temp.path())
        .map_err(|err| OrganizerError::Filesystem(format!("copy {source}: {err}")))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| OrganizerError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), OrganizerError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| OrganizerError::Filesystem(format!("create {path}: {err}")))
}

pub fn has_extension(name: &str, extensions: &[String]) -> bool {
    Utf8Path::new(name)
        .extension()
        .map(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
        .unwrap_or(false)
}

pub fn utf8_path(path: std::path::PathBuf) -> Result<Utf8PathBuf, OrganizerError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| OrganizerError::Filesystem(format!("non-utf8 path {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        let exts = vec!["nii".to_string(), "bval".to_string()];
        assert!(has_extension("T1w.NII", &exts));
        assert!(has_extension("dwi.bval", &exts));
        assert!(!has_extension("dwi.json", &exts));
        assert!(!has_extension("nii", &exts));
    }

    #[test]
    fn listing_separates_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_path(dir.path().to_path_buf()).unwrap();
        fs::create_dir(root.join("b_dir").as_std_path()).unwrap();
        fs::create_dir(root.join("a_dir").as_std_path()).unwrap();
        fs::write(root.join("z.nii").as_std_path(), b"x").unwrap();
        fs::write(root.join("c.bval").as_std_path(), b"x").unwrap();

        assert_eq!(list_dir_names(&root).unwrap(), vec!["a_dir", "b_dir"]);
        assert_eq!(list_file_names(&root).unwrap(), vec!["c.bval", "z.nii"]);
    }

    #[test]
    fn listing_missing_dir_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_path(dir.path().join("absent")).unwrap();
        let err = list_dir_names(&root).unwrap_err();
        assert!(matches!(err, OrganizerError::PathNotFound(path) if path == root));
    }

    #[test]
    fn move_file_relocates() {
        let dir = tempfile::tempdir().unwrap();
        let root = utf8_path(dir.path().to_path_buf()).unwrap();
        let source = root.join("a.nii");
        let dest = root.join("a_moved.nii");
        fs::write(source.as_std_path(), b"vol").unwrap();
        move_file(&source, &dest).unwrap();
        assert!(!source.as_std_path().exists());
        assert_eq!(fs::read(dest.as_std_path()).unwrap(), b"vol");
    }
}
