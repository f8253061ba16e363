use camino::{Utf8Path, Utf8PathBuf};

use crate::config::ResolvedConfig;
use crate::identifier::SubjectKey;

pub const STAGING_DIR: &str = "NIFTI_Converted";
pub const CONVERTED_DIR: &str = "converted";

/// Directory layout of a study: raw acquisitions, converter staging and the
/// organized data tree.
#[derive(Debug, Clone)]
pub struct Layout {
    input_root: Utf8PathBuf,
    staging_root: Utf8PathBuf,
    data_root: Utf8PathBuf,
}

impl Layout {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(&config.raw_root, &config.input_root, &config.data_root)
    }

    pub fn new(raw_root: &Utf8Path, input_root: &Utf8Path, data_root: &Utf8Path) -> Self {
        Self {
            input_root: input_root.to_path_buf(),
            staging_root: raw_root.join(STAGING_DIR),
            data_root: data_root.to_path_buf(),
        }
    }

    pub fn input_root(&self) -> &Utf8Path {
        &self.input_root
    }

    pub fn staging_root(&self) -> &Utf8Path {
        &self.staging_root
    }

    pub fn data_root(&self) -> &Utf8Path {
        &self.data_root
    }

    /// True when `path` is the staging root, which sits inside the input root
    /// whenever raw acquisitions are read straight from the raw root.
    pub fn is_staging_root(&self, path: &Utf8Path) -> bool {
        path == self.staging_root.as_path()
    }

    pub fn input_session_dir(&self, session: &str) -> Utf8PathBuf {
        self.input_root.join(session)
    }

    pub fn staging_session_dir(&self, session: &str) -> Utf8PathBuf {
        self.staging_root.join(session)
    }

    /// `NIFTI_Converted/<session>/<subject>_<scan>`; its existence marks the
    /// acquisition as converted.
    pub fn staging_dir(&self, session: &str, key: &SubjectKey) -> Utf8PathBuf {
        self.staging_session_dir(session).join(key.to_string())
    }

    pub fn organized_dir(&self, key: &SubjectKey, folder: &str) -> Utf8PathBuf {
        self.data_root
            .join(key.to_string())
            .join(CONVERTED_DIR)
            .join(folder)
    }

    pub fn organized_path(&self, key: &SubjectKey, folder: &str, name: &str) -> Utf8PathBuf {
        self.organized_dir(key, folder).join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = Layout::new(
            Utf8Path::new("/study/raw"),
            Utf8Path::new("/study/raw/raw_mri/WPC-9080"),
            Utf8Path::new("/study/data"),
        );
        let key = SubjectKey::new("SP000", "2");

        assert_eq!(
            layout.staging_dir("20240105", &key),
            Utf8PathBuf::from("/study/raw/NIFTI_Converted/20240105/SP000_2")
        );
        assert_eq!(
            layout.input_session_dir("20240105"),
            Utf8PathBuf::from("/study/raw/raw_mri/WPC-9080/20240105")
        );
        assert!(
            layout
                .organized_path(&key, "anat", "T1.nii")
                .ends_with("data/SP000_2/converted/anat/T1.nii")
        );
    }
}
