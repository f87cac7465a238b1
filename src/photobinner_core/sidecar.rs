use std::path::{Path, PathBuf};

/// Names of the files that travel with a media file.
///
/// Example: for "CRW_0001.CRW" these are "CRW_0001.CRW.xmp",
/// "._CRW_0001.CRW" and "CRW_0001.THM".
pub fn companion_names(filename: &str) -> Vec<String> {
    let mut names = vec![format!("{filename}.xmp"), format!("._{filename}")];

    for thumbnailed in [".CRW", ".AVI"] {
        if let Some(stem) = filename.strip_suffix(thumbnailed) {
            names.push(format!("{stem}.THM"));
        }
    }

    names
}

/// A companion that exists next to the media file, with where it should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Companions of `original_name` present in `current_folder`, mapped into
/// `target_folder` under the names that match `final_name`.
pub fn find_companions(
    current_folder: &Path,
    original_name: &str,
    target_folder: &Path,
    final_name: &str,
) -> Vec<CompanionMove> {
    companion_names(original_name)
        .into_iter()
        .zip(companion_names(final_name))
        .map(|(from, to)| (current_folder.join(from), target_folder.join(to)))
        .filter(|(from, _)| from.is_file())
        .map(|(source, destination)| CompanionMove {
            source,
            destination,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_companion_names() {
        assert_eq!(
            companion_names("IMG_1.JPG"),
            vec!["IMG_1.JPG.xmp".to_string(), "._IMG_1.JPG".to_string()]
        );
        assert_eq!(companion_names("CRW_1.CRW")[2], "CRW_1.THM");
        assert_eq!(companion_names("MVI_1.AVI")[2], "MVI_1.THM");
        assert_eq!(companion_names("MVI_1.avi").len(), 2);
    }

    #[test]
    fn test_find_companions_follows_rename() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("CRW_1.CRW").touch().unwrap();
        temp.child("CRW_1.THM").touch().unwrap();
        temp.child("CRW_1.CRW.xmp").touch().unwrap();

        let found = find_companions(temp.path(), "CRW_1.CRW", Path::new("/t"), "CRW_20200101_101010.CRW");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].destination, PathBuf::from("/t/CRW_20200101_101010.CRW.xmp"));
        assert_eq!(found[1].destination, PathBuf::from("/t/CRW_20200101_101010.THM"));
    }
}
