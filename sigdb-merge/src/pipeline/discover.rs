//! Input discovery on the filesystem

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Object file extensions handed to the signature generator
pub const OBJECT_EXTENSIONS: &[&str] = &["o", "lo", "obj"];

/// Archive extensions handed to the unpacker
pub const ARCHIVE_EXTENSIONS: &[&str] = &["a", "lib"];

fn matches_extension(path: &Path, extensions: &[&str]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Every regular file under `root` (recursively) whose extension is in
/// `extensions`, compared case-insensitively. An empty list matches all
/// files. Symbolic links are not followed. The result is sorted.
pub fn find_files(root: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && matches_extension(entry.path(), extensions) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}

/// Object files (`.o`, `.lo`, `.obj`) under `root`
pub fn find_objects(root: &Path) -> io::Result<Vec<PathBuf>> {
    find_files(root, OBJECT_EXTENSIONS)
}

/// Archives (`.a`, `.lib` in any case) under `root`
pub fn find_archives(root: &Path) -> io::Result<Vec<PathBuf>> {
    find_files(root, ARCHIVE_EXTENSIONS)
}

/// Files to merge from an input directory
///
/// The directory holds one sub-directory per version or build of the
/// library; the files directly inside those sub-directories (and directly
/// inside `root`) are returned. Suffix filtering is left to the parser.
pub fn find_pattern_inputs(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_file() {
            found.push(path);
            continue;
        }
        if !path.is_dir() {
            continue;
        }
        log::debug!("listing files in {}", path.display());
        for sub in fs::read_dir(&path)? {
            let sub = sub?.path();
            if sub.is_file() {
                found.push(sub);
            }
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_find_objects_and_archives() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["x/a.o", "x/y/b.lo", "c.OBJ", "d.txt", "libc.a", "v10/rpcproxy.LIB"] {
            touch(&root.join(name));
        }

        let objects = find_objects(root).unwrap();
        assert_eq!(
            objects,
            vec![root.join("c.OBJ"), root.join("x/a.o"), root.join("x/y/b.lo")]
        );

        let archives = find_archives(root).unwrap();
        assert_eq!(archives, vec![root.join("libc.a"), root.join("v10/rpcproxy.LIB")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_find_files_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("x/a.o"));
        std::os::unix::fs::symlink("..", root.join("x/up")).unwrap();
        std::os::unix::fs::symlink(root.join("x"), root.join("again")).unwrap();

        let objects = find_objects(root).unwrap();
        assert_eq!(objects, vec![root.join("x/a.o")]);
    }

    #[test]
    fn test_find_pattern_inputs_is_one_level_deep() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["2.31/a.pac", "2.31/b.pac", "2.35/a.pac", "2.35/deep/c.pac", "top.pac"] {
            touch(&root.join(name));
        }

        let inputs = find_pattern_inputs(root).unwrap();
        assert_eq!(
            inputs,
            vec![
                root.join("2.31/a.pac"),
                root.join("2.31/b.pac"),
                root.join("2.35/a.pac"),
                root.join("top.pac"),
            ]
        );
    }
}
