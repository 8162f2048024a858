use std::path::Path;

use crate::heap_error::{ErrorLayer, HeapError, Result};

pub fn write_file_ensuring_parent_dir(file_path: &Path, contents: &str) -> Result<()> {
    let parent_path = match file_path.parent() {
        Some(p) => p,
        None => {
            return Err(HeapError::fatal(
                ErrorLayer::BadInput,
                format!("Problem getting parent of '{}'", file_path.display()),
            ));
        }
    };
    // A bare file name has an empty parent, which is the working directory.
    if !parent_path.as_os_str().is_empty() {
        if let Err(e) = std::fs::create_dir_all(parent_path) {
            return Err(HeapError::fatal(
                ErrorLayer::BadInput,
                format!("Problem creating parent of '{}': {}", file_path.display(), e),
            ));
        }
    }
    if let Err(e) = std::fs::write(file_path, contents) {
        return Err(HeapError::fatal(
            ErrorLayer::BadInput,
            format!("Problem writing '{}': {}", file_path.display(), e),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::temp_dir::TempDir;

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = TempDir::new("heapgraph-file-utils-test");
        let path = dir.join("nested").join("out.dot");
        write_file_ensuring_parent_dir(&path, "digraph heap {}\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "digraph heap {}\n");
    }
}
