//! Persists composed documents under the destination root.
//!
//! Target paths are logical identifiers, not filesystem paths, until this
//! point: `/` maps to `index.html`, paths ending in `.html` map verbatim,
//! and anything else becomes `<path>/index.html`. Traversal segments are
//! rejected so a hostile path can never write outside the root.

use anyhow::{anyhow, Context, Error};
use std::path::{Path, PathBuf};

pub struct PageWriter {
    root: PathBuf,
}

impl PageWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file a target path maps to, without touching the filesystem.
    pub fn target_file(&self, target_path: &str) -> Result<PathBuf, Error> {
        Ok(self.root.join(relative_file(target_path)?))
    }

    /// Writes one composed document, creating parent directories as needed.
    pub async fn write(&self, target_path: &str, content: &str) -> Result<PathBuf, Error> {
        let file = self.target_file(target_path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        tokio::fs::write(&file, content)
            .await
            .with_context(|| format!("failed to write '{}'", file.display()))?;
        Ok(file)
    }
}

fn relative_file(target_path: &str) -> Result<PathBuf, Error> {
    let trimmed = target_path.trim_matches('/');
    if trimmed
        .split('/')
        .any(|segment| segment == ".." || segment.contains('\\'))
    {
        return Err(anyhow!(
            "target path '{target_path}' would escape the destination root"
        ));
    }

    if trimmed.is_empty() {
        Ok(PathBuf::from("index.html"))
    } else if trimmed.ends_with(".html") {
        Ok(PathBuf::from(trimmed))
    } else {
        Ok(Path::new(trimmed).join("index.html"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn maps_routes_to_files() {
        let writer = PageWriter::new("/site");
        assert_eq!(
            writer.target_file("/").unwrap(),
            PathBuf::from("/site/index.html")
        );
        assert_eq!(
            writer.target_file("/about").unwrap(),
            PathBuf::from("/site/about/index.html")
        );
        assert_eq!(
            writer.target_file("/about/").unwrap(),
            PathBuf::from("/site/about/index.html")
        );
        assert_eq!(
            writer.target_file("/404.html").unwrap(),
            PathBuf::from("/site/404.html")
        );
        assert_eq!(
            writer.target_file("/docs/intro").unwrap(),
            PathBuf::from("/site/docs/intro/index.html")
        );
    }

    #[test]
    fn rejects_traversal_out_of_the_root() {
        let writer = PageWriter::new("/site");
        assert!(writer.target_file("/../etc/passwd").is_err());
        assert!(writer.target_file("/docs/../../escape").is_err());
        assert!(writer.target_file("/docs\\..\\escape").is_err());
    }

    #[tokio::test]
    async fn writes_documents_with_parent_directories() {
        let dir = tempdir().unwrap();
        let writer = PageWriter::new(dir.path());

        let file = writer.write("/docs/intro", "<html>hi</html>").await.unwrap();
        assert_eq!(file, dir.path().join("docs/intro/index.html"));
        assert_eq!(std::fs::read_to_string(file).unwrap(), "<html>hi</html>");
    }
}
