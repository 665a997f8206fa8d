use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct FileData {
    pub content: Vec<u8>,
    pub filename: String,
}

impl FileData {
    pub fn new(content: Vec<u8>, filename: String) -> Self {
        Self { content, filename }
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Extension of the original filename including the dot, or empty.
    pub fn extension(&self) -> &str {
        let base = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.filename);
        match base.rfind('.') {
            Some(0) | None => "",
            Some(i) => &base[i..],
        }
    }
}

/// Metadata of a stored file, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str) -> FileData {
        FileData::new(vec![1], name.to_string())
    }

    #[test]
    fn extension_keeps_the_dot() {
        assert_eq!(data("photo.png").extension(), ".png");
        assert_eq!(data("archive.tar.gz").extension(), ".gz");
    }

    #[test]
    fn extension_ignores_dotfiles_and_directories() {
        assert_eq!(data("README").extension(), "");
        assert_eq!(data(".bashrc").extension(), "");
        assert_eq!(data("some.dir/file").extension(), "");
    }
}
