//! Generated audio artifacts
//!
//! Output files live flat in one directory, are named `chat_<uuid>.<ext>`,
//! and are written once: the bytes are staged in a hidden temporary file in
//! the same directory and renamed into place only when complete. Per-chunk
//! segments are kept in a scoped temporary directory that is removed when the
//! [`Assembly`] is dropped, whether or not it was finished.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::{Error, Result};

/// Directory of servable audio artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    temp_dir: Option<PathBuf>,
    extension: String,
}

/// In-progress concatenation of synthesized segments
pub struct Assembly {
    dir: tempfile::TempDir,
    segments: Vec<PathBuf>,
    extension: String,
}

impl Assembly {
    /// Materialize one segment as its own temporary file
    ///
    /// # Errors
    ///
    /// Returns error if the segment cannot be written
    pub async fn push(&mut self, audio: &[u8]) -> Result<()> {
        let path = self.dir.path().join(format!(
            "part_{:04}_{}.{}",
            self.segments.len(),
            uuid::Uuid::new_v4(),
            self.extension
        ));
        tokio::fs::write(&path, audio).await?;
        self.segments.push(path);
        Ok(())
    }

    /// Number of segments written so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether no segment has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl ArtifactStore {
    /// Open (creating if needed) the output directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            temp_dir: None,
            extension: extension.into(),
        })
    }

    /// Keep segment files under `dir` instead of the system temp directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &dir {
            std::fs::create_dir_all(dir)?;
        }
        self.temp_dir = dir;
        Ok(self)
    }

    /// Directory artifacts are served from
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Start collecting segments for one output file
    ///
    /// # Errors
    ///
    /// Returns error if the scoped temporary directory cannot be created
    pub fn begin(&self) -> Result<Assembly> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("segments_");
        let dir = match &self.temp_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(Assembly {
            dir,
            segments: Vec::new(),
            extension: self.extension.clone(),
        })
    }

    /// Concatenate all segments, in order, into a new artifact
    ///
    /// Returns the bare filename of the artifact. The segment directory is
    /// removed on return.
    ///
    /// # Errors
    ///
    /// Returns error if a segment cannot be read or the artifact written
    pub async fn finish(&self, assembly: Assembly) -> Result<String> {
        let (name, staging) = self.stage()?;
        let mut out = tokio::fs::File::from_std(staging.reopen()?);

        for segment in &assembly.segments {
            let mut input = tokio::fs::File::open(segment).await?;
            tokio::io::copy(&mut input, &mut out).await?;
        }
        out.flush().await?;
        drop(out);

        staging
            .persist(self.output_dir.join(&name))
            .map_err(|e| e.error)?;
        tracing::debug!(file = %name, segments = assembly.segments.len(), "assembled artifact");
        Ok(name)
    }

    /// Write a new artifact directly from bytes
    ///
    /// # Errors
    ///
    /// Returns error if the artifact cannot be written
    pub async fn write(&self, bytes: &[u8]) -> Result<String> {
        let (name, staging) = self.stage()?;
        tokio::fs::write(staging.path(), bytes).await?;
        staging
            .persist(self.output_dir.join(&name))
            .map_err(|e| e.error)?;
        Ok(name)
    }

    /// Resolve a served filename to a path inside the output directory
    ///
    /// Names that could escape the directory or that refer to staging files
    /// resolve to `None`, as do names with no file behind them.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let safe = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0'])
            && name != "..";
        if !safe {
            return None;
        }

        let path = self.output_dir.join(name);
        path.is_file().then_some(path)
    }

    /// Read a served artifact
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such artifact exists
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self
            .resolve(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(tokio::fs::read(path).await?)
    }

    /// Reserve a fresh artifact name with a hidden staging file next to it
    fn stage(&self) -> Result<(String, tempfile::NamedTempFile)> {
        let name = format!("chat_{}.{}", uuid::Uuid::new_v4(), self.extension);
        let staging = tempfile::Builder::new()
            .prefix(".staging_")
            .tempfile_in(&self.output_dir)?;
        Ok((name, staging))
    }
}

/// Content type for a served artifact, by extension
#[must_use]
pub fn content_type(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"), "mp3")
            .unwrap()
            .with_temp_dir(Some(dir.path().join("tmp")))
            .unwrap();
        (dir, store)
    }

    fn entries(path: &Path) -> usize {
        std::fs::read_dir(path).unwrap().count()
    }

    #[tokio::test]
    async fn concatenates_segments_in_order() {
        let (dir, store) = store();
        let mut assembly = store.begin().unwrap();
        assembly.push(b"abc").await.unwrap();
        assembly.push(b"").await.unwrap();
        assembly.push(b"defg").await.unwrap();
        assert_eq!(assembly.len(), 3);

        let name = store.finish(assembly).await.unwrap();
        assert!(name.starts_with("chat_") && name.ends_with(".mp3"));
        assert_eq!(store.read(&name).await.unwrap(), b"abcdefg");

        // segments and staging files are gone
        assert_eq!(entries(&dir.path().join("tmp")), 0);
        assert_eq!(entries(store.output_dir()), 1);
    }

    #[tokio::test]
    async fn dropped_assembly_leaves_nothing_behind() {
        let (dir, store) = store();
        let mut assembly = store.begin().unwrap();
        assembly.push(b"partial").await.unwrap();
        drop(assembly);

        assert_eq!(entries(&dir.path().join("tmp")), 0);
        assert_eq!(entries(store.output_dir()), 0);
    }

    #[tokio::test]
    async fn empty_artifact() {
        let (_dir, store) = store();
        let name = store.write(b"").await.unwrap();
        assert!(store.read(&name).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn names_are_unique() {
        let (_dir, store) = store();
        let a = store.write(b"1").await.unwrap();
        let b = store.write(b"1").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let (_dir, store) = store();
        let err = store.read("chat_missing.mp3").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn rejects_escaping_names() {
        let (dir, store) = store();
        std::fs::write(dir.path().join("secret.txt"), b"x").unwrap();

        assert!(store.resolve("../secret.txt").is_none());
        assert!(store.resolve("..").is_none());
        assert!(store.resolve("").is_none());
        assert!(store.resolve(".staging_abc").is_none());
        assert!(store.resolve("a\\b").is_none());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("chat_1.mp3"), "audio/mpeg");
        assert_eq!(content_type("chat_1.WAV"), "audio/wav");
        assert_eq!(content_type("notes"), "application/octet-stream");
    }
}
