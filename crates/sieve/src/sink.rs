use {
    crate::ranker::Shortlist,
    anyhow::{Context, Result},
    itertools::Itertools,
    std::path::{Path, PathBuf},
    tokio::fs,
    tracing::debug,
};

/// The file the [Shortlist] ends up in.
///
/// The content is plain UTF-8 text, one address per line, no header or footer.
/// An empty file is a valid result that means no address has qualified.
#[derive(Clone, Debug)]
pub struct Sink {
    path: PathBuf,
}

impl Sink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empties the file, creating it if necessary.
    ///
    /// Meant to be called before probing starts, which also proves the path
    /// is writable. Note that nothing is renamed atomically: if the run dies
    /// after this call, the file stays empty.
    pub async fn truncate(&self) -> Result<()> {
        fs::write(&self.path, b"")
            .await
            .with_context(|| format!("cannot truncate {}", self.path.display()))?;

        debug!(path = %self.path.display(), "output has been truncated");
        Ok(())
    }

    /// Overwrites the file with the given [Shortlist].
    pub async fn write(&self, shortlist: &Shortlist) -> Result<()> {
        fs::write(&self.path, Self::render(shortlist))
            .await
            .with_context(|| format!("cannot write the shortlist to {}", self.path.display()))
    }

    /// Renders the [Shortlist] the way it's stored: addresses joined by newlines.
    pub fn render(shortlist: &Shortlist) -> String {
        shortlist.addresses().join("\n")
    }
}
