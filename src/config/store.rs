//! Persisting accepted configurations where the engine reads them.

use std::io;
use std::path::Path;

/// Overwrite `path` with `text`, world-readable.
pub async fn persist(path: &Path, text: &str) -> io::Result<()> {
    tokio::fs::write(path, text).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await?;
    }

    tracing::debug!(path = %path.display(), bytes = text.len(), "Config persisted");
    Ok(())
}
