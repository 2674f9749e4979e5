use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use neuragent_core::traits::FileStore;
use neuragent_core::types::ToolResult;

/// File store backed by the local filesystem.
///
/// Relative paths resolve against `working_dir`.
pub struct LocalFileStore {
    working_dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    fn resolve(&self, file_path: &str) -> PathBuf {
        resolve_path(file_path, &self.working_dir)
    }
}

impl Default for LocalFileStore {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileStore for LocalFileStore {
    fn read<'a>(
        &'a self,
        path: &'a str,
        start_line: usize,
        count: Option<usize>,
    ) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let full = self.resolve(path);
            debug!(path = %full.display(), start_line, "Reading file");

            let content = match tokio::fs::read_to_string(&full).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return ToolResult::error(format!("Error: File not found: {}", path));
                }
                Err(e) => return ToolResult::error(format!("Error reading file: {}", e)),
            };

            let lines: Vec<&str> = content.split_inclusive('\n').collect();
            if start_line >= lines.len() {
                return ToolResult::error(format!(
                    "Error: Start line {} is out of range (file has {} lines)",
                    start_line,
                    lines.len()
                ));
            }

            let end = match count {
                Some(n) => start_line.saturating_add(n).min(lines.len()),
                None => lines.len(),
            };
            ToolResult::success(lines[start_line..end].concat())
        })
    }

    fn write<'a>(
        &'a self,
        path: &'a str,
        content: &'a str,
        append: bool,
    ) -> BoxFuture<'a, ToolResult> {
        Box::pin(async move {
            let full = self.resolve(path);
            debug!(path = %full.display(), append, "Writing file");

            match write_file(&full, content, append).await {
                Ok(()) => ToolResult::success(format!("Successfully wrote to {}", path)),
                Err(e) => ToolResult::error(format!("Error writing to file: {}", e)),
            }
        })
    }
}

async fn write_file(path: &Path, content: &str, append: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

fn resolve_path(file_path: &str, working_dir: &Path) -> PathBuf {
    let path = PathBuf::from(file_path);
    if path.is_absolute() {
        path
    } else {
        working_dir.join(path)
    }
}
