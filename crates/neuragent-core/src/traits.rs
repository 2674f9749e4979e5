use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Text completion — the language-model collaborator.
pub trait CompletionService: Send + Sync + 'static {
    /// Complete a role-tagged conversation, returning the reply text.
    fn complete(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<String>>;
}

/// Search lookup. An empty result is not an error.
pub trait SearchService: Send + Sync + 'static {
    fn search<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<SearchHit>>>;

    /// Engine name, for logging.
    fn engine(&self) -> &str;
}

/// File read/write primitives. Failures come back as text in the
/// [`ToolResult`], not as errors.
pub trait FileStore: Send + Sync + 'static {
    /// Read from `start_line` (0-indexed), optionally limited to `count` lines.
    fn read<'a>(
        &'a self,
        path: &'a str,
        start_line: usize,
        count: Option<usize>,
    ) -> BoxFuture<'a, ToolResult>;

    /// Write or append `content`, creating parent directories.
    fn write<'a>(&'a self, path: &'a str, content: &'a str, append: bool)
        -> BoxFuture<'a, ToolResult>;
}
