use serde::{Deserialize, Serialize};

/// Branch an executor task is handled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ReadFile,
    WriteFile,
    General,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ReadFile => "read_file",
            TaskKind::WriteFile => "write_file",
            TaskKind::General => "general",
        }
    }
}

/// Best-effort keyword classifier over a task description.
///
/// Case-insensitive substring matching: a description mentioning both
/// "read" and "file" is a read, otherwise "write" and "file" is a write.
/// "Read the notes and write a file" is therefore classified as a read.
pub fn classify(description: &str) -> TaskKind {
    let lower = description.to_lowercase();
    let has_file = lower.contains("file");
    if has_file && lower.contains("read") {
        TaskKind::ReadFile
    } else if has_file && lower.contains("write") {
        TaskKind::WriteFile
    } else {
        TaskKind::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("Read the file data.txt"), TaskKind::ReadFile);
        assert_eq!(classify("WRITE results to FILE out.md"), TaskKind::WriteFile);
        assert_eq!(classify("Summarize the findings"), TaskKind::General);
        assert_eq!(classify("Read the chapter"), TaskKind::General);
        // Read wins when both verbs appear.
        assert_eq!(classify("read input and write file"), TaskKind::ReadFile);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TaskKind::WriteFile).unwrap();
        assert_eq!(json, "\"write_file\"");
        assert_eq!(TaskKind::ReadFile.as_str(), "read_file");
    }
}
