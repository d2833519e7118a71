//! Client-side file set: which statements the user believes are uploaded and
//! an estimated row share per file.
//!
//! Only the server knows the real per-file counts. The shares here are a display
//! estimate (`floor(total / n)`) and the stats become stale as soon as the set is
//! edited locally.

/// Statement file kind, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Pdf,
}

impl FileKind {
    /// Kind for a file name (case-insensitive `.csv` / `.pdf`); None for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".csv") {
            Some(FileKind::Csv)
        } else if lower.ends_with(".pdf") {
            Some(FileKind::Pdf)
        } else {
            None
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            FileKind::Pdf => "📄",
            FileKind::Csv => "📊",
        }
    }
}

/// One uploaded file as the client remembers it. Identity is its index in [`FileSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub kind: FileKind,
    /// Display-only estimate; never an exact server count.
    pub estimated_row_share: u64,
}

impl FileDescriptor {
    /// Meta line shown under the file name, e.g. `~40 transactions`.
    pub fn share_label(&self) -> String {
        format!("~{} transactions", self.estimated_row_share)
    }
}

/// Whether [`StatsSummary`] still mirrors the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsTrust {
    /// Taken from the last successful upload response.
    Authoritative,
    /// The file set was edited locally since; the server still holds the uploaded corpus.
    Stale,
}

/// Aggregate counts of the server's dataset as last known to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub total_rows: u64,
    pub file_count: usize,
    pub trust: StatsTrust,
}

/// `floor(total_rows / file_count)`; zero files yields zero.
pub fn row_share(total_rows: u64, file_count: usize) -> u64 {
    if file_count == 0 {
        return 0;
    }
    total_rows / file_count as u64
}

/// Ordered list of uploaded files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<FileDescriptor>,
}

impl FileSet {
    /// Build a fresh set from uploaded names, spreading `total_rows` evenly.
    /// Names that are not csv/pdf are skipped; callers validate before uploading.
    pub fn from_upload<S: AsRef<str>>(names: &[S], total_rows: u64) -> Self {
        let mut files: Vec<FileDescriptor> = names
            .iter()
            .filter_map(|n| {
                let name = n.as_ref();
                FileKind::from_name(name).map(|kind| FileDescriptor {
                    name: name.to_string(),
                    kind,
                    estimated_row_share: 0,
                })
            })
            .collect();
        let share = row_share(total_rows, files.len());
        for f in &mut files {
            f.estimated_row_share = share;
        }
        Self { files }
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Remove the file at `index`. Returns the removed descriptor, or None when out of range.
    pub fn remove(&mut self, index: usize) -> Option<FileDescriptor> {
        if index >= self.files.len() {
            return None;
        }
        Some(self.files.remove(index))
    }

    /// Recompute every share against `total_rows` (which may be stale).
    pub fn reshare(&mut self, total_rows: u64) {
        let share = row_share(total_rows, self.files.len());
        for f in &mut self.files {
            f.estimated_row_share = share;
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_name_is_case_insensitive() {
        assert_eq!(FileKind::from_name("Jan.CSV"), Some(FileKind::Csv));
        assert_eq!(FileKind::from_name("stmt.Pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_name("notes.txt"), None);
        assert_eq!(FileKind::from_name("csv"), None);
    }

    #[test]
    fn shares_floor_and_may_sum_below_total() {
        let set = FileSet::from_upload(&["a.csv", "b.pdf", "c.csv"], 100);
        assert_eq!(set.len(), 3);
        assert!(set.files().iter().all(|f| f.estimated_row_share == 33));
        let sum: u64 = set.files().iter().map(|f| f.estimated_row_share).sum();
        assert_eq!(sum, 99);
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let mut set = FileSet::from_upload(&["a.csv"], 10);
        assert!(set.remove(3).is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn reshare_uses_given_total() {
        let mut set = FileSet::from_upload(&["a.csv", "b.csv"], 120);
        set.remove(0);
        set.reshare(120);
        assert_eq!(set.files()[0].estimated_row_share, 120);
        assert_eq!(set.files()[0].share_label(), "~120 transactions");
    }
}
