/// Switches for one organize run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Decide and log everything, touch nothing.
    pub simulate: bool,
    /// Move files into their synthesized directory; otherwise rename them
    /// where they are.
    pub create_subdirectories: bool,
    /// Walk below the root (never into `invalid` or `duplicates`).
    pub recursive: bool,
    /// Remove directories left empty once every file is handled. Only
    /// directories found by a recursive walk are candidates.
    pub delete_empty_directories: bool,
    /// Name unresolved files after their modification time instead of
    /// moving them to `invalid`.
    pub treat_unresolved_as_file_time: bool,
    /// Add one hour to bare QuickTime creation dates.
    pub apply_dst_adjustment: bool,
    /// Files processed at once. Zero is treated as one.
    pub concurrency: usize,
    /// Sample paths kept per statistics category.
    pub sample_limit: usize,
}
impl Default for Options {
    fn default() -> Self {
        Self {
            simulate: false,
            create_subdirectories: true,
            recursive: false,
            delete_empty_directories: false,
            treat_unresolved_as_file_time: false,
            apply_dst_adjustment: false,
            concurrency: 1,
            sample_limit: 10,
        }
    }
}
impl Options {
    pub(crate) fn workers(&self) -> usize {
        self.concurrency.max(1)
    }
}
