/// Trait for reporting progress of long-running operations.
///
/// CLI implements with indicatif. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_download_start(&self, _url: &str) {}
    fn on_download_complete(&self, _games: usize, _duration_secs: f64) {}
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _files_found: usize, _current_path: &str) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_match_start(&self, _total_files: usize) {}
    fn on_match_complete(&self, _matched: usize, _unmatched: usize, _duration_secs: f64) {}
    fn on_convert_start(&self, _total_files: usize) {}
    fn on_convert_progress(&self, _files_done: usize, _total_files: usize, _current_path: &str) {}
    fn on_convert_complete(&self, _converted: usize, _failed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
