pub mod walk;

pub use walk::{collect_saves, ScanOptions};
