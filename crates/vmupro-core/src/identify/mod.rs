pub mod matcher;
pub mod metadata;
pub mod serial;

pub use matcher::Matcher;
