//! Output module for linkcheck
//!
//! Markdown page export (path layout, frontmatter, content-hash
//! idempotence) and the per-host boilerplate detector that cleans the
//! exported text.

mod boilerplate;
mod exporter;

pub use boilerplate::BoilerplateDetector;
pub use exporter::{build_empty_content_fallback, markdown_file_path};
