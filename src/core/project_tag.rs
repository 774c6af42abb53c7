//! Marks Xcode projects as protected.
//!
//! `SWIFTSHIELDED = true;` is inserted above every `PRODUCT_NAME =` build
//! setting so a later build phase can detect an already protected tree.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::files;
use crate::utils::io;

pub const MARKER: &str = "SWIFTSHIELDED = true;";
const TARGET: &str = "PRODUCT_NAME =";

/// Tagged project file content, or `None` when nothing was inserted.
///
/// Insertion stops at the first line that already carries the marker, so a
/// tagged project is left as it is.
pub fn tag_project_content(content: &str) -> Option<String> {
    let mut output = String::with_capacity(content.len() + 256);
    let mut inserting = true;
    let mut inserted = 0;

    for line in content.split_inclusive('\n') {
        if inserting {
            if line.contains(MARKER) {
                inserting = false;
            } else if line.contains(TARGET) {
                output.push_str("\t\t");
                output.push_str(MARKER);
                output.push('\n');
                inserted += 1;
            }
        }
        output.push_str(line);
    }

    (inserted > 0).then_some(output)
}

/// Tag every `*.xcodeproj/project.pbxproj` under `base_path`.
///
/// Returns the project files that changed. With `dry_run`, nothing is
/// written.
pub fn tag_projects(base_path: &Path, dry_run: bool) -> Result<Vec<PathBuf>> {
    let mut tagged = Vec::new();

    for bundle in files::find_bundles(base_path, "xcodeproj") {
        let project_file = bundle.join("project.pbxproj");
        if !project_file.is_file() {
            continue;
        }
        let content = io::read_file(&project_file, "read project file")?;
        let Some(updated) = tag_project_content(&content) else {
            continue;
        };
        log_status!("project", "Tagging {}", project_file.display());
        if !dry_run {
            io::write_file_atomic(&project_file, &updated, "tag project file")?;
        }
        tagged.push(project_file);
    }

    Ok(tagged)
}
