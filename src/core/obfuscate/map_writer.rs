use std::path::{Path, PathBuf};

use super::NameTable;
use crate::error::Result;
use crate::utils::io;

pub const OUTPUT_DIR: &str = "swiftshield-output";
pub const MAP_FILE_NAME: &str = "conversionMap.txt";

const HEADER: &str = "//\n//  SwiftShield\n//  Conversion Map\n//\n\nData:\n";

/// Conversion map text: a fixed header, then one `original ===> generated`
/// line per entry, sorted by original name.
pub fn render_map(table: &NameTable) -> String {
    let mut output = String::from(HEADER);
    for (original, generated) in table.iter() {
        output.push('\n');
        output.push_str(original);
        output.push_str(" ===> ");
        output.push_str(generated);
    }
    output
}

pub fn map_path(base_path: &Path) -> PathBuf {
    base_path.join(OUTPUT_DIR).join(MAP_FILE_NAME)
}

/// Write the conversion map under `<base>/swiftshield-output/`.
pub fn write_map(base_path: &Path, table: &NameTable) -> Result<PathBuf> {
    let path = map_path(base_path);
    io::ensure_dir(&base_path.join(OUTPUT_DIR), "create output directory")?;
    log_status!("map", "Generating conversion map at {}", path.display());
    io::write_file_atomic(&path, &render_map(table), "write conversion map")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::super::name_table::testing::SequenceGenerator;
    use super::*;

    #[test]
    fn renders_header_and_sorted_entries() {
        let mut table = NameTable::with_generator(25, Box::new(SequenceGenerator::default()));
        table.resolve("ViewController").unwrap();
        table.resolve("AppDelegate").unwrap();

        assert_eq!(
            render_map(&table),
            "//\n//  SwiftShield\n//  Conversion Map\n//\n\nData:\n\nAppDelegate ===> X2\nViewController ===> X1"
        );
    }

    #[test]
    fn writes_into_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = NameTable::with_generator(25, Box::new(SequenceGenerator::default()));
        table.resolve("Foo").unwrap();

        let path = write_map(dir.path(), &table).unwrap();

        assert_eq!(path, dir.path().join("swiftshield-output/conversionMap.txt"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("\nFoo ===> X1"));
    }

    #[test]
    fn rewriting_the_map_replaces_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = NameTable::with_generator(25, Box::new(SequenceGenerator::default()));
        table.resolve("Foo").unwrap();
        write_map(dir.path(), &table).unwrap();
        table.resolve("Bar").unwrap();
        let path = write_map(dir.path(), &table).unwrap();

        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written.matches("===>").count(), 2);
    }
}
