use anyhow::{Context, Result};
use arrow::array::Array;
use std::path::PathBuf;

use cellscape::ingest::load_csv_files;

/// Display the inferred schema of each CSV file
pub fn run(files: Vec<PathBuf>) -> Result<()> {
    let loaded = load_csv_files(&files).context("Failed to read input files")?;

    for entry in &loaded {
        let table = &entry.table;
        println!("CSV File Information");
        println!("====================");
        println!("File: {}", entry.path.display());
        println!();

        println!("File Statistics:");
        println!("  Rows: {}", table.num_rows());
        println!("  Columns: {}", table.num_columns());
        println!();

        println!("Schema:");
        for (i, (field, column)) in table
            .schema()
            .fields()
            .iter()
            .zip(table.batch().columns())
            .enumerate()
        {
            println!(
                "  {:3}. {} ({}, {} missing)",
                i + 1,
                field.name(),
                field.data_type(),
                column.null_count()
            );
        }
        println!();
    }

    if loaded.len() > 1 {
        println!("All {} files share the same column set.", loaded.len());
    }

    Ok(())
}
