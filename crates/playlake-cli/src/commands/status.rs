use anyhow::Result;
use std::path::Path;

use playlake_etl::table_status;
use playlake_etl::tables::ALL_TABLES;

pub fn show_status(output_dir: &Path) -> Result<()> {
    println!("\nPlaylake Status\n");
    println!("  Output: {}\n", output_dir.display());

    let mut missing = 0;
    for table in ALL_TABLES {
        match table_status(output_dir, table)? {
            Some(status) => {
                let state = if status.complete { "complete" } else { "incomplete" };
                println!(
                    "  {:<16} {:<10} {} partitions, {} files",
                    table, state, status.partitions, status.files
                );
            }
            None => {
                missing += 1;
                println!("  {:<16} missing", table);
            }
        }
    }

    if missing > 0 {
        println!("\n  Run `playlake run` to build the missing tables");
    }

    Ok(())
}
