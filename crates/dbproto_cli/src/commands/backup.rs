//! The `backup` and `restore` commands.

use dbproto_core::Server;
use tracing::info;

/// Writes `backup.zip` for every database and prints its path.
pub fn create(server: &Server) -> Result<(), Box<dyn std::error::Error>> {
    info!("creating backup");
    let path = server.backup_databases()?;
    println!("Backup written to {}", path.display());
    Ok(())
}

/// Restores every database from `backup.zip` and prints the catalog.
pub fn restore(server: &Server) -> Result<(), Box<dyn std::error::Error>> {
    info!("restoring from backup");
    server.restore_databases()?;
    let databases = server.list_databases();
    println!("Restored {} database(s):", databases.len());
    for name in databases {
        println!("  {name}");
    }
    Ok(())
}
