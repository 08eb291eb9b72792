//! The `list` command: databases, tables, or records.

use dbproto_core::{Scalar, Server};

/// Lists databases, a database's tables, or a table's records.
pub fn run(
    server: &Server,
    database: Option<&str>,
    table: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(db_name) = database else {
        let databases = server.list_databases();
        if databases.is_empty() {
            println!("No databases.");
        } else {
            println!("Databases:");
            for name in databases {
                println!("  {name}");
            }
        }
        return Ok(());
    };

    let db = server.database(db_name)?;
    let Some(table_name) = table else {
        println!("Tables in {db_name}:");
        for name in db.list_tables() {
            println!("  {name}");
        }
        return Ok(());
    };

    let table = db.table(table_name)?;
    let primary_key = table.primary_key().to_string();
    let mut records = table.select_all()?;
    records.sort_by_key(|record| {
        record
            .get(&primary_key)
            .map(Scalar::key_string)
            .unwrap_or_default()
    });

    println!("Records in {db_name}.{table_name}:");
    for record in records {
        let mut fields: Vec<(&String, &Scalar)> = record.iter().collect();
        // Primary key first, the rest alphabetical.
        fields.sort_by_key(|(name, _)| (name.as_str() != primary_key, name.to_string()));
        let rendered: Vec<String> = fields
            .iter()
            .map(|(name, value)| format!("{name}={}", render(value)))
            .collect();
        println!("  {}", rendered.join("  "));
    }
    Ok(())
}

/// Quotes text values so they read unambiguously next to numbers.
fn render(value: &Scalar) -> String {
    match value {
        Scalar::Text(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}
