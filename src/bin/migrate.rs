use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::env;
use std::fs;
use std::path::Path;

/// Applies migrations/init.sql to the configured database and, when
/// SEED_ADMIN_PASSWORD is set, seeds an initial superadmin account.
fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    println!("Starting database migration...");

    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "data/barangay.db".to_string());
    if let Some(parent) = Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(&db_path);
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;
    let conn = pool.get()?;

    let migration_path =
        env::var("MIGRATION_FILE").unwrap_or_else(|_| "migrations/init.sql".to_string());
    if !Path::new(&migration_path).exists() {
        println!("Migration file not found at: {}", migration_path);
        return Ok(());
    }

    let sql_content = fs::read_to_string(&migration_path)?;
    // Schema uses IF NOT EXISTS throughout, so re-running is harmless.
    conn.execute_batch(&sql_content)?;
    println!("Schema applied to {}", db_path);

    if let Ok(password) = env::var("SEED_ADMIN_PASSWORD") {
        let username =
            env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "superadmin".to_string());
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            [&username],
            |row| row.get(0),
        )?;
        if existing == 0 {
            conn.execute(
                "INSERT INTO users (id, username, password, role, full_name, position, is_active, created_at)
                 VALUES (?1, ?2, ?3, 'superadmin', 'System Administrator', 'Administrator', 1, ?4)",
                rusqlite::params![
                    uuid::Uuid::new_v4().to_string(),
                    username,
                    barangay_fms::auth::hash_password(&password),
                    chrono::Utc::now().to_rfc3339(),
                ],
            )?;
            println!("Seeded superadmin account '{}'", username);
        } else {
            println!("Account '{}' already exists, skipping seed.", username);
        }
    }

    println!("Migration complete.");
    Ok(())
}
