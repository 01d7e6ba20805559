//! Tests for database migrations
//!
//! These tests verify that:
//! - All migrations apply successfully
//! - Schema version is tracked correctly
//! - Reopening an existing file does not re-run migrations or lose rows

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::storage::database::Database;

    /// Helper to create a temporary database for testing
    fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).expect("Failed to create database");
        (db, temp_dir)
    }

    #[test]
    fn test_database_creation() {
        let (db, _temp) = create_test_db();
        assert_eq!(db.get_schema_version(), 1);
    }

    #[test]
    fn test_plans_table_exists() {
        let (db, _temp) = create_test_db();

        let conn = db.conn();
        let mut stmt = conn
            .prepare("PRAGMA table_info(plans)")
            .expect("Failed to prepare PRAGMA");

        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("Failed to get columns")
            .filter_map(Result::ok)
            .collect();

        assert_eq!(columns, vec!["id".to_string(), "data".to_string()]);
    }

    #[test]
    fn test_wal_mode_enabled() {
        let (db, _temp) = create_test_db();

        let journal_mode: String = db
            .conn()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .expect("Failed to get journal_mode");

        assert_eq!(journal_mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("nested").join("plans.db");

        {
            let db = Database::new(&db_path).expect("Failed to create database");
            db.conn()
                .execute(
                    "INSERT INTO plans (id, data) VALUES (?1, ?2)",
                    rusqlite::params![42_i64, b"{}".to_vec()],
                )
                .expect("Failed to insert");
        }

        let db = Database::new(&db_path).expect("Failed to reopen database");
        let versions: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .expect("Failed to count versions");
        assert_eq!(versions, 1, "Migration should only be recorded once");

        let rows: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM plans", [], |row| row.get(0))
            .expect("Failed to count plans");
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_in_memory_database_is_migrated() {
        let db = Database::open_in_memory().expect("Failed to open in-memory db");
        assert_eq!(db.get_schema_version(), 1);
    }
}
