use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id  TEXT PRIMARY KEY,
        doc JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id      TEXT PRIMARY KEY,
        user_id TEXT,
        email   TEXT,
        doc     JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS students_user_id_idx ON students (user_id)",
    "CREATE INDEX IF NOT EXISTS students_email_idx ON students (lower(email))",
    r#"
    CREATE TABLE IF NOT EXISTS drives (
        id     TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        doc    JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS enrollments (
        id          TEXT PRIMARY KEY,
        student_id  TEXT NOT NULL,
        drive_id    TEXT NOT NULL,
        status      TEXT NOT NULL,
        revision    BIGINT NOT NULL DEFAULT 0,
        enrolled_at TIMESTAMPTZ NOT NULL,
        doc         JSONB NOT NULL,
        UNIQUE (student_id, drive_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS enrollments_drive_idx ON enrollments (drive_id)",
];

/// Creates the document tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}
