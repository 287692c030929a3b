use sqlx::postgres::PgPool;
use std::env;

const GENERATION_TABLES: [&str; 6] = ["users", "prompts", "scripts", "audios", "videos", "muxes"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;

    println!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    let existing = sqlx::query_as::<_, (String,)>("SELECT tablename FROM pg_tables WHERE schemaname = 'public'")
        .fetch_all(&pool)
        .await?;
    let existing: Vec<String> = existing.into_iter().map(|(name,)| name).collect();

    println!("Generation tables:");
    let mut missing = 0;
    for table in GENERATION_TABLES {
        if existing.iter().any(|name| name == table) {
            let (rows,) = sqlx::query_as::<_, (i64,)>(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await?;
            println!("  ✅ {} ({} rows)", table, rows);
        } else {
            missing += 1;
            println!("  ❌ {} missing", table);
        }
    }

    println!("\nApplied migrations:");
    let migrations = sqlx::query_as::<_, (i64, String, bool)>(
        "SELECT version, description, success FROM _sqlx_migrations ORDER BY version",
    )
    .fetch_all(&pool)
    .await;

    match migrations {
        Ok(migrations) if migrations.is_empty() => println!("  (none)"),
        Ok(migrations) => {
            for (version, description, success) in migrations {
                println!("  - {} {} (success: {})", version, description, success);
            }
        }
        Err(e) => println!("  ❌ Error querying _sqlx_migrations: {}", e),
    }

    if missing > 0 {
        println!("\n{} table(s) missing. Start the server once to run migrations.", missing);
    }
    Ok(())
}
