/// Schema tests against a real database
///
/// Skipped unless DATABASE_URL points at a PostgreSQL instance.

mod common;

use common::test_pool;
use rentloop_shared::db::migrations::{embedded_count, schema_version};
use rentloop_shared::models::category::Category;

#[tokio::test]
async fn test_all_migrations_applied() {
    let Some(pool) = test_pool().await else { return };

    let version = schema_version(&pool).await.unwrap();
    assert!(version.applied >= embedded_count());
    assert!(version.latest.is_some());
}

#[tokio::test]
async fn test_default_categories_seeded() {
    let Some(pool) = test_pool().await else { return };

    let names: Vec<String> = Category::list(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();

    for expected in ["Camping", "Electronics", "Tools"] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn test_overlap_constraint_backs_up_booking_check() {
    let Some(pool) = test_pool().await else { return };
    let item_id = uuid::Uuid::new_v4();

    let insert = |start: &'static str, end: &'static str| {
        let pool = pool.clone();
        async move {
            sqlx::query(
                "INSERT INTO rentals (item_id, renter_username, start_at, end_at, deposit_cents)
                 VALUES ($1, 'direct', $2::timestamptz, $3::timestamptz, 0)",
            )
            .bind(item_id)
            .bind(start)
            .bind(end)
            .execute(&pool)
            .await
        }
    };

    insert("2031-01-01T10:00:00Z", "2031-01-01T12:00:00Z").await.unwrap();
    let err = insert("2031-01-01T11:00:00Z", "2031-01-01T13:00:00Z")
        .await
        .unwrap_err();
    let code = err.as_database_error().and_then(|e| e.code()).map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("23P01"));

    insert("2031-01-01T12:00:00Z", "2031-01-01T14:00:00Z").await.unwrap();
}
