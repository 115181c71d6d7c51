//! Typed data access for schemes and their slabs

use sqlx::{PgConnection, PgPool};

use super::model::{Scheme, Slab};

pub async fn scheme_exists(conn: &mut PgConnection, scheme_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM schemes WHERE scheme_id = $1)")
        .bind(scheme_id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn fetch_scheme(
    conn: &mut PgConnection,
    scheme_id: i64,
) -> Result<Option<Scheme>, sqlx::Error> {
    sqlx::query_as::<_, Scheme>("SELECT * FROM schemes WHERE scheme_id = $1")
        .bind(scheme_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn list_schemes(pool: &PgPool) -> Result<Vec<Scheme>, sqlx::Error> {
    sqlx::query_as::<_, Scheme>("SELECT * FROM schemes ORDER BY scheme_name, scheme_id")
        .fetch_all(pool)
        .await
}

/// Slabs of a scheme ordered by start day
pub async fn slabs_for(conn: &mut PgConnection, scheme_id: i64) -> Result<Vec<Slab>, sqlx::Error> {
    sqlx::query_as::<_, Slab>(
        r#"
        SELECT start_day, end_day, interest_rate FROM scheme_slabs
        WHERE scheme_id = $1
        ORDER BY start_day
        "#,
    )
    .bind(scheme_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn insert_scheme(
    conn: &mut PgConnection,
    scheme_name: &str,
    description: Option<&str>,
) -> Result<Scheme, sqlx::Error> {
    sqlx::query_as::<_, Scheme>(
        "INSERT INTO schemes (scheme_name, description) VALUES ($1, $2) RETURNING *",
    )
    .bind(scheme_name)
    .bind(description)
    .fetch_one(&mut *conn)
    .await
}

pub async fn update_scheme(
    conn: &mut PgConnection,
    scheme_id: i64,
    scheme_name: &str,
    description: Option<&str>,
) -> Result<Option<Scheme>, sqlx::Error> {
    sqlx::query_as::<_, Scheme>(
        r#"
        UPDATE schemes
        SET scheme_name = $1, description = $2, updated_on = NOW()
        WHERE scheme_id = $3
        RETURNING *
        "#,
    )
    .bind(scheme_name)
    .bind(description)
    .bind(scheme_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn replace_slabs(
    conn: &mut PgConnection,
    scheme_id: i64,
    slabs: &[Slab],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM scheme_slabs WHERE scheme_id = $1")
        .bind(scheme_id)
        .execute(&mut *conn)
        .await?;

    for slab in slabs {
        sqlx::query(
            r#"
            INSERT INTO scheme_slabs (scheme_id, start_day, end_day, interest_rate)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(scheme_id)
        .bind(slab.start_day)
        .bind(slab.end_day)
        .bind(slab.interest_rate)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn pending_loans_using(
    conn: &mut PgConnection,
    scheme_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM loans WHERE scheme_id = $1 AND completion_status = 'Pending'",
    )
    .bind(scheme_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn delete_scheme(conn: &mut PgConnection, scheme_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM schemes WHERE scheme_id = $1")
        .bind(scheme_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
