//! Scheme registry: CRUD over penalty schemes

use sqlx::PgPool;
use validator::Validate;

use super::model::{validate_slabs, Scheme, SchemeDetail, SchemeRequest, Slab};
use super::repository as repo;
use crate::error::LedgerError;

#[derive(Clone)]
pub struct SchemeService {
    db_pool: PgPool,
}

impl SchemeService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn create_scheme(&self, request: SchemeRequest) -> Result<SchemeDetail, LedgerError> {
        let slabs = check_request(&request)?;

        let mut tx = self.db_pool.begin().await?;
        let scheme =
            repo::insert_scheme(&mut tx, &request.scheme_name, request.description.as_deref())
                .await?;
        repo::replace_slabs(&mut tx, scheme.scheme_id, &slabs).await?;
        tx.commit().await?;

        tracing::info!(scheme_id = scheme.scheme_id, slabs = slabs.len(), "Scheme created");
        Ok(SchemeDetail { scheme, slabs })
    }

    /// Rename a scheme and replace its slab table in one transaction
    pub async fn update_scheme(
        &self,
        scheme_id: i64,
        request: SchemeRequest,
    ) -> Result<SchemeDetail, LedgerError> {
        let slabs = check_request(&request)?;

        let mut tx = self.db_pool.begin().await?;
        let scheme = repo::update_scheme(
            &mut tx,
            scheme_id,
            &request.scheme_name,
            request.description.as_deref(),
        )
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Scheme #{}", scheme_id)))?;
        repo::replace_slabs(&mut tx, scheme_id, &slabs).await?;
        tx.commit().await?;

        tracing::info!(scheme_id, slabs = slabs.len(), "Scheme updated");
        Ok(SchemeDetail { scheme, slabs })
    }

    pub async fn get_scheme(&self, scheme_id: i64) -> Result<SchemeDetail, LedgerError> {
        let mut conn = self.db_pool.acquire().await?;
        let scheme = repo::fetch_scheme(&mut conn, scheme_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("Scheme #{}", scheme_id)))?;
        let slabs = repo::slabs_for(&mut conn, scheme_id).await?;
        Ok(SchemeDetail { scheme, slabs })
    }

    pub async fn list_schemes(&self) -> Result<Vec<Scheme>, LedgerError> {
        Ok(repo::list_schemes(&self.db_pool).await?)
    }

    /// Refused while any Pending loan still references the scheme
    pub async fn delete_scheme(&self, scheme_id: i64) -> Result<(), LedgerError> {
        let mut tx = self.db_pool.begin().await?;

        let in_use = repo::pending_loans_using(&mut tx, scheme_id).await?;
        if in_use > 0 {
            return Err(LedgerError::Conflict(format!(
                "Scheme #{} is used by {} pending loan(s)",
                scheme_id, in_use
            )));
        }
        if repo::delete_scheme(&mut tx, scheme_id).await? == 0 {
            return Err(LedgerError::not_found(format!("Scheme #{}", scheme_id)));
        }
        tx.commit().await?;

        tracing::info!(scheme_id, "Scheme deleted");
        Ok(())
    }
}

/// Field and slab checks shared by create and update
pub fn check_request(request: &SchemeRequest) -> Result<Vec<Slab>, LedgerError> {
    request
        .validate()
        .map_err(|e| LedgerError::validation(e.to_string()))?;
    validate_slabs(&request.slabs)
}
