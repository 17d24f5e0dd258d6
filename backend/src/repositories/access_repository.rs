use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::database::{Database, IsolationLevel};
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{
    AccessPolicy, CodeBatch, Invitation, InvitationStatus, InviteCode, NewRegistration, Registration,
};

const CODE_COLUMNS: &str = "id, batch_id, tenant_id, pool_id, code, uses_per_code, used_count, status, \
                            expires_at, created_at, updated_at";

const INVITATION_COLUMNS: &str = "id, tenant_id, pool_id, email, token, status, expires_at, sent_count, \
                                  accepted_at, accepted_by, created_at";

/// Invite codes, code batches, invitations and registrations.
///
/// Every operation that consumes a use runs read, compute and write inside
/// a single serializable transaction with the target row locked.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    async fn find_pool_policy(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Option<AccessPolicy>>;

    /// Lookup by normalized code text
    async fn find_code(&self, code: &str, tenant_id: Uuid) -> AppResult<Option<InviteCode>>;

    /// Consume one use of a code, optionally registering the redeemer in the
    /// same transaction. Returns the code as written.
    async fn redeem_code(
        &self,
        code_id: Uuid,
        tenant_id: Uuid,
        registration: Option<NewRegistration>,
        now: DateTime<Utc>,
    ) -> AppResult<InviteCode>;

    async fn set_code_paused(
        &self,
        code_id: Uuid,
        tenant_id: Uuid,
        paused: bool,
        now: DateTime<Utc>,
    ) -> AppResult<InviteCode>;

    /// Codes are globally unique, not per tenant
    async fn code_exists(&self, code: &str) -> AppResult<bool>;

    async fn create_batch(&self, batch: CodeBatch, codes: Vec<InviteCode>) -> AppResult<CodeBatch>;

    async fn find_batch(&self, batch_id: Uuid, tenant_id: Uuid) -> AppResult<Option<CodeBatch>>;

    async fn find_invitation_by_token(&self, token: &str, tenant_id: Uuid) -> AppResult<Option<Invitation>>;

    /// A PENDING, unexpired invitation for this email and pool
    async fn find_open_invitation(
        &self,
        pool_id: Uuid,
        tenant_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>>;

    async fn create_invitation(&self, invitation: Invitation) -> AppResult<Invitation>;

    /// Move a PENDING invitation to ACCEPTED exactly once
    async fn redeem_invitation(
        &self,
        invitation_id: Uuid,
        tenant_id: Uuid,
        email: String,
        registration: Option<NewRegistration>,
        now: DateTime<Utc>,
    ) -> AppResult<Invitation>;
}

/// PostgreSQL implementation of [`AccessRepository`]
pub struct PgAccessRepository {
    db: Database,
}

impl PgAccessRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

async fn lock_code(conn: &mut PgConnection, code_id: Uuid, tenant_id: Uuid) -> AppResult<InviteCode> {
    let sql = format!(
        "SELECT {} FROM invite_codes WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        CODE_COLUMNS
    );
    sqlx::query_as::<_, InviteCode>(&sql)
        .bind(code_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invite code {} not found", code_id)))
}

async fn lock_invitation(conn: &mut PgConnection, invitation_id: Uuid, tenant_id: Uuid) -> AppResult<Invitation> {
    let sql = format!(
        "SELECT {} FROM invitations WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        INVITATION_COLUMNS
    );
    sqlx::query_as::<_, Invitation>(&sql)
        .bind(invitation_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invitation {} not found", invitation_id)))
}

/// Insert a registration; the (pool_id, user_id) unique key turns a repeat
/// into `Conflict`
async fn insert_registration(conn: &mut PgConnection, registration: &Registration) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO registrations (id, tenant_id, pool_id, user_id, source, source_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(registration.id)
    .bind(registration.tenant_id)
    .bind(registration.pool_id)
    .bind(registration.user_id)
    .bind(&registration.source)
    .bind(registration.source_id)
    .bind(registration.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match RepositoryError::from(e) {
        RepositoryError::Duplicate(_) => AppError::Conflict(format!(
            "User {} is already registered for pool {}",
            registration.user_id, registration.pool_id
        )),
        other => other.into(),
    })?;

    Ok(())
}

#[async_trait]
impl AccessRepository for PgAccessRepository {
    async fn find_pool_policy(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Option<AccessPolicy>> {
        let policy = sqlx::query_scalar::<_, String>(
            r#"
            SELECT access_policy FROM pools WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(pool_id)
        .bind(tenant_id)
        .fetch_optional(self.db.pool())
        .await?;

        policy
            .map(|p| AccessPolicy::from_str(&p).map_err(AppError::Internal))
            .transpose()
    }

    async fn find_code(&self, code: &str, tenant_id: Uuid) -> AppResult<Option<InviteCode>> {
        let sql = format!(
            "SELECT {} FROM invite_codes WHERE code = $1 AND tenant_id = $2",
            CODE_COLUMNS
        );
        let code = sqlx::query_as::<_, InviteCode>(&sql)
            .bind(code)
            .bind(tenant_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(code)
    }

    async fn redeem_code(
        &self,
        code_id: Uuid,
        tenant_id: Uuid,
        registration: Option<NewRegistration>,
        now: DateTime<Utc>,
    ) -> AppResult<InviteCode> {
        self.db
            .transaction(IsolationLevel::Serializable, move |conn| {
                Box::pin(async move {
                    let mut code = lock_code(conn, code_id, tenant_id).await?;
                    let code_use = code.next_use(now)?;

                    sqlx::query(
                        r#"
                        UPDATE invite_codes
                        SET used_count = $2, status = $3, updated_at = $4
                        WHERE id = $1
                        "#,
                    )
                    .bind(code.id)
                    .bind(code_use.used_count)
                    .bind(code_use.status.as_str())
                    .bind(now)
                    .execute(&mut *conn)
                    .await?;

                    if code_use.completes_code {
                        sqlx::query(
                            r#"
                            UPDATE code_batches
                            SET used_codes = used_codes + 1
                            WHERE id = $1
                            "#,
                        )
                        .bind(code.batch_id)
                        .execute(&mut *conn)
                        .await?;
                    }

                    if let Some(registration) = registration {
                        let registration = registration.into_registration(tenant_id, code.id, now);
                        insert_registration(conn, &registration).await?;
                    }

                    code.apply_use(&code_use, now);
                    Ok(code)
                })
            })
            .await
    }

    async fn set_code_paused(
        &self,
        code_id: Uuid,
        tenant_id: Uuid,
        paused: bool,
        now: DateTime<Utc>,
    ) -> AppResult<InviteCode> {
        self.db
            .transaction(IsolationLevel::ReadCommitted, move |conn| {
                Box::pin(async move {
                    let mut code = lock_code(conn, code_id, tenant_id).await?;
                    let status = code.status_after_pause(paused);

                    sqlx::query("UPDATE invite_codes SET status = $2, updated_at = $3 WHERE id = $1")
                        .bind(code.id)
                        .bind(status.as_str())
                        .bind(now)
                        .execute(&mut *conn)
                        .await?;

                    code.status = status.as_str().to_string();
                    code.updated_at = now;
                    Ok(code)
                })
            })
            .await
    }

    async fn code_exists(&self, code: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM invite_codes WHERE code = $1)
            "#,
        )
        .bind(code)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    async fn create_batch(&self, batch: CodeBatch, codes: Vec<InviteCode>) -> AppResult<CodeBatch> {
        self.db
            .transaction(IsolationLevel::ReadCommitted, move |conn| {
                Box::pin(async move {
                    let created = sqlx::query_as::<_, CodeBatch>(
                        r#"
                        INSERT INTO code_batches
                            (id, tenant_id, pool_id, name, uses_per_code, code_count, used_codes, expires_at, created_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                        RETURNING id, tenant_id, pool_id, name, uses_per_code, code_count, used_codes, expires_at, created_at
                        "#,
                    )
                    .bind(batch.id)
                    .bind(batch.tenant_id)
                    .bind(batch.pool_id)
                    .bind(&batch.name)
                    .bind(batch.uses_per_code)
                    .bind(batch.code_count)
                    .bind(batch.used_codes)
                    .bind(batch.expires_at)
                    .bind(batch.created_at)
                    .fetch_one(&mut *conn)
                    .await?;

                    let ids: Vec<Uuid> = codes.iter().map(|c| c.id).collect();
                    let texts: Vec<String> = codes.iter().map(|c| c.code.clone()).collect();

                    sqlx::query(
                        r#"
                        INSERT INTO invite_codes
                            (id, batch_id, tenant_id, pool_id, code, uses_per_code, used_count, status,
                             expires_at, created_at, updated_at)
                        SELECT ids.id, $3, $4, $5, ids.code, $6, 0, 'UNUSED', $7, $8, $8
                        FROM UNNEST($1::uuid[], $2::text[]) AS ids(id, code)
                        "#,
                    )
                    .bind(ids)
                    .bind(texts)
                    .bind(created.id)
                    .bind(created.tenant_id)
                    .bind(created.pool_id)
                    .bind(created.uses_per_code)
                    .bind(created.expires_at)
                    .bind(created.created_at)
                    .execute(&mut *conn)
                    .await?;

                    Ok(created)
                })
            })
            .await
    }

    async fn find_batch(&self, batch_id: Uuid, tenant_id: Uuid) -> AppResult<Option<CodeBatch>> {
        let batch = sqlx::query_as::<_, CodeBatch>(
            r#"
            SELECT id, tenant_id, pool_id, name, uses_per_code, code_count, used_codes, expires_at, created_at
            FROM code_batches
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(batch_id)
        .bind(tenant_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(batch)
    }

    async fn find_invitation_by_token(&self, token: &str, tenant_id: Uuid) -> AppResult<Option<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations WHERE token = $1 AND tenant_id = $2",
            INVITATION_COLUMNS
        );
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(token)
            .bind(tenant_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(invitation)
    }

    async fn find_open_invitation(
        &self,
        pool_id: Uuid,
        tenant_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Invitation>> {
        let sql = format!(
            "SELECT {} FROM invitations \
             WHERE pool_id = $1 AND tenant_id = $2 AND lower(email) = lower($3) \
               AND status = 'PENDING' AND expires_at > $4 \
             ORDER BY created_at DESC LIMIT 1",
            INVITATION_COLUMNS
        );
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(pool_id)
            .bind(tenant_id)
            .bind(email)
            .bind(now)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(invitation)
    }

    async fn create_invitation(&self, invitation: Invitation) -> AppResult<Invitation> {
        let sql = format!(
            "INSERT INTO invitations ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {cols}",
            cols = INVITATION_COLUMNS
        );
        let created = sqlx::query_as::<_, Invitation>(&sql)
            .bind(invitation.id)
            .bind(invitation.tenant_id)
            .bind(invitation.pool_id)
            .bind(&invitation.email)
            .bind(&invitation.token)
            .bind(&invitation.status)
            .bind(invitation.expires_at)
            .bind(invitation.sent_count)
            .bind(invitation.accepted_at)
            .bind(invitation.accepted_by)
            .bind(invitation.created_at)
            .fetch_one(self.db.pool())
            .await?;

        Ok(created)
    }

    async fn redeem_invitation(
        &self,
        invitation_id: Uuid,
        tenant_id: Uuid,
        email: String,
        registration: Option<NewRegistration>,
        now: DateTime<Utc>,
    ) -> AppResult<Invitation> {
        self.db
            .transaction(IsolationLevel::Serializable, move |conn| {
                Box::pin(async move {
                    let mut invitation = lock_invitation(conn, invitation_id, tenant_id).await?;
                    invitation.check_redeemable(now)?;
                    invitation.check_email(&email)?;

                    let accepted_by = registration.as_ref().map(|r| r.user_id);

                    sqlx::query(
                        r#"
                        UPDATE invitations
                        SET status = $2, accepted_at = $3, accepted_by = $4
                        WHERE id = $1
                        "#,
                    )
                    .bind(invitation.id)
                    .bind(InvitationStatus::Accepted.as_str())
                    .bind(now)
                    .bind(accepted_by)
                    .execute(&mut *conn)
                    .await?;

                    if let Some(registration) = registration {
                        let registration = registration.into_registration(tenant_id, invitation.id, now);
                        insert_registration(conn, &registration).await?;
                    }

                    invitation.status = InvitationStatus::Accepted.as_str().to_string();
                    invitation.accepted_at = Some(now);
                    invitation.accepted_by = accepted_by;
                    Ok(invitation)
                })
            })
            .await
    }
}
