use crate::config::AccessConfig;
use crate::database::with_retry;
use crate::error::{AppError, AppResult};
use crate::models::{
    normalize_code, normalize_email, AccessPolicy, CodeBatch, CodeStatus, Invitation, InvitationStatus,
    InviteCode, NewRegistration, RegistrationSource,
};
use crate::repositories::AccessRepository;
use crate::services::AuditTrailService;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Unambiguous code characters (no 0/O, 1/I); 32 symbols so a byte maps without bias
const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const MAX_CODES_PER_BATCH: i32 = 10_000;

/// Produces a candidate code of the requested length
pub type CodeGenerator = Arc<dyn Fn(usize) -> String + Send + Sync>;

/// Random code from v4 UUID bytes, skipping the version and variant bytes
pub fn random_code(length: usize) -> String {
    let mut code = String::with_capacity(length);
    while code.len() < length {
        let bytes = *Uuid::new_v4().as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            if i == 6 || i == 8 {
                continue;
            }
            if code.len() == length {
                break;
            }
            code.push(CODE_ALPHABET[usize::from(*b) % CODE_ALPHABET.len()] as char);
        }
    }
    code
}

/// 64 hex chars of randomness
fn random_token() -> String {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    hex::encode(bytes)
}

/// Input for a new code batch
#[derive(Debug, Clone)]
pub struct NewCodeBatch {
    pub pool_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub code_count: i32,
    pub uses_per_code: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewCodeBatch {
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Batch name is required".to_string()));
        }
        if self.code_count < 1 || self.code_count > MAX_CODES_PER_BATCH {
            return Err(AppError::Validation(format!(
                "Code count must be between 1 and {}, got {}",
                MAX_CODES_PER_BATCH, self.code_count
            )));
        }
        if self.uses_per_code < 1 {
            return Err(AppError::Validation(format!(
                "Uses per code must be at least 1, got {}",
                self.uses_per_code
            )));
        }
        if matches!(self.expires_at, Some(at) if at <= now) {
            return Err(AppError::Validation("Batch expiry must be in the future".to_string()));
        }
        Ok(())
    }
}

/// Validates and consumes invite codes and email invitations
pub struct AccessRedemptionService {
    repo: Arc<dyn AccessRepository>,
    audit: Option<Arc<AuditTrailService>>,
    config: AccessConfig,
    generator: CodeGenerator,
}

impl AccessRedemptionService {
    pub fn new(repo: Arc<dyn AccessRepository>, config: AccessConfig) -> Self {
        Self {
            repo,
            audit: None,
            config,
            generator: Arc::new(random_code),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditTrailService>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Replace the random code source
    pub fn with_code_generator(mut self, generator: CodeGenerator) -> Self {
        self.generator = generator;
        self
    }

    async fn require_policy(&self, pool_id: Uuid, tenant_id: Uuid, expected: AccessPolicy) -> AppResult<()> {
        let policy = self
            .repo
            .find_pool_policy(pool_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pool {} not found", pool_id)))?;

        if policy != expected {
            return Err(AppError::Conflict(format!(
                "Pool {} uses {} access, not {}",
                pool_id,
                policy.as_str(),
                expected.as_str()
            )));
        }
        Ok(())
    }

    /// Look up a code for a pool and check it can be redeemed right now
    pub async fn validate_code(&self, code: &str, pool_id: Uuid, tenant_id: Uuid) -> AppResult<InviteCode> {
        self.require_policy(pool_id, tenant_id, AccessPolicy::Code).await?;

        let normalized = normalize_code(code);
        let invite_code = self
            .repo
            .find_code(&normalized, tenant_id)
            .await?
            .filter(|c| c.pool_id == pool_id)
            .ok_or_else(|| AppError::NotFound(format!("Invite code {} not found", normalized)))?;

        invite_code.check_redeemable(Utc::now())?;
        Ok(invite_code)
    }

    /// Look up an invitation token for a pool and check it is still open
    pub async fn validate_invitation(&self, token: &str, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Invitation> {
        self.require_policy(pool_id, tenant_id, AccessPolicy::Invite).await?;

        let invitation = self
            .repo
            .find_invitation_by_token(token.trim(), tenant_id)
            .await?
            .filter(|i| i.pool_id == pool_id)
            .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

        invitation.check_redeemable(Utc::now())?;
        Ok(invitation)
    }

    /// Consume one use of a code. Transaction conflicts are retried within
    /// the configured budget.
    pub async fn redeem_code(&self, code_id: Uuid, tenant_id: Uuid) -> AppResult<InviteCode> {
        let code = self.redeem_code_with(code_id, tenant_id, None).await?;
        info!(code_id = %code.id, used_count = code.used_count, status = %code.status, "Invite code redeemed");
        Ok(code)
    }

    /// Accept an invitation on behalf of the holder of `email`
    pub async fn redeem_invitation(&self, invitation_id: Uuid, tenant_id: Uuid, email: &str) -> AppResult<Invitation> {
        let invitation = self
            .redeem_invitation_with(invitation_id, tenant_id, email, None)
            .await?;
        info!(invitation_id = %invitation.id, "Invitation accepted");
        Ok(invitation)
    }

    /// Validate and redeem a code, registering `user_id` in the same transaction
    pub async fn register_with_code(
        &self,
        code: &str,
        pool_id: Uuid,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<InviteCode> {
        let invite_code = self.validate_code(code, pool_id, tenant_id).await?;
        let registration = NewRegistration {
            pool_id,
            user_id,
            source: RegistrationSource::Code,
        };

        let redeemed = self
            .redeem_code_with(invite_code.id, tenant_id, Some(registration))
            .await?;
        info!(pool_id = %pool_id, user_id = %user_id, code_id = %redeemed.id, "User registered with invite code");
        Ok(redeemed)
    }

    /// Validate and accept an invitation, registering `user_id` in the same transaction
    pub async fn register_with_invitation(
        &self,
        token: &str,
        pool_id: Uuid,
        tenant_id: Uuid,
        user_id: Uuid,
        email: &str,
    ) -> AppResult<Invitation> {
        let invitation = self.validate_invitation(token, pool_id, tenant_id).await?;
        let registration = NewRegistration {
            pool_id,
            user_id,
            source: RegistrationSource::Invitation,
        };

        let accepted = self
            .redeem_invitation_with(invitation.id, tenant_id, email, Some(registration))
            .await?;
        info!(pool_id = %pool_id, user_id = %user_id, invitation_id = %accepted.id, "User registered with invitation");
        Ok(accepted)
    }

    async fn redeem_code_with(
        &self,
        code_id: Uuid,
        tenant_id: Uuid,
        registration: Option<NewRegistration>,
    ) -> AppResult<InviteCode> {
        let repo = &self.repo;
        let user_id = registration.as_ref().map(|r| r.user_id);
        let registration = &registration;

        let code = with_retry(self.config.redemption_max_attempts, move || {
            repo.redeem_code(code_id, tenant_id, registration.clone(), Utc::now())
        })
        .await?;

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_code_redeemed(&code, user_id).await {
                warn!(code_id = %code.id, error = %e, "Failed to audit code redemption");
            }
        }
        Ok(code)
    }

    async fn redeem_invitation_with(
        &self,
        invitation_id: Uuid,
        tenant_id: Uuid,
        email: &str,
        registration: Option<NewRegistration>,
    ) -> AppResult<Invitation> {
        let repo = &self.repo;
        let registration = &registration;

        let invitation = with_retry(self.config.redemption_max_attempts, move || {
            repo.redeem_invitation(
                invitation_id,
                tenant_id,
                email.to_string(),
                registration.clone(),
                Utc::now(),
            )
        })
        .await?;

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_invitation_accepted(&invitation).await {
                warn!(invitation_id = %invitation.id, error = %e, "Failed to audit invitation acceptance");
            }
        }
        Ok(invitation)
    }

    /// Draw a code that is neither stored nor already drawn for this batch.
    /// Fails closed with `Internal` once the attempt budget is spent.
    async fn generate_unique_code(&self, drawn: &HashSet<String>) -> AppResult<String> {
        for attempt in 1..=self.config.code_generation_attempts {
            let candidate = (self.generator)(self.config.code_length);
            if drawn.contains(&candidate) || self.repo.code_exists(&candidate).await? {
                warn!(attempt = attempt, "Invite code collision, drawing again");
                continue;
            }
            return Ok(candidate);
        }

        Err(AppError::Internal(format!(
            "Could not generate a unique invite code after {} attempts",
            self.config.code_generation_attempts
        )))
    }

    /// Generate a batch of unique codes for a CODE pool
    pub async fn create_code_batch(&self, request: NewCodeBatch) -> AppResult<CodeBatch> {
        let now = Utc::now();
        request.validate(now)?;
        self.require_policy(request.pool_id, request.tenant_id, AccessPolicy::Code)
            .await?;

        let batch_id = Uuid::new_v4();
        let mut drawn: HashSet<String> = HashSet::with_capacity(request.code_count as usize);
        let mut codes = Vec::with_capacity(request.code_count as usize);

        for _ in 0..request.code_count {
            let code = self.generate_unique_code(&drawn).await?;
            drawn.insert(code.clone());
            codes.push(InviteCode {
                id: Uuid::new_v4(),
                batch_id,
                tenant_id: request.tenant_id,
                pool_id: request.pool_id,
                code,
                uses_per_code: request.uses_per_code,
                used_count: 0,
                status: CodeStatus::Unused.as_str().to_string(),
                expires_at: request.expires_at,
                created_at: now,
                updated_at: now,
            });
        }

        let batch = CodeBatch {
            id: batch_id,
            tenant_id: request.tenant_id,
            pool_id: request.pool_id,
            name: request.name.trim().to_string(),
            uses_per_code: request.uses_per_code,
            code_count: request.code_count,
            used_codes: 0,
            expires_at: request.expires_at,
            created_at: now,
        };

        let created = self.repo.create_batch(batch, codes).await?;
        info!(batch_id = %created.id, pool_id = %created.pool_id, codes = created.code_count, "Code batch created");

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_code_batch_created(&created).await {
                warn!(batch_id = %created.id, error = %e, "Failed to audit code batch");
            }
        }
        Ok(created)
    }

    pub async fn pause_code(&self, code_id: Uuid, tenant_id: Uuid) -> AppResult<InviteCode> {
        self.set_paused(code_id, tenant_id, true).await
    }

    /// Lift a pause; status goes back to what usage implies
    pub async fn resume_code(&self, code_id: Uuid, tenant_id: Uuid) -> AppResult<InviteCode> {
        self.set_paused(code_id, tenant_id, false).await
    }

    async fn set_paused(&self, code_id: Uuid, tenant_id: Uuid, paused: bool) -> AppResult<InviteCode> {
        let code = self
            .repo
            .set_code_paused(code_id, tenant_id, paused, Utc::now())
            .await?;
        info!(code_id = %code.id, status = %code.status, "Invite code pause state changed");

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_code_paused(&code, paused).await {
                warn!(code_id = %code.id, error = %e, "Failed to audit code pause");
            }
        }
        Ok(code)
    }

    /// Issue an invitation for an INVITE pool. At most one open invitation
    /// exists per email and pool.
    pub async fn create_invitation(&self, pool_id: Uuid, tenant_id: Uuid, email: &str) -> AppResult<Invitation> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation(format!("Invalid email address: {}", email)));
        }
        self.require_policy(pool_id, tenant_id, AccessPolicy::Invite).await?;

        let now = Utc::now();
        if self
            .repo
            .find_open_invitation(pool_id, tenant_id, &email, now)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "A pending invitation for {} already exists in pool {}",
                email, pool_id
            )));
        }

        let invitation = Invitation {
            id: Uuid::new_v4(),
            tenant_id,
            pool_id,
            email,
            token: random_token(),
            status: InvitationStatus::Pending.as_str().to_string(),
            expires_at: now + Duration::hours(self.config.invitation_ttl_hours),
            sent_count: 1,
            accepted_at: None,
            accepted_by: None,
            created_at: now,
        };

        let created = self.repo.create_invitation(invitation).await?;
        info!(invitation_id = %created.id, pool_id = %pool_id, "Invitation created");

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_invitation_created(&created).await {
                warn!(invitation_id = %created.id, error = %e, "Failed to audit invitation");
            }
        }
        Ok(created)
    }
}
