//! First-run provisioning of a tenant and its administrator.

use tracing::info;
use vellum_core::error::{VellumError, VellumResult};
use vellum_core::models::tenant::{CreateTenant, Tenant};
use vellum_core::models::user::{CreateUser, UpdateUser, User, UserRole};
use vellum_core::repository::{TenantRepository, UserRepository};

use crate::config::BootstrapConfig;
use crate::state::AppState;

/// Create the configured tenant and admin account when they do not
/// exist yet. Running it again leaves existing records untouched apart
/// from making sure the account is an active, verified admin.
pub async fn run(state: &AppState, config: &BootstrapConfig) -> VellumResult<(Tenant, User)> {
    let tenant = match state.tenants.get_by_slug(&config.tenant_slug).await {
        Ok(tenant) => tenant,
        Err(VellumError::NotFound { .. }) => {
            let tenant = state
                .tenants
                .create(CreateTenant {
                    name: config.tenant_name.clone(),
                    slug: config.tenant_slug.clone(),
                    storage_quota_bytes: None,
                    settings: None,
                })
                .await?;
            info!(tenant_id = %tenant.id, slug = %tenant.slug, "Bootstrap tenant created");
            tenant
        }
        Err(e) => return Err(e),
    };

    let user = match state.users.get_by_email(tenant.id, &config.admin_email).await {
        Ok(user) => user,
        Err(VellumError::NotFound { .. }) => {
            let user = state
                .users
                .create(CreateUser {
                    tenant_id: tenant.id,
                    email: config.admin_email.clone(),
                    password: config.admin_password.clone(),
                    first_name: "Platform".into(),
                    last_name: "Admin".into(),
                    role: UserRole::Admin,
                    email_verification_token_hash: None,
                })
                .await?;
            info!(user_id = %user.id, tenant_id = %tenant.id, "Bootstrap admin created");
            user
        }
        Err(e) => return Err(e),
    };

    if user.is_admin() && user.is_active && user.is_email_verified {
        return Ok((tenant, user));
    }
    let user = state
        .users
        .update(
            tenant.id,
            user.id,
            UpdateUser {
                role: Some(UserRole::Admin),
                is_active: Some(true),
                is_email_verified: Some(true),
                ..Default::default()
            },
        )
        .await?;
    Ok((tenant, user))
}
