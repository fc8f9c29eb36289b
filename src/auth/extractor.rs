use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::auth::jwt::{self, Claims};
use crate::db::clients::ClientScope;
use crate::error::AppError;
use crate::models::Role;
use crate::state::SharedState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub role: Role,
}

impl AuthUser {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn require_super_admin(&self) -> Result<(), AppError> {
        if self.is_super_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Super admin access required".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }

    /// Super admins may read any organization; everyone else only their own.
    pub fn can_access_organization(&self, organization_id: Uuid) -> bool {
        self.is_super_admin() || self.organization_id == Some(organization_id)
    }

    pub fn require_organization_access(&self, organization_id: Uuid) -> Result<(), AppError> {
        if self.can_access_organization(organization_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have access to this organization".to_string(),
            ))
        }
    }

    /// Clients are shared across an organization, personal otherwise.
    pub fn client_scope(&self) -> ClientScope {
        ClientScope {
            user_id: self.user_id,
            organization_id: self.organization_id,
        }
    }

    /// Scope whose appointment types and locations the caller may edit: their
    /// organization's as its admin, the unaffiliated catalog as super admin.
    pub fn require_catalog_admin(&self) -> Result<Option<Uuid>, AppError> {
        match self.organization_id {
            Some(org) => self.require_organization_admin(org).map(|_| Some(org)),
            None => self.require_super_admin().map(|_| None),
        }
    }

    /// Org admins manage their own organization; super admins manage all.
    pub fn require_organization_admin(&self, organization_id: Uuid) -> Result<(), AppError> {
        if self.is_super_admin()
            || (self.role == Role::OrgAdmin && self.organization_id == Some(organization_id))
        {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Organization admin access required".to_string(),
            ))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            user_id: claims.sub,
            organization_id: claims.org,
            role: claims.role,
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;
    Ok(value.strip_prefix("Bearer ").map(str::to_string))
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts)? {
            Some(token) => token,
            None => CookieJar::from_headers(&parts.headers)
                .get("access_token")
                .map(|c| c.value().to_string())
                .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))?,
        };

        let claims = jwt::decode_token(&token, &state.config.jwt_secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(claims.into())
    }
}
