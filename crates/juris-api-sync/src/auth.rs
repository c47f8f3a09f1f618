//! Tenant context extraction.
//!
//! Authentication proper is handled upstream (gateway / reverse proxy);
//! this service trusts the forwarded identity headers.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::SyncApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Identity of the caller, as forwarded by the gateway.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
}

fn header_uuid(parts: &Parts, name: &str) -> Option<Uuid> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = SyncApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_uuid(parts, TENANT_HEADER).ok_or(SyncApiError::Unauthorized)?;
        Ok(Self {
            tenant_id,
            user_id: header_uuid(parts, USER_HEADER),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/cases/abc/sync");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn extracts_tenant_and_user() {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let mut parts = parts_with(&[
            (TENANT_HEADER, &tenant.to_string()),
            (USER_HEADER, &user.to_string()),
        ]);
        let ctx = AuthContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.tenant_id, tenant);
        assert_eq!(ctx.user_id, Some(user));
    }

    #[tokio::test]
    async fn missing_tenant_is_unauthorized() {
        let mut parts = parts_with(&[]);
        let err = AuthContext::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncApiError::Unauthorized));
    }

    #[tokio::test]
    async fn malformed_tenant_is_unauthorized() {
        let mut parts = parts_with(&[(TENANT_HEADER, "not-a-uuid")]);
        let err = AuthContext::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncApiError::Unauthorized));
    }
}
