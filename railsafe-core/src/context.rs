//! Request context - the organization and user an operation runs on behalf of
//!
//! Passed explicitly to every operation that needs it; there is no ambient
//! "current organization" or "current user".

use crate::error::RiskError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque organization identifier assigned by the organization service
///
/// Deserialization goes through [`OrgId::new`], so a blank id never loads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrgId(String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Result<Self, RiskError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RiskError::Validation {
                field: "orgId",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(OrgId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrgId {
    type Error = RiskError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        OrgId::new(id)
    }
}

impl From<OrgId> for String {
    fn from(id: OrgId) -> Self {
        id.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Organizational role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    ChiefRiskManager,
    DivisionRiskManager,
    DepartmentRiskManager,
    Employee,
}

impl UserRole {
    /// Roles that may edit the organization's level descriptions
    pub fn can_edit_catalog(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::ChiefRiskManager)
    }
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    pub role: UserRole,
}

/// Explicit per-request scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub org_id: OrgId,
    pub user: Option<UserIdentity>,
}

impl RequestContext {
    /// Context for an anonymous caller inside one organization
    pub fn for_org(org_id: OrgId) -> Self {
        RequestContext { org_id, user: None }
    }

    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = Some(user);
        self
    }

    /// Fail unless `org_id` is the context's organization
    pub fn ensure_org(&self, org_id: &OrgId) -> Result<(), RiskError> {
        if &self.org_id == org_id {
            Ok(())
        } else {
            Err(RiskError::OrgMismatch {
                expected: self.org_id.to_string(),
                actual: org_id.to_string(),
            })
        }
    }

    /// Whether the caller may edit level descriptions
    pub fn can_edit_catalog(&self) -> bool {
        self.user
            .as_ref()
            .map(|u| u.role.can_edit_catalog())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_org_id_rejects_blank() {
        assert!(OrgId::new("  ").is_err());
        assert_eq!(OrgId::new("org-1").unwrap().as_str(), "org-1");
    }

    #[test]
    fn test_org_id_wire_form() {
        let id: OrgId = serde_json::from_str("\"org-1\"").unwrap();
        assert_eq!(id.as_str(), "org-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"org-1\"");

        for blank in ["\"\"", "\"   \""] {
            let err = serde_json::from_str::<OrgId>(blank).unwrap_err();
            assert!(err.to_string().contains("orgId"), "{blank}: {err}");
        }
    }

    #[test]
    fn test_ensure_org() {
        let ctx = RequestContext::for_org(OrgId::new("org-1").unwrap());
        assert!(ctx.ensure_org(&OrgId::new("org-1").unwrap()).is_ok());
        let err = ctx.ensure_org(&OrgId::new("org-2").unwrap()).unwrap_err();
        assert_eq!(err.code(), "ORG_MISMATCH");
    }

    #[test]
    fn test_catalog_edit_permission() {
        let ctx = RequestContext::for_org(OrgId::new("org-1").unwrap());
        assert!(!ctx.can_edit_catalog());

        let chief = ctx.clone().with_user(UserIdentity {
            user_id: "u-1".to_string(),
            role: UserRole::ChiefRiskManager,
        });
        assert!(chief.can_edit_catalog());

        let employee = ctx.with_user(UserIdentity {
            user_id: "u-2".to_string(),
            role: UserRole::Employee,
        });
        assert!(!employee.can_edit_catalog());
    }

    #[test]
    fn test_role_wire_tags() {
        let role: UserRole = serde_json::from_str("\"DEPARTMENT_RISK_MANAGER\"").unwrap();
        assert_eq!(role, UserRole::DepartmentRiskManager);
    }
}
