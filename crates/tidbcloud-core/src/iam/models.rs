//! Wire models for the IAM `/v1beta1` API

use serde::{Deserialize, Serialize};

use crate::api::{list_envelope, opt_u64};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub org_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "opt_u64")]
    pub cluster_count: Option<u64>,
    #[serde(default, deserialize_with = "opt_u64")]
    pub user_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<String>,
    #[serde(default)]
    pub aws_cmek_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlUser {
    pub user_name: String,
    /// `role_admin`, `role_readwrite` or `role_readonly`
    #[serde(default)]
    pub builtin_role: String,
    #[serde(default)]
    pub custom_roles: Vec<String>,
    /// `mysql_native_password` or `tidb_auth_token`
    #[serde(default)]
    pub auth_method: String,
}

/// Request body for creating a SQL user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSqlUserRequest {
    pub user_name: String,
    pub password: String,
    pub builtin_role: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_roles: Vec<String>,
    pub auth_method: String,
    /// Let the server prepend the cluster's user prefix
    #[serde(default)]
    pub auto_prefix: bool,
}

impl CreateSqlUserRequest {
    #[must_use]
    pub fn new(
        user_name: impl Into<String>,
        password: impl Into<String>,
        builtin_role: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            builtin_role: builtin_role.into(),
            custom_roles: Vec::new(),
            auth_method: "mysql_native_password".to_string(),
            auto_prefix: false,
        }
    }

    #[must_use]
    pub fn with_custom_role(mut self, role: impl Into<String>) -> Self {
        self.custom_roles.push(role.into());
        self
    }

    #[must_use]
    pub fn with_auto_prefix(mut self, auto_prefix: bool) -> Self {
        self.auto_prefix = auto_prefix;
        self
    }
}

/// Fields to change on a SQL user; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSqlUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtin_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_roles: Option<Vec<String>>,
}

list_envelope!(ListProjectsResponse, projects: Project);
list_envelope!(ListSqlUsersResponse, sql_users: SqlUser);
