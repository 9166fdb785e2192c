//! Identity and access management façade (`https://iam.tidbapi.com/v1beta1`)

pub mod models;

pub use models::*;

use async_trait::async_trait;
use serde::de::IgnoredAny;
use tracing::debug;

use crate::api::{ApiClient, V1BETA1, segment};
use crate::context::CallContext;
use crate::error::Result;
use crate::pagination::{Cursor, Page};
use crate::registry::BackendHandle;

/// Operations of the IAM API
#[async_trait]
pub trait IamApi: Send + Sync {
    async fn list_projects(
        &self,
        ctx: &CallContext,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Project>>;

    async fn create_sql_user(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateSqlUserRequest,
    ) -> Result<SqlUser>;

    async fn get_sql_user(&self, ctx: &CallContext, cluster_id: &str, user_name: &str)
    -> Result<SqlUser>;

    async fn update_sql_user(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        user_name: &str,
        request: &UpdateSqlUserRequest,
    ) -> Result<SqlUser>;

    async fn delete_sql_user(&self, ctx: &CallContext, cluster_id: &str, user_name: &str)
    -> Result<()>;

    async fn list_sql_users(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<SqlUser>>;
}

/// HTTP implementation of [`IamApi`]
#[derive(Debug, Clone)]
pub struct IamClient {
    api: ApiClient,
}

impl IamClient {
    pub fn new(handle: BackendHandle) -> Self {
        Self {
            api: ApiClient::new(handle, V1BETA1),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

fn sql_users_path(cluster_id: &str) -> String {
    format!("/clusters/{}/sqlUsers", segment(cluster_id))
}

fn sql_user_path(cluster_id: &str, user_name: &str) -> String {
    format!("{}/{}", sql_users_path(cluster_id), segment(user_name))
}

#[async_trait]
impl IamApi for IamClient {
    async fn list_projects(
        &self,
        ctx: &CallContext,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Project>> {
        self.api
            .list::<ListProjectsResponse>(ctx, "/projects", &[], cursor, page_size)
            .await
    }

    async fn create_sql_user(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateSqlUserRequest,
    ) -> Result<SqlUser> {
        debug!(cluster_id, user_name = %request.user_name, "Creating SQL user");
        self.api
            .post(ctx, &sql_users_path(cluster_id), request)
            .await
    }

    async fn get_sql_user(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        user_name: &str,
    ) -> Result<SqlUser> {
        self.api
            .get(ctx, &sql_user_path(cluster_id, user_name))
            .await
    }

    async fn update_sql_user(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        user_name: &str,
        request: &UpdateSqlUserRequest,
    ) -> Result<SqlUser> {
        debug!(cluster_id, user_name, "Updating SQL user");
        self.api
            .patch(ctx, &sql_user_path(cluster_id, user_name), request)
            .await
    }

    async fn delete_sql_user(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        user_name: &str,
    ) -> Result<()> {
        debug!(cluster_id, user_name, "Deleting SQL user");
        let _: IgnoredAny = self
            .api
            .delete(ctx, &sql_user_path(cluster_id, user_name))
            .await?;
        Ok(())
    }

    async fn list_sql_users(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<SqlUser>> {
        self.api
            .list::<ListSqlUsersResponse>(ctx, &sql_users_path(cluster_id), &[], cursor, page_size)
            .await
    }
}
