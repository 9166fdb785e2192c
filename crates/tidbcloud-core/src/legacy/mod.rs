//! Legacy `/api/v1beta` façade
//!
//! Every call goes through the generic [`Dispatcher`], so success is
//! strictly HTTP 200. Listings are numerically paged.

pub mod models;

pub use models::*;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::json;
use tracing::debug;

use crate::api::segment;
use crate::context::CallContext;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::pagination::{Cursor, Page, PaginationStyle, RawPage, fetch_next_page};
use crate::registry::BackendHandle;

/// Version prefix of the legacy API
pub const API_PREFIX: &str = "/api/v1beta";

/// Operations of the legacy API
#[async_trait]
pub trait LegacyApi: Send + Sync {
    async fn list_projects(
        &self,
        ctx: &CallContext,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Project>>;

    async fn create_cluster(
        &self,
        ctx: &CallContext,
        project_id: &str,
        request: &CreateClusterRequest,
    ) -> Result<CreatedResource>;

    async fn get_cluster(&self, ctx: &CallContext, project_id: &str, cluster_id: &str)
    -> Result<Cluster>;

    async fn update_cluster(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        request: &UpdateClusterRequest,
    ) -> Result<()>;

    async fn delete_cluster(&self, ctx: &CallContext, project_id: &str, cluster_id: &str)
    -> Result<()>;

    async fn list_clusters(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Cluster>>;

    async fn create_backup(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        request: &CreateBackupRequest,
    ) -> Result<CreatedResource>;

    async fn get_backup(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        backup_id: &str,
    ) -> Result<Backup>;

    async fn delete_backup(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        backup_id: &str,
    ) -> Result<()>;

    async fn list_backups(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Backup>>;

    async fn create_restore(
        &self,
        ctx: &CallContext,
        project_id: &str,
        request: &CreateRestoreRequest,
    ) -> Result<CreatedRestore>;

    async fn get_restore(&self, ctx: &CallContext, project_id: &str, restore_id: &str)
    -> Result<Restore>;

    async fn list_restores(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Restore>>;

    async fn create_import(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        request: &CreateImportRequest,
    ) -> Result<CreatedResource>;

    async fn get_import(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        import_id: &str,
    ) -> Result<Import>;

    async fn list_imports(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Import>>;

    async fn cancel_import(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        import_id: &str,
    ) -> Result<()>;

    /// Ask for a pre-signed URL to upload a local import file to
    async fn generate_upload_url(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        request: &UploadUrlRequest,
    ) -> Result<UploadUrl>;
}

/// HTTP implementation of [`LegacyApi`]
#[derive(Debug, Clone)]
pub struct LegacyClient {
    dispatcher: Dispatcher,
}

impl LegacyClient {
    pub fn new(handle: BackendHandle) -> Self {
        Self {
            dispatcher: Dispatcher::new(handle),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    async fn get<T: DeserializeOwned>(&self, ctx: &CallContext, path: &str) -> Result<T> {
        self.dispatcher
            .dispatch_into(ctx, Method::GET, path, None)
            .await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let payload = serde_json::to_value(body)?;
        self.dispatcher
            .dispatch_into(ctx, method, path, Some(&payload))
            .await
    }

    async fn delete(&self, ctx: &CallContext, path: &str) -> Result<()> {
        let _: IgnoredAny = self
            .dispatcher
            .dispatch_into(ctx, Method::DELETE, path, None)
            .await?;
        Ok(())
    }

    async fn list<T: DeserializeOwned + Send>(
        &self,
        ctx: &CallContext,
        path: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<T>> {
        fetch_next_page(PaginationStyle::Numeric, cursor, page_size, |cursor| async move {
            let mut url = self.dispatcher.handle().url(path)?;
            cursor.apply(&mut url);
            let list: ListResponse<T> = self
                .dispatcher
                .dispatch_into(ctx, Method::GET, url.as_str(), None)
                .await?;
            Ok(RawPage::Numeric {
                items: list.items,
                total: list.total,
            })
        })
        .await
    }
}

fn project_path(project_id: &str) -> String {
    format!("{API_PREFIX}/projects/{}", segment(project_id))
}

fn cluster_path(project_id: &str, cluster_id: &str) -> String {
    format!(
        "{}/clusters/{}",
        project_path(project_id),
        segment(cluster_id)
    )
}

#[async_trait]
impl LegacyApi for LegacyClient {
    async fn list_projects(
        &self,
        ctx: &CallContext,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Project>> {
        self.list(ctx, &format!("{API_PREFIX}/projects"), cursor, page_size)
            .await
    }

    async fn create_cluster(
        &self,
        ctx: &CallContext,
        project_id: &str,
        request: &CreateClusterRequest,
    ) -> Result<CreatedResource> {
        debug!(project_id, name = %request.name, "Creating cluster");
        self.send_json(
            ctx,
            Method::POST,
            &format!("{}/clusters", project_path(project_id)),
            request,
        )
        .await
    }

    async fn get_cluster(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
    ) -> Result<Cluster> {
        self.get(ctx, &cluster_path(project_id, cluster_id)).await
    }

    async fn update_cluster(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        request: &UpdateClusterRequest,
    ) -> Result<()> {
        debug!(project_id, cluster_id, "Updating cluster");
        let _: IgnoredAny = self
            .send_json(
                ctx,
                Method::PATCH,
                &cluster_path(project_id, cluster_id),
                request,
            )
            .await?;
        Ok(())
    }

    async fn delete_cluster(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
    ) -> Result<()> {
        debug!(project_id, cluster_id, "Deleting cluster");
        self.delete(ctx, &cluster_path(project_id, cluster_id))
            .await
    }

    async fn list_clusters(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Cluster>> {
        self.list(
            ctx,
            &format!("{}/clusters", project_path(project_id)),
            cursor,
            page_size,
        )
        .await
    }

    async fn create_backup(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        request: &CreateBackupRequest,
    ) -> Result<CreatedResource> {
        self.send_json(
            ctx,
            Method::POST,
            &format!("{}/backups", cluster_path(project_id, cluster_id)),
            request,
        )
        .await
    }

    async fn get_backup(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        backup_id: &str,
    ) -> Result<Backup> {
        self.get(
            ctx,
            &format!(
                "{}/backups/{}",
                cluster_path(project_id, cluster_id),
                segment(backup_id)
            ),
        )
        .await
    }

    async fn delete_backup(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        backup_id: &str,
    ) -> Result<()> {
        self.delete(
            ctx,
            &format!(
                "{}/backups/{}",
                cluster_path(project_id, cluster_id),
                segment(backup_id)
            ),
        )
        .await
    }

    async fn list_backups(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Backup>> {
        self.list(
            ctx,
            &format!("{}/backups", cluster_path(project_id, cluster_id)),
            cursor,
            page_size,
        )
        .await
    }

    async fn create_restore(
        &self,
        ctx: &CallContext,
        project_id: &str,
        request: &CreateRestoreRequest,
    ) -> Result<CreatedRestore> {
        debug!(project_id, backup_id = %request.backup_id, "Restoring backup");
        self.send_json(
            ctx,
            Method::POST,
            &format!("{}/restores", project_path(project_id)),
            request,
        )
        .await
    }

    async fn get_restore(
        &self,
        ctx: &CallContext,
        project_id: &str,
        restore_id: &str,
    ) -> Result<Restore> {
        self.get(
            ctx,
            &format!(
                "{}/restores/{}",
                project_path(project_id),
                segment(restore_id)
            ),
        )
        .await
    }

    async fn list_restores(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Restore>> {
        self.list(
            ctx,
            &format!("{}/restores", project_path(project_id)),
            cursor,
            page_size,
        )
        .await
    }

    async fn create_import(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        request: &CreateImportRequest,
    ) -> Result<CreatedResource> {
        debug!(project_id, cluster_id, import_type = %request.import_type, "Creating import");
        self.send_json(
            ctx,
            Method::POST,
            &format!("{}/imports", cluster_path(project_id, cluster_id)),
            request,
        )
        .await
    }

    async fn get_import(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        import_id: &str,
    ) -> Result<Import> {
        self.get(
            ctx,
            &format!(
                "{}/imports/{}",
                cluster_path(project_id, cluster_id),
                segment(import_id)
            ),
        )
        .await
    }

    async fn list_imports(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Import>> {
        self.list(
            ctx,
            &format!("{}/imports", cluster_path(project_id, cluster_id)),
            cursor,
            page_size,
        )
        .await
    }

    async fn cancel_import(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        import_id: &str,
    ) -> Result<()> {
        debug!(project_id, cluster_id, import_id, "Cancelling import");
        let _: IgnoredAny = self
            .send_json(
                ctx,
                Method::PUT,
                &format!(
                    "{}/imports/{}",
                    cluster_path(project_id, cluster_id),
                    segment(import_id)
                ),
                &json!({ "action": "cancel" }),
            )
            .await?;
        Ok(())
    }

    async fn generate_upload_url(
        &self,
        ctx: &CallContext,
        project_id: &str,
        cluster_id: &str,
        request: &UploadUrlRequest,
    ) -> Result<UploadUrl> {
        debug!(
            project_id,
            cluster_id,
            file_name = %request.file_name,
            content_length = request.content_length,
            "Requesting upload URL"
        );
        self.send_json(
            ctx,
            Method::POST,
            &format!("{}/upload_url", cluster_path(project_id, cluster_id)),
            request,
        )
        .await
    }
}
