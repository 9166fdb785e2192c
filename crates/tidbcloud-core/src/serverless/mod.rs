//! Serverless cluster façade (`https://serverless.tidbapi.com/v1beta1`)
//!
//! Covers clusters, branches, exports, imports and the multipart upload
//! protocol used to stage local files for an import. The part PUTs
//! themselves go to pre-signed storage URLs and are sent by
//! [`Uploader`](crate::upload::Uploader), not by this client.

pub mod models;

pub use models::*;

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde_json::json;
use tracing::{debug, info};

use crate::api::{ApiClient, V1BETA1, segment};
use crate::context::CallContext;
use crate::error::Result;
use crate::pagination::{Cursor, Page};
use crate::registry::BackendHandle;

/// Operations of the serverless API
#[async_trait]
pub trait ServerlessApi: Send + Sync {
    async fn create_cluster(&self, ctx: &CallContext, request: &CreateClusterRequest)
    -> Result<Cluster>;

    async fn get_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<Cluster>;

    async fn update_cluster(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &UpdateClusterRequest,
    ) -> Result<Cluster>;

    async fn delete_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<Cluster>;

    /// List clusters, optionally only those of one project
    async fn list_clusters(
        &self,
        ctx: &CallContext,
        project_id: Option<&str>,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Cluster>>;

    async fn create_branch(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateBranchRequest,
    ) -> Result<Branch>;

    async fn get_branch(&self, ctx: &CallContext, cluster_id: &str, branch_id: &str)
    -> Result<Branch>;

    async fn delete_branch(&self, ctx: &CallContext, cluster_id: &str, branch_id: &str)
    -> Result<Branch>;

    async fn list_branches(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Branch>>;

    /// Reset a branch to the current state of its parent
    async fn reset_branch(&self, ctx: &CallContext, cluster_id: &str, branch_id: &str)
    -> Result<Branch>;

    async fn create_export(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateExportRequest,
    ) -> Result<Export>;

    async fn get_export(&self, ctx: &CallContext, cluster_id: &str, export_id: &str)
    -> Result<Export>;

    async fn delete_export(&self, ctx: &CallContext, cluster_id: &str, export_id: &str)
    -> Result<Export>;

    async fn list_exports(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Export>>;

    async fn cancel_export(&self, ctx: &CallContext, cluster_id: &str, export_id: &str)
    -> Result<Export>;

    async fn create_import(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateImportRequest,
    ) -> Result<Import>;

    async fn get_import(&self, ctx: &CallContext, cluster_id: &str, import_id: &str)
    -> Result<Import>;

    async fn list_imports(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Import>>;

    async fn cancel_import(&self, ctx: &CallContext, cluster_id: &str, import_id: &str)
    -> Result<()>;

    /// Open a multipart upload and get one pre-signed URL per part
    async fn start_upload(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &StartUploadRequest,
    ) -> Result<StartUploadResponse>;

    async fn complete_upload(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CompleteUploadRequest,
    ) -> Result<()>;

    async fn cancel_upload(&self, ctx: &CallContext, cluster_id: &str, upload_id: &str)
    -> Result<()>;
}

/// HTTP implementation of [`ServerlessApi`]
#[derive(Debug, Clone)]
pub struct ServerlessClient {
    api: ApiClient,
}

impl ServerlessClient {
    pub fn new(handle: BackendHandle) -> Self {
        Self {
            api: ApiClient::new(handle, V1BETA1),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

fn cluster_path(cluster_id: &str) -> String {
    format!("/clusters/{}", segment(cluster_id))
}

fn child_path(cluster_id: &str, collection: &str, id: &str) -> String {
    format!("{}/{collection}/{}", cluster_path(cluster_id), segment(id))
}

#[async_trait]
impl ServerlessApi for ServerlessClient {
    async fn create_cluster(
        &self,
        ctx: &CallContext,
        request: &CreateClusterRequest,
    ) -> Result<Cluster> {
        debug!(
            display_name = %request.display_name,
            region = %request.region.name,
            "Creating serverless cluster"
        );
        let cluster: Cluster = self.api.post(ctx, "/clusters", request).await?;
        info!(cluster_id = %cluster.cluster_id, "Serverless cluster created");
        Ok(cluster)
    }

    async fn get_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<Cluster> {
        self.api.get(ctx, &cluster_path(cluster_id)).await
    }

    async fn update_cluster(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &UpdateClusterRequest,
    ) -> Result<Cluster> {
        debug!(cluster_id, mask = ?request.update_mask(), "Updating serverless cluster");
        self.api
            .patch(ctx, &cluster_path(cluster_id), request)
            .await
    }

    async fn delete_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<Cluster> {
        debug!(cluster_id, "Deleting serverless cluster");
        self.api.delete(ctx, &cluster_path(cluster_id)).await
    }

    async fn list_clusters(
        &self,
        ctx: &CallContext,
        project_id: Option<&str>,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Cluster>> {
        self.api
            .list::<ListClustersResponse>(
                ctx,
                "/clusters",
                &[("project_id", project_id.unwrap_or_default())],
                cursor,
                page_size,
            )
            .await
    }

    async fn create_branch(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateBranchRequest,
    ) -> Result<Branch> {
        debug!(cluster_id, display_name = %request.display_name, "Creating branch");
        self.api
            .post(
                ctx,
                &format!("{}/branches", cluster_path(cluster_id)),
                request,
            )
            .await
    }

    async fn get_branch(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        branch_id: &str,
    ) -> Result<Branch> {
        self.api
            .get(ctx, &child_path(cluster_id, "branches", branch_id))
            .await
    }

    async fn delete_branch(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        branch_id: &str,
    ) -> Result<Branch> {
        debug!(cluster_id, branch_id, "Deleting branch");
        self.api
            .delete(ctx, &child_path(cluster_id, "branches", branch_id))
            .await
    }

    async fn list_branches(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Branch>> {
        self.api
            .list::<ListBranchesResponse>(
                ctx,
                &format!("{}/branches", cluster_path(cluster_id)),
                &[],
                cursor,
                page_size,
            )
            .await
    }

    async fn reset_branch(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        branch_id: &str,
    ) -> Result<Branch> {
        debug!(cluster_id, branch_id, "Resetting branch");
        self.api
            .post(
                ctx,
                &format!("{}:reset", child_path(cluster_id, "branches", branch_id)),
                &json!({}),
            )
            .await
    }

    async fn create_export(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateExportRequest,
    ) -> Result<Export> {
        debug!(cluster_id, target = %request.target.target_type, "Creating export");
        self.api
            .post(ctx, &format!("{}/exports", cluster_path(cluster_id)), request)
            .await
    }

    async fn get_export(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        export_id: &str,
    ) -> Result<Export> {
        self.api
            .get(ctx, &child_path(cluster_id, "exports", export_id))
            .await
    }

    async fn delete_export(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        export_id: &str,
    ) -> Result<Export> {
        debug!(cluster_id, export_id, "Deleting export");
        self.api
            .delete(ctx, &child_path(cluster_id, "exports", export_id))
            .await
    }

    async fn list_exports(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Export>> {
        self.api
            .list::<ListExportsResponse>(
                ctx,
                &format!("{}/exports", cluster_path(cluster_id)),
                &[],
                cursor,
                page_size,
            )
            .await
    }

    async fn cancel_export(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        export_id: &str,
    ) -> Result<Export> {
        debug!(cluster_id, export_id, "Cancelling export");
        self.api
            .post(
                ctx,
                &format!("{}:cancel", child_path(cluster_id, "exports", export_id)),
                &json!({}),
            )
            .await
    }

    async fn create_import(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateImportRequest,
    ) -> Result<Import> {
        debug!(cluster_id, source = %request.source.source_type, "Creating import");
        self.api
            .post(ctx, &format!("{}/imports", cluster_path(cluster_id)), request)
            .await
    }

    async fn get_import(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        import_id: &str,
    ) -> Result<Import> {
        self.api
            .get(ctx, &child_path(cluster_id, "imports", import_id))
            .await
    }

    async fn list_imports(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Import>> {
        self.api
            .list::<ListImportsResponse>(
                ctx,
                &format!("{}/imports", cluster_path(cluster_id)),
                &[],
                cursor,
                page_size,
            )
            .await
    }

    async fn cancel_import(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        import_id: &str,
    ) -> Result<()> {
        debug!(cluster_id, import_id, "Cancelling import");
        let _: IgnoredAny = self
            .api
            .post(
                ctx,
                &format!("{}:cancel", child_path(cluster_id, "imports", import_id)),
                &json!({}),
            )
            .await?;
        Ok(())
    }

    async fn start_upload(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &StartUploadRequest,
    ) -> Result<StartUploadResponse> {
        debug!(
            cluster_id,
            file_name = %request.file_name,
            content_length = request.content_length,
            part_count = request.part_count,
            "Starting multipart upload"
        );
        self.api
            .post(ctx, &format!("{}/uploads", cluster_path(cluster_id)), request)
            .await
    }

    async fn complete_upload(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CompleteUploadRequest,
    ) -> Result<()> {
        debug!(cluster_id, upload_id = %request.upload_id, "Completing multipart upload");
        let _: IgnoredAny = self
            .api
            .post(
                ctx,
                &format!("{}/uploads/complete", cluster_path(cluster_id)),
                request,
            )
            .await?;
        Ok(())
    }

    async fn cancel_upload(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        upload_id: &str,
    ) -> Result<()> {
        debug!(cluster_id, upload_id, "Cancelling multipart upload");
        let request = CancelUploadRequest {
            upload_id: upload_id.to_string(),
        };
        let _: IgnoredAny = self
            .api
            .post(
                ctx,
                &format!("{}/uploads/cancel", cluster_path(cluster_id)),
                &request,
            )
            .await?;
        Ok(())
    }
}
