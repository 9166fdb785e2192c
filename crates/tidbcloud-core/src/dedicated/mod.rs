//! Dedicated cluster façade (`https://dedicated.tidbapi.com/v1beta1`)

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

/// Operations of the dedicated cluster API
#[async_trait]
pub trait DedicatedApi: Send + Sync {
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

    async fn pause_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<()>;

    async fn resume_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<()>;

    async fn reset_root_password(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        password: &str,
    ) -> Result<()>;

    async fn create_tidb_node_group(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateTidbNodeGroupRequest,
    ) -> Result<TidbNodeGroup>;

    async fn get_tidb_node_group(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        node_group_id: &str,
    ) -> Result<TidbNodeGroup>;

    async fn update_tidb_node_group(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        node_group_id: &str,
        request: &UpdateTidbNodeGroupRequest,
    ) -> Result<TidbNodeGroup>;

    async fn delete_tidb_node_group(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        node_group_id: &str,
    ) -> Result<()>;

    async fn list_tidb_node_groups(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<TidbNodeGroup>>;

    /// List regions, optionally of one cloud provider
    async fn list_regions(
        &self,
        ctx: &CallContext,
        cloud_provider: Option<&str>,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Region>>;

    async fn get_region(&self, ctx: &CallContext, region_id: &str) -> Result<Region>;
}

/// HTTP implementation of [`DedicatedApi`]
#[derive(Debug, Clone)]
pub struct DedicatedClient {
    api: ApiClient,
}

impl DedicatedClient {
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

fn node_group_path(cluster_id: &str, node_group_id: &str) -> String {
    format!(
        "{}/tidbNodeGroups/{}",
        cluster_path(cluster_id),
        segment(node_group_id)
    )
}

#[async_trait]
impl DedicatedApi for DedicatedClient {
    async fn create_cluster(
        &self,
        ctx: &CallContext,
        request: &CreateClusterRequest,
    ) -> Result<Cluster> {
        debug!(
            display_name = %request.display_name,
            region_id = %request.region_id,
            "Creating dedicated cluster"
        );
        let cluster: Cluster = self.api.post(ctx, "/clusters", request).await?;
        info!(cluster_id = %cluster.cluster_id, "Dedicated cluster created");
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
        debug!(cluster_id, "Updating dedicated cluster");
        self.api
            .patch(ctx, &cluster_path(cluster_id), request)
            .await
    }

    async fn delete_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<Cluster> {
        debug!(cluster_id, "Deleting dedicated cluster");
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

    async fn pause_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<()> {
        debug!(cluster_id, "Pausing dedicated cluster");
        let _: IgnoredAny = self
            .api
            .post(ctx, &format!("{}:pause", cluster_path(cluster_id)), &json!({}))
            .await?;
        Ok(())
    }

    async fn resume_cluster(&self, ctx: &CallContext, cluster_id: &str) -> Result<()> {
        debug!(cluster_id, "Resuming dedicated cluster");
        let _: IgnoredAny = self
            .api
            .post(ctx, &format!("{}:resume", cluster_path(cluster_id)), &json!({}))
            .await?;
        Ok(())
    }

    async fn reset_root_password(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        password: &str,
    ) -> Result<()> {
        debug!(cluster_id, "Resetting root password");
        let request = ResetRootPasswordRequest {
            root_password: password.to_string(),
        };
        let _: IgnoredAny = self
            .api
            .post(
                ctx,
                &format!("{}:resetRootPassword", cluster_path(cluster_id)),
                &request,
            )
            .await?;
        Ok(())
    }

    async fn create_tidb_node_group(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        request: &CreateTidbNodeGroupRequest,
    ) -> Result<TidbNodeGroup> {
        debug!(cluster_id, display_name = %request.display_name, "Creating TiDB node group");
        self.api
            .post(
                ctx,
                &format!("{}/tidbNodeGroups", cluster_path(cluster_id)),
                request,
            )
            .await
    }

    async fn get_tidb_node_group(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        node_group_id: &str,
    ) -> Result<TidbNodeGroup> {
        self.api
            .get(ctx, &node_group_path(cluster_id, node_group_id))
            .await
    }

    async fn update_tidb_node_group(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        node_group_id: &str,
        request: &UpdateTidbNodeGroupRequest,
    ) -> Result<TidbNodeGroup> {
        self.api
            .patch(ctx, &node_group_path(cluster_id, node_group_id), request)
            .await
    }

    async fn delete_tidb_node_group(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        node_group_id: &str,
    ) -> Result<()> {
        debug!(cluster_id, node_group_id, "Deleting TiDB node group");
        let _: IgnoredAny = self
            .api
            .delete(ctx, &node_group_path(cluster_id, node_group_id))
            .await?;
        Ok(())
    }

    async fn list_tidb_node_groups(
        &self,
        ctx: &CallContext,
        cluster_id: &str,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<TidbNodeGroup>> {
        self.api
            .list::<ListTidbNodeGroupsResponse>(
                ctx,
                &format!("{}/tidbNodeGroups", cluster_path(cluster_id)),
                &[],
                cursor,
                page_size,
            )
            .await
    }

    async fn list_regions(
        &self,
        ctx: &CallContext,
        cloud_provider: Option<&str>,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<Page<Region>> {
        self.api
            .list::<ListRegionsResponse>(
                ctx,
                "/regions",
                &[("cloud_provider", cloud_provider.unwrap_or_default())],
                cursor,
                page_size,
            )
            .await
    }

    async fn get_region(&self, ctx: &CallContext, region_id: &str) -> Result<Region> {
        self.api
            .get(ctx, &format!("/regions/{}", segment(region_id)))
            .await
    }
}
