//! Wire models for the dedicated `/v1beta1` API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::list_envelope;

/// Label key carrying the owning project id
pub const PROJECT_LABEL: &str = "tidb.cloud/project";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    /// `PUBLIC`, `VPC_PEERING` or `PRIVATE_ENDPOINT`
    #[serde(default)]
    pub connection_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TidbNodeGroup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tidb_node_group_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_spec_key: String,
    pub node_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub is_default_group: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TidbNodeSetting {
    pub node_spec_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tidb_node_groups: Vec<TidbNodeGroup>,
}

/// TiKV or TiFlash node layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNodeSetting {
    pub node_spec_key: String,
    pub node_count: u32,
    pub storage_size_gi: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub region_id: String,
    #[serde(default)]
    pub cloud_provider: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub tidb_node_setting: TidbNodeSetting,
    #[serde(default)]
    pub tikv_node_setting: StorageNodeSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiflash_node_setting: Option<StorageNodeSetting>,
    #[serde(default)]
    pub port: u16,
    /// `CREATING`, `ACTIVE`, `MODIFYING`, `PAUSED`, `RESUMING`, `DELETING`, ...
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Cluster {
    /// Project id from the cluster labels
    pub fn project_id(&self) -> Option<&str> {
        self.labels.get(PROJECT_LABEL).map(String::as_str)
    }
}

/// Request body for creating a dedicated cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub display_name: String,
    pub region_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub tidb_node_setting: TidbNodeSetting,
    pub tikv_node_setting: StorageNodeSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiflash_node_setting: Option<StorageNodeSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_password: Option<String>,
}

impl CreateClusterRequest {
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        region_id: impl Into<String>,
        tidb_node_setting: TidbNodeSetting,
        tikv_node_setting: StorageNodeSetting,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            region_id: region_id.into(),
            labels: BTreeMap::new(),
            tidb_node_setting,
            tikv_node_setting,
            tiflash_node_setting: None,
            port: None,
            root_password: None,
        }
    }

    /// Place the cluster in a project
    #[must_use]
    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.labels
            .insert(PROJECT_LABEL.to_string(), project_id.into());
        self
    }

    #[must_use]
    pub fn with_tiflash(mut self, setting: StorageNodeSetting) -> Self {
        self.tiflash_node_setting = Some(setting);
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_root_password(mut self, password: impl Into<String>) -> Self {
        self.root_password = Some(password.into());
        self
    }
}

/// Fields to change on a dedicated cluster; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateClusterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tidb_node_setting: Option<TidbNodeSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tikv_node_setting: Option<StorageNodeSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiflash_node_setting: Option<StorageNodeSetting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetRootPasswordRequest {
    pub root_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTidbNodeGroupRequest {
    pub display_name: String,
    pub node_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTidbNodeGroupRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub region_id: String,
    #[serde(default)]
    pub cloud_provider: String,
    #[serde(default)]
    pub display_name: String,
    /// Provider-side name, e.g. `us-west-2`
    #[serde(default)]
    pub region_name: String,
}

list_envelope!(ListClustersResponse, clusters: Cluster);
list_envelope!(ListTidbNodeGroupsResponse, tidb_node_groups: TidbNodeGroup);
list_envelope!(ListRegionsResponse, regions: Region);
