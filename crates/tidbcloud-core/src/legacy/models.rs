//! Wire models for the legacy `/api/v1beta` API
//!
//! Identifiers are numeric strings. Timestamps are Unix seconds encoded as
//! strings and are kept as received.

use serde::{Deserialize, Serialize};

use crate::api::opt_u64;

/// `{ items, total }` list envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default, deserialize_with = "opt_u64")]
    pub total: Option<u64>,
}

/// `{ id }` returned by create calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResource {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// Size and count of one cluster component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub node_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size_gib: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_quantity: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tidb: Option<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tikv: Option<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiflash: Option<ComponentSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAccess {
    pub cidr: String,
    #[serde(default)]
    pub description: String,
}

/// Cluster configuration as sent on create and restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_access_list: Vec<IpAccess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

/// Request body for creating a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    /// `DEDICATED` or `DEVELOPER`
    pub cluster_type: String,
    /// `AWS` or `GCP`
    pub cloud_provider: String,
    pub region: String,
    pub config: ClusterConfig,
}

impl CreateClusterRequest {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        cluster_type: impl Into<String>,
        cloud_provider: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cluster_type: cluster_type.into(),
            cloud_provider: cloud_provider.into(),
            region: region.into(),
            config: ClusterConfig::default(),
        }
    }

    #[must_use]
    pub fn with_root_password(mut self, password: impl Into<String>) -> Self {
        self.config.root_password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_components(mut self, components: Components) -> Self {
        self.config.components = Some(components);
        self
    }

    #[must_use]
    pub fn with_ip_access(mut self, cidr: impl Into<String>, description: impl Into<String>) -> Self {
        self.config.ip_access_list.push(IpAccess {
            cidr: cidr.into(),
            description: description.into(),
        });
        self
    }
}

/// Request body for scaling or pausing a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateClusterRequest {
    pub config: UpdateClusterConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateClusterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

impl UpdateClusterRequest {
    #[must_use]
    pub fn scale(components: Components) -> Self {
        Self {
            config: UpdateClusterConfig {
                components: Some(components),
                paused: None,
            },
        }
    }

    #[must_use]
    pub fn paused(paused: bool) -> Self {
        Self {
            config: UpdateClusterConfig {
                components: None,
                paused: Some(paused),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStrings {
    #[serde(default)]
    pub default_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_peering: Option<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(default)]
    pub tidb_version: String,
    /// `AVAILABLE`, `CREATING`, `MODIFYING`, `PAUSED`, ...
    #[serde(default)]
    pub cluster_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_strings: Option<ConnectionStrings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub cluster_type: String,
    #[serde(default)]
    pub cloud_provider: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<String>,
    #[serde(default)]
    pub config: ClusterConfig,
    #[serde(default)]
    pub status: ClusterStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBackupRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `MANUAL` or `AUTO`
    #[serde(default, rename = "type")]
    pub backup_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<String>,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRestoreRequest {
    pub backup_id: String,
    pub name: String,
    pub config: ClusterConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRestore {
    pub id: String,
    #[serde(default)]
    pub cluster_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredCluster {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restore {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<String>,
    #[serde(default)]
    pub backup_id: String,
    #[serde(default)]
    pub cluster_id: String,
    /// `PENDING`, `RUNNING`, `FAILED` or `SUCCESS`
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<RestoredCluster>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backslash_escape: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_last_separator: Option<bool>,
}

/// Request body for starting an import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateImportRequest {
    /// `S3`, `GCS` or `LOCAL`
    #[serde(rename = "type")]
    pub import_type: String,
    /// `SqlFile`, `AuroraSnapshot`, `CSV` or `Parquet`
    pub data_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_format: Option<CsvFormat>,
    /// Name returned by upload URL generation, for `LOCAL` imports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_table: Option<TargetTable>,
}

impl CreateImportRequest {
    /// Import from object storage
    #[must_use]
    pub fn from_source(
        import_type: impl Into<String>,
        data_format: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            import_type: import_type.into(),
            data_format: data_format.into(),
            source_url: Some(source_url.into()),
            aws_role_arn: None,
            csv_format: None,
            file_name: None,
            target_table: None,
        }
    }

    /// Import a file previously uploaded through an upload URL
    #[must_use]
    pub fn local(new_file_name: impl Into<String>, target_table: TargetTable) -> Self {
        Self {
            import_type: "LOCAL".to_string(),
            data_format: "CSV".to_string(),
            source_url: None,
            aws_role_arn: None,
            csv_format: None,
            file_name: Some(new_file_name.into()),
            target_table: Some(target_table),
        }
    }

    #[must_use]
    pub fn with_aws_role_arn(mut self, arn: impl Into<String>) -> Self {
        self.aws_role_arn = Some(arn.into());
        self
    }

    #[must_use]
    pub fn with_csv_format(mut self, format: CsvFormat) -> Self {
        self.csv_format = Some(format);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTable {
    pub schema: String,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub id: String,
    #[serde(default)]
    pub cluster_id: String,
    /// `PREPARING`, `IMPORTING`, `COMPLETED`, `FAILED` or `CANCELING`
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "type")]
    pub import_type: String,
    #[serde(default)]
    pub data_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<String>,
    #[serde(default, deserialize_with = "opt_u64")]
    pub total_size: Option<u64>,
    #[serde(default, deserialize_with = "opt_u64")]
    pub total_files: Option<u64>,
    #[serde(default, deserialize_with = "opt_u64")]
    pub completed_tables: Option<u64>,
    #[serde(default, deserialize_with = "opt_u64")]
    pub pending_tables: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrlRequest {
    pub file_name: String,
    pub content_length: u64,
}

/// Pre-signed upload destination issued by the legacy API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrl {
    pub upload_url: String,
    /// Name to reference the uploaded object by when creating an import
    pub new_file_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_cluster_body() {
        let request = CreateClusterRequest::new("dev", "DEVELOPER", "AWS", "us-west-2")
            .with_root_password("secret")
            .with_ip_access("0.0.0.0/0", "anywhere");

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "name": "dev",
                "cluster_type": "DEVELOPER",
                "cloud_provider": "AWS",
                "region": "us-west-2",
                "config": {
                    "root_password": "secret",
                    "ip_access_list": [{"cidr": "0.0.0.0/0", "description": "anywhere"}]
                }
            })
        );
    }

    #[test]
    fn test_cluster_tolerates_sparse_response() {
        let cluster: Cluster = serde_json::from_value(json!({
            "id": "1379661944646413143",
            "name": "Cluster0",
            "status": {"cluster_status": "AVAILABLE"}
        }))
        .unwrap();

        assert_eq!(cluster.status.cluster_status, "AVAILABLE");
        assert!(cluster.config.components.is_none());
    }

    #[test]
    fn test_list_total_as_string() {
        let list: ListResponse<Project> = serde_json::from_value(json!({
            "items": [{"id": "1", "org_id": "2", "name": "default", "cluster_count": "3"}],
            "total": "1"
        }))
        .unwrap();
        assert_eq!(list.total, Some(1));
        assert_eq!(list.items[0].cluster_count, Some(3));
    }

    #[test]
    fn test_pause_body() {
        assert_eq!(
            serde_json::to_value(UpdateClusterRequest::paused(true)).unwrap(),
            json!({"config": {"paused": true}})
        );
    }
}
