//! Wire models for the serverless `/v1beta1` API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::{list_envelope, opt_u64};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Resource name, e.g. `regions/aws-us-east-1`
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cloud_provider: String,
}

impl Region {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Monthly spending cap in US cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingLimit {
    pub monthly: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicEndpoint {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateEndpoint {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<PublicEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<PrivateEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub region: Region,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spending_limit: Option<SpendingLimit>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// `CREATING`, `ACTIVE`, `RESTORING`, `MAINTENANCE`, `DELETING`, ...
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub user_prefix: String,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

/// Request body for creating a serverless cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub display_name: String,
    pub region: Region,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spending_limit: Option<SpendingLimit>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Endpoints>,
}

impl CreateClusterRequest {
    #[must_use]
    pub fn new(display_name: impl Into<String>, region_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            region: Region::named(region_name),
            spending_limit: None,
            labels: BTreeMap::new(),
            root_password: None,
            endpoints: None,
        }
    }

    #[must_use]
    pub fn with_spending_limit(mut self, monthly: u32) -> Self {
        self.spending_limit = Some(SpendingLimit { monthly });
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_root_password(mut self, password: impl Into<String>) -> Self {
        self.root_password = Some(password.into());
        self
    }
}

/// Fields to change on a serverless cluster
///
/// Serialized with an `update_mask` listing exactly the fields that are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateClusterRequest {
    pub display_name: Option<String>,
    pub spending_limit: Option<SpendingLimit>,
    pub labels: Option<BTreeMap<String, String>>,
    pub public_endpoint_disabled: Option<bool>,
}

#[derive(Serialize)]
struct UpdateClusterBody<'a> {
    cluster: UpdateClusterFields<'a>,
    update_mask: String,
}

#[derive(Serialize)]
struct UpdateClusterFields<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spending_limit: Option<SpendingLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'a BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoints: Option<serde_json::Value>,
}

impl UpdateClusterRequest {
    /// Field paths that will be sent
    pub fn update_mask(&self) -> Vec<&'static str> {
        let mut mask = Vec::new();
        if self.display_name.is_some() {
            mask.push("display_name");
        }
        if self.spending_limit.is_some() {
            mask.push("spending_limit");
        }
        if self.labels.is_some() {
            mask.push("labels");
        }
        if self.public_endpoint_disabled.is_some() {
            mask.push("endpoints.public.disabled");
        }
        mask
    }

    pub fn is_empty(&self) -> bool {
        self.update_mask().is_empty()
    }
}

impl Serialize for UpdateClusterRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let endpoints = self
            .public_endpoint_disabled
            .map(|disabled| serde_json::json!({ "public": { "disabled": disabled } }));
        UpdateClusterBody {
            cluster: UpdateClusterFields {
                display_name: self.display_name.as_deref(),
                spending_limit: self.spending_limit,
                labels: self.labels.as_ref(),
                endpoints,
            },
            update_mask: self.update_mask().join(","),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub branch_id: String,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub parent_display_name: String,
    /// `CREATING`, `ACTIVE`, `DELETED`, `MAINTENANCE`, `RESTORING`
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub user_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBranchRequest {
    pub display_name: String,
    /// Parent branch id; the cluster itself when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Point in time of the parent to branch from; now when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_timestamp: Option<DateTime<Utc>>,
}

impl CreateBranchRequest {
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            parent_id: None,
            parent_timestamp: None,
        }
    }

    #[must_use]
    pub fn from_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.parent_timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// `SQL`, `CSV` or `PARQUET`
    #[serde(default)]
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// `GZIP`, `SNAPPY`, `ZSTD` or `NONE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Location {
    pub uri: String,
    /// `ROLE_ARN` or `ACCESS_KEY`
    #[serde(default)]
    pub auth_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTarget {
    /// `LOCAL` or `S3`
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub export_id: String,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub display_name: String,
    /// `RUNNING`, `SUCCEEDED`, `FAILED`, `CANCELED`, `DELETED`, `EXPIRED`
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub export_options: ExportOptions,
    #[serde(default)]
    pub target: ExportTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateExportRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub export_options: ExportOptions,
    pub target: ExportTarget,
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
    pub null_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// `CSV`, `SQL`, `AURORA_SNAPSHOT` or `PARQUET`
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_format: Option<CsvFormat>,
}

/// A file staged through the multipart upload API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSource {
    pub upload_id: String,
    pub target_database: String,
    pub target_table: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSource {
    /// `LOCAL` or `S3`
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateImportRequest {
    pub import_options: ImportOptions,
    pub source: ImportSource,
}

impl CreateImportRequest {
    /// Import a file uploaded with the multipart upload API
    #[must_use]
    pub fn local(
        upload_id: impl Into<String>,
        target_database: impl Into<String>,
        target_table: impl Into<String>,
        file_type: impl Into<String>,
    ) -> Self {
        Self {
            import_options: ImportOptions {
                file_type: file_type.into(),
                csv_format: None,
            },
            source: ImportSource {
                source_type: "LOCAL".to_string(),
                local: Some(LocalSource {
                    upload_id: upload_id.into(),
                    target_database: target_database.into(),
                    target_table: target_table.into(),
                }),
                s3: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub import_id: String,
    #[serde(default)]
    pub cluster_id: String,
    /// `PREPARING`, `IMPORTING`, `COMPLETED`, `FAILED`, `CANCELING`, `CANCELED`
    #[serde(default)]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_options: Option<ImportOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ImportSource>,
    #[serde(default, deserialize_with = "opt_u64")]
    pub total_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<DateTime<Utc>>,
}

/// `POST .../uploads` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartUploadRequest {
    pub file_name: String,
    pub content_length: u64,
    pub part_count: u32,
}

/// One pre-signed part destination issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedPart {
    pub part_number: u32,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartUploadResponse {
    pub upload_id: String,
    #[serde(default)]
    pub parts: Vec<PresignedPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// `POST .../uploads/complete` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteUploadRequest {
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

/// `POST .../uploads/cancel` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelUploadRequest {
    pub upload_id: String,
}

list_envelope!(ListClustersResponse, clusters: Cluster);
list_envelope!(ListBranchesResponse, branches: Branch);
list_envelope!(ListExportsResponse, exports: Export);
list_envelope!(ListImportsResponse, imports: Import);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_update_mask_follows_set_fields() {
        let update = UpdateClusterRequest {
            display_name: Some("renamed".to_string()),
            public_endpoint_disabled: Some(true),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({
                "cluster": {
                    "display_name": "renamed",
                    "endpoints": {"public": {"disabled": true}}
                },
                "update_mask": "display_name,endpoints.public.disabled"
            })
        );
        assert!(UpdateClusterRequest::default().is_empty());
    }

    #[test]
    fn test_create_cluster_body() {
        let request = CreateClusterRequest::new("dev", "regions/aws-us-east-1")
            .with_spending_limit(1000)
            .with_label("tidb.cloud/project", "42");

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "display_name": "dev",
                "region": {"name": "regions/aws-us-east-1"},
                "spending_limit": {"monthly": 1000},
                "labels": {"tidb.cloud/project": "42"}
            })
        );
    }

    #[test]
    fn test_start_upload_response() {
        let response: StartUploadResponse = serde_json::from_value(json!({
            "upload_id": "up-1",
            "parts": [
                {"part_number": 1, "url": "https://s3.example.com/p1"},
                {"part_number": 2, "url": "https://s3.example.com/p2"}
            ]
        }))
        .unwrap();
        assert_eq!(response.parts.len(), 2);
        assert_eq!(response.parts[1].part_number, 2);
    }
}
