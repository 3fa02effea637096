//! Staging catalog data under the warehouse temp directory
//!
//! Objects of a catalog table are copied to
//! `{REDSHIFT_TMP_DIR}/{table}/{run id}/{partition}/` so every `COPY` reads
//! a prefix holding exactly one partition of one run.

use crate::error::{EtlError, Result};
use aws_sdk_s3::{error::DisplayErrorContext, Client};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

/// Staging directory for objects found directly under the table location
pub const UNPARTITIONED_DIR: &str = "_unpartitioned";

fn s3_error<E>(err: E) -> EtlError
where
    E: std::error::Error,
{
    EtlError::provider("S3", DisplayErrorContext(&err).to_string())
}

/// `s3://bucket/prefix/`; a non-empty prefix always ends with `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub prefix: String,
}

impl S3Location {
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| EtlError::InvalidLocation(uri.to_string()))?;

        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(EtlError::InvalidLocation(uri.to_string()));
        }

        let prefix = prefix.trim_matches('/');
        Ok(Self {
            bucket: bucket.to_string(),
            prefix: if prefix.is_empty() {
                String::new()
            } else {
                format!("{}/", prefix)
            },
        })
    }

    pub fn join(&self, segment: &str) -> Self {
        Self {
            bucket: self.bucket.clone(),
            prefix: format!("{}{}/", self.prefix, segment.trim_matches('/')),
        }
    }

    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// Partition value and partition-relative path of an object under `prefix`.
///
/// `prefix/2024/a.csv` belongs to partition `2024`, `prefix/year=2024/a.csv`
/// to `2024` as well, and `prefix/a.csv` to no partition. Directory markers
/// and `_`/`.`-prefixed files are skipped.
pub fn partition_of(prefix: &str, key: &str) -> Option<(Option<String>, String)> {
    let relative = key.strip_prefix(prefix)?;
    let file_name = relative.rsplit('/').next()?;
    if file_name.is_empty() || file_name.starts_with('_') || file_name.starts_with('.') {
        return None;
    }

    match relative.split_once('/') {
        Some((dir, rest)) => {
            let value = dir.split_once('=').map_or(dir, |(_, v)| v);
            Some((Some(value.to_string()), rest.to_string()))
        }
        None => Some((None, relative.to_string())),
    }
}

/// Source keys grouped by partition value
pub fn group_by_partition<'a, I>(prefix: &str, keys: I) -> BTreeMap<Option<String>, Vec<(String, String)>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut groups: BTreeMap<Option<String>, Vec<(String, String)>> = BTreeMap::new();
    for key in keys {
        if let Some((partition, relative)) = partition_of(prefix, key) {
            groups
                .entry(partition)
                .or_default()
                .push((key.to_string(), relative));
        }
    }
    groups
}

/// One partition of one table, staged for a single `COPY`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPartition {
    /// `None` for objects directly under the table location
    pub partition: Option<String>,
    pub location: S3Location,
    /// (source key, staged key)
    pub copies: Vec<(String, String)>,
}

/// Where every object of `table` goes for this run. Unpartitioned objects
/// come last so partition values can be assigned to freshly loaded rows.
pub fn plan_staging<'a, I>(
    source: &S3Location,
    staging_root: &S3Location,
    table: &str,
    run_id: &str,
    keys: I,
) -> Vec<StagedPartition>
where
    I: IntoIterator<Item = &'a str>,
{
    let run_root = staging_root.join(table).join(run_id);

    let mut plan: Vec<StagedPartition> = group_by_partition(&source.prefix, keys)
        .into_iter()
        .map(|(partition, objects)| {
            let location = match &partition {
                Some(value) => run_root.join(&format!("partition_0={}", value)),
                None => run_root.join(UNPARTITIONED_DIR),
            };
            let copies = objects
                .into_iter()
                .map(|(key, relative)| {
                    let staged = format!("{}{}", location.prefix, relative);
                    (key, staged)
                })
                .collect();
            StagedPartition {
                partition,
                location,
                copies,
            }
        })
        .collect();

    plan.sort_by_key(|p| p.partition.is_none());
    plan
}

fn copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<_> = key.split('/').map(urlencoding::encode).collect();
    format!("{}/{}", bucket, encoded.join("/"))
}

pub struct Staging {
    client: Client,
}

impl Staging {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Every key under `location`, following continuation tokens
    #[instrument(skip(self), fields(location = %location))]
    pub async fn list_keys(&self, location: &S3Location) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&location.bucket)
                .prefix(&location.prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(s3_error)?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            match output.next_continuation_token() {
                Some(next) if output.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }

        debug!(objects = keys.len(), "Listed objects");
        Ok(keys)
    }

    /// Copy the table's objects into its staging directories
    #[instrument(skip(self, source, staging_root), fields(source = %source))]
    pub async fn stage_table(
        &self,
        source: &S3Location,
        staging_root: &S3Location,
        table: &str,
        run_id: &str,
    ) -> Result<Vec<StagedPartition>> {
        let keys = self.list_keys(source).await?;
        let plan = plan_staging(source, staging_root, table, run_id, keys.iter().map(String::as_str));

        if plan.is_empty() {
            return Err(EtlError::NoData {
                table: table.to_string(),
                location: source.uri(),
            });
        }

        for partition in &plan {
            for (from, to) in &partition.copies {
                self.client
                    .copy_object()
                    .bucket(&staging_root.bucket)
                    .copy_source(copy_source(&source.bucket, from))
                    .key(to)
                    .send()
                    .await
                    .map_err(s3_error)?;
            }
        }

        let objects: usize = plan.iter().map(|p| p.copies.len()).sum();
        info!(table, partitions = plan.len(), objects, "Staged table data");

        Ok(plan)
    }

    /// Delete every staged copy
    #[instrument(skip_all)]
    pub async fn cleanup(&self, bucket: &str, staged: &[StagedPartition]) -> Result<()> {
        let mut deleted = 0usize;
        for partition in staged {
            for (_, key) in &partition.copies {
                self.client
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(s3_error)?;
                deleted += 1;
            }
        }

        debug!(deleted, "Removed staged objects");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        let loc = S3Location::parse("s3://data-bucket/costs").unwrap();
        assert_eq!(loc.bucket, "data-bucket");
        assert_eq!(loc.prefix, "costs/");
        assert_eq!(loc.uri(), "s3://data-bucket/costs/");

        let root = S3Location::parse("s3://data-bucket/").unwrap();
        assert_eq!(root.prefix, "");

        assert!(S3Location::parse("https://data-bucket/costs").is_err());
        assert!(S3Location::parse("s3:///costs").is_err());
    }

    #[test]
    fn test_join() {
        let tmp = S3Location::parse("s3://resources/temp/").unwrap();
        assert_eq!(tmp.join("costs").join("run-1").uri(), "s3://resources/temp/costs/run-1/");
    }

    #[test]
    fn test_partition_of() {
        assert_eq!(
            partition_of("costs/", "costs/2024/part-0.csv"),
            Some((Some("2024".to_string()), "part-0.csv".to_string()))
        );
        assert_eq!(
            partition_of("costs/", "costs/year=2024/part-0.csv"),
            Some((Some("2024".to_string()), "part-0.csv".to_string()))
        );
        assert_eq!(
            partition_of("costs/", "costs/costs.csv"),
            Some((None, "costs.csv".to_string()))
        );
        assert_eq!(partition_of("costs/", "costs/"), None);
        assert_eq!(partition_of("costs/", "costs/2024/_SUCCESS"), None);
        assert_eq!(partition_of("costs/", "other/a.csv"), None);
    }

    #[test]
    fn test_copy_source_encodes_key_segments() {
        assert_eq!(
            copy_source("b", "costs/db costs($).csv"),
            "b/costs/db%20costs%28%24%29.csv"
        );
    }
}
