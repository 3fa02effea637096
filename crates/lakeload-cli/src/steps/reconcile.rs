//! Row-count reconciliation between local CSVs and warehouse tables

use super::upload::CsvFileSet;
use crate::error::{PipelineError, Result};
use crate::providers::Warehouse;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument, warn};

/// `sales.csv` → `sales`
pub fn table_name(path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PipelineError::invalid_input(format!("'{}' has no usable file name", path.display()))
        })?;

    let table = file_name.strip_suffix(".csv").unwrap_or(file_name);
    if table.is_empty() {
        return Err(PipelineError::invalid_input(format!(
            "cannot derive a table name from '{}'",
            file_name
        )));
    }

    Ok(table.to_string())
}

/// Data rows of a CSV file: line count minus the header line.
///
/// A final line without a trailing newline still counts.
pub fn count_local_rows(path: &Path) -> Result<u64> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; 64 * 1024];
    let mut lines: u64 = 0;
    let mut last = None;

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        lines += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        last = Some(buf[n - 1]);
    }

    if last.is_some_and(|b| b != b'\n') {
        lines += 1;
    }

    Ok(lines.saturating_sub(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Matched,
    /// Counts differ but the table is exempt
    Exempt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReconciliation {
    pub table: String,
    pub local_rows: u64,
    pub warehouse_rows: u64,
    pub status: ReconcileStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub tables: Vec<TableReconciliation>,
}

impl ReconcileReport {
    pub fn exempted(&self) -> impl Iterator<Item = &TableReconciliation> {
        self.tables
            .iter()
            .filter(|t| t.status == ReconcileStatus::Exempt)
    }
}

/// Compare every file's local count with its warehouse table.
///
/// The first mismatch on a non-exempt table fails the check; query and
/// connection errors propagate.
#[instrument(skip_all, fields(files = files.len()))]
pub async fn reconcile(
    warehouse: &dyn Warehouse,
    files: &CsvFileSet,
    exempt_tables: &BTreeSet<String>,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for path in files.files() {
        let table = table_name(path)?;
        let local_rows = count_local_rows(path)?;
        let warehouse_rows = warehouse.count_rows(&table).await?;

        let status = if local_rows == warehouse_rows {
            info!(table = %table, rows = local_rows, "Row counts match");
            ReconcileStatus::Matched
        } else if exempt_tables.contains(&table) {
            warn!(
                table = %table,
                local_rows,
                warehouse_rows,
                "Row counts differ on exempt table"
            );
            ReconcileStatus::Exempt
        } else {
            return Err(PipelineError::RowCountMismatch {
                table,
                local: local_rows,
                warehouse: warehouse_rows,
            });
        };

        report.tables.push(TableReconciliation {
            table,
            local_rows,
            warehouse_rows,
            status,
        });
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name(Path::new("data/sales.csv")).unwrap(), "sales");
        assert!(table_name(Path::new(".csv")).is_err());
    }

    #[test]
    fn test_count_local_rows() {
        let dir = TempDir::new().unwrap();

        let full = write(&dir, "a.csv", "id,name\n1,a\n2,b\n3,c\n");
        assert_eq!(count_local_rows(&full).unwrap(), 3);

        let unterminated = write(&dir, "b.csv", "id,name\n1,a\n2,b");
        assert_eq!(count_local_rows(&unterminated).unwrap(), 2);

        let header_only = write(&dir, "c.csv", "id,name\n");
        assert_eq!(count_local_rows(&header_only).unwrap(), 0);

        let empty = write(&dir, "d.csv", "");
        assert_eq!(count_local_rows(&empty).unwrap(), 0);
    }
}
