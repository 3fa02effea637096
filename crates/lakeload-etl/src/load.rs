//! Reloading one warehouse table

use crate::schema::{data_columns, preactions, PARTITION_COLUMN, TARGET_SCHEMA};
use crate::staging::StagedPartition;
use crate::error::Result;
use sqlx::{Connection, PgConnection};
use tracing::{debug, info, instrument};

/// `COPY` of one staged prefix into the data columns
pub fn copy_statement(table: &str, columns: &[String], source_uri: &str, iam_role: &str) -> String {
    format!(
        "COPY {}.{} ({}) FROM '{}' IAM_ROLE '{}' FORMAT AS CSV IGNOREHEADER 1",
        TARGET_SCHEMA,
        table,
        columns.join(", "),
        quote_literal(source_uri),
        quote_literal(iam_role),
    )
}

/// Tag the rows just copied with their partition value
pub fn partition_update(table: &str, value: &str) -> String {
    format!(
        "UPDATE {schema}.{table} SET {col} = '{value}' WHERE {col} IS NULL",
        schema = TARGET_SCHEMA,
        col = PARTITION_COLUMN,
        value = quote_literal(value),
    )
}

fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Statements that replace `table` with the staged data, in order
pub fn load_statements(
    table: &str,
    definition: &str,
    staged: &[StagedPartition],
    iam_role: &str,
) -> Vec<String> {
    let columns = data_columns(definition);
    let mut statements = vec![preactions(table, definition)];

    for partition in staged {
        statements.push(copy_statement(
            table,
            &columns,
            &partition.location.uri(),
            iam_role,
        ));
        if let Some(value) = &partition.partition {
            statements.push(partition_update(table, value));
        }
    }

    statements
}

/// Run `statements` in a single transaction; nothing is kept on failure
#[instrument(skip(conn, statements), fields(statements = statements.len()))]
pub async fn reload_table(conn: &mut PgConnection, table: &str, statements: &[String]) -> Result<()> {
    let mut tx = conn.begin().await?;

    for statement in statements {
        debug!(statement = %statement, "Executing");
        sqlx::raw_sql(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    info!(table, "Table reloaded");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::staging::S3Location;

    const ROLE: &str = "arn:aws:iam::123456789012:role/copy";

    #[test]
    fn test_copy_statement() {
        let columns = vec!["col0".to_string(), "col1".to_string()];
        assert_eq!(
            copy_statement("customer_table", &columns, "s3://tmp/customer_table/r1/_unpartitioned/", ROLE),
            "COPY public.customer_table (col0, col1) FROM 's3://tmp/customer_table/r1/_unpartitioned/' \
             IAM_ROLE 'arn:aws:iam::123456789012:role/copy' FORMAT AS CSV IGNOREHEADER 1"
        );
    }

    #[test]
    fn test_partition_update_escapes_quotes() {
        assert_eq!(
            partition_update("costs", "o'brien"),
            "UPDATE public.costs SET partition_0 = 'o''brien' WHERE partition_0 IS NULL"
        );
    }

    #[test]
    fn test_load_statements_order() {
        let root = S3Location::parse("s3://tmp/costs/r1/").unwrap();
        let staged = vec![
            StagedPartition {
                partition: Some("2024".to_string()),
                location: root.join("partition_0=2024"),
                copies: vec![],
            },
            StagedPartition {
                partition: None,
                location: root.join("_unpartitioned"),
                copies: vec![],
            },
        ];

        let statements = load_statements(
            "customer_table",
            "col0 VARCHAR(256), col1 VARCHAR(256), partition_0 VARCHAR(256)",
            &staged,
            ROLE,
        );

        assert_eq!(statements.len(), 4);
        assert!(statements[0].starts_with("DROP TABLE IF EXISTS public.customer_table;"));
        assert!(statements[1].contains("FROM 's3://tmp/costs/r1/partition_0=2024/'"));
        assert!(statements[1].contains("(col0, col1)"));
        assert!(statements[2].starts_with("UPDATE public.customer_table SET partition_0 = '2024'"));
        assert!(statements[3].contains("_unpartitioned"));
    }
}
