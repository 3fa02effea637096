//! Destination table schemas
//!
//! The warehouse tables are recreated from these literal column lists on
//! every run. Each list ends with the `partition_0` column the crawler adds
//! for the directory an object was found in.

use crate::error::{EtlError, Result};

/// Column holding the crawler's first-level partition value
pub const PARTITION_COLUMN: &str = "partition_0";

/// Warehouse schema the tables are created in
pub const TARGET_SCHEMA: &str = "public";

pub const TABLE_SCHEMAS: &[(&str, &str)] = &[
    (
        "costs",
        r#" "instance type" VARCHAR(256), "db.r5.4xlarge($)" DOUBLE PRECISION, "db.r6g.xlarge($)" DOUBLE PRECISION, "db.r6g.4xlarge($)" DOUBLE PRECISION, "db.r6g.large($)" DOUBLE PRECISION, "db.r5.xlarge($)" DOUBLE PRECISION, "no instance type($)" DOUBLE PRECISION, "db.r5.large($)" DOUBLE PRECISION, "db.t3.medium($)" DOUBLE PRECISION, "db.t4g.medium($)" DOUBLE PRECISION, "db.t2.medium($)" DOUBLE PRECISION, "total costs($)" DOUBLE PRECISION, "partition_0" VARCHAR(256)"#,
    ),
    (
        "country_table",
        "col0 VARCHAR(256), col1 VARCHAR(256), col2 VARCHAR(256), col3 VARCHAR(256), partition_0 VARCHAR(256)",
    ),
    (
        "customer_table",
        "col0 VARCHAR(256), col1 VARCHAR(256), partition_0 VARCHAR(256)",
    ),
    (
        "fx_table",
        "date VARCHAR(256), gbpusd DOUBLE PRECISION, eurusd DOUBLE PRECISION, audusd DOUBLE PRECISION, eurgbp DOUBLE PRECISION, euraud DOUBLE PRECISION, gbpaud DOUBLE PRECISION, jpyusd DOUBLE PRECISION, jpyaud DOUBLE PRECISION, jpyeur DOUBLE PRECISION, jpygbp DOUBLE PRECISION, krwusd DOUBLE PRECISION, krwaud DOUBLE PRECISION, krweur DOUBLE PRECISION, krwgbp DOUBLE PRECISION, krwjpy DOUBLE PRECISION, hkdusd DOUBLE PRECISION, hkdaud DOUBLE PRECISION, hkdeur DOUBLE PRECISION, hkdgbp DOUBLE PRECISION, hkdjpy DOUBLE PRECISION, hkdkrw DOUBLE PRECISION, twdusd DOUBLE PRECISION, twdaud DOUBLE PRECISION, twdeur DOUBLE PRECISION, twdgbp DOUBLE PRECISION, twdjpy DOUBLE PRECISION, twdkrw DOUBLE PRECISION, twdhkd DOUBLE PRECISION, partition_0 VARCHAR(256)",
    ),
    (
        "salesdata",
        "category VARCHAR(256), subcategory VARCHAR(256), product_family VARCHAR(256), key_product VARCHAR(256), sku VARCHAR(256), description VARCHAR(512), grade VARCHAR(256), country_id BIGINT, cost_currency VARCHAR(256), cost_per_device BIGINT, sales_date VARCHAR(256), sold_currency VARCHAR(256), price_sold_per_device BIGINT, status VARCHAR(256), customer_id BIGINT, quantity BIGINT, sales_order_id BIGINT, serial BIGINT, bin_id VARCHAR(256), partition_0 VARCHAR(256)",
    ),
];

pub fn schema_for(table: &str) -> Option<&'static str> {
    TABLE_SCHEMAS
        .iter()
        .find(|(name, _)| *name == table)
        .map(|(_, definition)| *definition)
}

/// Schemas of the tables named in `tables`, in [`TABLE_SCHEMAS`] order.
/// An empty selection means every table.
pub fn select_tables(tables: &[String]) -> Result<Vec<(&'static str, &'static str)>> {
    if let Some(unknown) = tables.iter().find(|t| schema_for(t).is_none()) {
        return Err(EtlError::UnknownTable(unknown.clone()));
    }

    Ok(TABLE_SCHEMAS
        .iter()
        .filter(|(name, _)| tables.is_empty() || tables.iter().any(|t| t == name))
        .copied()
        .collect())
}

/// Column names of a definition, in order and as written (quoted names keep
/// their quotes).
///
/// Commas inside double quotes or parentheses do not separate columns.
pub fn column_names(definition: &str) -> Vec<String> {
    split_columns(definition)
        .into_iter()
        .filter_map(|column| {
            let column = column.trim();
            if let Some(rest) = column.strip_prefix('"') {
                let end = rest.find('"')?;
                Some(format!("\"{}\"", &rest[..end]))
            } else {
                column.split_whitespace().next().map(str::to_string)
            }
        })
        .collect()
}

/// Columns loaded from the CSV data; everything but the partition column
pub fn data_columns(definition: &str) -> Vec<String> {
    column_names(definition)
        .into_iter()
        .filter(|name| name.trim_matches('"') != PARTITION_COLUMN)
        .collect()
}

/// SQL run before loading: replace the table with an empty one
pub fn preactions(table: &str, definition: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {schema}.{table}; CREATE TABLE IF NOT EXISTS {schema}.{table} ({definition});",
        schema = TARGET_SCHEMA,
    )
}

fn split_columns(definition: &str) -> Vec<&str> {
    let mut columns = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;

    for (i, c) in definition.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                columns.push(&definition[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    let last = &definition[start..];
    if !last.trim().is_empty() {
        columns.push(last);
    }

    columns
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_ends_with_partition_column() {
        assert_eq!(TABLE_SCHEMAS.len(), 5);
        for (table, definition) in TABLE_SCHEMAS {
            let columns = column_names(definition);
            assert_eq!(
                columns.last().unwrap().trim_matches('"'),
                PARTITION_COLUMN,
                "{}",
                table
            );
        }
    }

    #[test]
    fn test_quoted_column_names() {
        let columns = column_names(schema_for("costs").unwrap());

        assert_eq!(columns.len(), 13);
        assert_eq!(columns[0], "\"instance type\"");
        assert_eq!(columns[1], "\"db.r5.4xlarge($)\"");
        assert_eq!(columns[11], "\"total costs($)\"");
    }

    #[test]
    fn test_plain_column_names() {
        assert_eq!(
            column_names(schema_for("customer_table").unwrap()),
            vec!["col0", "col1", "partition_0"]
        );
        assert_eq!(column_names(schema_for("fx_table").unwrap()).len(), 30);
        assert_eq!(column_names(schema_for("salesdata").unwrap()).len(), 20);
    }

    #[test]
    fn test_parenthesized_commas_do_not_split() {
        assert_eq!(
            column_names("amount DECIMAL(10,2), note VARCHAR(64)"),
            vec!["amount", "note"]
        );
    }

    #[test]
    fn test_data_columns_drop_partition() {
        assert_eq!(
            data_columns(schema_for("country_table").unwrap()),
            vec!["col0", "col1", "col2", "col3"]
        );
    }

    #[test]
    fn test_preactions() {
        assert_eq!(
            preactions("customer_table", "col0 VARCHAR(256), partition_0 VARCHAR(256)"),
            "DROP TABLE IF EXISTS public.customer_table; CREATE TABLE IF NOT EXISTS public.customer_table (col0 VARCHAR(256), partition_0 VARCHAR(256));"
        );
    }

    #[test]
    fn test_unknown_table() {
        assert!(schema_for("users").is_none());
    }

    #[test]
    fn test_select_tables_keeps_load_order() {
        assert_eq!(select_tables(&[]).unwrap().len(), TABLE_SCHEMAS.len());

        let selected = select_tables(&["salesdata".to_string(), "costs".to_string()]).unwrap();
        let names: Vec<_> = selected.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["costs", "salesdata"]);
    }

    #[test]
    fn test_select_tables_rejects_unknown_name() {
        let err = select_tables(&["costs".to_string(), "users".to_string()]).unwrap_err();
        assert!(matches!(err, EtlError::UnknownTable(name) if name == "users"));
    }
}
