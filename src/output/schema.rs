//! Arrow schema and conversion for usage rows

use crate::error::Result;
use crate::model::{Breakdown, UsageRecord};
use arrow::array::{ArrayRef, Date32Array, Int64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Datelike;
use std::sync::Arc;

/// Days from 0001-01-01 to 1970-01-01
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Metric columns, in output order
const METRIC_COLUMNS: [&str; 9] = [
    "total_seats",
    "total_active_users",
    "total_engaged_users",
    "total_suggestions_count",
    "total_acceptances_count",
    "total_lines_suggested",
    "total_lines_accepted",
    "total_active_users_chat",
    "total_active_chat_sessions",
];

/// Arrow schema of an exported usage batch
///
/// Breakdown columns hold the versioned JSON text stored in the domain store.
pub fn usage_schema() -> Schema {
    let mut fields = vec![
        Field::new("connection_id", DataType::UInt64, false),
        Field::new("resource_id", DataType::Utf8, false),
        Field::new("day", DataType::Date32, false),
    ];
    fields.extend(
        METRIC_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Int64, false)),
    );
    fields.push(Field::new("language_breakdown", DataType::Utf8, true));
    fields.push(Field::new("editor_breakdown", DataType::Utf8, true));
    Schema::new(fields)
}

fn metrics(record: &UsageRecord) -> [i64; 9] {
    [
        record.total_seats,
        record.total_active_users,
        record.total_engaged_users,
        record.total_suggestions_count,
        record.total_acceptances_count,
        record.total_lines_suggested,
        record.total_lines_accepted,
        record.total_active_users_chat,
        record.total_active_chat_sessions,
    ]
}

fn breakdown_column(
    records: &[UsageRecord],
    pick: impl Fn(&UsageRecord) -> Option<&Breakdown>,
) -> Result<ArrayRef> {
    let values = records
        .iter()
        .map(|r| pick(r).map(Breakdown::to_json).transpose())
        .collect::<Result<Vec<Option<String>>>>()?;
    Ok(Arc::new(StringArray::from(values)))
}

/// Convert usage rows to an Arrow RecordBatch
pub fn usage_to_arrow(records: &[UsageRecord]) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            records.iter().map(|r| r.connection_id),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.resource_id.as_str()),
        )),
        Arc::new(Date32Array::from_iter_values(
            records
                .iter()
                .map(|r| r.day.num_days_from_ce() - EPOCH_DAYS_FROM_CE),
        )),
    ];

    let rows: Vec<[i64; 9]> = records.iter().map(metrics).collect();
    for index in 0..METRIC_COLUMNS.len() {
        columns.push(Arc::new(Int64Array::from_iter_values(
            rows.iter().map(|m| m[index]),
        )));
    }

    columns.push(breakdown_column(records, |r| r.language_breakdown.as_ref())?);
    columns.push(breakdown_column(records, |r| r.editor_breakdown.as_ref())?);

    Ok(RecordBatch::try_new(Arc::new(usage_schema()), columns)?)
}
