// 📋 Data-Table Rows
// Typed rows of the data-table page: creation with validation, mock data, totals

use crate::record::{Keyed, RowKey, DEFAULT_ID_FIELD};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Active,
    Inactive,
    Pending,
}

impl RowStatus {
    pub fn name(&self) -> &str {
        match self {
            RowStatus::Active => "active",
            RowStatus::Inactive => "inactive",
            RowStatus::Pending => "pending",
        }
    }
}

/// TableRow - one row of the data-table page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub id: String,
    pub title1: String,
    pub title2: String,
    pub status: RowStatus,
    pub category: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CreateRow - input of the "new row" dialog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateRow {
    #[validate(length(min = 1, message = "title 1 is required"))]
    pub title1: String,

    #[validate(length(min = 1, message = "title 2 is required"))]
    pub title2: String,

    pub status: RowStatus,

    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,

    #[validate(range(min = 0.0, message = "value cannot be negative"))]
    pub value: f64,
}

impl TableRow {
    /// Validate the input and stamp a new row with a fresh id
    pub fn create(input: CreateRow) -> Result<TableRow, ValidationErrors> {
        input.validate()?;
        let now = Utc::now();
        Ok(TableRow {
            id: uuid::Uuid::new_v4().to_string(),
            title1: input.title1,
            title2: input.title2,
            status: input.status,
            category: input.category,
            value: input.value,
            created_at: now,
            updated_at: now,
        })
    }

    /// Mark the row as modified now
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Keyed for TableRow {
    fn key(&self, id_field: &str) -> Option<RowKey> {
        match id_field {
            DEFAULT_ID_FIELD => Some(self.id.clone()),
            "title1" => Some(self.title1.clone()),
            "title2" => Some(self.title2.clone()),
            "category" => Some(self.category.clone()),
            _ => None,
        }
    }
}

/// The rows served by the mocked fetch
pub fn mock_rows() -> Vec<TableRow> {
    let row = |id: &str, title: &str, status: RowStatus, category: &str, value: f64, day: u32| {
        let at = Utc
            .with_ymd_and_hms(2024, 1, day, 0, 0, 0)
            .single()
            .unwrap_or_default();
        TableRow {
            id: id.to_string(),
            title1: format!("Item {}", title),
            title2: format!("Description {}", title),
            status,
            category: category.to_string(),
            value,
            created_at: at,
            updated_at: at,
        }
    };

    vec![
        row("1", "A", RowStatus::Active, "Category 1", 100.0, 1),
        row("2", "B", RowStatus::Inactive, "Category 2", 200.0, 2),
        row("3", "C", RowStatus::Pending, "Category 1", 150.0, 3),
    ]
}

/// ValueTotals - arithmetic totals of the `value` column
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValueTotals {
    pub count: usize,
    pub total: f64,
    pub by_status: BTreeMap<RowStatus, f64>,
}

pub fn value_totals(rows: &[TableRow]) -> ValueTotals {
    let mut totals = ValueTotals::default();
    for row in rows {
        totals.count += 1;
        totals.total += row.value;
        *totals.by_status.entry(row.status).or_insert(0.0) += row.value;
    }
    totals
}
