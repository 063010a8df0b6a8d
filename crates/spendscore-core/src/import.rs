//! CSV import parsers for the training datasets
//!
//! Columns are located by header name (case-insensitive). A row whose date or
//! amount cannot be parsed, or whose category is empty, is rejected and
//! counted, never coerced. A malformed CSV record is an error.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use tracing::{debug, warn};

use crate::config::Vocabulary;
use crate::dataset::normalize_category;
use crate::error::{Error, Result};
use crate::models::{BudgetShareRow, GoalRecord, SpendingRecord, Transaction, TransactionType};

/// Spend columns of the spending-habits survey, in file order
pub const HABIT_SPEND_COLUMNS: [&str; 11] = [
    "Rent",
    "Loan_Repayment",
    "Insurance",
    "Groceries",
    "Transport",
    "Eating_Out",
    "Entertainment",
    "Utilities",
    "Healthcare",
    "Education",
    "Miscellaneous",
];

const INCOME_COLUMN: &str = "Income";
const SAVINGS_COLUMN: &str = "Desired_Savings_Percentage";
const BUDGET_SUFFIX: &str = "Budget";
/// Fallback header for the transaction type (used by exported clean files)
const TYPE_FALLBACK_COLUMN: &str = "type";

/// Header names of a labeled transaction table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionColumns {
    pub date: String,
    pub description: String,
    pub amount: String,
    pub category: String,
    /// Optional; rows without it are expenses
    pub kind: Option<String>,
}

impl Default for TransactionColumns {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            description: "Description".to_string(),
            amount: "Amount".to_string(),
            category: "Category".to_string(),
            kind: Some("Transaction Type".to_string()),
        }
    }
}

/// Header names of a categorized spending table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendingColumns {
    pub date: String,
    pub category: String,
    pub amount: String,
}

impl Default for SpendingColumns {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            category: "category".to_string(),
            amount: "amount".to_string(),
        }
    }
}

/// Parsed rows plus the number of rows rejected
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRows<T> {
    pub rows: Vec<T>,
    pub rejected: usize,
}

/// Budget shares and savings goals from the spending-habits survey
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitsData {
    pub shares: Vec<BudgetShareRow>,
    pub goals: Vec<GoalRecord>,
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
}

fn required_column(headers: &StringRecord, name: &str) -> Result<usize> {
    column_index(headers, name).ok_or_else(|| Error::Import(format!("Missing column: {}", name)))
}

/// Parse a labeled transaction table
pub fn parse_transactions_csv<R: Read>(
    reader: R,
    columns: &TransactionColumns,
) -> Result<ParsedRows<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let date_col = required_column(&headers, &columns.date)?;
    let description_col = required_column(&headers, &columns.description)?;
    let amount_col = required_column(&headers, &columns.amount)?;
    let category_col = required_column(&headers, &columns.category)?;
    let kind_col = columns
        .kind
        .as_deref()
        .and_then(|name| column_index(&headers, name))
        .or_else(|| column_index(&headers, TYPE_FALLBACK_COLUMN));

    let mut rows = Vec::new();
    let mut rejected = 0;

    for (line, result) in rdr.records().enumerate() {
        let record = result?;

        let parsed = (|| -> Result<Transaction> {
            let date = parse_date(record.get(date_col).unwrap_or(""))?;
            let amount = parse_amount(record.get(amount_col).unwrap_or(""))?;
            let category = record.get(category_col).unwrap_or("").trim();
            if category.is_empty() {
                return Err(Error::Import("Missing category".into()));
            }
            let kind = match kind_col.and_then(|i| record.get(i)).map(str::trim) {
                None | Some("") => TransactionType::Expense,
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    debug!(kind = raw, "Unrecognized transaction type");
                    TransactionType::Other
                }),
            };
            Ok(Transaction {
                date,
                description: record.get(description_col).unwrap_or("").to_string(),
                amount,
                category: category.to_string(),
                kind,
            })
        })();

        match parsed {
            Ok(tx) => rows.push(tx),
            Err(e) => {
                warn!(line = line + 2, error = %e, "Rejected transaction row");
                rejected += 1;
            }
        }
    }

    debug!("Parsed {} transactions ({} rejected)", rows.len(), rejected);
    Ok(ParsedRows { rows, rejected })
}

/// Parse a categorized spending table
pub fn parse_spending_csv<R: Read>(
    reader: R,
    columns: &SpendingColumns,
) -> Result<ParsedRows<SpendingRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let date_col = required_column(&headers, &columns.date)?;
    let category_col = required_column(&headers, &columns.category)?;
    let amount_col = required_column(&headers, &columns.amount)?;

    let mut rows = Vec::new();
    let mut rejected = 0;

    for (line, result) in rdr.records().enumerate() {
        let record = result?;

        let parsed = (|| -> Result<SpendingRecord> {
            let date = parse_date(record.get(date_col).unwrap_or(""))?;
            let amount = parse_amount(record.get(amount_col).unwrap_or(""))?;
            let category = record.get(category_col).unwrap_or("").trim();
            if category.is_empty() {
                return Err(Error::Import("Missing category".into()));
            }
            Ok(SpendingRecord {
                date,
                category: category.to_string(),
                amount,
            })
        })();

        match parsed {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!(line = line + 2, error = %e, "Rejected spending row");
                rejected += 1;
            }
        }
    }

    debug!("Parsed {} spending rows ({} rejected)", rows.len(), rejected);
    Ok(ParsedRows { rows, rejected })
}

/// Turn one row's named amounts into shares of their total
///
/// Unparseable cells count as 0. Rows with a non-positive total yield `None`.
/// Columns that normalise to the same category are summed.
fn share_row(
    record: &StringRecord,
    columns: &[(Option<usize>, String)],
) -> Option<BudgetShareRow> {
    let values: Vec<f64> = columns
        .iter()
        .map(|(index, _)| {
            index
                .and_then(|i| record.get(i))
                .and_then(|cell| parse_amount(cell).ok())
                .unwrap_or(0.0)
        })
        .collect();
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let mut row = BudgetShareRow::new();
    for ((_, category), value) in columns.iter().zip(values) {
        *row.entry(category.clone()).or_insert(0.0) += value / total;
    }
    Some(row)
}

/// Parse a budget allocation table: every column ending in `Budget`
pub fn parse_budget_allocation_csv<R: Read>(
    reader: R,
    vocabulary: &Vocabulary,
) -> Result<Vec<BudgetShareRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns: Vec<(Option<usize>, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.ends_with(BUDGET_SUFFIX))
        .map(|(i, h)| {
            (
                Some(i),
                normalize_category(&h.replace(BUDGET_SUFFIX, ""), vocabulary),
            )
        })
        .collect();
    if columns.is_empty() {
        return Err(Error::Import("No budget columns found".into()));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if let Some(row) = share_row(&record, &columns) {
            rows.push(row);
        }
    }

    debug!("Parsed {} budget allocation rows", rows.len());
    Ok(rows)
}

/// Parse the spending-habits survey into budget shares and savings goals
///
/// Missing spend columns count as 0. A goal record needs both income and
/// desired savings percentage to parse.
pub fn parse_spending_habits_csv<R: Read>(reader: R, vocabulary: &Vocabulary) -> Result<HabitsData> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns: Vec<(Option<usize>, String)> = HABIT_SPEND_COLUMNS
        .iter()
        .map(|name| {
            (
                column_index(&headers, name),
                normalize_category(name, vocabulary),
            )
        })
        .collect();
    let income_col = column_index(&headers, INCOME_COLUMN);
    let savings_col = column_index(&headers, SAVINGS_COLUMN);

    let mut data = HabitsData::default();
    for result in rdr.records() {
        let record = result?;
        if let Some(row) = share_row(&record, &columns) {
            data.shares.push(row);
        }

        let cell = |index: Option<usize>| {
            index
                .and_then(|i| record.get(i))
                .and_then(|v| parse_amount(v).ok())
        };
        if let (Some(income), Some(pct)) = (cell(income_col), cell(savings_col)) {
            data.goals.push(GoalRecord {
                income,
                desired_savings_percentage: pct,
            });
        }
    }

    debug!(
        "Parsed {} habit share rows and {} goal records",
        data.shares.len(),
        data.goals.len()
    );
    Ok(data)
}

/// Parse a date string in various formats
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%m-%d-%Y", // 01-15-2024
        "%d/%m/%Y", // 15/01/2024 (European)
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    // Timestamps: keep the calendar date
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
pub fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(Error::Import(format!("Unable to parse amount: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;

    fn vocab() -> Vocabulary {
        ScoringConfig::embedded().unwrap().vocabulary
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("01/15/2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            parse_date("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            parse_date("2024-01-15 13:45:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(
            parse_date("25/12/2023").unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 25).unwrap()
        );
        assert!(parse_date("not a date").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("-123.45").unwrap(), -123.45);
        assert_eq!(parse_amount("(100.00)").unwrap(), -100.00);
        assert!(parse_amount("").is_err());
        assert!(parse_amount("NaN").is_err());
    }

    #[test]
    fn test_parse_transactions_csv() {
        let csv = "Date,Description,Amount,Transaction Type,Category,Account Name
01/15/2024,NETFLIX.COM,15.99,debit,Movies & DVDs,Checking
01/16/2024,Paycheck ACME,2500.00,credit,Paycheck,Checking
garbage,Bad Date,1.00,debit,Restaurants,Checking
01/17/2024,No amount,,debit,Restaurants,Checking
01/18/2024,No category,3.00,debit,,Checking";

        let parsed = parse_transactions_csv(csv.as_bytes(), &TransactionColumns::default()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rejected, 3);
        assert_eq!(parsed.rows[0].description, "NETFLIX.COM");
        assert_eq!(parsed.rows[0].category, "Movies & DVDs");
        assert_eq!(parsed.rows[0].kind, TransactionType::Expense);
        assert_eq!(parsed.rows[1].kind, TransactionType::Income);
    }

    #[test]
    fn test_parse_transactions_missing_column() {
        let csv = "Date,Amount\n01/15/2024,1.00";
        let result = parse_transactions_csv(csv.as_bytes(), &TransactionColumns::default());
        assert!(matches!(result, Err(Error::Import(_))));
    }

    #[test]
    fn test_parse_transactions_lowercase_headers_and_type_fallback() {
        let csv = "date,description,amount,category,type
2024-03-01,Coffee beans,-12.5,Coffee,expense
2024-03-02,Transfer out,-100,Miscellaneous,transfer";

        let parsed = parse_transactions_csv(csv.as_bytes(), &TransactionColumns::default()).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].kind, TransactionType::Other);
    }

    #[test]
    fn test_parse_spending_csv_custom_columns() {
        let csv = "City,Date,Card Type,Exp Type,Gender,Amount
Delhi,29-Oct-14,Gold,Bills,F,82475
Mumbai,2014-10-30,Silver,Food,M,32555
Pune,2014-10-31,Gold,,M,100";

        let columns = SpendingColumns {
            date: "Date".to_string(),
            category: "Exp Type".to_string(),
            amount: "Amount".to_string(),
        };
        let parsed = parse_spending_csv(csv.as_bytes(), &columns).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rejected, 2);
        assert_eq!(parsed.rows[0].category, "Food");
        assert_eq!(parsed.rows[0].amount, 32555.0);
    }

    #[test]
    fn test_parse_budget_allocation_csv() {
        let csv = "Household,Income,Food_Budget,Rent_Budget,Education_Budget
1,5000,200,600,200
2,4000,0,0,0
3,6000,abc,300,100";

        let rows = parse_budget_allocation_csv(csv.as_bytes(), &vocab()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Food"], 0.2);
        assert_eq!(rows[0]["Rent"], 0.6);
        assert_eq!(rows[0]["Education"], 0.2);
        assert_eq!(rows[1]["Food"], 0.0);
        assert_eq!(rows[1]["Rent"], 0.75);
    }

    #[test]
    fn test_parse_budget_allocation_requires_budget_columns() {
        let csv = "a,b\n1,2";
        assert!(parse_budget_allocation_csv(csv.as_bytes(), &vocab()).is_err());
    }

    #[test]
    fn test_parse_spending_habits_csv() {
        let csv = "Income,Age,Rent,Loan_Repayment,Insurance,Groceries,Transport,Eating_Out,Entertainment,Utilities,Healthcare,Education,Miscellaneous,Desired_Savings_Percentage
40000,30,10000,0,1000,5000,2000,1000,500,500,0,0,0,15.5
25000,41,0,0,0,0,0,0,0,0,0,0,0,
abc,22,100,0,0,0,0,0,0,0,0,0,0,10";

        let data = parse_spending_habits_csv(csv.as_bytes(), &vocab()).unwrap();
        assert_eq!(data.shares.len(), 2);
        assert_eq!(data.shares[0]["Rent"], 0.5);
        assert_eq!(data.shares[0]["Food"], 0.25);
        assert_eq!(data.shares[0]["Debt Payments"], 0.0);
        assert_eq!(data.shares[1]["Rent"], 1.0);
        assert_eq!(data.goals.len(), 1);
        assert_eq!(data.goals[0].income, 40000.0);
        assert_eq!(data.goals[0].desired_savings_percentage, 15.5);
    }
}
