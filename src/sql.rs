use std::collections::HashMap;
use std::str::FromStr;

use sqlparser::ast::{
    self, Expr, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments, ObjectNamePart,
    SelectItem, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::engine::{BlockInput, DocumentInput, StayInput};
use crate::kyc::KycDocumentType;
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRequest(StayInput),
    InsertBooking {
        stay: StayInput,
        channel: Option<ChannelRef>,
    },
    InsertBlock(BlockInput),
    DeleteBlock {
        id: Ulid,
    },
    InsertKycDocument {
        booking_id: Ulid,
        document: DocumentInput,
    },
    InsertBookingEdit {
        booking_id: Ulid,
        edit: BookingEdit,
    },
    ApproveRequest {
        id: Ulid,
    },
    RejectRequest {
        id: Ulid,
        reason: Option<String>,
    },
    CheckIn {
        id: Ulid,
    },
    CheckOut {
        id: Ulid,
    },
    CancelBooking {
        id: Ulid,
        reason: Option<String>,
        kind: Option<CancellationType>,
    },
    MarkNoShow {
        id: Ulid,
    },
    VerifyKyc {
        id: Ulid,
    },
    RejectKyc {
        id: Ulid,
        reason: String,
    },
    ImportChannelFeed {
        ics: String,
    },
    SelectAvailability {
        check_in: Day,
        check_out: Day,
        exclude: Option<Ulid>,
    },
    SelectFreeRanges {
        start: Day,
        end: Day,
    },
    SelectBookings {
        id: Option<Ulid>,
    },
    SelectRequests {
        id: Option<Ulid>,
    },
    SelectBlocks {
        id: Option<Ulid>,
    },
    SelectChannelBlocks,
    Checkpoint,
}

impl Command {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Command::InsertRequest(_) => "insert_request",
            Command::InsertBooking { .. } => "insert_booking",
            Command::InsertBlock(_) => "insert_block",
            Command::DeleteBlock { .. } => "delete_block",
            Command::InsertKycDocument { .. } => "insert_kyc_document",
            Command::InsertBookingEdit { .. } => "edit_booking",
            Command::ApproveRequest { .. } => "approve_request",
            Command::RejectRequest { .. } => "reject_request",
            Command::CheckIn { .. } => "check_in",
            Command::CheckOut { .. } => "check_out",
            Command::CancelBooking { .. } => "cancel_booking",
            Command::MarkNoShow { .. } => "mark_no_show",
            Command::VerifyKyc { .. } => "verify_kyc",
            Command::RejectKyc { .. } => "reject_kyc",
            Command::ImportChannelFeed { .. } => "import_channel_feed",
            Command::SelectAvailability { .. } => "select_availability",
            Command::SelectFreeRanges { .. } => "select_free_ranges",
            Command::SelectBookings { .. } => "select_bookings",
            Command::SelectRequests { .. } => "select_requests",
            Command::SelectBlocks { .. } => "select_blocks",
            Command::SelectChannelBlocks => "select_channel_blocks",
            Command::Checkpoint => "checkpoint",
        }
    }
}

// Canonical column order, used when an INSERT names no columns.
const REQUEST_COLUMNS: &[&str] = &[
    "id",
    "guest_name",
    "phone",
    "email",
    "check_in",
    "check_out",
    "price_per_night",
    "notes",
];
const BOOKING_COLUMNS: &[&str] = &[
    "id",
    "guest_name",
    "phone",
    "email",
    "check_in",
    "check_out",
    "price_per_night",
    "notes",
    "channel",
    "external_ref",
];
const BLOCK_COLUMNS: &[&str] = &["id", "start_date", "end_date", "kind", "reason", "note"];
const KYC_COLUMNS: &[&str] = &["booking_id", "doc_type", "storage_ref", "content_type", "size"];
const EDIT_COLUMNS: &[&str] = &[
    "booking_id",
    "status",
    "guest_name",
    "phone",
    "email",
    "notes",
    "check_in",
    "check_out",
];

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if trimmed.eq_ignore_ascii_case("CHECKPOINT") {
        return Ok(Command::Checkpoint);
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

/// One VALUES row keyed by column name. NULL reads as absent.
struct Row<'a> {
    table: &'static str,
    values: HashMap<&'static str, &'a Expr>,
}

impl<'a> Row<'a> {
    fn new(
        table: &'static str,
        canonical: &[&'static str],
        named: &[ast::Ident],
        values: &'a [Expr],
    ) -> Result<Self, SqlError> {
        let mut map = HashMap::new();
        if named.is_empty() {
            if values.len() > canonical.len() {
                return Err(SqlError::WrongArity(table, canonical.len(), values.len()));
            }
            for (col, expr) in canonical.iter().zip(values) {
                map.insert(*col, expr);
            }
        } else {
            if named.len() != values.len() {
                return Err(SqlError::WrongArity(table, named.len(), values.len()));
            }
            for (ident, expr) in named.iter().zip(values) {
                let name = ident.value.to_lowercase();
                let col = canonical
                    .iter()
                    .find(|c| **c == name)
                    .ok_or_else(|| SqlError::UnknownColumn(table, name.clone()))?;
                map.insert(*col, expr);
            }
        }
        Ok(Self { table, values: map })
    }

    fn get(&self, col: &'static str) -> Option<&'a Expr> {
        self.values.get(col).copied().filter(|e| !is_null(e))
    }

    fn require(&self, col: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(col).ok_or(SqlError::MissingColumn(self.table, col))
    }

    /// Absent id means "assign one".
    fn id_or_new(&self, col: &'static str) -> Result<Ulid, SqlError> {
        self.get(col).map(parse_ulid_expr).transpose().map(|id| id.unwrap_or_else(Ulid::new))
    }

    fn ulid(&self, col: &'static str) -> Result<Ulid, SqlError> {
        parse_ulid_expr(self.require(col)?)
    }

    fn string(&self, col: &'static str) -> Result<String, SqlError> {
        parse_string_expr(self.require(col)?)
    }

    fn opt_string(&self, col: &'static str) -> Result<Option<String>, SqlError> {
        self.get(col).map(parse_string_expr).transpose()
    }

    fn date(&self, col: &'static str) -> Result<Day, SqlError> {
        parse_date_expr(self.require(col)?)
    }

    fn opt_date(&self, col: &'static str) -> Result<Option<Day>, SqlError> {
        self.get(col).map(parse_date_expr).transpose()
    }

    fn u64(&self, col: &'static str) -> Result<u64, SqlError> {
        parse_u64_expr(self.require(col)?)
    }

    fn parsed<T: FromStr<Err = String>>(&self, col: &'static str) -> Result<Option<T>, SqlError> {
        self.opt_string(col)?
            .map(|s| s.parse::<T>().map_err(SqlError::Parse))
            .transpose()
    }

    fn stay(&self) -> Result<StayInput, SqlError> {
        Ok(StayInput {
            id: self.id_or_new("id")?,
            guest_name: self.string("guest_name")?,
            phone: self.string("phone")?,
            email: self.opt_string("email")?,
            check_in: self.date("check_in")?,
            check_out: self.date("check_out")?,
            price_per_night: self.u64("price_per_night")?,
            notes: self.opt_string("notes")?,
        })
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;
    let cols = &insert.columns;

    match table.as_str() {
        "booking_requests" => {
            let row = Row::new("booking_requests", REQUEST_COLUMNS, cols, &values)?;
            Ok(Command::InsertRequest(row.stay()?))
        }
        "bookings" => {
            let row = Row::new("bookings", BOOKING_COLUMNS, cols, &values)?;
            let channel = match row.opt_string("channel")? {
                Some(channel) => Some(ChannelRef {
                    channel,
                    external_ref: row.opt_string("external_ref")?,
                }),
                None if row.get("external_ref").is_some() => {
                    return Err(SqlError::MissingColumn("bookings", "channel"));
                }
                None => None,
            };
            Ok(Command::InsertBooking {
                stay: row.stay()?,
                channel,
            })
        }
        "blocks" => {
            let row = Row::new("blocks", BLOCK_COLUMNS, cols, &values)?;
            Ok(Command::InsertBlock(BlockInput {
                id: row.id_or_new("id")?,
                start: row.date("start_date")?,
                end: row.date("end_date")?,
                kind: row.parsed::<BlockKind>("kind")?.unwrap_or(BlockKind::Other),
                reason: row.string("reason")?,
                note: row.opt_string("note")?,
            }))
        }
        "kyc_documents" => {
            let row = Row::new("kyc_documents", KYC_COLUMNS, cols, &values)?;
            Ok(Command::InsertKycDocument {
                booking_id: row.ulid("booking_id")?,
                document: DocumentInput {
                    doc_type: row
                        .parsed::<KycDocumentType>("doc_type")?
                        .ok_or(SqlError::MissingColumn("kyc_documents", "doc_type"))?,
                    storage_ref: row.string("storage_ref")?,
                    content_type: row.string("content_type")?,
                    size: row.u64("size")?,
                },
            })
        }
        "booking_edits" => {
            let row = Row::new("booking_edits", EDIT_COLUMNS, cols, &values)?;
            Ok(Command::InsertBookingEdit {
                booking_id: row.ulid("booking_id")?,
                edit: BookingEdit {
                    status: row.parsed::<BookingStatus>("status")?,
                    guest_name: row.opt_string("guest_name")?,
                    phone: row.opt_string("phone")?,
                    email: row.opt_string("email")?,
                    notes: row.opt_string("notes")?,
                    check_in: row.opt_date("check_in")?,
                    check_out: row.opt_date("check_out")?,
                },
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?.ok_or(SqlError::MissingFilter("id"))?;

    match table.as_str() {
        "blocks" => Ok(Command::DeleteBlock { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return parse_function_call(&select.projection);
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        collect_filters(selection, &mut filters)?;
    }
    let find = |col: &str, op: ast::BinaryOperator| {
        filters
            .iter()
            .find(|(c, o, _)| c == col && *o == op)
            .map(|(_, _, e)| *e)
    };

    match table.as_str() {
        "availability" => Ok(Command::SelectAvailability {
            check_in: parse_date_expr(
                find("check_in", ast::BinaryOperator::Eq).ok_or(SqlError::MissingFilter("check_in"))?,
            )?,
            check_out: parse_date_expr(
                find("check_out", ast::BinaryOperator::Eq)
                    .ok_or(SqlError::MissingFilter("check_out"))?,
            )?,
            exclude: find("exclude", ast::BinaryOperator::Eq)
                .filter(|e| !is_null(e))
                .map(parse_ulid_expr)
                .transpose()?,
        }),
        "free_ranges" => Ok(Command::SelectFreeRanges {
            start: parse_date_expr(
                find("start", ast::BinaryOperator::GtEq).ok_or(SqlError::MissingFilter("start"))?,
            )?,
            end: parse_date_expr(
                find("end", ast::BinaryOperator::LtEq).ok_or(SqlError::MissingFilter("end"))?,
            )?,
        }),
        "bookings" | "booking_requests" | "blocks" => {
            let id = find("id", ast::BinaryOperator::Eq)
                .map(parse_ulid_expr)
                .transpose()?;
            Ok(match table.as_str() {
                "bookings" => Command::SelectBookings { id },
                "booking_requests" => Command::SelectRequests { id },
                _ => Command::SelectBlocks { id },
            })
        }
        "channel_blocks" => Ok(Command::SelectChannelBlocks),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// `SELECT approve_request('01…')` and friends.
fn parse_function_call(projection: &[SelectItem]) -> Result<Command, SqlError> {
    let expr = match projection.first() {
        Some(SelectItem::UnnamedExpr(e)) | Some(SelectItem::ExprWithAlias { expr: e, .. }) => e,
        _ => return Err(SqlError::Unsupported("SELECT without FROM".into())),
    };
    let func = match expr {
        Expr::Function(f) => f,
        _ => return Err(SqlError::Unsupported("SELECT without FROM".into())),
    };
    let name = object_name_last(&func.name).ok_or_else(|| SqlError::Parse("empty function name".into()))?;
    let args: Vec<&Expr> = match &func.args {
        FunctionArguments::None => Vec::new(),
        FunctionArguments::List(list) => list
            .args
            .iter()
            .map(|a| match a {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Ok(e),
                _ => Err(SqlError::Unsupported("named or wildcard argument".into())),
            })
            .collect::<Result<_, _>>()?,
        FunctionArguments::Subquery(_) => {
            return Err(SqlError::Unsupported("subquery argument".into()));
        }
    };

    let arity = |min: usize, max: usize, f: &'static str| {
        if args.len() < min || args.len() > max {
            Err(SqlError::WrongArity(f, min, args.len()))
        } else {
            Ok(())
        }
    };
    let opt_arg = |i: usize| args.get(i).copied().filter(|e| !is_null(e));

    match name.as_str() {
        "approve_request" => {
            arity(1, 1, "approve_request")?;
            Ok(Command::ApproveRequest { id: parse_ulid_expr(args[0])? })
        }
        "reject_request" => {
            arity(1, 2, "reject_request")?;
            Ok(Command::RejectRequest {
                id: parse_ulid_expr(args[0])?,
                reason: opt_arg(1).map(parse_string_expr).transpose()?,
            })
        }
        "check_in" => {
            arity(1, 1, "check_in")?;
            Ok(Command::CheckIn { id: parse_ulid_expr(args[0])? })
        }
        "check_out" => {
            arity(1, 1, "check_out")?;
            Ok(Command::CheckOut { id: parse_ulid_expr(args[0])? })
        }
        "cancel_booking" => {
            arity(1, 3, "cancel_booking")?;
            Ok(Command::CancelBooking {
                id: parse_ulid_expr(args[0])?,
                reason: opt_arg(1).map(parse_string_expr).transpose()?,
                kind: opt_arg(2)
                    .map(|e| {
                        parse_string_expr(e)?
                            .parse::<CancellationType>()
                            .map_err(SqlError::Parse)
                    })
                    .transpose()?,
            })
        }
        "mark_no_show" => {
            arity(1, 1, "mark_no_show")?;
            Ok(Command::MarkNoShow { id: parse_ulid_expr(args[0])? })
        }
        "verify_kyc" => {
            arity(1, 1, "verify_kyc")?;
            Ok(Command::VerifyKyc { id: parse_ulid_expr(args[0])? })
        }
        "reject_kyc" => {
            arity(2, 2, "reject_kyc")?;
            Ok(Command::RejectKyc {
                id: parse_ulid_expr(args[0])?,
                reason: parse_string_expr(args[1])?,
            })
        }
        "import_channel_feed" => {
            arity(1, 1, "import_channel_feed")?;
            Ok(Command::ImportChannelFeed { ics: parse_string_expr(args[0])? })
        }
        _ => Err(SqlError::UnknownFunction(name)),
    }
}

/// Flatten an AND-chain of `column <op> value` comparisons.
fn collect_filters<'a>(
    expr: &'a Expr,
    out: &mut Vec<(String, ast::BinaryOperator, &'a Expr)>,
) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_filters(inner, out),
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_filters(left, out)?;
            collect_filters(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push((col, op.clone(), right.as_ref()));
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.len() {
            0 => Err(SqlError::Parse("empty VALUES".into())),
            1 => Ok(values.rows[0].clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Option<Ulid>, SqlError> {
    let Some(sel) = selection else {
        return Ok(None);
    };
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_ulid_expr(right).map(Some),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

/// Literal value, looking through `'…'::type` casts.
fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        Expr::Cast { expr, .. } | Expr::Nested(expr) => extract_value(expr),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn parse_string_expr(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::EscapedStringLiteral(s)) => Ok(s.clone()),
        Some(Value::DollarQuotedString(s)) => Ok(s.value.clone()),
        Some(Value::Number(n, _)) => Ok(n.clone()),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string_expr(expr)?;
    Ulid::from_string(s.trim()).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

fn parse_date_expr(expr: &Expr) -> Result<Day, SqlError> {
    let s = parse_string_expr(expr)?;
    Day::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_u64_expr(expr: &Expr) -> Result<u64, SqlError> {
    let s = parse_string_expr(expr)?;
    s.trim()
        .parse()
        .map_err(|e| SqlError::Parse(format!("bad non-negative integer {s:?}: {e}")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    UnknownFunction(String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
}

impl SqlError {
    pub fn sqlstate(&self) -> &'static str {
        match self {
            SqlError::UnknownTable(_) => "42P01",
            SqlError::UnknownColumn(..) => "42703",
            SqlError::UnknownFunction(_) => "42883",
            _ => "42601",
        }
    }
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t}: unknown column {c}"),
            SqlError::UnknownFunction(name) => write!(f, "unknown function: {name}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing value for {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    fn d(s: &str) -> Day {
        s.parse().unwrap()
    }

    #[test]
    fn parse_insert_request_named_columns() {
        let sql = format!(
            "INSERT INTO booking_requests (id, guest_name, phone, check_in, check_out, price_per_night) \
             VALUES ('{ID}', 'Asha Rao', '98765 43210', '2026-04-01', '2026-04-04', 1000)"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertRequest(stay) => {
                assert_eq!(stay.id.to_string(), ID);
                assert_eq!(stay.guest_name, "Asha Rao");
                assert_eq!(stay.phone, "98765 43210");
                assert_eq!(stay.email, None);
                assert_eq!(stay.check_in, d("2026-04-01"));
                assert_eq!(stay.check_out, d("2026-04-04"));
                assert_eq!(stay.price_per_night, 1000);
                assert_eq!(stay.notes, None);
            }
            other => panic!("expected InsertRequest, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_request_positional_with_nulls() {
        let sql = format!(
            "INSERT INTO booking_requests VALUES ('{ID}', 'Asha', '9876543210', NULL, '2026-04-01', '2026-04-04', '1500', 'late arrival')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertRequest(stay) => {
                assert_eq!(stay.email, None);
                assert_eq!(stay.price_per_night, 1500);
                assert_eq!(stay.notes.as_deref(), Some("late arrival"));
            }
            other => panic!("expected InsertRequest, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_request_without_id_assigns_one() {
        let sql = "INSERT INTO booking_requests (guest_name, phone, check_in, check_out, price_per_night) \
                   VALUES ('Asha', '9876543210', '2026-04-01', '2026-04-04', 1000)";
        assert!(matches!(parse_sql(sql).unwrap(), Command::InsertRequest(_)));
    }

    #[test]
    fn parse_insert_request_missing_dates() {
        let sql = "INSERT INTO booking_requests (guest_name, phone, price_per_night) VALUES ('Asha', '1', 1)";
        assert!(matches!(
            parse_sql(sql),
            Err(SqlError::MissingColumn("booking_requests", "check_in"))
        ));
    }

    #[test]
    fn parse_insert_booking_with_channel() {
        let sql = format!(
            "INSERT INTO bookings (id, guest_name, phone, check_in, check_out, price_per_night, channel, external_ref) \
             VALUES ('{ID}', 'Lee', '+44 20 7946 0958', '2026-05-01', '2026-05-03', 2000, 'airbnb', 'HMX123')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking { stay, channel } => {
                assert_eq!(stay.price_per_night, 2000);
                let channel = channel.unwrap();
                assert_eq!(channel.channel, "airbnb");
                assert_eq!(channel.external_ref.as_deref(), Some("HMX123"));
            }
            other => panic!("expected InsertBooking, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_manual() {
        let sql = "INSERT INTO bookings (guest_name, phone, check_in, check_out, price_per_night) \
                   VALUES ('Lee', '9876543210', '2026-05-01', '2026-05-03', 2000)";
        assert!(matches!(
            parse_sql(sql).unwrap(),
            Command::InsertBooking { channel: None, .. }
        ));
    }

    #[test]
    fn parse_insert_block() {
        let sql = format!(
            "INSERT INTO blocks (id, start_date, end_date, kind, reason) VALUES ('{ID}', '2026-03-10', '2026-03-10', 'maintenance', 'pool pump')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBlock(block) => {
                assert_eq!(block.start, d("2026-03-10"));
                assert_eq!(block.end, d("2026-03-10"));
                assert_eq!(block.kind, BlockKind::Maintenance);
                assert_eq!(block.reason, "pool pump");
                assert_eq!(block.note, None);
            }
            other => panic!("expected InsertBlock, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_block_bad_kind() {
        let sql = "INSERT INTO blocks (start_date, end_date, kind, reason) VALUES ('2026-03-10', '2026-03-11', 'party', 'x')";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_delete_block() {
        let sql = format!("DELETE FROM blocks WHERE id = '{ID}'");
        match parse_sql(&sql).unwrap() {
            Command::DeleteBlock { id } => assert_eq!(id.to_string(), ID),
            other => panic!("expected DeleteBlock, got {other:?}"),
        }
    }

    #[test]
    fn parse_delete_requires_id() {
        assert!(matches!(
            parse_sql("DELETE FROM blocks"),
            Err(SqlError::MissingFilter("id"))
        ));
        assert!(parse_sql(&format!("DELETE FROM bookings WHERE id = '{ID}'")).is_err());
    }

    #[test]
    fn parse_insert_kyc_document() {
        let sql = format!(
            "INSERT INTO kyc_documents (booking_id, doc_type, storage_ref, content_type, size) \
             VALUES ('{ID}', 'government_id', 's3://kyc/abc.jpg', 'image/jpeg', 204800)"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertKycDocument { booking_id, document } => {
                assert_eq!(booking_id.to_string(), ID);
                assert_eq!(document.doc_type, KycDocumentType::GovernmentId);
                assert_eq!(document.storage_ref, "s3://kyc/abc.jpg");
                assert_eq!(document.size, 204_800);
            }
            other => panic!("expected InsertKycDocument, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_edit_partial() {
        let sql = format!(
            "INSERT INTO booking_edits (booking_id, check_out, notes) VALUES ('{ID}', '2026-04-06', 'extended')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBookingEdit { booking_id, edit } => {
                assert_eq!(booking_id.to_string(), ID);
                assert_eq!(edit.check_out, Some(d("2026-04-06")));
                assert_eq!(edit.notes.as_deref(), Some("extended"));
                assert_eq!(edit.status, None);
                assert_eq!(edit.check_in, None);
            }
            other => panic!("expected InsertBookingEdit, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_edit_status() {
        let sql = format!("INSERT INTO booking_edits (booking_id, status) VALUES ('{ID}', 'checked_out')");
        match parse_sql(&sql).unwrap() {
            Command::InsertBookingEdit { edit, .. } => {
                assert_eq!(edit.status, Some(BookingStatus::CheckedOut));
            }
            other => panic!("expected InsertBookingEdit, got {other:?}"),
        }
    }

    #[test]
    fn parse_unknown_column() {
        let sql = "INSERT INTO blocks (start_date, finish) VALUES ('2026-03-10', '2026-03-11')";
        assert!(matches!(parse_sql(sql), Err(SqlError::UnknownColumn("blocks", _))));
    }

    #[test]
    fn parse_function_calls() {
        let cases = [
            (format!("SELECT approve_request('{ID}')"), "approve_request"),
            (format!("SELECT reject_request('{ID}')"), "reject_request"),
            (format!("SELECT reject_request('{ID}', 'dates taken')"), "reject_request"),
            (format!("SELECT check_in('{ID}')"), "check_in"),
            (format!("SELECT check_out('{ID}')"), "check_out"),
            (format!("SELECT cancel_booking('{ID}')"), "cancel_booking"),
            (format!("SELECT mark_no_show('{ID}')"), "mark_no_show"),
            (format!("SELECT verify_kyc('{ID}')"), "verify_kyc"),
            (format!("SELECT reject_kyc('{ID}', 'blurry')"), "reject_kyc"),
        ];
        for (sql, label) in cases {
            let cmd = parse_sql(&sql).unwrap_or_else(|e| panic!("{sql}: {e}"));
            assert_eq!(cmd.label(), label);
        }
    }

    #[test]
    fn parse_cancel_with_reason_and_type() {
        let sql = format!("SELECT cancel_booking('{ID}', 'family emergency', 'guest_request')");
        match parse_sql(&sql).unwrap() {
            Command::CancelBooking { reason, kind, .. } => {
                assert_eq!(reason.as_deref(), Some("family emergency"));
                assert_eq!(kind, Some(CancellationType::GuestRequest));
            }
            other => panic!("expected CancelBooking, got {other:?}"),
        }
    }

    #[test]
    fn parse_function_arity() {
        assert!(matches!(
            parse_sql(&format!("SELECT reject_kyc('{ID}')")),
            Err(SqlError::WrongArity("reject_kyc", 2, 1))
        ));
        assert!(matches!(
            parse_sql("SELECT approve_request()"),
            Err(SqlError::WrongArity(..))
        ));
        assert!(matches!(
            parse_sql(&format!("SELECT drop_everything('{ID}')")),
            Err(SqlError::UnknownFunction(_))
        ));
    }

    #[test]
    fn parse_import_feed_multiline() {
        let sql = "SELECT import_channel_feed('BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART;VALUE=DATE:20260501\nEND:VEVENT\nEND:VCALENDAR')";
        match parse_sql(sql).unwrap() {
            Command::ImportChannelFeed { ics } => {
                assert!(ics.contains("DTSTART;VALUE=DATE:20260501"));
            }
            other => panic!("expected ImportChannelFeed, got {other:?}"),
        }
    }

    #[test]
    fn parse_select_availability() {
        let sql = "SELECT * FROM availability WHERE check_in = '2026-04-01' AND check_out = '2026-04-04'";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectAvailability {
                check_in: d("2026-04-01"),
                check_out: d("2026-04-04"),
                exclude: None,
            }
        );
    }

    #[test]
    fn parse_select_availability_with_exclude_and_cast() {
        let sql = format!(
            "SELECT * FROM availability WHERE check_in = '2026-04-01'::date AND check_out = '2026-04-04' AND exclude = '{ID}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAvailability { check_in, exclude, .. } => {
                assert_eq!(check_in, d("2026-04-01"));
                assert_eq!(exclude.unwrap().to_string(), ID);
            }
            other => panic!("expected SelectAvailability, got {other:?}"),
        }
    }

    #[test]
    fn parse_select_availability_missing_filter() {
        let sql = "SELECT * FROM availability WHERE check_in = '2026-04-01'";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("check_out"))));
    }

    #[test]
    fn parse_select_free_ranges() {
        let sql = r#"SELECT * FROM free_ranges WHERE start >= '2026-04-01' AND "end" <= '2026-05-01'"#;
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectFreeRanges {
                start: d("2026-04-01"),
                end: d("2026-05-01"),
            }
        );
    }

    #[test]
    fn parse_select_listings() {
        assert_eq!(parse_sql("SELECT * FROM bookings").unwrap(), Command::SelectBookings { id: None });
        assert_eq!(
            parse_sql("SELECT * FROM booking_requests").unwrap(),
            Command::SelectRequests { id: None }
        );
        assert_eq!(parse_sql("SELECT * FROM channel_blocks").unwrap(), Command::SelectChannelBlocks);
        match parse_sql(&format!("SELECT * FROM blocks WHERE id = '{ID}'")).unwrap() {
            Command::SelectBlocks { id } => assert_eq!(id.unwrap().to_string(), ID),
            other => panic!("expected SelectBlocks, got {other:?}"),
        }
    }

    #[test]
    fn parse_checkpoint() {
        assert_eq!(parse_sql("CHECKPOINT").unwrap(), Command::Checkpoint);
        assert_eq!(parse_sql("checkpoint;").unwrap(), Command::Checkpoint);
    }

    #[test]
    fn parse_bad_date_and_ulid() {
        let sql = "SELECT * FROM availability WHERE check_in = '2026-02-30' AND check_out = '2026-03-02'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
        assert!(matches!(parse_sql("SELECT check_in('nope')"), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_unknown_table_errors() {
        let err = parse_sql("INSERT INTO foobar (id) VALUES ('x')").unwrap_err();
        assert_eq!(err.sqlstate(), "42P01");
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
