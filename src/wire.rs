use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::messages::data::DataRow;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::auth::{AccessGate, Authorization, StaydeskAuthSource};
use crate::engine::{Conflict, Engine, EngineError, ErrorKind};
use crate::model::*;
use crate::sql::{self, Command, SqlError};
use crate::tenant::TenantManager;

pub struct StaydeskHandler {
    tenant_manager: Arc<TenantManager>,
    gate: Arc<dyn AccessGate>,
    query_parser: Arc<StaydeskQueryParser>,
}

impl StaydeskHandler {
    pub fn new(tenant_manager: Arc<TenantManager>, gate: Arc<dyn AccessGate>) -> Self {
        Self {
            tenant_manager,
            gate,
            query_parser: Arc::new(StaydeskQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    fn authorize<C: ClientInfo>(&self, client: &C) -> Authorization {
        let auth = self
            .gate
            .authorize(client.metadata().get("user").map(String::as_str));
        if let Authorization::Denied { reason, status } = &auth {
            debug!(status, reason = %reason, "connection user not permitted");
        }
        auth
    }

    async fn run<C: ClientInfo>(&self, client: &C, sql: &str) -> PgWireResult<Vec<Response>> {
        let engine = self.resolve_engine(client)?;
        let auth = self.authorize(client);
        let cmd = sql::parse_sql(sql).map_err(sql_err)?;

        let label = cmd.label();
        let started = Instant::now();
        let result = self.execute_command(&engine, &auth, cmd).await;
        metrics::histogram!(crate::observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = match &result {
            Ok(_) => "ok",
            Err(EngineError::Denied { .. }) => {
                metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
                "denied"
            }
            Err(_) => "error",
        };
        metrics::counter!(crate::observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result.map_err(engine_err)
    }

    async fn execute_command(
        &self,
        engine: &Engine,
        auth: &Authorization,
        cmd: Command,
    ) -> Result<Vec<Response>, EngineError> {
        match cmd {
            Command::InsertRequest(stay) => {
                engine.submit_request(auth, stay).await?;
                Ok(vec![insert_tag()])
            }
            Command::InsertBooking { stay, channel } => {
                engine.create_booking(auth, stay, channel).await?;
                Ok(vec![insert_tag()])
            }
            Command::InsertBlock(block) => {
                engine.create_block(auth, block).await?;
                Ok(vec![insert_tag()])
            }
            Command::DeleteBlock { id } => {
                engine.delete_block(auth, id).await?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertKycDocument {
                booking_id,
                document,
            } => {
                engine.append_kyc_document(auth, booking_id, document).await?;
                Ok(vec![insert_tag()])
            }
            Command::InsertBookingEdit { booking_id, edit } => {
                engine.edit_booking(auth, booking_id, edit).await?;
                Ok(vec![insert_tag()])
            }
            Command::ApproveRequest { id } => {
                let booking_id = engine.approve_request(auth, id).await?;
                Ok(single_value("approve_request", booking_id.to_string()))
            }
            Command::RejectRequest { id, reason } => {
                engine.reject_request(auth, id, reason).await?;
                Ok(single_value("reject_request", RequestStatus::Rejected.as_str().into()))
            }
            Command::CheckIn { id } => {
                engine.check_in(auth, id).await?;
                Ok(single_value("check_in", BookingStatus::CheckedIn.as_str().into()))
            }
            Command::CheckOut { id } => {
                engine.check_out(auth, id).await?;
                Ok(single_value("check_out", BookingStatus::CheckedOut.as_str().into()))
            }
            Command::CancelBooking { id, reason, kind } => {
                let outcome = engine.cancel_booking(auth, id, reason, kind).await?;
                Ok(single_value("cancel_booking", outcome.as_str().into()))
            }
            Command::MarkNoShow { id } => {
                let outcome = engine.mark_no_show(auth, id).await?;
                Ok(single_value("mark_no_show", outcome.as_str().into()))
            }
            Command::VerifyKyc { id } => {
                engine.verify_kyc(auth, id).await?;
                Ok(single_value("verify_kyc", crate::kyc::KycStatus::Verified.as_str().into()))
            }
            Command::RejectKyc { id, reason } => {
                engine.reject_kyc(auth, id, &reason).await?;
                Ok(single_value("reject_kyc", crate::kyc::KycStatus::Rejected.as_str().into()))
            }
            Command::ImportChannelFeed { ics } => {
                let count = engine.import_channel_feed(auth, &ics).await?;
                Ok(single_value("import_channel_feed", count.to_string()))
            }
            Command::SelectAvailability {
                check_in,
                check_out,
                exclude,
            } => {
                // A conflict is an answer here, not a failure.
                let conflict = match engine.check_availability(auth, check_in, check_out, exclude).await {
                    Ok(()) => None,
                    Err(EngineError::Unavailable(conflict)) => Some(conflict),
                    Err(e) => return Err(e),
                };
                let schema = Arc::new(availability_schema());
                let row = availability_row(&schema, conflict.as_ref());
                Ok(rows(schema, vec![row]))
            }
            Command::SelectFreeRanges { start, end } => {
                let ranges = engine.free_ranges(auth, start, end).await?;
                let schema = Arc::new(free_ranges_schema());
                let data = ranges
                    .iter()
                    .map(|span| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&span.start.to_string())?;
                        encoder.encode_field(&span.end.to_string())?;
                        encoder.encode_field(&span.nights())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(rows(schema, data))
            }
            Command::SelectBookings { id } => {
                let bookings = match id {
                    Some(id) => vec![engine.get_booking(auth, id).await?],
                    None => engine.list_bookings(auth).await?,
                };
                let schema = Arc::new(bookings_schema());
                let data = bookings.iter().map(|b| booking_row(&schema, b)).collect();
                Ok(rows(schema, data))
            }
            Command::SelectRequests { id } => {
                let requests = match id {
                    Some(id) => vec![engine.get_request(auth, id).await?],
                    None => engine.list_requests(auth).await?,
                };
                let schema = Arc::new(requests_schema());
                let data = requests.iter().map(|r| request_row(&schema, r)).collect();
                Ok(rows(schema, data))
            }
            Command::SelectBlocks { id } => {
                let mut blocks = engine.list_blocks(auth).await?;
                if let Some(id) = id {
                    blocks.retain(|b| b.id == id);
                    if blocks.is_empty() {
                        return Err(EngineError::NotFound(id));
                    }
                }
                let schema = Arc::new(blocks_schema());
                let data = blocks.iter().map(|b| block_row(&schema, b)).collect();
                Ok(rows(schema, data))
            }
            Command::SelectChannelBlocks => {
                let blocks = engine.list_channel_blocks(auth).await?;
                let schema = Arc::new(channel_blocks_schema());
                let data = blocks
                    .iter()
                    .map(|b| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.uid)?;
                        encoder.encode_field(&b.range.start.to_string())?;
                        encoder.encode_field(&b.range.end.to_string())?;
                        encoder.encode_field(&b.summary)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(rows(schema, data))
            }
            Command::Checkpoint => {
                auth.require_admin()?;
                engine.compact_wal().await?;
                Ok(vec![Response::Execution(Tag::new("CHECKPOINT"))])
            }
        }
    }
}

// ── Result encoding ──────────────────────────────────────────────

fn insert_tag() -> Response {
    Response::Execution(Tag::new("INSERT").with_rows(1))
}

fn rows(schema: Arc<Vec<FieldInfo>>, data: Vec<PgWireResult<DataRow>>) -> Vec<Response> {
    vec![Response::Query(QueryResponse::new(schema, stream::iter(data)))]
}

fn single_value(column: &str, value: String) -> Vec<Response> {
    let schema = Arc::new(vec![text_field(column)]);
    let mut encoder = DataRowEncoder::new(schema.clone());
    let row = encoder.encode_field(&value).map(|()| encoder.take_row());
    rows(schema, vec![row])
}

fn availability_row(schema: &Arc<Vec<FieldInfo>>, conflict: Option<&Conflict>) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&conflict.is_none())?;
    encoder.encode_field(&conflict.map(|c| c.kind.as_str().to_string()))?;
    encoder.encode_field(&conflict.map(|c| c.id.clone()))?;
    let json = conflict
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| PgWireError::ApiError(Box::new(e)))?;
    encoder.encode_field(&json)?;
    Ok(encoder.take_row())
}

fn booking_row(schema: &Arc<Vec<FieldInfo>>, b: &Booking) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&b.id.to_string())?;
    encoder.encode_field(&b.request_id.map(|id| id.to_string()))?;
    encoder.encode_field(&b.guest.name)?;
    encoder.encode_field(&b.guest.phone.e164)?;
    encoder.encode_field(&b.guest.email)?;
    encoder.encode_field(&b.check_in.to_string())?;
    encoder.encode_field(&b.check_out.to_string())?;
    encoder.encode_field(&i64::from(b.nights))?;
    encoder.encode_field(&(b.price_per_night as i64))?;
    encoder.encode_field(&(b.total_amount as i64))?;
    encoder.encode_field(&b.status.as_str().to_string())?;
    encoder.encode_field(&b.kyc.status.as_str().to_string())?;
    encoder.encode_field(&(b.kyc.documents.len() as i64))?;
    encoder.encode_field(&b.no_show)?;
    encoder.encode_field(&b.source.as_str().to_string())?;
    encoder.encode_field(&b.channel.as_ref().map(|c| c.channel.clone()))?;
    encoder.encode_field(&b.channel.as_ref().and_then(|c| c.external_ref.clone()))?;
    encoder.encode_field(&b.notes)?;
    encoder.encode_field(&b.cancellation.as_ref().map(|c| c.stamp.at.to_rfc3339()))?;
    encoder.encode_field(&b.cancellation.as_ref().map(|c| c.kind.as_str().to_string()))?;
    encoder.encode_field(&b.created.at.to_rfc3339())?;
    Ok(encoder.take_row())
}

fn request_row(schema: &Arc<Vec<FieldInfo>>, r: &BookingRequest) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&r.id.to_string())?;
    encoder.encode_field(&r.guest.name)?;
    encoder.encode_field(&r.guest.phone.e164)?;
    encoder.encode_field(&r.guest.email)?;
    encoder.encode_field(&r.check_in.to_string())?;
    encoder.encode_field(&r.check_out.to_string())?;
    encoder.encode_field(&i64::from(r.nights))?;
    encoder.encode_field(&(r.price_per_night as i64))?;
    encoder.encode_field(&(r.total_amount as i64))?;
    encoder.encode_field(&r.status.as_str().to_string())?;
    encoder.encode_field(&r.booking_id.map(|id| id.to_string()))?;
    encoder.encode_field(&r.rejection_reason)?;
    encoder.encode_field(&r.notes)?;
    encoder.encode_field(&r.created.at.to_rfc3339())?;
    Ok(encoder.take_row())
}

fn block_row(schema: &Arc<Vec<FieldInfo>>, b: &CalendarBlock) -> PgWireResult<DataRow> {
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&b.id.to_string())?;
    encoder.encode_field(&b.range.start.to_string())?;
    encoder.encode_field(&b.range.end.to_string())?;
    encoder.encode_field(&b.kind.as_str().to_string())?;
    encoder.encode_field(&b.reason)?;
    encoder.encode_field(&b.note)?;
    encoder.encode_field(&b.created.by)?;
    Ok(encoder.take_row())
}

// ── Schemas ──────────────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn text_field(name: &str) -> FieldInfo {
    field(name, Type::VARCHAR)
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        field("available", Type::BOOL),
        text_field("conflict_kind"),
        text_field("conflict_id"),
        field("conflict", Type::JSON),
    ]
}

fn free_ranges_schema() -> Vec<FieldInfo> {
    vec![text_field("start"), text_field("end"), field("nights", Type::INT8)]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("request_id"),
        text_field("guest_name"),
        text_field("phone"),
        text_field("email"),
        text_field("check_in"),
        text_field("check_out"),
        field("nights", Type::INT8),
        field("price_per_night", Type::INT8),
        field("total_amount", Type::INT8),
        text_field("status"),
        text_field("kyc_status"),
        field("kyc_documents", Type::INT8),
        field("no_show", Type::BOOL),
        text_field("source"),
        text_field("channel"),
        text_field("external_ref"),
        text_field("notes"),
        text_field("cancelled_at"),
        text_field("cancellation_type"),
        text_field("created_at"),
    ]
}

fn requests_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("guest_name"),
        text_field("phone"),
        text_field("email"),
        text_field("check_in"),
        text_field("check_out"),
        field("nights", Type::INT8),
        field("price_per_night", Type::INT8),
        field("total_amount", Type::INT8),
        text_field("status"),
        text_field("booking_id"),
        text_field("rejection_reason"),
        text_field("notes"),
        text_field("created_at"),
    ]
}

fn blocks_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("start_date"),
        text_field("end_date"),
        text_field("kind"),
        text_field("reason"),
        text_field("note"),
        text_field("created_by"),
    ]
}

fn channel_blocks_schema() -> Vec<FieldInfo> {
    vec![
        text_field("uid"),
        text_field("start_date"),
        text_field("end_date"),
        text_field("summary"),
    ]
}

const FUNCTIONS: &[&str] = &[
    "approve_request",
    "reject_request",
    "check_in",
    "check_out",
    "cancel_booking",
    "mark_no_show",
    "verify_kyc",
    "reject_kyc",
    "import_channel_feed",
];

/// Row shape of a statement before its parameters are bound.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.trim_start().to_lowercase();
    if !lower.starts_with("select") {
        return vec![];
    }
    if lower.contains("from availability") {
        availability_schema()
    } else if lower.contains("from free_ranges") {
        free_ranges_schema()
    } else if lower.contains("from booking_requests") {
        requests_schema()
    } else if lower.contains("from bookings") {
        bookings_schema()
    } else if lower.contains("from channel_blocks") {
        channel_blocks_schema()
    } else if lower.contains("from blocks") {
        blocks_schema()
    } else if let Some(f) = FUNCTIONS.iter().find(|f| lower.contains(&format!("{f}("))) {
        vec![text_field(f)]
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for StaydeskHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.run(client, query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct StaydeskQueryParser;

#[async_trait]
impl QueryParser for StaydeskQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for StaydeskHandler {
    type Statement = String;
    type QueryParser = StaydeskQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let mut responses = self.run(client, &sql).await?;
        if responses.is_empty() {
            return Ok(Response::EmptyQuery);
        }
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Highest `$N` placeholder in the statement.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    max = max.max(n);
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Inline bound parameters as quoted literals. The SQL layer accepts
/// dates, amounts and ULIDs in string form, so every value is quoted.
fn substitute_params(portal: &Portal<String>) -> String {
    let params: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    bind_params(&portal.statement.statement, &params)
}

/// One pass over the statement: each `$N` becomes its quoted value and
/// inserted text is never scanned again.
fn bind_params(sql: &str, params: &[Option<String>]) -> String {
    let mut result = String::with_capacity(sql.len());
    let bytes = sql.as_bytes();
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let param = sql[start..end]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| params.get(idx));
        if let Some(param) = param {
            result.push_str(&sql[copied..i]);
            match param {
                Some(text) => {
                    result.push('\'');
                    result.push_str(&text.replace('\'', "''"));
                    result.push('\'');
                }
                None => result.push_str("NULL"),
            }
            copied = end;
        }
        i = end;
    }
    result.push_str(&sql[copied..]);
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct StaydeskFactory {
    handler: Arc<StaydeskHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<StaydeskAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl StaydeskFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, gate: Arc<dyn AccessGate>, password: String) -> Self {
        let auth_source = StaydeskAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(StaydeskHandler::new(tenant_manager, gate)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for StaydeskFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client socket until it disconnects.
pub async fn process_connection(
    socket: TcpStream,
    factory: Arc<StaydeskFactory>,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: EngineError) -> PgWireError {
    if e.kind() == ErrorKind::StorageError {
        warn!(error = %e, "storage failure");
    }
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        e.sqlstate().into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        e.sqlstate().into(),
        e.to_string(),
    )))
}
