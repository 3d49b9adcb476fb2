//! API handler: owns the services and routes requests to them.
//!
//! The serve loop reads one JSON request per line, dispatches, and writes
//! one JSON response per line. Storage and integrity failures answer the
//! client with generic codes; the specific cause goes to stderr for
//! operators.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::audit::AccessAuditor;
use crate::auth::Identity;
use crate::config::ServiceConfig;
use crate::delivery::{DeliveryService, FetchOutcome};
use crate::ingest::{IngestError, IngestService, UploadRequest};
use crate::protocol::ops::{self, names};
use crate::protocol::{ApiError, ApiRequest, ApiResponse};
use crate::registry::{RecordId, Registry, StorageError};
use crate::seal::Sealer;
use crate::stats::StatsService;

/// Main API handler.
pub struct ApiHandler {
    registry: Arc<Registry>,
    auditor: Arc<AccessAuditor>,
    delivery: DeliveryService,
    ingest: IngestService,
    stats: StatsService,
}

impl ApiHandler {
    /// Build the handler and its services from configuration.
    pub fn new(config: &ServiceConfig, sealer: Sealer) -> Self {
        let registry = Arc::new(Registry::in_memory());
        Self::with_registry(config, sealer, registry)
    }

    /// Build the handler over an existing registry.
    pub fn with_registry(config: &ServiceConfig, sealer: Sealer, registry: Arc<Registry>) -> Self {
        let auditor = Arc::new(AccessAuditor::new());
        let delivery = DeliveryService::new(
            registry.clone(),
            sealer.clone(),
            config.rate_limiter(),
            auditor.clone(),
        );
        let ingest = IngestService::new(registry.clone(), sealer, config.ingest_limits());
        let stats = StatsService::new(registry.clone());
        Self {
            registry,
            auditor,
            delivery,
            ingest,
            stats,
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The access auditor.
    pub fn auditor(&self) -> &Arc<AccessAuditor> {
        &self.auditor
    }

    /// Serve requests line by line until EOF.
    pub fn run_with_io<R: BufRead, W: Write>(&self, reader: &mut R, writer: &mut W) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let response = match serde_json::from_str::<ApiRequest>(&line) {
                Ok(request) => self.dispatch(request),
                Err(e) => ApiResponse::error(
                    String::new(),
                    ApiError::invalid_request(format!("invalid JSON: {}", e)),
                ),
            };
            serde_json::to_writer(&mut *writer, &response)?;
            writeln!(writer)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Dispatch one request at the current time.
    pub fn dispatch(&self, request: ApiRequest) -> ApiResponse {
        self.dispatch_at(request, Utc::now())
    }

    /// Dispatch one request at an explicit instant. Time is a parameter so
    /// cooldown and expiry behavior is testable.
    pub fn dispatch_at(&self, request: ApiRequest, now: DateTime<Utc>) -> ApiResponse {
        let request_id = request.request_id.clone();
        match self.route(&request, now) {
            Ok(payload) => ApiResponse::success(request_id, payload),
            Err(error) => ApiResponse::error(request_id, error),
        }
    }

    fn route(&self, request: &ApiRequest, now: DateTime<Utc>) -> Result<serde_json::Value, ApiError> {
        match request.op.as_str() {
            names::FETCH => {
                let params: ops::FetchParams = decode(&request.payload)?;
                self.fetch(params, now)
            }
            names::UPLOAD => {
                let params: ops::UploadParams = decode(&request.payload)?;
                check_assertion(&params.identity, now)?;
                let id = self
                    .ingest
                    .upload(
                        &params.identity,
                        UploadRequest {
                            name: params.name,
                            key: params.key,
                            source: params.source,
                            expiry_days: params.expiry_days,
                            tier: params.tier,
                        },
                        now,
                    )
                    .map_err(ingest_error)?;
                encode(&ops::UploadReply { id: id.to_string() })
            }
            names::EDIT => {
                let params: ops::EditParams = decode(&request.payload)?;
                check_assertion(&params.identity, now)?;
                let id = RecordId::from(params.id);
                self.ingest
                    .edit(&params.identity, &id, params.new_payload, params.new_name)
                    .map_err(ingest_error)?;
                Ok(serde_json::json!({}))
            }
            names::DELETE => {
                let params: ops::DeleteParams = decode(&request.payload)?;
                check_assertion(&params.identity, now)?;
                let id = RecordId::from(params.id);
                self.ingest
                    .delete(&params.identity, &id)
                    .map_err(ingest_error)?;
                Ok(serde_json::json!({}))
            }
            names::LIST => {
                let params: ops::ListParams = decode(&request.payload)?;
                check_assertion(&params.identity, now)?;
                let records = if params.identity.is_admin() {
                    self.registry.list_all()
                } else {
                    self.registry.list_by_owner(&params.identity.principal)
                }
                .map_err(storage_error)?;
                encode(&ops::ListReply { records })
            }
            names::BUNDLE => {
                let params: ops::BundleParams = decode(&request.payload)?;
                check_assertion(&params.identity, now)?;
                let id = self
                    .ingest
                    .bundle(&params.identity, &params.keys, &params.bundle_name, now)
                    .map_err(ingest_error)?;
                encode(&ops::BundleReply { id: id.to_string() })
            }
            names::STATS => {
                let params: ops::StatsParams = decode(&request.payload)?;
                check_assertion(&params.identity, now)?;
                let report = self
                    .stats
                    .report(&params.identity, now)
                    .map_err(storage_error)?;
                encode(&ops::StatsReply { report })
            }
            names::AUDIT_EXPORT => {
                let params: ops::AuditExportParams = decode(&request.payload)?;
                check_assertion(&params.identity, now)?;
                let owned_keys: Vec<String> = self
                    .registry
                    .list_by_owner(&params.identity.principal)
                    .map_err(storage_error)?
                    .into_iter()
                    .map(|r| r.lookup_key)
                    .collect();
                let entries = self.auditor.export(&params.identity, &owned_keys);
                encode(&ops::AuditExportReply { entries })
            }
            op => Err(ApiError::unknown_operation(op)),
        }
    }

    fn fetch(&self, params: ops::FetchParams, now: DateTime<Utc>) -> Result<serde_json::Value, ApiError> {
        let outcome = self
            .delivery
            .fetch(&params.key, params.source_address.as_deref(), now)
            .map_err(storage_error)?;
        match outcome {
            FetchOutcome::Served { payload } => encode(&ops::FetchReply { payload }),
            FetchOutcome::Forbidden => Err(ApiError::forbidden()),
            FetchOutcome::Gone => Err(ApiError::gone()),
            FetchOutcome::TooManyRequests => Err(ApiError::too_many_requests()),
            FetchOutcome::IntegrityFailure => Err(ApiError::integrity_failure()),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(payload: &serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| ApiError::invalid_request(format!("invalid payload: {}", e)))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| {
        eprintln!("api: reply serialization failed: {}", e);
        ApiError::storage_error()
    })
}

fn check_assertion(identity: &Identity, now: DateTime<Utc>) -> Result<(), ApiError> {
    if identity.is_valid_at(now) {
        Ok(())
    } else {
        Err(ApiError::not_authorized("identity assertion expired"))
    }
}

fn storage_error(e: StorageError) -> ApiError {
    eprintln!("api: storage failure: {}", e);
    ApiError::storage_error()
}

fn ingest_error(e: IngestError) -> ApiError {
    match e {
        IngestError::Validation(msg) => ApiError::invalid_request(msg),
        IngestError::Authorization(msg) => ApiError::not_authorized(msg),
        IngestError::Conflict { key } => ApiError::conflict(&key),
        IngestError::NotFound => ApiError::not_found(),
        IngestError::NotOwner => ApiError::not_owner(),
        IngestError::Transform(err) => ApiError::transform_failed(err.to_string()),
        IngestError::Storage(err) => storage_error(err),
    }
}
