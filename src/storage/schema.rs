//! Control-plane schema identifiers for type-safe query building.
//!
//! Table creation itself happens in each backend's migration ladder; these
//! enums keep query construction free of stray strings.

use sea_query::Iden;

/// Targets table.
#[derive(Iden)]
pub enum Targets {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "name"]
    Name,
    #[iden = "kind"]
    Kind,
    #[iden = "dsn"]
    Dsn,
    #[iden = "database"]
    Database,
    #[iden = "schema"]
    Schema,
    #[iden = "options_json"]
    OptionsJson,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Target connectivity checks.
#[derive(Iden)]
pub enum TargetChecks {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "target_id"]
    TargetId,
    #[iden = "checked_at"]
    CheckedAt,
    #[iden = "ok"]
    Ok,
    #[iden = "latency_ms"]
    LatencyMs,
    #[iden = "server_version"]
    ServerVersion,
    #[iden = "capabilities_json"]
    CapabilitiesJson,
    #[iden = "error"]
    Error,
}

/// Run log lines.
#[derive(Iden)]
pub enum RunLogs {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "run_id"]
    RunId,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "level"]
    Level,
    #[iden = "message"]
    Message,
}
