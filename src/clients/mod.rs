pub mod import;

use serde::Serialize;
use sqlx::PgPool;

use crate::db;
use crate::db::clients::ClientScope;
use crate::error::AppError;
use crate::models::Client;

#[derive(Debug, Serialize)]
pub struct FailedRow {
    pub row: usize,
    pub data: import::Row,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub successful: Vec<Client>,
    pub failed: Vec<FailedRow>,
}

/// Insert every parseable row of `csv_text` under `scope`. Rows that fail to
/// parse or insert are reported and do not stop the rest.
pub async fn import_csv(
    pool: &PgPool,
    scope: ClientScope,
    csv_text: &str,
) -> Result<ImportReport, AppError> {
    let (format, rows) = import::parse(csv_text)
        .map_err(|e| AppError::BadRequest(format!("Invalid CSV: {e}")))?;

    let mut report = ImportReport::default();
    for parsed in rows {
        let outcome = match parsed.fields {
            Ok(fields) => db::clients::create(pool, scope, &fields)
                .await
                .map_err(|e| {
                    tracing::warn!(row = parsed.row, error = %e, "Client import row failed");
                    "Failed to save client".to_string()
                }),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(client) => report.successful.push(client),
            Err(error) => report.failed.push(FailedRow {
                row: parsed.row,
                data: parsed.data,
                error,
            }),
        }
    }

    tracing::info!(
        format = ?format,
        imported = report.successful.len(),
        failed = report.failed.len(),
        "Client CSV import finished"
    );
    Ok(report)
}
