//! Postgres-backed stock store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StockError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StockError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (foreign key violation) | `23503` | `Validation` | Link to an unknown antibiotic code |
//! | Database (check constraint violation) | `23514` | `Validation` | Negative quantity or threshold |
//! | Database (unique violation) | `23505` | `Validation` | Duplicate primary key |
//! | Database (other) | Any other | `Internal` | Other database errors |
//! | PoolClosed / PoolTimedOut | N/A | `Internal` | No connection available |
//! | Other | N/A | `Internal` | Network errors, decode failures, etc. |
//!
//! ## Units of work
//!
//! Transactional operations acquire one connection via `pool.begin()`, run
//! their body against it, and always end in an explicit `commit` (body
//! succeeded) or `rollback` (any error). The connection returns to the pool
//! when the transaction is consumed, on every path.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use tracing::{Span, instrument};

use antibiostock_core::dispatch::distinct_codes;
use antibiostock_core::{
    Antibiotic, AntibioticCode, DispatchReceipt, DispatchRequest, LinkReplacement, Panel,
    PanelId, PanelMembership, Shortfall, StockError, StockResult, StockUpdate, Withdrawal,
    verify_dispatch,
};

use super::r#trait::{StockStore, StoreDiagnostics};
use crate::config::DatabaseConfig;

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug, FromRow)]
struct AntibioticRow {
    codigo: String,
    nombre: String,
    cantidad: i64,
    stock_minimo: i64,
}

impl TryFrom<AntibioticRow> for Antibiotic {
    type Error = StockError;

    fn try_from(row: AntibioticRow) -> Result<Self, Self::Error> {
        let code = AntibioticCode::from_stored(row.codigo)
            .map_err(|e| StockError::internal(format!("corrupt antibiotic row: {e}")))?;
        Ok(Antibiotic {
            code,
            name: row.nombre,
            quantity: row.cantidad,
            minimum_threshold: row.stock_minimo,
        })
    }
}

#[derive(Debug, FromRow)]
struct PanelRow {
    id: i64,
    nombre: String,
}

#[derive(Debug, FromRow)]
struct MembershipRow {
    codigo: String,
    nombre: String,
    existe: bool,
}

fn into_antibiotics(rows: Vec<AntibioticRow>) -> StockResult<Vec<Antibiotic>> {
    rows.into_iter().map(Antibiotic::try_from).collect()
}

/// Stored codes are taken verbatim so they keep matching their own rows.
fn parse_codes(raw: Vec<String>) -> StockResult<Vec<AntibioticCode>> {
    raw.into_iter()
        .map(|c| {
            AntibioticCode::from_stored(c)
                .map_err(|e| StockError::internal(format!("corrupt link row: {e}")))
        })
        .collect()
}

fn code_strings(codes: &[AntibioticCode]) -> Vec<String> {
    codes.iter().map(|c| c.as_str().to_string()).collect()
}

/// Postgres-backed stock store.
///
/// Holds a `PgPool` handle (cheap to clone, thread-safe). Integer columns are
/// read through `::bigint` casts so the store works against both `INTEGER`
/// and `BIGINT` schemas.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from configuration and connect eagerly.
    pub async fn connect(config: &DatabaseConfig) -> StockResult<Self> {
        let mut options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| map_sqlx_error("parse_database_url", e))?;
        if config.require_tls {
            options = options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the three tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StockResult<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self, operation: &str) -> StockResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

/// Close a unit of work: commit on success, roll back on any error.
async fn finish<T>(
    tx: Transaction<'static, Postgres>,
    operation: &str,
    outcome: StockResult<T>,
) -> StockResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error(operation, e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(operation, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

async fn panel_exists(conn: &mut PgConnection, panel_id: PanelId) -> StockResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM antibiogramas WHERE id = $1)")
        .bind(panel_id.get())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("panel_exists", e))
}

async fn replace_links_in(
    conn: &mut PgConnection,
    replacement: &LinkReplacement,
) -> StockResult<usize> {
    if !panel_exists(conn, replacement.panel_id).await? {
        return Err(StockError::not_found(format!("panel {}", replacement.panel_id)));
    }

    sqlx::query("DELETE FROM antibiograma_antibiotico WHERE antibiograma_id = $1")
        .bind(replacement.panel_id.get())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_links", e))?;

    for code in &replacement.codes {
        sqlx::query(
            "INSERT INTO antibiograma_antibiotico (antibiograma_id, antibiotico_codigo) VALUES ($1, $2)",
        )
        .bind(replacement.panel_id.get())
        .bind(code.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StockError::validation(format!("unknown antibiotic code {code}"))
            } else {
                map_sqlx_error("insert_link", e)
            }
        })?;
    }

    Ok(replacement.codes.len())
}

async fn dispatch_in(
    conn: &mut PgConnection,
    request: &DispatchRequest,
) -> StockResult<DispatchReceipt> {
    if !panel_exists(conn, request.panel_id).await? {
        return Err(StockError::validation(format!(
            "panel {} does not exist",
            request.panel_id
        )));
    }

    let raw_codes = sqlx::query_scalar::<_, String>(
        r#"
        SELECT DISTINCT antibiotico_codigo
        FROM antibiograma_antibiotico
        WHERE antibiograma_id = $1
        "#,
    )
    .bind(request.panel_id.get())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("resolve_links", e))?;

    let linked = distinct_codes(parse_codes(raw_codes)?);
    if linked.is_empty() {
        return Err(StockError::NoLinkedItems(request.panel_id));
    }
    let keys = code_strings(&linked);

    // Lock in code order so overlapping dispatches queue instead of deadlocking.
    let locked = sqlx::query_as::<_, AntibioticRow>(
        r#"
        SELECT codigo, nombre, cantidad::bigint AS cantidad, stock_minimo::bigint AS stock_minimo
        FROM antibioticos
        WHERE codigo = ANY($1)
        ORDER BY codigo
        FOR UPDATE
        "#,
    )
    .bind(&keys)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("lock_rows", e))?;
    let locked = into_antibiotics(locked)?;

    Span::current().record("locked", locked.len() as u64);
    verify_dispatch(request, &linked, &locked)?;

    let updated = sqlx::query(
        r#"
        UPDATE antibioticos
        SET cantidad = cantidad - $1
        WHERE codigo = ANY($2)
        "#,
    )
    .bind(request.units)
    .bind(&keys)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("decrement_rows", e))?
    .rows_affected();

    if updated != keys.len() as u64 {
        return Err(StockError::internal(format!(
            "decremented {updated} rows, expected {}",
            keys.len()
        )));
    }

    let after = sqlx::query_as::<_, AntibioticRow>(
        r#"
        SELECT codigo, nombre, cantidad::bigint AS cantidad, stock_minimo::bigint AS stock_minimo
        FROM antibioticos
        WHERE codigo = ANY($1)
        ORDER BY nombre, codigo
        "#,
    )
    .bind(&keys)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("read_affected", e))?;

    Ok(DispatchReceipt {
        panel_id: request.panel_id,
        units: request.units,
        affected: into_antibiotics(after)?,
    })
}

#[async_trait]
impl StockStore for PostgresStockStore {
    #[instrument(skip(self), err)]
    async fn list_panels(&self) -> StockResult<Vec<Panel>> {
        let rows = sqlx::query_as::<_, PanelRow>(
            "SELECT id::bigint AS id, nombre FROM antibiogramas ORDER BY nombre, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_panels", e))?;

        rows.into_iter()
            .map(|r| {
                Ok(Panel {
                    id: PanelId::new(r.id)
                        .map_err(|e| StockError::internal(format!("corrupt panel row: {e}")))?,
                    name: r.nombre,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn list_antibiotics(&self) -> StockResult<Vec<Antibiotic>> {
        let rows = sqlx::query_as::<_, AntibioticRow>(
            r#"
            SELECT codigo, nombre, cantidad::bigint AS cantidad, stock_minimo::bigint AS stock_minimo
            FROM antibioticos
            ORDER BY nombre, codigo
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_antibiotics", e))?;

        into_antibiotics(rows)
    }

    #[instrument(skip_all, fields(panel_id = %panel_id), err)]
    async fn panel_membership(&self, panel_id: PanelId) -> StockResult<Vec<PanelMembership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT
                a.codigo,
                a.nombre,
                EXISTS(
                    SELECT 1
                    FROM antibiograma_antibiotico aa
                    WHERE aa.antibiograma_id = $1
                      AND aa.antibiotico_codigo = a.codigo
                ) AS existe
            FROM antibioticos a
            ORDER BY a.nombre, a.codigo
            "#,
        )
        .bind(panel_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("panel_membership", e))?;

        rows.into_iter()
            .map(|r| {
                Ok(PanelMembership {
                    code: AntibioticCode::from_stored(r.codigo)
                        .map_err(|e| StockError::internal(format!("corrupt antibiotic row: {e}")))?,
                    name: r.nombre,
                    linked: r.existe,
                })
            })
            .collect()
    }

    #[instrument(skip_all, fields(panel_id = %panel_id), err)]
    async fn linked_codes(&self, panel_id: PanelId) -> StockResult<Vec<AntibioticCode>> {
        let raw = sqlx::query_scalar::<_, String>(
            r#"
            SELECT antibiotico_codigo
            FROM antibiograma_antibiotico
            WHERE antibiograma_id = $1
            ORDER BY antibiotico_codigo
            "#,
        )
        .bind(panel_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("linked_codes", e))?;

        parse_codes(raw)
    }

    #[instrument(skip_all, fields(panel_id = %panel_id), err)]
    async fn linked_antibiotics(&self, panel_id: PanelId) -> StockResult<Vec<Antibiotic>> {
        let rows = sqlx::query_as::<_, AntibioticRow>(
            r#"
            SELECT a.codigo, a.nombre, a.cantidad::bigint AS cantidad, a.stock_minimo::bigint AS stock_minimo
            FROM antibioticos a
            WHERE a.codigo IN (
                SELECT aa.antibiotico_codigo
                FROM antibiograma_antibiotico aa
                WHERE aa.antibiograma_id = $1
            )
            ORDER BY a.nombre, a.codigo
            "#,
        )
        .bind(panel_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("linked_antibiotics", e))?;

        into_antibiotics(rows)
    }

    #[instrument(skip_all, fields(code = %code), err)]
    async fn update_antibiotic(
        &self,
        code: &AntibioticCode,
        update: StockUpdate,
    ) -> StockResult<Antibiotic> {
        let row = sqlx::query_as::<_, AntibioticRow>(
            r#"
            UPDATE antibioticos
            SET cantidad = COALESCE($1, cantidad),
                stock_minimo = COALESCE($2, stock_minimo)
            WHERE codigo = $3
            RETURNING codigo, nombre, cantidad::bigint AS cantidad, stock_minimo::bigint AS stock_minimo
            "#,
        )
        .bind(update.quantity())
        .bind(update.minimum_threshold())
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_antibiotic", e))?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StockError::not_found(format!("antibiotic {code}"))),
        }
    }

    #[instrument(skip_all, fields(code = %withdrawal.code, amount = withdrawal.amount), err)]
    async fn withdraw(&self, withdrawal: Withdrawal) -> StockResult<Antibiotic> {
        // Single conditional write: race-safe without an explicit lock.
        let row = sqlx::query_as::<_, AntibioticRow>(
            r#"
            UPDATE antibioticos
            SET cantidad = cantidad - $1
            WHERE codigo = $2
              AND cantidad >= $1
            RETURNING codigo, nombre, cantidad::bigint AS cantidad, stock_minimo::bigint AS stock_minimo
            "#,
        )
        .bind(withdrawal.amount)
        .bind(withdrawal.code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("withdraw", e))?;

        if let Some(row) = row {
            return row.try_into();
        }

        // Nothing matched: tell "unknown code" apart from "not enough stock".
        let current = sqlx::query_as::<_, AntibioticRow>(
            r#"
            SELECT codigo, nombre, cantidad::bigint AS cantidad, stock_minimo::bigint AS stock_minimo
            FROM antibioticos
            WHERE codigo = $1
            "#,
        )
        .bind(withdrawal.code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("withdraw_check", e))?;

        match current {
            None => Err(StockError::not_found(format!("antibiotic {}", withdrawal.code))),
            Some(row) => {
                let item = Antibiotic::try_from(row)?;
                Err(StockError::InsufficientStock(vec![Shortfall::new(
                    &item,
                    withdrawal.amount,
                )]))
            }
        }
    }

    #[instrument(
        skip_all,
        fields(panel_id = %replacement.panel_id, codes = replacement.codes.len()),
        err
    )]
    async fn replace_links(&self, replacement: LinkReplacement) -> StockResult<usize> {
        let mut tx = self.begin("replace_links").await?;
        let outcome = replace_links_in(&mut tx, &replacement).await;
        finish(tx, "replace_links", outcome).await
    }

    #[instrument(
        skip_all,
        fields(panel_id = %request.panel_id, units = request.units, locked = tracing::field::Empty),
        err
    )]
    async fn register_dispatch(&self, request: DispatchRequest) -> StockResult<DispatchReceipt> {
        let mut tx = self.begin("register_dispatch").await?;
        let outcome = dispatch_in(&mut tx, &request).await;
        finish(tx, "register_dispatch", outcome).await
    }

    #[instrument(skip(self), err)]
    async fn below_minimum(&self) -> StockResult<Vec<Antibiotic>> {
        let rows = sqlx::query_as::<_, AntibioticRow>(
            r#"
            SELECT codigo, nombre, cantidad::bigint AS cantidad, stock_minimo::bigint AS stock_minimo
            FROM antibioticos
            WHERE cantidad < stock_minimo
            ORDER BY nombre, codigo
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("below_minimum", e))?;

        into_antibiotics(rows)
    }

    #[instrument(skip(self), err)]
    async fn diagnostics(&self) -> StockResult<StoreDiagnostics> {
        let now = sqlx::query_scalar::<_, DateTime<Utc>>("SELECT NOW()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("now", e))?;

        let tables = sqlx::query_scalar::<_, String>(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = 'public'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_tables", e))?;

        Ok(StoreDiagnostics { now, tables })
    }
}

/// Map SQLx errors to `StockError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StockError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23503") => StockError::validation(format!(
                    "referenced row does not exist ({operation})"
                )),
                Some("23514") => StockError::validation(format!(
                    "value violates a stock constraint ({operation})"
                )),
                Some("23505") => {
                    StockError::validation(format!("duplicate key ({operation})"))
                }
                _ => StockError::internal(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StockError::internal(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StockError::internal(format!("connection pool timed out in {}", operation))
        }
        _ => StockError::internal(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a foreign key violation.
fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}
