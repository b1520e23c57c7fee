//! PostgreSQL implementation of the persistence boundary.
//!
//! Every conditional update is a single `UPDATE ... WHERE <filter>
//! RETURNING ...` statement. Under `READ COMMITTED` a racing update blocks on
//! the row lock and then re-evaluates the predicate against the committed
//! row, so at most one of several concurrent updates can match.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::models::{
    ORDER_COLUMNS, OrderRow, PROVIDER_COLUMNS, ProviderRow, SLOT_COLUMNS, ServiceRow, SlotRow,
    UserRow,
};
use super::{FindResult, OrderFilter, OrderPatch, Page, SlotFilter, SlotPatch, Store};
use crate::config::MarketConfig;
use crate::domain::{
    AccountFlags, Order, Provider, ProviderId, Service, ServiceId, Slot, User, UserId,
};
use crate::error::MarketError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] if no URL is configured or
    /// the database cannot be reached.
    pub async fn connect(config: &MarketConfig) -> Result<Self, MarketError> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            MarketError::PersistenceError("DATABASE_URL is not configured".to_string())
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the SQL migrations found in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self, dir: &Path) -> Result<(), MarketError> {
        let migrator = sqlx::migrate::Migrator::new(dir)
            .await
            .map_err(|e| MarketError::PersistenceError(e.to_string()))?;
        migrator
            .run(&self.pool)
            .await
            .map_err(|e| MarketError::PersistenceError(e.to_string()))?;
        tracing::info!(dir = %dir.display(), "database migrations applied");
        Ok(())
    }
}

fn push_slot_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &SlotFilter) {
    qb.push(" WHERE TRUE");
    if let Some(ids) = &filter.ids {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        qb.push(" AND id = ANY(").push_bind(ids).push(")");
    }
    if let Some(id) = filter.exclude_id {
        qb.push(" AND id <> ").push_bind(*id.as_uuid());
    }
    if let Some(provider_id) = filter.provider_id {
        qb.push(" AND provider_id = ").push_bind(*provider_id.as_uuid());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(customer_id) = filter.customer_id {
        qb.push(" AND customer_id = ").push_bind(*customer_id.as_uuid());
    }
    if let Some(after) = filter.starts_after {
        qb.push(" AND start_at > ").push_bind(after);
    }
    if let Some((start, end)) = filter.overlapping {
        qb.push(" AND start_at < ").push_bind(end);
        qb.push(" AND end_at > ").push_bind(start);
    }
}

fn push_order_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(id) = filter.id {
        qb.push(" AND id = ").push_bind(*id.as_uuid());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(session) = &filter.checkout_session_id {
        qb.push(" AND checkout_session_id = ")
            .push_bind(session.clone());
    }
    if let Some(intent) = &filter.payment_intent_id {
        qb.push(" AND payment_intent_id = ").push_bind(intent.clone());
    }
    if let Some(slot_id) = filter.covers_slot {
        qb.push(" AND ")
            .push_bind(*slot_id.as_uuid())
            .push(" = ANY(slot_ids)");
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_slot(&self, slot: Slot) -> Result<Slot, MarketError> {
        let sql = format!(
            "INSERT INTO slots ({SLOT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {SLOT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SlotRow>(&sql)
            .bind(*slot.id.as_uuid())
            .bind(*slot.provider_id.as_uuid())
            .bind(slot.start)
            .bind(slot.end)
            .bind(slot.status.as_str())
            .bind(slot.customer_id.map(Uuid::from))
            .bind(slot.service_id.map(Uuid::from))
            .bind(slot.price_snapshot.map(Json))
            .bind(slot.created_at)
            .bind(slot.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Slot::try_from(row)
    }

    async fn find_slots(
        &self,
        filter: &SlotFilter,
        page: Option<Page>,
    ) -> Result<FindResult<Slot>, MarketError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM slots");
        push_slot_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(SLOT_COLUMNS).push(" FROM slots");
        push_slot_filter(&mut qb, filter);
        qb.push(" ORDER BY start_at ASC, id ASC");
        if let Some(page) = page {
            qb.push(" LIMIT ").push_bind(i64::from(page.per_page));
            qb.push(" OFFSET ")
                .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
        }
        let rows = qb
            .build_query_as::<SlotRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(FindResult {
            docs: rows
                .into_iter()
                .map(Slot::try_from)
                .collect::<Result<_, _>>()?,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn update_slots_where(
        &self,
        filter: &SlotFilter,
        patch: &SlotPatch,
    ) -> Result<Vec<Slot>, MarketError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE slots SET updated_at = now()");
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(customer_id) = patch.customer_id {
            qb.push(", customer_id = ")
                .push_bind(customer_id.map(Uuid::from));
        }
        if let Some(service_id) = patch.service_id {
            qb.push(", service_id = ").push_bind(service_id.map(Uuid::from));
        }
        if let Some(snapshot) = &patch.price_snapshot {
            qb.push(", price_snapshot = ")
                .push_bind(snapshot.clone().map(Json));
        }
        if let Some(start) = patch.start {
            qb.push(", start_at = ").push_bind(start);
        }
        if let Some(end) = patch.end {
            qb.push(", end_at = ").push_bind(end);
        }
        push_slot_filter(&mut qb, filter);
        qb.push(" RETURNING ").push(SLOT_COLUMNS);

        let rows = qb
            .build_query_as::<SlotRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Slot::try_from).collect()
    }

    async fn delete_slots_where(&self, filter: &SlotFilter) -> Result<Vec<Slot>, MarketError> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM slots");
        push_slot_filter(&mut qb, filter);
        qb.push(" RETURNING ").push(SLOT_COLUMNS);
        let rows = qb
            .build_query_as::<SlotRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Slot::try_from).collect()
    }

    async fn create_order(&self, order: Order) -> Result<Order, MarketError> {
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {ORDER_COLUMNS}"
        );
        let slot_ids: Vec<Uuid> = order.slot_ids.iter().map(|id| *id.as_uuid()).collect();
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(*order.id.as_uuid())
            .bind(*order.customer_id.as_uuid())
            .bind(*order.provider_id.as_uuid())
            .bind(slot_ids)
            .bind(order.amount)
            .bind(&order.currency)
            .bind(order.platform_fee)
            .bind(&order.destination_account)
            .bind(&order.checkout_session_id)
            .bind(&order.payment_intent_id)
            .bind(&order.receipt_url)
            .bind(order.status.as_str())
            .bind(order.hold_expires_at)
            .bind(order.created_at)
            .bind(order.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Order::try_from(row)
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, MarketError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(ORDER_COLUMNS).push(" FROM orders");
        push_order_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC");
        let rows = qb
            .build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn update_orders_where(
        &self,
        filter: &OrderFilter,
        patch: &OrderPatch,
    ) -> Result<Vec<Order>, MarketError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE orders SET updated_at = now()");
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(session) = &patch.checkout_session_id {
            qb.push(", checkout_session_id = ")
                .push_bind(session.clone());
        }
        if let Some(intent) = &patch.payment_intent_id {
            qb.push(", payment_intent_id = ").push_bind(intent.clone());
        }
        if let Some(receipt) = &patch.receipt_url {
            qb.push(", receipt_url = ").push_bind(receipt.clone());
        }
        push_order_filter(&mut qb, filter);
        qb.push(" RETURNING ").push(ORDER_COLUMNS);
        let rows = qb
            .build_query_as::<OrderRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn provider_by_id(&self, id: ProviderId) -> Result<Option<Provider>, MarketError> {
        let sql = format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = $1");
        let row = sqlx::query_as::<_, ProviderRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Provider::from))
    }

    async fn save_provider(&self, provider: Provider) -> Result<Provider, MarketError> {
        let sql = format!(
            "INSERT INTO providers ({PROVIDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET owner_id = EXCLUDED.owner_id, name = EXCLUDED.name, \
             slug = EXCLUDED.slug, hourly_rate = EXCLUDED.hourly_rate, \
             payment_account_id = EXCLUDED.payment_account_id, \
             charges_enabled = EXCLUDED.charges_enabled, \
             payouts_enabled = EXCLUDED.payouts_enabled, \
             details_submitted = EXCLUDED.details_submitted \
             RETURNING {PROVIDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProviderRow>(&sql)
            .bind(*provider.id.as_uuid())
            .bind(*provider.owner_id.as_uuid())
            .bind(&provider.name)
            .bind(&provider.slug)
            .bind(provider.hourly_rate)
            .bind(&provider.payment_account_id)
            .bind(provider.charges_enabled)
            .bind(provider.payouts_enabled)
            .bind(provider.details_submitted)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn update_provider_flags(
        &self,
        account_id: &str,
        flags: AccountFlags,
    ) -> Result<Vec<Provider>, MarketError> {
        let sql = format!(
            "UPDATE providers SET charges_enabled = $1, payouts_enabled = $2, \
             details_submitted = $3 WHERE payment_account_id = $4 RETURNING {PROVIDER_COLUMNS}"
        );
        let rows = sqlx::query_as::<_, ProviderRow>(&sql)
            .bind(flags.charges_enabled)
            .bind(flags.payouts_enabled)
            .bind(flags.details_submitted)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Provider::from).collect())
    }

    async fn service_by_id(&self, id: ServiceId) -> Result<Option<Service>, MarketError> {
        let row = sqlx::query_as::<_, ServiceRow>(
            "SELECT id, name, slug FROM services WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Service::from))
    }

    async fn save_service(&self, service: Service) -> Result<Service, MarketError> {
        let row = sqlx::query_as::<_, ServiceRow>(
            "INSERT INTO services (id, name, slug) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, slug = EXCLUDED.slug \
             RETURNING id, name, slug",
        )
        .bind(*service.id.as_uuid())
        .bind(&service.name)
        .bind(&service.slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, MarketError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, accepted_terms_version FROM users WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn user_by_external_id(&self, external_id: &str) -> Result<Option<User>, MarketError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, external_id, accepted_terms_version FROM users WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn save_user(&self, user: User) -> Result<User, MarketError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, external_id, accepted_terms_version) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET external_id = EXCLUDED.external_id, \
             accepted_terms_version = EXCLUDED.accepted_terms_version \
             RETURNING id, external_id, accepted_terms_version",
        )
        .bind(*user.id.as_uuid())
        .bind(&user.external_id)
        .bind(&user.accepted_terms_version)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}
