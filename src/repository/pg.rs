use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    ExpressionMethods, QueryDsl, SelectableHelper,
    pg::Pg,
    result::{DatabaseErrorKind, Error as DieselError},
};
use diesel_async::RunQueryDsl;

use super::{OrderRepository, PageRequest, RepoError};
use crate::{
    db::DbPool,
    models::{CreateOrderEntity, OrderChangeset, OrderEntity},
    schema::orders,
    status::OrderStatus,
};

/// Postgres-backed repository. Every query is built with the diesel DSL, so all values are
/// bound parameters.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: DbPool,
}

impl PgOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn owned_by(user_id: i64, status: Option<OrderStatus>) -> orders::BoxedQuery<'static, Pg> {
    let mut query = orders::table
        .filter(orders::user_id.eq(user_id))
        .filter(orders::deleted_at.is_null())
        .into_boxed();
    if let Some(status) = status {
        query = query.filter(orders::status.eq(status));
    }
    query
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: CreateOrderEntity) -> Result<OrderEntity, RepoError> {
        let conn = &mut self
            .pool
            .get()
            .await
            .map_err(|e| RepoError::storage("create", &order.order_no, e))?;

        diesel::insert_into(orders::table)
            .values(&order)
            .returning(OrderEntity::as_returning())
            .get_result(conn)
            .await
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    RepoError::Conflict(order.order_no.clone())
                }
                err => RepoError::storage("create", &order.order_no, err),
            })
    }

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<OrderEntity>, RepoError> {
        let conn = &mut self
            .pool
            .get()
            .await
            .map_err(|e| RepoError::storage("find_by_order_no", order_no, e))?;

        let order = orders::table
            .filter(orders::order_no.eq(order_no))
            .filter(orders::deleted_at.is_null())
            .select(OrderEntity::as_select())
            .first(conn)
            .await;

        match order {
            Ok(order) => Ok(Some(order)),
            Err(DieselError::NotFound) => Ok(None),
            Err(err) => Err(RepoError::storage("find_by_order_no", order_no, err)),
        }
    }

    async fn find_by_user(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<(Vec<OrderEntity>, i64), RepoError> {
        let key = format!("user {user_id}");
        let conn = &mut self
            .pool
            .get()
            .await
            .map_err(|e| RepoError::storage("find_by_user", &key, e))?;

        let total: i64 = owned_by(user_id, status)
            .count()
            .get_result(conn)
            .await
            .map_err(|e| RepoError::storage("count_by_user", &key, e))?;

        let orders: Vec<OrderEntity> = owned_by(user_id, status)
            .order_by(orders::created_at.desc())
            .then_order_by(orders::id.desc())
            .offset(page.offset())
            .limit(page.page_size())
            .select(OrderEntity::as_select())
            .load(conn)
            .await
            .map_err(|e| RepoError::storage("find_by_user", &key, e))?;

        Ok((orders, total))
    }

    async fn update_fields(
        &self,
        order_no: &str,
        expected: OrderStatus,
        changes: OrderChangeset,
    ) -> Result<(), RepoError> {
        let conn = &mut self
            .pool
            .get()
            .await
            .map_err(|e| RepoError::storage("update_fields", order_no, e))?;

        // The status guard makes racing transitions resolve to a single winner.
        let affected = diesel::update(
            orders::table
                .filter(orders::order_no.eq(order_no))
                .filter(orders::status.eq(expected))
                .filter(orders::deleted_at.is_null()),
        )
        .set((&changes, orders::updated_at.eq(Utc::now())))
        .execute(conn)
        .await
        .map_err(|e| RepoError::storage("update_fields", order_no, e))?;

        if affected == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
