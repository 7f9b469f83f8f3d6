use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::{
        pagination::PageRequest,
        repos::{RepoError, SecuritiesRepo, SecurityQueryFilter, SecuritySort},
    },
    domain::securities::{ColumnFilter, SecurityColumn, SecurityRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SecurityRow {
    id: Uuid,
    isin: String,
    cusip: String,
    figi: String,
    ticker: String,
    security_name: String,
    issuer_name: String,
    issuer_country: String,
    country_of_risk: String,
    instrument_type: String,
    seniority: String,
    currency: String,
    coupon_type: String,
    coupon_rate: f64,
    issue_date: String,
    maturity_date: String,
    days_to_maturity: i32,
    rating_sp: String,
    rating_moodys: String,
    rating_fitch: String,
    composite_rating: String,
    ig_flag: String,
    developed_market: String,
    sector: String,
    index_member: String,
    approved_index: String,
    callable: String,
    putable: String,
    subordinated_flag: String,
    esg_exclusion: String,
    shariah_compliant: String,
    created_at: OffsetDateTime,
}

impl From<SecurityRow> for SecurityRecord {
    fn from(row: SecurityRow) -> Self {
        Self {
            id: row.id,
            isin: row.isin,
            cusip: row.cusip,
            figi: row.figi,
            ticker: row.ticker,
            security_name: row.security_name,
            issuer_name: row.issuer_name,
            issuer_country: row.issuer_country,
            country_of_risk: row.country_of_risk,
            instrument_type: row.instrument_type,
            seniority: row.seniority,
            currency: row.currency,
            coupon_type: row.coupon_type,
            coupon_rate: row.coupon_rate,
            issue_date: row.issue_date,
            maturity_date: row.maturity_date,
            days_to_maturity: row.days_to_maturity,
            rating_sp: row.rating_sp,
            rating_moodys: row.rating_moodys,
            rating_fitch: row.rating_fitch,
            composite_rating: row.composite_rating,
            ig_flag: row.ig_flag,
            developed_market: row.developed_market,
            sector: row.sector,
            index_member: row.index_member,
            approved_index: row.approved_index,
            callable: row.callable,
            putable: row.putable,
            subordinated_flag: row.subordinated_flag,
            esg_exclusion: row.esg_exclusion,
            shariah_compliant: row.shariah_compliant,
            created_at: row.created_at,
        }
    }
}

const SECURITY_COLUMNS: &str = "id, isin, cusip, figi, ticker, security_name, issuer_name, \
     issuer_country, country_of_risk, instrument_type, seniority, currency, coupon_type, \
     coupon_rate, issue_date, maturity_date, days_to_maturity, rating_sp, rating_moodys, \
     rating_fitch, composite_rating, ig_flag, developed_market, sector, index_member, \
     approved_index, callable, putable, subordinated_flag, esg_exclusion, shariah_compliant, \
     created_at";

fn apply_search_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q SecurityQueryFilter) {
    if let Some(search) = filter.search.as_ref() {
        let pattern = format!("%{}%", search);
        qb.push(" AND (isin ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR security_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR issuer_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR ticker ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

fn apply_column_filters<'q>(qb: &mut QueryBuilder<'q, Postgres>, filters: &'q [ColumnFilter]) {
    for filter in filters {
        // Column names come from the SecurityColumn allowlist, never from
        // the client; only the values are bound.
        if filter.column == SecurityColumn::DaysToMaturity {
            // Numeric column: compare as text to tolerate agent-shaped
            // values without a cast error aborting the whole funnel.
            qb.push(" AND days_to_maturity::text IN (");
        } else {
            qb.push(" AND ");
            qb.push(filter.column.as_sql());
            qb.push(" IN (");
        }
        let mut values = qb.separated(", ");
        for value in &filter.values {
            values.push_bind(value);
        }
        qb.push(")");
    }
}

#[async_trait]
impl SecuritiesRepo for PostgresRepositories {
    async fn list_securities(
        &self,
        filter: &SecurityQueryFilter,
        sort: SecuritySort,
        page: PageRequest,
    ) -> Result<Vec<SecurityRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(SECURITY_COLUMNS);
        qb.push(" FROM securities WHERE TRUE");
        apply_search_filter(&mut qb, filter);

        qb.push(" ORDER BY ");
        qb.push(sort.column.as_sql());
        qb.push(" ");
        qb.push(sort.order.as_sql());
        if sort.column != SecurityColumn::Isin {
            qb.push(", isin ASC");
        }

        qb.push(" LIMIT ");
        qb.push_bind(i64::from(page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows = qb
            .build_query_as::<SecurityRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SecurityRecord::from).collect())
    }

    async fn count_securities(&self, filter: &SecurityQueryFilter) -> Result<u64, RepoError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT count(*) FROM securities WHERE TRUE");
        apply_search_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }

    async fn count_matching(&self, filters: &[ColumnFilter]) -> Result<i64, RepoError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT count(*) FROM securities WHERE TRUE");
        apply_column_filters(&mut qb, filters);

        qb.build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_securities(&self, records: &[SecurityRecord]) -> Result<u64, RepoError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO securities (id, isin, cusip, figi, ticker, security_name, issuer_name, \
             issuer_country, country_of_risk, instrument_type, seniority, currency, coupon_type, \
             coupon_rate, issue_date, maturity_date, days_to_maturity, rating_sp, rating_moodys, \
             rating_fitch, composite_rating, ig_flag, developed_market, sector, index_member, \
             approved_index, callable, putable, subordinated_flag, esg_exclusion, \
             shariah_compliant) ",
        );

        qb.push_values(records, |mut row, record| {
            row.push_bind(record.id)
                .push_bind(&record.isin)
                .push_bind(&record.cusip)
                .push_bind(&record.figi)
                .push_bind(&record.ticker)
                .push_bind(&record.security_name)
                .push_bind(&record.issuer_name)
                .push_bind(&record.issuer_country)
                .push_bind(&record.country_of_risk)
                .push_bind(&record.instrument_type)
                .push_bind(&record.seniority)
                .push_bind(&record.currency)
                .push_bind(&record.coupon_type)
                .push_bind(record.coupon_rate)
                .push_bind(&record.issue_date)
                .push_bind(&record.maturity_date)
                .push_bind(record.days_to_maturity)
                .push_bind(&record.rating_sp)
                .push_bind(&record.rating_moodys)
                .push_bind(&record.rating_fitch)
                .push_bind(&record.composite_rating)
                .push_bind(&record.ig_flag)
                .push_bind(&record.developed_market)
                .push_bind(&record.sector)
                .push_bind(&record.index_member)
                .push_bind(&record.approved_index)
                .push_bind(&record.callable)
                .push_bind(&record.putable)
                .push_bind(&record.subordinated_flag)
                .push_bind(&record.esg_exclusion)
                .push_bind(&record.shariah_compliant);
        });

        let result = qb
            .build()
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
