//! Bulk catalog loading from the CSV security feed.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{RepoError, SecuritiesRepo};
use crate::domain::securities::SecurityRecord;

const IMPORT_BATCH_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum CatalogImportError {
    #[error("failed to read `{path}`: {message}")]
    Read { path: String, message: String },
    #[error("malformed CSV row: {0}")]
    MalformedRow(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// One catalog row as it appears in the CSV feed; headers carry the
/// feed's column names.
#[derive(Debug, Deserialize)]
struct CsvSecurityRow {
    #[serde(rename = "ISIN")]
    isin: String,
    #[serde(rename = "CUSIP")]
    cusip: String,
    #[serde(rename = "FIGI")]
    figi: String,
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "Security_Name")]
    security_name: String,
    #[serde(rename = "Issuer_Name")]
    issuer_name: String,
    #[serde(rename = "Issuer_Country")]
    issuer_country: String,
    #[serde(rename = "Country_of_Risk")]
    country_of_risk: String,
    #[serde(rename = "Instrument_Type")]
    instrument_type: String,
    #[serde(rename = "Seniority")]
    seniority: String,
    #[serde(rename = "Currency")]
    currency: String,
    #[serde(rename = "Coupon_Type")]
    coupon_type: String,
    #[serde(rename = "Coupon_Rate")]
    coupon_rate: f64,
    #[serde(rename = "Issue_Date")]
    issue_date: String,
    #[serde(rename = "Maturity_Date")]
    maturity_date: String,
    #[serde(rename = "Days_to_Maturity")]
    days_to_maturity: i32,
    #[serde(rename = "Rating_SP")]
    rating_sp: String,
    #[serde(rename = "Rating_Moodys")]
    rating_moodys: String,
    #[serde(rename = "Rating_Fitch")]
    rating_fitch: String,
    #[serde(rename = "Composite_Rating")]
    composite_rating: String,
    #[serde(rename = "IG_Flag")]
    ig_flag: String,
    #[serde(rename = "Developed_Market")]
    developed_market: String,
    #[serde(rename = "Sector")]
    sector: String,
    #[serde(rename = "Index_Member")]
    index_member: String,
    #[serde(rename = "Approved_Index")]
    approved_index: String,
    #[serde(rename = "Callable")]
    callable: String,
    #[serde(rename = "Putable")]
    putable: String,
    #[serde(rename = "Subordinated_Flag")]
    subordinated_flag: String,
    #[serde(rename = "ESG_Exclusion")]
    esg_exclusion: String,
    #[serde(rename = "Shariah_Compliant")]
    shariah_compliant: String,
}

impl From<CsvSecurityRow> for SecurityRecord {
    fn from(row: CsvSecurityRow) -> Self {
        Self {
            id: Uuid::new_v4(),
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
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Parse the CSV feed into catalog records.
pub fn read_catalog_csv(path: &Path) -> Result<Vec<SecurityRecord>, CatalogImportError> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| CatalogImportError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;

    let mut records = Vec::new();
    for row in reader.deserialize::<CsvSecurityRow>() {
        let row = row.map_err(|err| CatalogImportError::MalformedRow(err.to_string()))?;
        records.push(SecurityRecord::from(row));
    }

    Ok(records)
}

/// Load the CSV feed into the catalog in batches. Returns the number of
/// rows inserted.
pub async fn import_catalog(
    repo: Arc<dyn SecuritiesRepo>,
    path: &Path,
) -> Result<u64, CatalogImportError> {
    let records = read_catalog_csv(path)?;
    let total = records.len();

    let mut inserted = 0_u64;
    for batch in records.chunks(IMPORT_BATCH_SIZE) {
        inserted += repo.insert_securities(batch).await?;
    }

    info!(
        target = "sentinel::catalog",
        rows = total,
        inserted,
        "catalog import completed"
    );

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "ISIN,CUSIP,FIGI,Ticker,Security_Name,Issuer_Name,Issuer_Country,\
Country_of_Risk,Instrument_Type,Seniority,Currency,Coupon_Type,Coupon_Rate,Issue_Date,\
Maturity_Date,Days_to_Maturity,Rating_SP,Rating_Moodys,Rating_Fitch,Composite_Rating,\
IG_Flag,Developed_Market,Sector,Index_Member,Approved_Index,Callable,Putable,\
Subordinated_Flag,ESG_Exclusion,Shariah_Compliant";

    const ROW: &str = "US912828ZQ64,912828ZQ6,BBG00P3BLH14,UST,US Treasury 1.5% 2030,\
US Treasury,US,US,Government Bond,Senior,USD,Fixed,1.50,2020-05-15,2030-05-15,1740,\
AA+,Aaa,AAA,AAA,Yes,Yes,Government,Yes,Yes,No,No,No,No,No";

    #[test]
    fn parses_the_feed_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "{ROW}").unwrap();

        let records = read_catalog_csv(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].isin, "US912828ZQ64");
        assert_eq!(records[0].coupon_rate, 1.5);
        assert_eq!(records[0].days_to_maturity, 1740);
        assert_eq!(records[0].composite_rating, "AAA");
    }

    #[test]
    fn rejects_malformed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "only,three,fields").unwrap();

        let err = read_catalog_csv(file.path()).unwrap_err();
        assert!(matches!(err, CatalogImportError::MalformedRow(_)));
    }

    #[test]
    fn missing_files_report_the_path() {
        let err = read_catalog_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }
}
