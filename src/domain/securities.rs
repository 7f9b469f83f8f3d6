//! The reference security catalog: one flat record per instrument, plus
//! the column allowlist shared by sorting and funnel filtering.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityRecord {
    pub id: Uuid,
    pub isin: String,
    pub cusip: String,
    pub figi: String,
    pub ticker: String,
    pub security_name: String,
    pub issuer_name: String,
    pub issuer_country: String,
    pub country_of_risk: String,
    pub instrument_type: String,
    pub seniority: String,
    pub currency: String,
    pub coupon_type: String,
    pub coupon_rate: f64,
    pub issue_date: String,
    pub maturity_date: String,
    pub days_to_maturity: i32,
    pub rating_sp: String,
    pub rating_moodys: String,
    pub rating_fitch: String,
    pub composite_rating: String,
    pub ig_flag: String,
    pub developed_market: String,
    pub sector: String,
    pub index_member: String,
    pub approved_index: String,
    pub callable: String,
    pub putable: String,
    pub subordinated_flag: String,
    pub esg_exclusion: String,
    pub shariah_compliant: String,
    pub created_at: OffsetDateTime,
}

/// Catalog columns exposed to clients for sorting and constraint
/// filtering. Anything outside this allowlist never reaches SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityColumn {
    Isin,
    Cusip,
    Figi,
    Ticker,
    SecurityName,
    IssuerName,
    IssuerCountry,
    CountryOfRisk,
    InstrumentType,
    Seniority,
    Currency,
    CouponType,
    CouponRate,
    IssueDate,
    MaturityDate,
    DaysToMaturity,
    RatingSp,
    RatingMoodys,
    RatingFitch,
    CompositeRating,
    IgFlag,
    DevelopedMarket,
    Sector,
    IndexMember,
    ApprovedIndex,
    Callable,
    Putable,
    SubordinatedFlag,
    EsgExclusion,
    ShariahCompliant,
}

impl SecurityColumn {
    /// The SQL identifier. Every value here is a static literal, so the
    /// enum doubles as the injection barrier for client-supplied columns.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Isin => "isin",
            Self::Cusip => "cusip",
            Self::Figi => "figi",
            Self::Ticker => "ticker",
            Self::SecurityName => "security_name",
            Self::IssuerName => "issuer_name",
            Self::IssuerCountry => "issuer_country",
            Self::CountryOfRisk => "country_of_risk",
            Self::InstrumentType => "instrument_type",
            Self::Seniority => "seniority",
            Self::Currency => "currency",
            Self::CouponType => "coupon_type",
            Self::CouponRate => "coupon_rate",
            Self::IssueDate => "issue_date",
            Self::MaturityDate => "maturity_date",
            Self::DaysToMaturity => "days_to_maturity",
            Self::RatingSp => "rating_sp",
            Self::RatingMoodys => "rating_moodys",
            Self::RatingFitch => "rating_fitch",
            Self::CompositeRating => "composite_rating",
            Self::IgFlag => "ig_flag",
            Self::DevelopedMarket => "developed_market",
            Self::Sector => "sector",
            Self::IndexMember => "index_member",
            Self::ApprovedIndex => "approved_index",
            Self::Callable => "callable",
            Self::Putable => "putable",
            Self::SubordinatedFlag => "subordinated_flag",
            Self::EsgExclusion => "esg_exclusion",
            Self::ShariahCompliant => "shariah_compliant",
        }
    }

    /// The column name used by the catalog feed and the JSON API.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Isin => "ISIN",
            Self::Cusip => "CUSIP",
            Self::Figi => "FIGI",
            Self::Ticker => "Ticker",
            Self::SecurityName => "Security_Name",
            Self::IssuerName => "Issuer_Name",
            Self::IssuerCountry => "Issuer_Country",
            Self::CountryOfRisk => "Country_of_Risk",
            Self::InstrumentType => "Instrument_Type",
            Self::Seniority => "Seniority",
            Self::Currency => "Currency",
            Self::CouponType => "Coupon_Type",
            Self::CouponRate => "Coupon_Rate",
            Self::IssueDate => "Issue_Date",
            Self::MaturityDate => "Maturity_Date",
            Self::DaysToMaturity => "Days_to_Maturity",
            Self::RatingSp => "Rating_SP",
            Self::RatingMoodys => "Rating_Moodys",
            Self::RatingFitch => "Rating_Fitch",
            Self::CompositeRating => "Composite_Rating",
            Self::IgFlag => "IG_Flag",
            Self::DevelopedMarket => "Developed_Market",
            Self::Sector => "Sector",
            Self::IndexMember => "Index_Member",
            Self::ApprovedIndex => "Approved_Index",
            Self::Callable => "Callable",
            Self::Putable => "Putable",
            Self::SubordinatedFlag => "Subordinated_Flag",
            Self::EsgExclusion => "ESG_Exclusion",
            Self::ShariahCompliant => "Shariah_Compliant",
        }
    }

    pub const ALL: [SecurityColumn; 30] = [
        Self::Isin,
        Self::Cusip,
        Self::Figi,
        Self::Ticker,
        Self::SecurityName,
        Self::IssuerName,
        Self::IssuerCountry,
        Self::CountryOfRisk,
        Self::InstrumentType,
        Self::Seniority,
        Self::Currency,
        Self::CouponType,
        Self::CouponRate,
        Self::IssueDate,
        Self::MaturityDate,
        Self::DaysToMaturity,
        Self::RatingSp,
        Self::RatingMoodys,
        Self::RatingFitch,
        Self::CompositeRating,
        Self::IgFlag,
        Self::DevelopedMarket,
        Self::Sector,
        Self::IndexMember,
        Self::ApprovedIndex,
        Self::Callable,
        Self::Putable,
        Self::SubordinatedFlag,
        Self::EsgExclusion,
        Self::ShariahCompliant,
    ];

    /// Resolve a client-supplied sort or filter column by its wire name.
    /// Matching is case-insensitive; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|column| column.wire_name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.eq_ignore_ascii_case("desc") => Self::Descending,
            _ => Self::Ascending,
        }
    }
}

/// A `column IN (values)` restriction over the catalog, produced by
/// funnel simulation. Values compare as text.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilter {
    pub column: SecurityColumn,
    pub values: Vec<String>,
}
