//! The security catalog browser view.

use askama::Template;

use crate::application::pagination::PageInfo;
use crate::domain::securities::SecurityRecord;

use super::views::LayoutContext;

#[derive(Clone)]
pub struct SecurityRowView {
    pub isin: String,
    pub ticker: String,
    pub security_name: String,
    pub issuer_name: String,
    pub issuer_country: String,
    pub instrument_type: String,
    pub currency: String,
    pub coupon: String,
    pub maturity_date: String,
    pub rating: String,
    pub rating_class: &'static str,
    pub ig: &'static str,
    pub sector: String,
    pub shariah: &'static str,
}

pub struct SecuritiesPageView {
    pub rows: Vec<SecurityRowView>,
    pub search: String,
    pub sort_by: String,
    pub sort_order: String,
    pub page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub showing_from: u64,
    pub showing_to: u64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: u32,
    pub next_page: u32,
}

impl SecuritiesPageView {
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }
}

#[derive(Template)]
#[template(path = "securities.html")]
pub struct SecuritiesTemplate {
    pub view: LayoutContext<SecuritiesPageView>,
}

fn rating_class(rating: &str) -> &'static str {
    if rating.starts_with("AAA") || rating.starts_with("AA") {
        "rating-prime"
    } else if rating.starts_with('A') {
        "rating-high"
    } else if rating.starts_with("BBB") {
        "rating-medium"
    } else if rating.starts_with("BB") || rating.starts_with('B') {
        "rating-low"
    } else {
        "rating-none"
    }
}

fn yes_no(value: &str) -> &'static str {
    if value == "Yes" { "Y" } else { "N" }
}

pub fn securities_page(
    records: &[SecurityRecord],
    pagination: PageInfo,
    search: &str,
    sort_by: &str,
    sort_order: &str,
) -> SecuritiesPageView {
    let showing_from = if pagination.total_count == 0 {
        0
    } else {
        u64::from(pagination.page - 1) * u64::from(pagination.limit) + 1
    };
    let showing_to = (u64::from(pagination.page) * u64::from(pagination.limit))
        .min(pagination.total_count);

    SecuritiesPageView {
        rows: records
            .iter()
            .map(|record| SecurityRowView {
                isin: record.isin.clone(),
                ticker: record.ticker.clone(),
                security_name: record.security_name.clone(),
                issuer_name: record.issuer_name.clone(),
                issuer_country: record.issuer_country.clone(),
                instrument_type: record.instrument_type.clone(),
                currency: record.currency.clone(),
                coupon: format!("{:.2}%", record.coupon_rate),
                maturity_date: record.maturity_date.clone(),
                rating: record.composite_rating.clone(),
                rating_class: rating_class(&record.composite_rating),
                ig: yes_no(&record.ig_flag),
                sector: record.sector.clone(),
                shariah: yes_no(&record.shariah_compliant),
            })
            .collect(),
        search: search.to_owned(),
        sort_by: sort_by.to_owned(),
        sort_order: sort_order.to_owned(),
        page: pagination.page,
        total_pages: pagination.total_pages,
        total_count: pagination.total_count,
        showing_from,
        showing_to,
        has_prev: pagination.has_prev_page,
        has_next: pagination.has_next_page,
        prev_page: pagination.page.saturating_sub(1).max(1),
        next_page: pagination.page + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_classes_bucket_by_grade() {
        assert_eq!(rating_class("AAA"), "rating-prime");
        assert_eq!(rating_class("AA-"), "rating-prime");
        assert_eq!(rating_class("A+"), "rating-high");
        assert_eq!(rating_class("BBB"), "rating-medium");
        assert_eq!(rating_class("BB+"), "rating-low");
        assert_eq!(rating_class("NR"), "rating-none");
    }
}
