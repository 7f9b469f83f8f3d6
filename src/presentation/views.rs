//! Shared view plumbing: template rendering helpers and the page layout
//! chrome.

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::{ErrorReport, HttpError};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand_title: String,
    pub navigation: Vec<NavigationLinkView>,
}

impl LayoutChrome {
    pub fn new(active_href: &str) -> Self {
        let link = |label: &str, href: &str| NavigationLinkView {
            label: label.to_owned(),
            href: href.to_owned(),
            is_active: href == active_href,
        };
        Self {
            brand_title: "Sentinel".to_owned(),
            navigation: vec![link("Projects", "/"), link("Securities", "/securities")],
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand_title: String,
    pub navigation: Vec<NavigationLinkView>,
    pub title: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, title: impl Into<String>, content: T) -> Self {
        Self {
            brand_title: chrome.brand_title,
            navigation: chrome.navigation,
            title: title.into(),
            content,
        }
    }
}

pub struct ErrorPageView {
    pub heading: String,
    pub message: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView {
        heading: "Not found".to_owned(),
        message: "The page you were looking for does not exist.".to_owned(),
    };
    let view = LayoutContext::new(chrome, "Not found", content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

pub fn render_error_response(chrome: LayoutChrome, status: StatusCode, detail: String) -> Response {
    let content = ErrorPageView {
        heading: "Something went wrong".to_owned(),
        message: "The request could not be completed. The failure has been logged.".to_owned(),
    };
    let view = LayoutContext::new(chrome, "Error", content);
    let mut response = render_template_response(ErrorTemplate { view }, status);
    ErrorReport::from_message("presentation::views::render_error_response", status, detail)
        .attach(&mut response);
    response
}
