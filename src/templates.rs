//! HTML rendering with Tera.
//!
//! Templates are compiled into the binary so the server has no runtime
//! dependency on its working directory. Names ending in `.html` are autoescaped.

use std::collections::HashMap;

use axum::response::Html;
use tera::{Context, Tera, Value};

use crate::error::AppError;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("product.html", include_str!("../templates/product.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("signup.html", include_str!("../templates/signup.html")),
    ("account.html", include_str!("../templates/account.html")),
    (
        "checkout_success.html",
        include_str!("../templates/checkout_success.html"),
    ),
    (
        "checkout_cancel.html",
        include_str!("../templates/checkout_cancel.html"),
    ),
];

/// Compiled template set shared by all handlers.
#[derive(Debug)]
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Parse all embedded templates and register filters.
    ///
    /// # Errors
    ///
    /// Returns an error if a template fails to parse or extends an unknown parent.
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        // Added in one batch so `{% extends %}` chains resolve
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        tera.register_filter("money", money);
        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<Html<String>, AppError> {
        Ok(Html(self.tera.render(name, context)?))
    }
}

/// `{{ cents | money(currency="usd") }}` → `12.34 USD`.
fn money(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let cents = value
        .as_i64()
        .ok_or_else(|| tera::Error::msg("money filter expects an integer amount in cents"))?;
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let mut out = format!("{sign}{}.{:02}", abs / 100, abs % 100);

    if let Some(currency) = args.get("currency").and_then(Value::as_str) {
        out.push(' ');
        out.push_str(&currency.to_uppercase());
    }
    Ok(Value::String(out))
}
