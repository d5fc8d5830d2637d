// Page rendering
// Pure functions from session/request snapshots to HTML

use axum::http::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use super::html::{document, el, nbsp, raw, text, Element, Node};
use crate::auth::{API_KEY_VAR, API_SECRET_VAR};

const PAGE_TITLE: &str = "Coho";
const DEVELOPER_SITE: &str = "http://developer.cohuman.com";
const REPOSITORY: &str = "http://github.com/alexch/coho";
const RIBBON_IMAGE: &str =
    "https://github.blog/wp-content/uploads/2008/12/forkme_right_darkblue_121621.png";

const STYLE: &str = r#"
body { font-family: sans-serif; }
table { border: 1px solid gray; border-spacing: 0; }
td, th {
  border: 1px solid gray;
  padding: .5em .25em;
  vertical-align: top;
  text-align: left;
  max-width: 80em;
}
th { background: #ededed; }
pre {
  margin: 0;
  max-height: 20em; overflow-y: auto;
  max-width: 60em; overflow-x: auto;
}
.ribbon { position: absolute; top: 0; right: 0; border: 0; }
"#;

/// Everything the main page shows
pub struct PageView<'a> {
    /// Whether the session holds a usable access token
    pub signed_in: bool,
    pub session: &'a BTreeMap<String, Value>,
    pub env: &'a BTreeMap<String, Value>,
    pub query: Option<&'a str>,
    pub result: Option<&'a Value>,
}

/// Render the main page
pub fn render_page(view: &PageView<'_>) -> String {
    let mut body = el("body")
        .children(banner())
        .child(el("hr"))
        .child(button_form("/authorize", "Sign In To Cohuman"));

    if view.signed_in {
        body = body
            .child(button_form("/logout", "Sign Out"))
            .child(button_form("/tasks", "List Tasks"))
            .child(button_form("/users", "List Users"))
            .child(button_form("/projects", "List Projects"));
    }

    if view.query.is_some() || view.result.is_some() {
        body = body.child(el("hr")).child(result_table(view.query, view.result));
    }

    let body = body.children(diagnostics(view.session, view.env));
    document(head(PAGE_TITLE), body)
}

/// Render the help page shown when no API credentials are configured
pub fn render_setup_page(
    session: &BTreeMap<String, Value>,
    env: &BTreeMap<String, Value>,
    credentials_file: &Path,
) -> String {
    let instructions = el("div")
        .child(el("h2").text("Cohuman API credentials are not configured"))
        .child(
            el("p")
                .text("Coho needs an API key and secret to sign you in. Register an application at ")
                .child(el("a").attr("href", DEVELOPER_SITE).text(DEVELOPER_SITE))
                .text(", then either:"),
        )
        .child(
            el("ul")
                .child(
                    el("li")
                        .text("set the ")
                        .child(el("code").text(API_KEY_VAR))
                        .text(" and ")
                        .child(el("code").text(API_SECRET_VAR))
                        .text(" environment variables, or"),
                )
                .child(
                    el("li")
                        .text("create ")
                        .child(el("code").text(credentials_file.display().to_string()))
                        .text(" containing:")
                        .child(el("pre").text("key: YOUR_KEY\nsecret: YOUR_SECRET")),
                ),
        )
        .child(el("p").text("Restart the server after changing either source."));

    let body = el("body")
        .children(banner())
        .child(el("hr"))
        .child(instructions)
        .children(diagnostics(session, env));

    document(head(PAGE_TITLE), body)
}

/// Render a minimal page for an error response
pub fn render_error_page(status: StatusCode, message: &str) -> String {
    let body = el("body")
        .child(el("h1").text("Coho!"))
        .child(el("hr"))
        .child(el("h2").text(status.to_string()))
        .child(el("p").text(message))
        .child(el("p").child(el("a").attr("href", "/").text("Back to Coho")));

    document(head(&format!("{} - {}", PAGE_TITLE, status)), body)
}

fn head(title: &str) -> Element {
    el("head")
        .child(el("meta").attr("charset", "utf-8"))
        .child(el("title").text(title))
        .child(el("style").child(raw(STYLE)))
}

fn banner() -> Vec<Node> {
    vec![
        el("a")
            .attr("href", REPOSITORY)
            .child(
                el("img")
                    .attr("class", "ribbon")
                    .attr("src", RIBBON_IMAGE)
                    .attr("alt", "Fork me on GitHub"),
            )
            .into(),
        el("h1").text("Coho!").into(),
        el("i")
            .text("Swimming upstream in the ")
            .child(el("a").attr("href", DEVELOPER_SITE).text("Cohuman API"))
            .into(),
    ]
}

fn button_form(action: &str, label: &str) -> Element {
    el("form")
        .attr("action", action)
        .attr("method", "get")
        .child(el("input").attr("type", "submit").attr("value", label))
}

fn result_table(query: Option<&str>, result: Option<&Value>) -> Element {
    let mut table = el("table");

    if let Some(query) = query {
        table = table.child(
            el("tr")
                .child(el("th").text("Query:"))
                .child(el("td").child(el("pre").text(query))),
        );
    }

    if let Some(result) = result {
        table = table
            .child(el("tr").child(el("th").attr("colspan", "2").text("Result")))
            .child(
                el("tr").child(
                    el("td")
                        .attr("colspan", "2")
                        .child(el("pre").text(pretty(result))),
                ),
            );
    }

    table
}

fn diagnostics(session: &BTreeMap<String, Value>, env: &BTreeMap<String, Value>) -> Vec<Node> {
    vec![
        el("hr").into(),
        hash_table("Session", session).into(),
        el("hr").into(),
        hash_table("Request Environment", env).into(),
        el("hr").into(),
    ]
}

/// Two-column dump of a mapping
fn hash_table(name: &str, map: &BTreeMap<String, Value>) -> Element {
    let table = el("table").child(el("tr").child(el("th").attr("colspan", "2").text(name)));

    if map.is_empty() {
        return table.child(
            el("tr").child(
                el("td")
                    .attr("colspan", "2")
                    .child(nbsp(5))
                    .child(text("[empty]"))
                    .child(nbsp(5)),
            ),
        );
    }

    table.children(map.iter().map(|(key, value)| {
        let cell = if is_blank(value) {
            el("td").child(nbsp(1))
        } else {
            el("td").child(el("pre").text(pretty(value)))
        };
        el("tr").child(el("td").text(key.as_str())).child(cell)
    }))
}

/// Values that render as a blank cell
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
