//! Console presentation of results and errors.
//!
//! Colors are decided once when the [`Output`] is created and applied per
//! string; no terminal state is changed.

use std::io::{self, Write};

use colored::{ColoredString, Colorize};

use crate::error::AppError;

/// Width of the command column in help and syntax listings.
const COMMAND_COLUMN: usize = 29;

/// Output formatting context passed explicitly to everything that prints.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    color: bool,
}

impl Output {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Pretty JSON for a response body, the raw body when it is not JSON,
    /// `None` when there is nothing to show.
    pub fn render_result(&self, body: &str) -> Option<String> {
        if body.trim().is_empty() {
            return None;
        }
        let text = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
            Err(_) => body.to_string(),
        };
        Some(self.paint(&text, |s| s.white()))
    }

    /// One line per cause, outermost first.
    pub fn render_error(&self, err: &AppError) -> String {
        err.causes()
            .iter()
            .map(|cause| self.paint(cause, |s| s.red()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn print_result(&self, body: &str) {
        if let Some(text) = self.render_result(body) {
            println!("{text}");
        }
    }

    pub fn print_error(&self, err: &AppError) {
        eprintln!("{}", self.render_error(err));
    }

    /// Usage examples for every command.
    pub fn render_syntax(&self) -> String {
        let mut out = String::new();
        for note in SYNTAX_NOTES {
            out.push_str(&self.paint(note, |s| s.white()));
            out.push('\n');
        }
        out.push('\n');
        for (command, usage) in SYNTAX {
            let line = format!("{command:<COMMAND_COLUMN$}: {usage}");
            out.push_str(&self.paint(&line, |s| s.cyan()));
            out.push('\n');
        }
        out
    }

    pub fn print_syntax(&self) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(self.render_syntax().as_bytes())?;
        stdout.flush()
    }
}

const SYNTAX_NOTES: &[&str] = &[
    "- Square brackets indicate optional arguments",
    "- For information on supported query expressions, including $filter, $top, $orderby, and $expand, see https://msdn.microsoft.com/en-us/library/azure/dn727074.aspx",
    "- To find the objectId of the b2c-extensions-app, run get-b2c-application",
];

const SYNTAX: &[(&str, &str)] = &[
    ("get-user", "b2c-graph get-user [UserObjectId | Query]"),
    ("", "b2c-graph get-user 6d51065f-2e1d-4707-8ec9-ad491bae55dd"),
    ("", "b2c-graph get-user '$filter=displayName eq '\\''Joe Consumer'\\'''"),
    ("create-user", "b2c-graph create-user PathToJson"),
    ("", "b2c-graph create-user usertemplate-email.json"),
    ("update-user", "b2c-graph update-user UserObjectId PathToJson"),
    ("", "b2c-graph update-user 6d51065f-2e1d-4707-8ec9-ad491bae55dd usertemplate-email.json"),
    ("delete-user", "b2c-graph delete-user UserObjectId"),
    ("", "b2c-graph delete-user 6d51065f-2e1d-4707-8ec9-ad491bae55dd"),
    ("get-extension-attribute", "b2c-graph get-extension-attribute B2CExtensionsApplicationObjectId"),
    ("", "b2c-graph get-extension-attribute 909544d8-f8c0-49c7-b137-a89faff6f882"),
    ("register-extension", "b2c-graph register-extension B2CExtensionsApplicationObjectId PathToJson"),
    ("unregister-extension", "b2c-graph unregister-extension B2CExtensionsApplicationObjectId ExtensionObjectId"),
    ("get-b2c-application", "b2c-graph get-b2c-application"),
    ("help", "b2c-graph help"),
    ("syntax", "b2c-graph syntax"),
];
