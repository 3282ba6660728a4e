// src/report.rs

//! Result reporting
//!
//! One invocation emits exactly one report on stdout: either a success with
//! `changed` true/false, or a failure with a message. Logs go to stderr so
//! the JSON report stays machine-readable.

use crate::reconcile::ReconcileOutcome;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;

/// Final status surface for the caller
#[derive(Debug, Serialize)]
pub struct Report {
    pub changed: bool,
    /// Inventory listing as observed before any action was taken
    #[serde(skip_serializing_if = "Value::is_null")]
    pub current: Value,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl Report {
    pub fn success(outcome: ReconcileOutcome) -> Self {
        Self {
            changed: outcome.changed,
            current: outcome.before,
            message: outcome.message,
            failed: false,
        }
    }

    pub fn failure(message: impl Display) -> Self {
        Self {
            changed: false,
            current: Value::Null,
            message: message.to_string(),
            failed: true,
        }
    }

    /// Print the report as pretty JSON on stdout
    pub fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => println!("{}", json),
            // Report is plain data; serialization cannot realistically fail,
            // but degrade to the message rather than panicking
            Err(_) => println!("{}", self.message),
        }
    }
}
