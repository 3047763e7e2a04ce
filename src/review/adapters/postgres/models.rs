//! Diesel row models for review persistence.

use super::schema::{closed_tasks, mail_log, open_tasks, reviewers};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Row of the `reviewers` table.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Insertable)]
#[diesel(table_name = reviewers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReviewerRow {
    /// Reviewer handle.
    pub id: String,
    /// Human readable name.
    pub display_name: String,
    /// Mail address.
    pub email: Option<String>,
    /// Role code.
    pub role: i16,
    /// Availability level.
    pub availability: i16,
    /// Weighted page total.
    pub pages_weighted: i64,
    /// Timestamp of the last availability change.
    pub status_since: DateTime<Utc>,
}

/// Row of the `open_tasks` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = open_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OpenTaskRow {
    /// Fingerprint.
    pub id: String,
    /// Code map as JSON.
    pub codes: Value,
    /// Company name.
    pub company: String,
    /// Page count.
    pub pages: i32,
    /// Urgency flag.
    pub urgent: bool,
    /// Report author.
    pub author_id: String,
    /// Assigned reviewer.
    pub reviewer_id: Option<String>,
    /// Opening timestamp.
    pub opened_at: DateTime<Utc>,
}

/// Query result row of the `closed_tasks` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = closed_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClosedTaskRow {
    /// Sequence number.
    pub id: i64,
    /// Code map as JSON.
    pub codes: Value,
    /// Company name.
    pub company: String,
    /// Page count.
    pub pages: i32,
    /// Urgency flag.
    pub urgent: bool,
    /// Report author.
    pub author_id: String,
    /// Reviewer who finished the task.
    pub reviewer_id: String,
    /// Opening timestamp.
    pub opened_at: DateTime<Utc>,
    /// Finishing timestamp.
    pub closed_at: DateTime<Utc>,
}

/// Insert model for the `closed_tasks` table.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = closed_tasks)]
pub struct NewClosedTaskRow {
    /// Code map as JSON.
    pub codes: Value,
    /// Company name.
    pub company: String,
    /// Page count.
    pub pages: i32,
    /// Urgency flag.
    pub urgent: bool,
    /// Report author.
    pub author_id: String,
    /// Reviewer who finished the task.
    pub reviewer_id: String,
    /// Opening timestamp.
    pub opened_at: DateTime<Utc>,
    /// Finishing timestamp.
    pub closed_at: DateTime<Utc>,
}

/// Query result row of the `mail_log` table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = mail_log)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MailLogRow {
    /// Sequence number.
    pub id: i64,
    /// Spool folder.
    pub folder: String,
    /// Operation keyword.
    pub keyword: String,
    /// Raw sender header.
    pub sender: String,
    /// Resolved roster member.
    pub author_id: Option<String>,
    /// Failure description.
    pub error: Option<String>,
    /// Warnings as JSON.
    pub warnings: Value,
    /// Message as JSON.
    pub mail: Value,
    /// Report facts as JSON.
    pub document: Option<Value>,
    /// Write timestamp.
    pub recorded_at: DateTime<Utc>,
}

/// Insert model for the `mail_log` table.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = mail_log)]
pub struct NewMailLogRow {
    /// Spool folder.
    pub folder: String,
    /// Operation keyword.
    pub keyword: String,
    /// Raw sender header.
    pub sender: String,
    /// Resolved roster member.
    pub author_id: Option<String>,
    /// Failure description.
    pub error: Option<String>,
    /// Warnings as JSON.
    pub warnings: Value,
    /// Message as JSON.
    pub mail: Value,
    /// Report facts as JSON.
    pub document: Option<Value>,
    /// Write timestamp.
    pub recorded_at: DateTime<Utc>,
}
