//! Notifications sent to reviewers and operators.

use crate::review::domain::{ClosedTask, OpenTask};
use crate::review::services::WorkloadDigest;
use crate::roster::domain::ReviewerId;
use minijinja::{Environment, context};
use serde::Serialize;
use std::sync::Arc;

const ASSIGNED_SUBJECT: &str = "{% if resend %}(resend) {% endif %}[review assigned] {{ codes }}";
const ASSIGNED_BODY: &str = "\
Projects:
{% for code, title in task.codes|items %}  - {{ code }}: {{ title }}
{% endfor %}Company: {{ task.company }}
Author: {{ task.author_id }}
Pages: {{ task.pages }}
Urgent: {{ 'yes' if task.urgent else 'no' }}
Reviewer: {{ task.reviewer_id }}
{% for warning in warnings %}Warning: {{ warning }}
{% endfor %}";

const FINISHED_SUBJECT: &str = "{% if resend %}(resend) {% endif %}[review finished] {{ codes }}";
const FINISHED_BODY: &str = "\
Projects:
{% for code, title in task.codes|items %}  - {{ code }}: {{ title }}
{% endfor %}Company: {{ task.company }}
Reviewer: {{ task.reviewer_id }}
Opened: {{ task.opened_at }}
Closed: {{ task.closed_at }}
{% for warning in warnings %}Warning: {{ warning }}
{% endfor %}";

const DIGEST_SUBJECT: &str = "[workload] {{ open_tasks|length }} open";
const DIGEST_BODY: &str = "\
Open tasks:
{% for task in open_tasks %}  - {{ task.codes|join('+') }} -> {{ task.reviewer_id or 'unassigned' }} ({{ task.pages }} pages{% if task.urgent %}, urgent{% endif %})
{% else %}  (none)
{% endfor %}Queue:
{% for candidate in queue %}  {{ loop.index }}. {{ candidate.reviewer.id }} open={{ candidate.open_count }} diff={{ candidate.pages_diff }}{% if candidate.skipped %} skipped{% endif %}
{% endfor %}";

const FAILURE_SUBJECT: &str = "[failure] {{ source }}";
const FAILURE_BODY: &str = "({{ source }}) {{ description }}";

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A task was assigned to a reviewer.
    Assigned,
    /// A review was finished.
    Finished,
    /// Periodic workload digest.
    Digest,
    /// A command failed.
    Failure,
}

/// Rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// What happened.
    pub kind: NotificationKind,
    /// Roster member to notify; `None` addresses the operators.
    pub recipient: Option<ReviewerId>,
    /// Rendered subject line.
    pub subject: String,
    /// Rendered body.
    pub body: String,
    /// Warnings collected while processing the command.
    pub warnings: Vec<String>,
}

/// Renders notifications from built-in templates.
#[derive(Debug, Clone)]
pub struct NotificationRenderer {
    env: Arc<Environment<'static>>,
}

impl NotificationRenderer {
    /// Creates a renderer with the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`minijinja::Error`] when a template fails to compile.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("assigned.subject", ASSIGNED_SUBJECT)?;
        env.add_template("assigned.body", ASSIGNED_BODY)?;
        env.add_template("finished.subject", FINISHED_SUBJECT)?;
        env.add_template("finished.body", FINISHED_BODY)?;
        env.add_template("digest.subject", DIGEST_SUBJECT)?;
        env.add_template("digest.body", DIGEST_BODY)?;
        env.add_template("failure.subject", FAILURE_SUBJECT)?;
        env.add_template("failure.body", FAILURE_BODY)?;
        Ok(Self { env: Arc::new(env) })
    }

    /// Builds the notification telling a reviewer about a new task.
    ///
    /// # Errors
    ///
    /// Returns [`minijinja::Error`] when rendering fails.
    pub fn assigned(
        &self,
        task: &OpenTask,
        recipient: Option<ReviewerId>,
        warnings: Vec<String>,
        resend: bool,
    ) -> Result<Notification, minijinja::Error> {
        let ctx = context! {
            task => task,
            codes => task.codes().joined(),
            warnings => &warnings,
            resend => resend,
        };
        Ok(Notification {
            kind: NotificationKind::Assigned,
            recipient: recipient.or_else(|| task.reviewer_id().cloned()),
            subject: self.render("assigned.subject", &ctx)?,
            body: self.render("assigned.body", &ctx)?,
            warnings,
        })
    }

    /// Builds the notification telling an author their review is done.
    ///
    /// # Errors
    ///
    /// Returns [`minijinja::Error`] when rendering fails.
    pub fn finished(
        &self,
        task: &ClosedTask,
        recipient: Option<ReviewerId>,
        warnings: Vec<String>,
        resend: bool,
    ) -> Result<Notification, minijinja::Error> {
        let ctx = context! {
            task => task,
            codes => task.codes().joined(),
            warnings => &warnings,
            resend => resend,
        };
        Ok(Notification {
            kind: NotificationKind::Finished,
            recipient: recipient.or_else(|| Some(task.author_id().clone())),
            subject: self.render("finished.subject", &ctx)?,
            body: self.render("finished.body", &ctx)?,
            warnings,
        })
    }

    /// Builds the workload digest for the operators.
    ///
    /// # Errors
    ///
    /// Returns [`minijinja::Error`] when rendering fails.
    pub fn digest(&self, digest: &WorkloadDigest) -> Result<Notification, minijinja::Error> {
        let ctx = minijinja::Value::from_serialize(digest);
        Ok(Notification {
            kind: NotificationKind::Digest,
            recipient: None,
            subject: self.render("digest.subject", &ctx)?,
            body: self.render("digest.body", &ctx)?,
            warnings: Vec::new(),
        })
    }

    /// Builds the operator alert for a failed command.
    ///
    /// # Errors
    ///
    /// Returns [`minijinja::Error`] when rendering fails.
    pub fn failure(&self, source: &str, description: &str) -> Result<Notification, minijinja::Error> {
        let ctx = context! { source => source, description => description };
        Ok(Notification {
            kind: NotificationKind::Failure,
            recipient: None,
            subject: self.render("failure.subject", &ctx)?,
            body: self.render("failure.body", &ctx)?,
            warnings: Vec::new(),
        })
    }

    fn render(&self, name: &str, ctx: &minijinja::Value) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }
}
