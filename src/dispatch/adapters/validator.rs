//! Sender and directive validation against the roster.
//!
//! Submission bodies may carry one directive per line:
//!
//! ```text
//! urgent: yes
//! team: alice, bob
//! assign: carol
//! ```
//!
//! Full-width colons and commas are accepted, as is the ideographic comma.
//! A subject containing `--sender <id>` is attributed to that roster member
//! instead of the mail sender.

use crate::dispatch::domain::{Author, Directives, InboundMail};
use crate::dispatch::ports::{CollaboratorError, CollaboratorResult, Validator};
use crate::review::ports::{ReviewStore, ReviewStoreError, ReviewTransaction};
use crate::roster::domain::{Reviewer, ReviewerId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

const SENDER_FLAG: &str = "--sender";

/// Directive found on one body line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DirectiveLine {
    Urgent(bool),
    Team(Vec<String>),
    Assign(String),
}

/// Extracts directive lines from a message body, ignoring ordinary text.
pub(crate) fn parse_directive_lines(body: &str) -> Vec<DirectiveLine> {
    body.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<DirectiveLine> {
    let normalised: String = line
        .chars()
        .map(|ch| match ch {
            ':' | '：' | ',' | '，' | '、' => ' ',
            other => other,
        })
        .collect();
    let mut tokens = normalised.split_whitespace();
    let keyword = tokens.next()?.to_lowercase();
    let values: Vec<String> = tokens.map(ToOwned::to_owned).collect();
    match keyword.as_str() {
        "urgent" => Some(DirectiveLine::Urgent(values.first().is_some_and(|value| {
            matches!(value.to_lowercase().as_str(), "yes" | "y" | "true" | "1")
        }))),
        "team" => Some(DirectiveLine::Team(values)),
        "assign" => values.into_iter().next().map(DirectiveLine::Assign),
        _ => None,
    }
}

/// Returns the roster id named by `--sender <id>` in a subject.
pub(crate) fn sender_override(subject: &str) -> Option<&str> {
    let mut tokens = subject.split_whitespace();
    tokens.find(|token| *token == SENDER_FLAG)?;
    tokens.next()
}

/// Returns the bare address of `Name <address>` style senders.
pub(crate) fn mail_address(from: &str) -> &str {
    from.rsplit_once('<')
        .and_then(|(_, rest)| rest.split_once('>'))
        .map_or(from, |(address, _)| address)
        .trim()
}

fn resolve_name(
    tx: &mut dyn ReviewTransaction,
    name: &str,
) -> Result<Option<Reviewer>, ReviewStoreError> {
    if let Ok(id) = ReviewerId::new(name)
        && let Some(reviewer) = tx.fetch_reviewer(&id)?
    {
        return Ok(Some(reviewer));
    }
    let mut matches = tx.find_reviewers_by_name(name)?;
    if matches.len() == 1 {
        Ok(matches.pop())
    } else {
        Ok(None)
    }
}

fn resolve_directives(
    tx: &mut dyn ReviewTransaction,
    lines: Vec<DirectiveLine>,
    author: &ReviewerId,
) -> Result<Directives, ReviewStoreError> {
    let mut directives = Directives::default();
    let mut requested = None;
    for line in lines {
        match line {
            DirectiveLine::Urgent(flag) => directives.urgent = flag,
            DirectiveLine::Team(names) => {
                for name in names {
                    let Some(member) = resolve_name(tx, &name)? else {
                        directives
                            .warnings
                            .push(format!("unknown team member {name} ignored"));
                        continue;
                    };
                    directives.exclude.insert(member.id().clone());
                }
            }
            DirectiveLine::Assign(name) => requested = Some(name),
        }
    }
    if let Some(name) = requested {
        match resolve_name(tx, &name)? {
            Some(reviewer) if !reviewer.is_reviewer() => directives
                .warnings
                .push(format!("{name} does not review reports; assignment ignored")),
            Some(reviewer) if reviewer.id() == author => directives
                .warnings
                .push("self-assignment ignored".to_owned()),
            Some(reviewer) if directives.exclude.contains(reviewer.id()) => directives
                .warnings
                .push(format!("{name} is a teammate; assignment ignored")),
            Some(reviewer) => directives.forced = Some(reviewer.id().clone()),
            None => directives
                .warnings
                .push(format!("unknown reviewer {name}; assignment ignored")),
        }
    }
    Ok(directives)
}

/// Validator resolving senders and directives through the review store.
#[derive(Debug, Clone)]
pub struct DirectiveValidator<S> {
    store: Arc<S>,
}

impl<S> DirectiveValidator<S> {
    /// Creates a validator reading the roster from `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> Validator for DirectiveValidator<S>
where
    S: ReviewStore + 'static,
{
    async fn validate_sender(&self, mail: &InboundMail) -> CollaboratorResult<Author> {
        let explicit = sender_override(&mail.subject).map(ToOwned::to_owned);
        let address = mail_address(&mail.from).to_owned();
        let found = self
            .store
            .transaction(move |tx| -> Result<Option<Reviewer>, ReviewStoreError> {
                let Some(id) = explicit else {
                    return tx.find_reviewer_by_email(&address);
                };
                ReviewerId::new(id).map_or(Ok(None), |reviewer_id| tx.fetch_reviewer(&reviewer_id))
            })
            .await?;
        let reviewer = found.ok_or_else(|| CollaboratorError::InvalidSender(mail.from.clone()))?;
        Ok(Author {
            id: reviewer.id().clone(),
            display_name: reviewer.display_name().to_owned(),
        })
    }

    async fn validate_directives(
        &self,
        mail: &InboundMail,
        author: &Author,
    ) -> CollaboratorResult<Directives> {
        let lines = parse_directive_lines(&mail.body);
        let author_id = author.id.clone();
        let directives = self
            .store
            .transaction(move |tx| resolve_directives(tx, lines, &author_id))
            .await?;
        for warning in &directives.warnings {
            warn!(folder = %mail.folder, author = %author.id, %warning, "directive ignored");
        }
        Ok(directives)
    }
}
