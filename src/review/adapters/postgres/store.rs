//! `PostgreSQL` implementation of the review store.

use super::{
    models::{
        ClosedTaskRow, MailLogRow, NewClosedTaskRow, NewMailLogRow, OpenTaskRow, ReviewerRow,
    },
    schema::{closed_tasks, mail_log, open_tasks, reviewers},
};
use crate::review::domain::{
    ClosedTask, ClosedTaskId, MailLogEntry, NewClosedTask, NewMailLogEntry, OpenTask, OpenTaskId,
    Page, PageRequest, Pages, PersistedClosedTaskData, PersistedOpenTaskData, ProjectCodes,
    TaskFilter,
};
use crate::review::ports::{ReviewStore, ReviewStoreError, ReviewStoreResult, ReviewTransaction};
use crate::roster::domain::{
    Availability, PersistedReviewerData, Reviewer, ReviewerId, ReviewerRole,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by review adapters.
pub type ReviewPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed review store.
#[derive(Debug, Clone)]
pub struct PostgresReviewStore {
    pool: ReviewPgPool,
}

impl PostgresReviewStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: ReviewPgPool) -> Self {
        Self { pool }
    }
}

/// Separates the closure's own error from driver failures so that diesel
/// can roll back on either.
enum TransactionFailure<E> {
    Work(E),
    Driver(DieselError),
}

impl<E> From<DieselError> for TransactionFailure<E> {
    fn from(err: DieselError) -> Self {
        Self::Driver(err)
    }
}

#[async_trait]
impl ReviewStore for PostgresReviewStore {
    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<ReviewStoreError> + Send + 'static,
        F: FnOnce(&mut dyn ReviewTransaction) -> Result<T, E> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(|err| E::from(ReviewStoreError::persistence(err)))?;
            connection
                .transaction::<T, TransactionFailure<E>, _>(|conn| {
                    work(&mut PgReviewTransaction { conn }).map_err(TransactionFailure::Work)
                })
                .map_err(|failure| match failure {
                    TransactionFailure::Work(err) => err,
                    TransactionFailure::Driver(err) => {
                        E::from(ReviewStoreError::persistence(err))
                    }
                })
        })
        .await
        .map_err(|err| E::from(ReviewStoreError::persistence(err)))?
    }
}

struct PgReviewTransaction<'a> {
    conn: &'a mut PgConnection,
}

impl ReviewTransaction for PgReviewTransaction<'_> {
    fn lock_roster(&mut self) -> ReviewStoreResult<()> {
        reviewers::table
            .select(reviewers::id)
            .order(reviewers::id.asc())
            .for_update()
            .load::<String>(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        Ok(())
    }

    fn insert_reviewer(&mut self, reviewer: &Reviewer) -> ReviewStoreResult<()> {
        diesel::insert_into(reviewers::table)
            .values(&to_reviewer_row(reviewer))
            .execute(self.conn)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    ReviewStoreError::DuplicateReviewer(reviewer.id().clone())
                }
                _ => ReviewStoreError::persistence(err),
            })?;
        Ok(())
    }

    fn fetch_reviewer(&mut self, id: &ReviewerId) -> ReviewStoreResult<Option<Reviewer>> {
        let row = reviewers::table
            .find(id.as_str())
            .select(ReviewerRow::as_select())
            .first::<ReviewerRow>(self.conn)
            .optional()
            .map_err(ReviewStoreError::persistence)?;
        row.map(row_to_reviewer).transpose()
    }

    fn find_reviewer_by_email(&mut self, email: &str) -> ReviewStoreResult<Option<Reviewer>> {
        let row = diesel::sql_query(concat!(
            "SELECT id, display_name, email, role, availability, pages_weighted, status_since ",
            "FROM reviewers WHERE LOWER(email) = LOWER($1) LIMIT 1",
        ))
        .bind::<diesel::sql_types::Text, _>(email.trim())
        .get_result::<ReviewerRow>(self.conn)
        .optional()
        .map_err(ReviewStoreError::persistence)?;
        row.map(row_to_reviewer).transpose()
    }

    fn find_reviewers_by_name(&mut self, name: &str) -> ReviewStoreResult<Vec<Reviewer>> {
        let rows = diesel::sql_query(concat!(
            "SELECT id, display_name, email, role, availability, pages_weighted, status_since ",
            "FROM reviewers WHERE LOWER(id) = LOWER($1) OR LOWER(display_name) = LOWER($1) ",
            "ORDER BY id",
        ))
        .bind::<diesel::sql_types::Text, _>(name.trim())
        .load::<ReviewerRow>(self.conn)
        .map_err(ReviewStoreError::persistence)?;
        rows.into_iter().map(row_to_reviewer).collect()
    }

    fn list_reviewers(&mut self) -> ReviewStoreResult<Vec<Reviewer>> {
        let rows = reviewers::table
            .order(reviewers::id.asc())
            .select(ReviewerRow::as_select())
            .load::<ReviewerRow>(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        rows.into_iter().map(row_to_reviewer).collect()
    }

    fn adjust_pages(&mut self, id: &ReviewerId, delta: i64) -> ReviewStoreResult<Reviewer> {
        let mut reviewer = self
            .fetch_reviewer(id)?
            .ok_or_else(|| ReviewStoreError::ReviewerNotFound(id.clone()))?;
        reviewer.adjust_pages(delta)?;
        diesel::update(reviewers::table.find(id.as_str()))
            .set(reviewers::pages_weighted.eq(reviewer.pages_weighted()))
            .execute(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        Ok(reviewer)
    }

    fn set_availability(
        &mut self,
        id: &ReviewerId,
        level: Availability,
        now: DateTime<Utc>,
    ) -> ReviewStoreResult<Reviewer> {
        let row = diesel::update(reviewers::table.find(id.as_str()))
            .set((
                reviewers::availability.eq(level.as_i16()),
                reviewers::status_since.eq(now),
            ))
            .returning(ReviewerRow::as_returning())
            .get_result::<ReviewerRow>(self.conn)
            .optional()
            .map_err(ReviewStoreError::persistence)?
            .ok_or_else(|| ReviewStoreError::ReviewerNotFound(id.clone()))?;
        row_to_reviewer(row)
    }

    fn reset_stale_availability(
        &mut self,
        threshold_days: u32,
        now: DateTime<Utc>,
    ) -> ReviewStoreResult<usize> {
        let cutoff = now - Duration::days(i64::from(threshold_days));
        diesel::update(
            reviewers::table
                .filter(reviewers::availability.ne(Availability::AcceptingAll.as_i16()))
                .filter(reviewers::status_since.le(cutoff)),
        )
        .set((
            reviewers::availability.eq(Availability::AcceptingAll.as_i16()),
            reviewers::status_since.eq(now),
        ))
        .execute(self.conn)
        .map_err(ReviewStoreError::persistence)
    }

    fn insert_open(&mut self, task: &OpenTask) -> ReviewStoreResult<()> {
        let row = to_open_row(task)?;
        diesel::insert_into(open_tasks::table)
            .values(&row)
            .execute(self.conn)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    ReviewStoreError::DuplicateTask(task.id().clone())
                }
                _ => ReviewStoreError::persistence(err),
            })?;
        Ok(())
    }

    fn fetch_open(&mut self, id: &OpenTaskId) -> ReviewStoreResult<Option<OpenTask>> {
        let row = open_tasks::table
            .find(id.as_str())
            .select(OpenTaskRow::as_select())
            .first::<OpenTaskRow>(self.conn)
            .optional()
            .map_err(ReviewStoreError::persistence)?;
        row.map(row_to_open_task).transpose()
    }

    fn update_open(&mut self, task: &OpenTask) -> ReviewStoreResult<()> {
        let pages = i32::try_from(task.pages().value()).map_err(ReviewStoreError::persistence)?;
        let updated = diesel::update(open_tasks::table.find(task.id().as_str()))
            .set((
                open_tasks::reviewer_id.eq(task.reviewer_id().map(ReviewerId::as_str)),
                open_tasks::pages.eq(pages),
                open_tasks::urgent.eq(task.urgent()),
            ))
            .execute(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        if updated == 0 {
            return Err(ReviewStoreError::OpenTaskNotFound(task.id().clone()));
        }
        Ok(())
    }

    fn delete_open(&mut self, id: &OpenTaskId) -> ReviewStoreResult<OpenTask> {
        let row = diesel::delete(open_tasks::table.find(id.as_str()))
            .returning(OpenTaskRow::as_returning())
            .get_result::<OpenTaskRow>(self.conn)
            .optional()
            .map_err(ReviewStoreError::persistence)?
            .ok_or_else(|| ReviewStoreError::OpenTaskNotFound(id.clone()))?;
        row_to_open_task(row)
    }

    fn search_open(
        &mut self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> ReviewStoreResult<Page<OpenTask>> {
        let total = filtered_open(filter)
            .count()
            .get_result::<i64>(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        let rows = filtered_open(filter)
            .order((open_tasks::opened_at.asc(), open_tasks::id.asc()))
            .offset(page_offset(page)?)
            .limit(page_limit(page))
            .load::<OpenTaskRow>(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        Ok(Page {
            rows: rows
                .into_iter()
                .map(row_to_open_task)
                .collect::<ReviewStoreResult<_>>()?,
            total: u64::try_from(total).map_err(ReviewStoreError::persistence)?,
        })
    }

    fn insert_closed(&mut self, task: NewClosedTask) -> ReviewStoreResult<ClosedTask> {
        let row = to_new_closed_row(&task)?;
        let inserted = diesel::insert_into(closed_tasks::table)
            .values(&row)
            .returning(ClosedTaskRow::as_returning())
            .get_result::<ClosedTaskRow>(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        row_to_closed_task(inserted)
    }

    fn fetch_closed(&mut self, id: ClosedTaskId) -> ReviewStoreResult<Option<ClosedTask>> {
        let row = closed_tasks::table
            .find(id.value())
            .select(ClosedTaskRow::as_select())
            .first::<ClosedTaskRow>(self.conn)
            .optional()
            .map_err(ReviewStoreError::persistence)?;
        row.map(row_to_closed_task).transpose()
    }

    fn search_closed(
        &mut self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> ReviewStoreResult<Page<ClosedTask>> {
        let total = filtered_closed(filter)
            .count()
            .get_result::<i64>(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        let rows = filtered_closed(filter)
            .order(closed_tasks::id.desc())
            .offset(page_offset(page)?)
            .limit(page_limit(page))
            .load::<ClosedTaskRow>(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        Ok(Page {
            rows: rows
                .into_iter()
                .map(row_to_closed_task)
                .collect::<ReviewStoreResult<_>>()?,
            total: u64::try_from(total).map_err(ReviewStoreError::persistence)?,
        })
    }

    fn most_recent_closed(&mut self) -> ReviewStoreResult<Option<ClosedTask>> {
        let row = closed_tasks::table
            .order(closed_tasks::id.desc())
            .select(ClosedTaskRow::as_select())
            .first::<ClosedTaskRow>(self.conn)
            .optional()
            .map_err(ReviewStoreError::persistence)?;
        row.map(row_to_closed_task).transpose()
    }

    fn insert_mail_log(
        &mut self,
        entry: NewMailLogEntry,
        recorded_at: DateTime<Utc>,
    ) -> ReviewStoreResult<MailLogEntry> {
        let row = to_new_mail_log_row(entry, recorded_at)?;
        let inserted = diesel::insert_into(mail_log::table)
            .values(&row)
            .returning(MailLogRow::as_returning())
            .get_result::<MailLogRow>(self.conn)
            .map_err(ReviewStoreError::persistence)?;
        row_to_mail_log(inserted)
    }

    fn recent_mail_log(&mut self, limit: usize) -> ReviewStoreResult<Vec<MailLogEntry>> {
        mail_log::table
            .order(mail_log::id.desc())
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .select(MailLogRow::as_select())
            .load::<MailLogRow>(self.conn)
            .map_err(ReviewStoreError::persistence)?
            .into_iter()
            .map(row_to_mail_log)
            .collect()
    }
}

fn filtered_open(filter: &TaskFilter) -> open_tasks::BoxedQuery<'static, Pg> {
    let mut query = open_tasks::table.into_boxed();
    if !filter.codes().is_empty() {
        let codes: Vec<String> = filter.codes().iter().cloned().collect();
        query = query.filter(open_tasks::codes.has_all_keys(codes));
    }
    if let Some(author_id) = filter.author_id() {
        query = query.filter(open_tasks::author_id.eq(author_id.as_str().to_owned()));
    }
    if let Some(reviewer_id) = filter.reviewer_id() {
        query = query.filter(open_tasks::reviewer_id.eq(reviewer_id.as_str().to_owned()));
    }
    query
}

fn filtered_closed(filter: &TaskFilter) -> closed_tasks::BoxedQuery<'static, Pg> {
    let mut query = closed_tasks::table.into_boxed();
    if !filter.codes().is_empty() {
        let codes: Vec<String> = filter.codes().iter().cloned().collect();
        query = query.filter(closed_tasks::codes.has_all_keys(codes));
    }
    if let Some(author_id) = filter.author_id() {
        query = query.filter(closed_tasks::author_id.eq(author_id.as_str().to_owned()));
    }
    if let Some(reviewer_id) = filter.reviewer_id() {
        query = query.filter(closed_tasks::reviewer_id.eq(reviewer_id.as_str().to_owned()));
    }
    if let Some(fragment) = filter.company() {
        query = query.filter(closed_tasks::company.ilike(like_pattern(fragment)));
    }
    query
}

fn like_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for ch in fragment.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn page_offset(page: PageRequest) -> ReviewStoreResult<i64> {
    i64::try_from(page.offset()).map_err(ReviewStoreError::persistence)
}

fn page_limit(page: PageRequest) -> i64 {
    i64::from(page.page_size())
}

fn to_reviewer_row(reviewer: &Reviewer) -> ReviewerRow {
    ReviewerRow {
        id: reviewer.id().as_str().to_owned(),
        display_name: reviewer.display_name().to_owned(),
        email: reviewer.email().map(str::to_owned),
        role: reviewer.role().as_i16(),
        availability: reviewer.availability().as_i16(),
        pages_weighted: reviewer.pages_weighted(),
        status_since: reviewer.status_since(),
    }
}

fn row_to_reviewer(row: ReviewerRow) -> ReviewStoreResult<Reviewer> {
    Ok(Reviewer::from_persisted(PersistedReviewerData {
        id: ReviewerId::new(row.id).map_err(ReviewStoreError::persistence)?,
        display_name: row.display_name,
        email: row.email,
        role: ReviewerRole::try_from(row.role).map_err(ReviewStoreError::persistence)?,
        availability: Availability::try_from(row.availability)
            .map_err(ReviewStoreError::persistence)?,
        pages_weighted: row.pages_weighted,
        status_since: row.status_since,
    }))
}

fn to_open_row(task: &OpenTask) -> ReviewStoreResult<OpenTaskRow> {
    Ok(OpenTaskRow {
        id: task.id().as_str().to_owned(),
        codes: serde_json::to_value(task.codes()).map_err(ReviewStoreError::persistence)?,
        company: task.company().to_owned(),
        pages: i32::try_from(task.pages().value()).map_err(ReviewStoreError::persistence)?,
        urgent: task.urgent(),
        author_id: task.author_id().as_str().to_owned(),
        reviewer_id: task.reviewer_id().map(|id| id.as_str().to_owned()),
        opened_at: task.opened_at(),
    })
}

fn row_to_open_task(row: OpenTaskRow) -> ReviewStoreResult<OpenTask> {
    let task = OpenTask::from_persisted(PersistedOpenTaskData {
        codes: parse_codes(row.codes)?,
        company: row.company,
        pages: parse_pages(row.pages)?,
        urgent: row.urgent,
        author_id: ReviewerId::new(row.author_id).map_err(ReviewStoreError::persistence)?,
        reviewer_id: row
            .reviewer_id
            .map(ReviewerId::new)
            .transpose()
            .map_err(ReviewStoreError::persistence)?,
        opened_at: row.opened_at,
    });
    if task.id().as_str() != row.id {
        return Err(ReviewStoreError::persistence(std::io::Error::other(format!(
            "open task {} does not match the fingerprint of its codes",
            row.id
        ))));
    }
    Ok(task)
}

fn to_new_closed_row(task: &NewClosedTask) -> ReviewStoreResult<NewClosedTaskRow> {
    Ok(NewClosedTaskRow {
        codes: serde_json::to_value(&task.codes).map_err(ReviewStoreError::persistence)?,
        company: task.company.clone(),
        pages: i32::try_from(task.pages.value()).map_err(ReviewStoreError::persistence)?,
        urgent: task.urgent,
        author_id: task.author_id.as_str().to_owned(),
        reviewer_id: task.reviewer_id.as_str().to_owned(),
        opened_at: task.opened_at,
        closed_at: task.closed_at,
    })
}

fn row_to_closed_task(row: ClosedTaskRow) -> ReviewStoreResult<ClosedTask> {
    Ok(ClosedTask::from_persisted(PersistedClosedTaskData {
        id: ClosedTaskId::new(row.id).map_err(ReviewStoreError::persistence)?,
        task: NewClosedTask {
            codes: parse_codes(row.codes)?,
            company: row.company,
            pages: parse_pages(row.pages)?,
            urgent: row.urgent,
            author_id: ReviewerId::new(row.author_id).map_err(ReviewStoreError::persistence)?,
            reviewer_id: ReviewerId::new(row.reviewer_id)
                .map_err(ReviewStoreError::persistence)?,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
        },
    }))
}

fn parse_codes(value: serde_json::Value) -> ReviewStoreResult<ProjectCodes> {
    serde_json::from_value::<ProjectCodes>(value).map_err(ReviewStoreError::persistence)
}

fn parse_pages(value: i32) -> ReviewStoreResult<Pages> {
    let raw = u32::try_from(value).map_err(ReviewStoreError::persistence)?;
    Pages::new(raw).map_err(ReviewStoreError::persistence)
}

fn to_new_mail_log_row(
    entry: NewMailLogEntry,
    recorded_at: DateTime<Utc>,
) -> ReviewStoreResult<NewMailLogRow> {
    Ok(NewMailLogRow {
        warnings: serde_json::to_value(&entry.warnings).map_err(ReviewStoreError::persistence)?,
        folder: entry.folder,
        keyword: entry.keyword,
        sender: entry.sender,
        author_id: entry.author_id.map(|id| id.as_str().to_owned()),
        error: entry.error,
        mail: entry.mail,
        document: entry.document,
        recorded_at,
    })
}

fn row_to_mail_log(row: MailLogRow) -> ReviewStoreResult<MailLogEntry> {
    let author_id = row
        .author_id
        .map(ReviewerId::new)
        .transpose()
        .map_err(ReviewStoreError::persistence)?;
    Ok(MailLogEntry {
        id: row.id,
        entry: NewMailLogEntry {
            folder: row.folder,
            keyword: row.keyword,
            sender: row.sender,
            author_id,
            error: row.error,
            warnings: serde_json::from_value(row.warnings)
                .map_err(ReviewStoreError::persistence)?,
            mail: row.mail,
            document: row.document,
        },
        recorded_at: row.recorded_at,
    })
}
