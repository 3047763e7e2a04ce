//! Diesel schema for the roster ledger and review tasks.

diesel::table! {
    /// Roster members and their weighted workload counters.
    reviewers (id) {
        /// Reviewer handle.
        #[max_length = 64]
        id -> Varchar,
        /// Human readable name.
        #[max_length = 255]
        display_name -> Varchar,
        /// Mail address used to resolve inbound senders.
        #[max_length = 255]
        email -> Nullable<Varchar>,
        /// Role code (0 author only, 1 reviewer).
        role -> Int2,
        /// Availability level (0 to 2).
        availability -> Int2,
        /// Weighted pages across assigned open tasks.
        pages_weighted -> Int8,
        /// Timestamp of the last availability change.
        status_since -> Timestamptz,
    }
}

diesel::table! {
    /// Tasks awaiting or undergoing review.
    open_tasks (id) {
        /// Fingerprint of the project codes.
        #[max_length = 64]
        id -> Varchar,
        /// Map of project code to title.
        codes -> Jsonb,
        /// Company name.
        #[max_length = 255]
        company -> Varchar,
        /// Page count.
        pages -> Int4,
        /// Urgency flag.
        urgent -> Bool,
        /// Report author.
        #[max_length = 64]
        author_id -> Varchar,
        /// Assigned reviewer.
        #[max_length = 64]
        reviewer_id -> Nullable<Varchar>,
        /// Opening timestamp.
        opened_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only history of finished reviews.
    closed_tasks (id) {
        /// Sequence number.
        id -> Int8,
        /// Map of project code to title.
        codes -> Jsonb,
        /// Company name.
        #[max_length = 255]
        company -> Varchar,
        /// Page count.
        pages -> Int4,
        /// Urgency flag.
        urgent -> Bool,
        /// Report author.
        #[max_length = 64]
        author_id -> Varchar,
        /// Reviewer who finished the task.
        #[max_length = 64]
        reviewer_id -> Varchar,
        /// Opening timestamp.
        opened_at -> Timestamptz,
        /// Finishing timestamp.
        closed_at -> Timestamptz,
    }
}

diesel::table! {
    /// Outcome of every processed inbound message.
    mail_log (id) {
        /// Sequence number.
        id -> Int8,
        /// Spool folder of the message.
        #[max_length = 255]
        folder -> Varchar,
        /// Operation keyword.
        #[max_length = 16]
        keyword -> Varchar,
        /// Raw sender header.
        #[max_length = 255]
        sender -> Varchar,
        /// Resolved roster member.
        #[max_length = 64]
        author_id -> Nullable<Varchar>,
        /// Failure description.
        error -> Nullable<Text>,
        /// Directive warnings as a JSON array.
        warnings -> Jsonb,
        /// The message as received.
        mail -> Jsonb,
        /// Extracted report facts.
        document -> Nullable<Jsonb>,
        /// Write timestamp.
        recorded_at -> Timestamptz,
    }
}
