//! Diesel schema for workflow persistence.

diesel::table! {
    /// Issues scoped to a repository.
    issues (id) {
        /// Generated issue identifier.
        id -> Int8,
        /// Owning repository identifier.
        repo_id -> Int8,
        /// Issue title.
        #[max_length = 255]
        title -> Varchar,
        /// Free-form description.
        description -> Text,
        /// Lifecycle state, `open` or `closed`.
        #[max_length = 16]
        state -> Varchar,
        /// Author user identifier.
        author_id -> Int8,
        /// User who closed the issue.
        closed_by -> Nullable<Int8>,
        /// Closure timestamp.
        closed_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Merge requests scoped to a repository.
    merge_requests (id) {
        /// Generated merge request identifier.
        id -> Int8,
        /// Owning repository identifier.
        repo_id -> Int8,
        /// Merge request title.
        #[max_length = 255]
        title -> Varchar,
        /// Free-form description.
        description -> Text,
        /// Branch whose commits are merged.
        #[max_length = 255]
        source_branch -> Varchar,
        /// Branch receiving the merge commit.
        #[max_length = 255]
        target_branch -> Varchar,
        /// Lifecycle state, `open`, `merged` or `closed`.
        #[max_length = 16]
        state -> Varchar,
        /// Author user identifier.
        author_id -> Int8,
        /// User who merged the merge request.
        merged_by -> Nullable<Int8>,
        /// Merge timestamp.
        merged_at -> Nullable<Timestamptz>,
        /// User who closed the merge request.
        closed_by -> Nullable<Int8>,
        /// Closure timestamp.
        closed_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Directed "depends-on" edges between issues.
    issue_dependencies (id) {
        /// Generated edge identifier.
        id -> Int8,
        /// Blocked issue.
        issue_id -> Int8,
        /// Issue depended on.
        depends_on_id -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(issues, issue_dependencies);
