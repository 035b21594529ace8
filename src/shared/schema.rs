diesel::table! {
    tickets (id) {
        id -> Uuid,
        ticket_id -> Varchar,
        user_id -> Varchar,
        category -> Varchar,
        description -> Text,
        priority -> Varchar,
        status -> Varchar,
        escalated -> Bool,
        escalation_level -> Int4,
        assigned_to -> Nullable<Varchar>,
        resolution_notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        last_action_at -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    ticket_history (id) {
        id -> Uuid,
        ticket_id -> Varchar,
        changed_by -> Varchar,
        old_status -> Nullable<Varchar>,
        new_status -> Varchar,
        comment -> Text,
        changed_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(tickets, ticket_history);
