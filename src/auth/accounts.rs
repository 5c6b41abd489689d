use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    auth::roles::Role,
    models::{NewProfile, NewUser, NewUserRole},
    schema::{profiles, user_roles, users},
};

/// Identity, profile and role rows for a new account.
#[derive(Debug)]
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub roles: &'a [Role],
}

pub fn email_taken(conn: &mut PgConnection, email: &str) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        users::table.filter(users::email.eq(email)),
    ))
    .get_result(conn)
}

/// Writes all rows of the account in one transaction.
pub fn create_account(conn: &mut PgConnection, account: NewAccount<'_>) -> QueryResult<Uuid> {
    let user_id = Uuid::new_v4();

    conn.transaction(|conn| {
        diesel::insert_into(users::table)
            .values(NewUser {
                id: user_id,
                email: account.email.to_string(),
                password_hash: account.password_hash,
            })
            .execute(conn)?;
        diesel::insert_into(profiles::table)
            .values(NewProfile {
                id: user_id,
                email: account.email.to_string(),
                display_name: account.display_name,
            })
            .execute(conn)?;

        let role_rows: Vec<NewUserRole> = account
            .roles
            .iter()
            .map(|role| NewUserRole {
                id: Uuid::new_v4(),
                user_id,
                role: role.as_str().to_string(),
            })
            .collect();
        if !role_rows.is_empty() {
            diesel::insert_into(user_roles::table)
                .values(&role_rows)
                .execute(conn)?;
        }
        Ok(user_id)
    })
}
