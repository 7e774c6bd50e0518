use lazy_static::lazy_static;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        dto::{ListQuery, UserPage, UserResponse},
        pagination::PageRequest,
        password::hash_password,
        repo_types::{NewUser, UserChanges},
        upload::UserForm,
    },
    validation::{Rule, Validator},
};

const EMAIL_MSG: &str = "Must be a valid email address";
const PASSWORD_MSG: &str = "Password must be at least 6 characters long";
const NAME_MSG: &str = "Name is required";

lazy_static! {
    static ref CREATE_RULES: Validator = Validator::new()
        .rule("email", Rule::Email, EMAIL_MSG)
        .rule("password", Rule::MinLength(6), PASSWORD_MSG)
        .rule("name", Rule::NotEmpty, NAME_MSG);
    static ref UPDATE_RULES: Validator = Validator::new()
        .optional("email", Rule::Email, EMAIL_MSG)
        .optional("password", Rule::MinLength(6), PASSWORD_MSG)
        .optional("name", Rule::NotEmpty, NAME_MSG);
}

/// Path ids that are not valid integers can never match a row.
pub fn parse_id(raw: &str) -> ApiResult<i32> {
    raw.trim().parse::<i32>().map_err(|_| ApiError::NotFound)
}

pub async fn create_user(st: &AppState, form: UserForm) -> ApiResult<UserResponse> {
    CREATE_RULES
        .validate(&form.fields)
        .map_err(ApiError::Validation)?;

    let fields = form.fields;
    let hash = hash_password(fields.password.as_deref().unwrap_or_default())?;
    let user = st
        .users
        .create(NewUser {
            email: fields.email.unwrap_or_default(),
            password: hash,
            name: fields.name.unwrap_or_default(),
            photo: form.photo,
        })
        .await?;

    info!(user_id = user.id, "user created");
    Ok(UserResponse::from_user(user, &st.config.base_url))
}

pub async fn list_users(st: &AppState, query: &ListQuery) -> ApiResult<UserPage> {
    let req = PageRequest::from_query(query)?;
    let skip = req.skip()?;

    let count = st.users.count().await?;
    let rows = st.users.find_page(skip, req.page_size).await?;

    let total_pages = req.total_pages(count);
    let users = rows
        .into_iter()
        .map(|u| UserResponse::from_user(u, &st.config.base_url))
        .collect();

    Ok(UserPage {
        count,
        total_pages,
        current_page: req.page,
        next_page: req.next_link(total_pages),
        prev_page: req.prev_link(),
        users,
    })
}

pub async fn get_user(st: &AppState, id: i32) -> ApiResult<UserResponse> {
    let user = st.users.find_by_id(id).await?.ok_or(ApiError::NotFound)?;
    Ok(UserResponse::from_user(user, &st.config.base_url))
}

pub async fn update_user(st: &AppState, id: i32, form: UserForm) -> ApiResult<UserResponse> {
    let mut fields = form.fields;
    if fields.password.as_deref() == Some("") {
        fields.password = None;
    }
    UPDATE_RULES.validate(&fields).map_err(ApiError::Validation)?;

    let password = match fields.password.as_deref() {
        Some(plain) => Some(hash_password(plain)?),
        None => None,
    };
    let changes = UserChanges {
        email: fields.email,
        password,
        name: fields.name,
        photo: form.photo,
    };

    let user = st
        .users
        .update(id, changes)
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = user.id, "user updated");
    Ok(UserResponse::from_user(user, &st.config.base_url))
}

pub async fn delete_user(st: &AppState, id: i32) -> ApiResult<()> {
    if !st.users.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    info!(user_id = id, "user deleted");
    Ok(())
}
