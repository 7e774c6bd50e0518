use sqlx::FromRow;

/// User row as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password: String, // Argon2 hash
    pub name: String,
    pub photo: Option<String>, // relative path, e.g. uploads/1700000000000-me.png
}

/// Values for a row about to be inserted; `id` comes from the datastore.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub photo: Option<String>,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub photo: Option<String>,
}

impl UserChanges {
    pub fn apply(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(password) = self.password {
            user.password = password;
        }
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(photo) = self.photo {
            user.photo = Some(photo);
        }
    }
}
