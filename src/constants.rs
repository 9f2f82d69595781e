pub const ALLOWED_AVATAR_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg"];

pub mod pagination {

    pub const PER_PAGE: u64 = 10;
}

pub mod session {

    pub const USER_ID_KEY: &str = "user_id";
}

pub mod validation {

    pub const USERNAME_MIN: usize = 6;

    pub const USERNAME_MAX: usize = 20;

    pub const PASSWORD_MIN: usize = 6;

    pub const PASSWORD_MAX: usize = 20;

    pub const TITLE_MAX: usize = 100;
}
