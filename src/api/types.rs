use serde::Serialize;

use crate::db::{PostPage, PostWithAuthor, User};
use crate::forms::FieldErrors;

/// Envelope shared by every endpoint. `flash` and `redirect` carry what a
/// server-rendered app would have pushed into the session and the Location
/// header; clients replay them after following the redirect.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flash: Vec<Flash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
            flash: Vec::new(),
            redirect: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            errors: None,
            flash: Vec::new(),
            redirect: None,
        }
    }

    #[must_use]
    pub fn with_flash(mut self, category: FlashCategory, message: impl Into<String>) -> Self {
        self.flash.push(Flash {
            category,
            message: message.into(),
        });
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    #[must_use]
    pub fn with_redirect(mut self, to: impl Into<String>) -> Self {
        self.redirect = Some(to.into());
        self
    }
}

impl ApiResponse<()> {
    /// Success with no payload; used by endpoints that only flash/redirect.
    pub const fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            errors: None,
            flash: Vec::new(),
            redirect: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Info,
    Danger,
}

#[derive(Debug, Serialize)]
pub struct AuthorDto {
    pub id: i32,
    pub username: String,
    pub image_url: String,
}

impl From<&User> for AuthorDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            image_url: avatar_url(&user.image_file),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDto {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub post_time: String,
    pub author: AuthorDto,
}

impl PostDto {
    #[must_use]
    pub fn from_parts(post: crate::entities::posts::Model, author: &User) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            post_time: post.post_time,
            author: AuthorDto::from(author),
        }
    }
}

impl From<PostWithAuthor> for PostDto {
    fn from(entry: PostWithAuthor) -> Self {
        Self::from_parts(entry.post, &entry.author)
    }
}

#[derive(Debug, Serialize)]
pub struct PostPageDto {
    pub posts: Vec<PostDto>,
    pub page: u64,
    pub total_pages: u64,
    pub total_items: u64,
}

impl From<PostPage> for PostPageDto {
    fn from(page: PostPage) -> Self {
        Self {
            posts: page.posts.into_iter().map(PostDto::from).collect(),
            page: page.page,
            total_pages: page.total_pages,
            total_items: page.total_items,
        }
    }
}

/// Public URL an avatar file is served under.
#[must_use]
pub fn avatar_url(image_file: &str) -> String {
    format!("/static/icon/{image_file}")
}
